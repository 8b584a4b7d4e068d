//! Dispatching native work off the calling thread.
//!
//! Every dataset owns an [`Executor`]: a native lock plus a FIFO of pending jobs. The
//! lock is held by synchronous calls and by the job currently running, so GDAL never
//! sees two concurrent calls on the same dataset. Queues are drained by a small
//! process-wide rayon pool; a queue is handed to at most one worker at a
//! time, which keeps jobs of one dataset in submission order.
//!
//! A job is split in two halves. The native half runs on the worker, touches only
//! native handles and plain values, and reports a [`Result`]. The translation half
//! turns that value into wrappers and runs on whichever thread awaits the [`Job`].

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use once_cell::sync::Lazy;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config;
use crate::dataset::Dataset;
use crate::errors::{GdalError, Result};
use crate::wrapper::{NativeObject, PinGuard, Wrapper};

type Work = Box<dyn FnOnce() + Send + 'static>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        // jobs run under `catch_unwind`, a poisoned lock only means a job panicked
        Err(poison_error) => poison_error.into_inner(),
    }
}

/// Threads shared by all datasets. `None` when the pool could not be built, in which
/// case drains go to rayon's global pool.
static POOL: Lazy<Option<ThreadPool>> = Lazy::new(|| {
    let workers = config::job_workers();
    match ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("gdal-job-{i}"))
        .build()
    {
        Ok(pool) => {
            log::debug!("started {workers} job worker(s)");
            Some(pool)
        }
        Err(e) => {
            log::error!("unable to start job workers, using the global pool: {e}");
            None
        }
    }
});

fn dispatch(work: impl FnOnce() + Send + 'static) {
    match POOL.as_ref() {
        Some(pool) => pool.spawn(work),
        None => rayon::spawn(work),
    }
}

#[derive(Default)]
struct Pending {
    queue: VecDeque<Work>,
    draining: bool,
}

/// Per-dataset serialization of native calls.
#[derive(Default)]
pub(crate) struct Executor {
    native_lock: Mutex<()>,
    pending: Mutex<Pending>,
    native_calls: AtomicUsize,
    closing: AtomicBool,
}

impl Executor {
    pub(crate) fn check_open(&self, root: &NativeObject) -> Result<()> {
        if self.closing.load(Ordering::Acquire) {
            return Err(GdalError::DestroyedDataset);
        }
        root.handle().map(|_| ())
    }

    /// Runs `f` under the native lock if `root` is still alive.
    ///
    /// Liveness is checked before and after acquiring the lock, so a dataset closed
    /// while this call waited is reported as destroyed without reaching GDAL.
    pub(crate) fn exec<T>(&self, root: &NativeObject, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.check_open(root)?;
        let _guard = lock(&self.native_lock);
        self.check_open(root)?;
        self.native_calls.fetch_add(1, Ordering::Relaxed);
        f()
    }

    /// Refuses new native sections, waits for the running one and runs `f` with the lock held.
    pub(crate) fn shutdown(&self, f: impl FnOnce()) {
        self.closing.store(true, Ordering::Release);
        let _guard = lock(&self.native_lock);
        f()
    }

    /// Number of native sections entered so far.
    pub(crate) fn native_calls(&self) -> usize {
        self.native_calls.load(Ordering::Relaxed)
    }

    fn submit(self: &Arc<Self>, work: Work) {
        let start_drain = {
            let mut pending = lock(&self.pending);
            pending.queue.push_back(work);
            !std::mem::replace(&mut pending.draining, true)
        };
        if start_drain {
            let executor = self.clone();
            dispatch(move || executor.drain());
        }
    }

    fn drain(&self) {
        loop {
            let work = {
                let mut pending = lock(&self.pending);
                match pending.queue.pop_front() {
                    Some(work) => work,
                    None => {
                        pending.draining = false;
                        return;
                    }
                }
            };
            if panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
                log::error!("job panicked, its result is reported as aborted");
            }
        }
    }
}

/// Lifecycle of a dispatched job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum JobState {
    Created = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
}

impl JobState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => JobState::Created,
            1 => JobState::Running,
            2 => JobState::Completed,
            _ => JobState::Failed,
        }
    }
}

/// A unit of native work bound to one dataset.
///
/// Objects registered with [`AsyncJob::pin`] stay alive until the job has finished,
/// even if every caller-side handle is dropped or destroyed meanwhile.
pub(crate) struct AsyncJob<N, T> {
    dataset: Dataset,
    pins: Vec<PinGuard>,
    rejected: Option<GdalError>,
    main: Box<dyn FnOnce() -> Result<N> + Send>,
    rval: Box<dyn FnOnce(N) -> Result<T>>,
}

impl<N: Send + 'static, T: 'static> AsyncJob<N, T> {
    pub(crate) fn new<M, R>(dataset: &Dataset, main: M, rval: R) -> Self
    where
        M: FnOnce() -> Result<N> + Send + 'static,
        R: FnOnce(N) -> Result<T> + 'static,
    {
        AsyncJob {
            dataset: dataset.clone(),
            pins: Vec::new(),
            rejected: None,
            main: Box::new(main),
            rval: Box::new(rval),
        }
    }

    /// Keeps `wrapper` from being released before the job has finished.
    ///
    /// The native half must resolve the wrapper with [`NativeObject::pinned_handle`].
    /// A wrapper that is already destroyed fails the job without running it.
    pub(crate) fn pin<W: Wrapper>(mut self, wrapper: &W) -> Self {
        let object = wrapper.native_object();
        match object.handle() {
            Ok(_) => self.pins.push(object.pin()),
            Err(e) => {
                self.rejected.get_or_insert(e);
            }
        }
        self
    }

    fn check(dataset: &Dataset, rejected: Option<GdalError>) -> Result<()> {
        dataset.executor().check_open(dataset.native_object())?;
        match rejected {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Runs both halves on the calling thread.
    pub(crate) fn run(self) -> Result<T> {
        let AsyncJob {
            dataset,
            pins,
            rejected,
            main,
            rval,
        } = self;
        Self::check(&dataset, rejected)?;
        let native = dataset.executor().exec(dataset.native_object(), main)?;
        let result = rval(native);
        drop(pins);
        result
    }

    /// Queues the native half on the dataset's executor.
    pub(crate) fn spawn(self) -> Job<T> {
        let AsyncJob {
            dataset,
            pins,
            rejected,
            main,
            rval,
        } = self;
        let state = Arc::new(AtomicU8::new(JobState::Created as u8));
        let (sender, receiver) = oneshot::channel::<Result<N>>();

        if let Err(e) = Self::check(&dataset, rejected) {
            state.store(JobState::Failed as u8, Ordering::Release);
            let _ = sender.send(Err(e));
        } else {
            let worker_state = state.clone();
            let worker_dataset = dataset.clone();
            dataset.executor().submit(Box::new(move || {
                worker_state.store(JobState::Running as u8, Ordering::Release);
                let result = worker_dataset
                    .executor()
                    .exec(worker_dataset.native_object(), main);
                let finished = if result.is_ok() {
                    JobState::Completed
                } else {
                    JobState::Failed
                };
                worker_state.store(finished as u8, Ordering::Release);
                if sender.send(result).is_err() {
                    log::trace!("job result dropped, nobody is waiting for it");
                }
                drop(pins);
            }));
        }

        let translate_state = state.clone();
        let future = async move {
            let native = receiver.await.map_err(|_| GdalError::JobAborted)??;
            let result = rval(native);
            if result.is_err() {
                translate_state.store(JobState::Failed as u8, Ordering::Release);
            }
            result
        }
        .boxed_local();

        Job { state, future }
    }
}

/// Future resolving to the result of an `_async` operation.
///
/// Dropping a `Job` does not abort it: the native half still runs, its result is
/// discarded.
#[must_use = "jobs do nothing observable unless awaited"]
pub struct Job<T> {
    state: Arc<AtomicU8>,
    future: LocalBoxFuture<'static, Result<T>>,
}

impl<T: 'static> Job<T> {
    /// A job that already holds its result, used when arguments are rejected up front.
    pub(crate) fn ready(result: Result<T>) -> Self {
        let state = if result.is_ok() {
            JobState::Completed
        } else {
            JobState::Failed
        };
        Job {
            state: Arc::new(AtomicU8::new(state as u8)),
            future: futures::future::ready(result).boxed_local(),
        }
    }
}

impl<T> Job<T> {
    pub fn state(&self) -> JobState {
        JobState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Blocks the current thread until the job has completed.
    pub fn wait(self) -> Result<T> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for Job<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().future.as_mut().poll(cx)
    }
}
