use std::ffi::CString;
use std::marker::PhantomData;

use futures::stream::{self, LocalBoxStream, StreamExt};

use crate::collection::{
    fetch_checked, not_found, unsupported, ChildAccess, IndexedAccess,
};
use crate::dataset::{Dataset, DatasetBound};
use crate::errors::{GdalError, Result};
use crate::job::{AsyncJob, Job};
use crate::wrapper::{NativePtr, Wrapper};

/// Children of an object living inside a dataset.
///
/// Every operation first checks that the dataset is still open and fails with
/// [`GdalError::DestroyedDataset`] otherwise, without calling into GDAL. Native calls
/// run under the dataset's native lock. Each operation comes in a blocking form and an
/// `_async` form that runs the native part on a job worker.
pub struct DatasetCollection<A: ChildAccess> {
    parent: A::Parent,
    _access: PhantomData<fn() -> A>,
}

impl<A: ChildAccess> DatasetCollection<A>
where
    A::Parent: DatasetBound,
{
    pub(crate) fn new(parent: A::Parent) -> Self {
        DatasetCollection {
            parent,
            _access: PhantomData,
        }
    }

    pub fn parent(&self) -> &A::Parent {
        &self.parent
    }

    pub fn dataset(&self) -> &Dataset {
        self.parent.dataset()
    }

    /// Builds a job whose native half receives the parent's handle, resolved on the
    /// worker, and whose translation half receives the parent wrapper.
    pub(crate) fn job<N, T, M, R>(&self, main: M, rval: R) -> AsyncJob<N, T>
    where
        N: Send + 'static,
        T: 'static,
        M: FnOnce(NativePtr) -> Result<N> + Send + 'static,
        R: FnOnce(&A::Parent, N) -> Result<T> + 'static,
    {
        let object = self.parent.native_object().clone();
        let parent = self.parent.clone();
        AsyncJob::new(
            self.dataset(),
            move || main(object.pinned_handle()?),
            move |native| rval(&parent, native),
        )
        .pin(&self.parent)
    }

    fn count_job(&self) -> AsyncJob<usize, usize> {
        self.job(|c_parent| unsafe { A::count(c_parent) }, |_, count| Ok(count))
    }

    /// Number of children.
    pub fn count(&self) -> Result<usize> {
        self.count_job().run()
    }

    pub fn count_async(&self) -> Job<usize> {
        self.count_job().spawn()
    }
}

impl<A: IndexedAccess> DatasetCollection<A>
where
    A::Parent: DatasetBound,
{
    fn get_job(&self, index: usize) -> AsyncJob<A::Native, A::Element> {
        self.job(
            move |c_parent| unsafe { fetch_checked::<A>(c_parent, index) },
            A::wrap,
        )
    }

    /// Returns the child at `index`.
    ///
    /// Fails with [`GdalError::IndexOutOfRange`] unless
    /// `FIRST_INDEX <= index < FIRST_INDEX + count()`.
    pub fn get(&self, index: usize) -> Result<A::Element> {
        self.get_job(index).run()
    }

    pub fn get_async(&self, index: usize) -> Job<A::Element> {
        self.get_job(index).spawn()
    }

    fn get_by_name_job(&self, name: &str) -> Result<AsyncJob<A::Native, A::Element>> {
        self.dataset().check_open()?;
        if !A::BY_NAME {
            return Err(unsupported::<A>("get_by_name"));
        }
        let c_name = CString::new(name)?;
        let key = name.to_string();
        Ok(self.job(
            move |c_parent| match unsafe { A::fetch_by_name(c_parent, &c_name)? } {
                Some(native) => Ok(native),
                None => Err(not_found::<A>(&key)),
            },
            A::wrap,
        ))
    }

    /// Returns the child called `name`.
    pub fn get_by_name(&self, name: &str) -> Result<A::Element> {
        self.get_by_name_job(name)?.run()
    }

    pub fn get_by_name_async(&self, name: &str) -> Job<A::Element> {
        match self.get_by_name_job(name) {
            Ok(job) => job.spawn(),
            Err(e) => Job::ready(Err(e)),
        }
    }

    /// Asynchronous counterpart of [`DatasetCollection::iter`]: counts, then fetches one
    /// child per step, each on a job worker.
    ///
    /// A failed count ends the stream after yielding its error.
    pub fn stream(&self) -> LocalBoxStream<'static, Result<A::Element>> {
        let collection = DatasetCollection::<A>::new(self.parent.clone());
        stream::unfold(
            (collection, None::<(usize, usize)>),
            |(collection, range)| async move {
                let (next, end) = match range {
                    Some(range) => range,
                    None => match collection.count_async().await {
                        Ok(count) => (A::FIRST_INDEX, A::FIRST_INDEX + count),
                        Err(e) => return Some((Err(e), (collection, Some((0, 0))))),
                    },
                };
                if next >= end {
                    return None;
                }
                let element = collection.get_async(next).await;
                Some((element, (collection, Some((next + 1, end)))))
            },
        )
        .boxed_local()
    }

    /// Iterates over the children present when the iterator is created.
    pub fn iter(&self) -> DatasetCollectionIter<'_, A> {
        let (next, end, error) = match self.count() {
            Ok(count) => (A::FIRST_INDEX, A::FIRST_INDEX + count, None),
            Err(e) => (0, 0, Some(e)),
        };
        DatasetCollectionIter {
            collection: self,
            next,
            end,
            error,
        }
    }
}

/// Iterator over a [`DatasetCollection`], yielding one `Result` per child.
pub struct DatasetCollectionIter<'a, A: IndexedAccess>
where
    A::Parent: DatasetBound,
{
    collection: &'a DatasetCollection<A>,
    next: usize,
    end: usize,
    error: Option<GdalError>,
}

impl<A: IndexedAccess> Iterator for DatasetCollectionIter<'_, A>
where
    A::Parent: DatasetBound,
{
    type Item = Result<A::Element>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.error.take() {
            return Some(Err(e));
        }
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.collection.get(index))
    }
}
