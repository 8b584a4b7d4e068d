//! Ownership bookkeeping shared by every wrapper type.
//!
//! Each public wrapper ([`Dataset`](crate::Dataset), [`Layer`](crate::vector::Layer),
//! [`Geometry`](crate::vector::Geometry), ...) is a cheap, clonable handle to one
//! [`NativeObject`]. The native object records the GDAL pointer, whether this crate is
//! responsible for releasing it and which wrapper it was obtained from. Once released,
//! the pointer is cleared and every further access fails with
//! [`GdalError::Destroyed`] (or [`GdalError::DestroyedDataset`] when the owning dataset
//! is the object that went away).

use std::ffi::c_void;
use std::fmt::{Debug, Formatter};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::{GdalError, Result};
use crate::store::{self, StoreKey};

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Raw GDAL handle that can be moved to a job worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativePtr(*mut c_void);

// SAFETY: a `NativePtr` is only dereferenced by GDAL while the owning dataset's
// native lock is held (or, for standalone objects, by the thread that owns the wrapper).
unsafe impl Send for NativePtr {}

impl NativePtr {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        NativePtr(ptr)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    pub(crate) fn addr(self) -> usize {
        self.0 as usize
    }
}

/// Who releases the native object once the wrapper goes away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// Created by this crate, released on destroy.
    Owned,
    /// Copy of a parent-owned object, released on destroy.
    Cloned,
    /// Owned by the parent; never released here.
    Borrowed,
}

impl Ownership {
    pub fn releases(self) -> bool {
        !matches!(self, Ownership::Borrowed)
    }
}

/// Releases a native pointer previously handed out by GDAL.
pub(crate) type ReleaseFn = unsafe fn(*mut c_void);

/// Jobs currently holding the object, and whether a release waits for them.
#[derive(Default)]
struct Pins {
    count: usize,
    deferred: bool,
}

/// One GDAL object as seen from Rust: the pointer, its ownership and its parent link.
///
/// The parent link keeps the parent wrapper reachable while this object exists. It is
/// never used to free anything.
///
/// An object pinned by a running job outlives [`NativeObject::destroy`]: callers see it
/// destroyed at once, the release itself happens when the last pin is dropped.
pub struct NativeObject {
    kind: &'static str,
    uid: u64,
    ptr: AtomicPtr<c_void>,
    retired: AtomicBool,
    pins: Mutex<Pins>,
    ownership: Ownership,
    release: Option<ReleaseFn>,
    parent: Option<Arc<NativeObject>>,
    root: bool,
    store_key: Option<StoreKey>,
}

impl NativeObject {
    fn new(
        kind: &'static str,
        ptr: NativePtr,
        ownership: Ownership,
        release: Option<ReleaseFn>,
        parent: Option<Arc<NativeObject>>,
    ) -> Self {
        let object = NativeObject {
            kind,
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            ptr: AtomicPtr::new(ptr.as_ptr()),
            retired: AtomicBool::new(false),
            pins: Mutex::default(),
            ownership,
            release,
            parent,
            root: false,
            store_key: None,
        };
        log::trace!(
            "created {} #{} ({:?}) at {:p}",
            object.kind,
            object.uid,
            object.ownership,
            ptr.as_ptr()
        );
        object
    }

    /// A dataset handle: owned, parentless, and reported as [`GdalError::DestroyedDataset`] once closed.
    pub(crate) fn root(kind: &'static str, ptr: NativePtr, release: ReleaseFn) -> Self {
        let mut object = Self::new(kind, ptr, Ownership::Owned, Some(release), None);
        object.root = true;
        object
    }

    /// An object created by this crate.
    pub(crate) fn owned(kind: &'static str, ptr: NativePtr, release: ReleaseFn) -> Self {
        Self::new(kind, ptr, Ownership::Owned, Some(release), None)
    }

    /// An independent copy of a parent-owned object.
    pub(crate) fn cloned(kind: &'static str, ptr: NativePtr, release: ReleaseFn) -> Self {
        Self::new(kind, ptr, Ownership::Cloned, Some(release), None)
    }

    /// A view into an object owned by `parent`.
    pub(crate) fn borrowed(kind: &'static str, ptr: NativePtr, parent: &Arc<NativeObject>) -> Self {
        Self::new(kind, ptr, Ownership::Borrowed, None, Some(parent.clone()))
    }

    pub(crate) fn with_store_key(mut self, key: StoreKey) -> Self {
        self.store_key = Some(key);
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Process-unique identity, used as the parent key of registered children.
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub(crate) fn parent(&self) -> Option<&Arc<NativeObject>> {
        self.parent.as_ref()
    }

    /// Whether this object and every object on its parent chain is still alive.
    pub fn is_alive(&self) -> bool {
        self.handle().is_ok()
    }

    /// Returns the native pointer after checking the whole parent chain.
    pub fn handle(&self) -> Result<NativePtr> {
        if let Some(parent) = &self.parent {
            parent.handle()?;
        }
        if self.retired.load(Ordering::Acquire) {
            return Err(self.destroyed_error());
        }
        self.load_ptr()
    }

    /// Like [`NativeObject::handle`], but still succeeds after a destroy that waits for
    /// the caller's pin. Only for job halves holding a [`PinGuard`] on this object.
    pub(crate) fn pinned_handle(&self) -> Result<NativePtr> {
        if let Some(parent) = &self.parent {
            parent.pinned_handle()?;
        }
        self.load_ptr()
    }

    fn load_ptr(&self) -> Result<NativePtr> {
        let ptr = self.ptr.load(Ordering::Acquire);
        if ptr.is_null() {
            return Err(self.destroyed_error());
        }
        Ok(NativePtr(ptr))
    }

    pub(crate) fn destroyed_error(&self) -> GdalError {
        if self.root {
            GdalError::DestroyedDataset
        } else {
            GdalError::Destroyed(self.kind)
        }
    }

    fn pins(&self) -> MutexGuard<'_, Pins> {
        match self.pins.lock() {
            Ok(guard) => guard,
            Err(poison_error) => poison_error.into_inner(),
        }
    }

    /// Keeps the native object from being released until the guard is dropped.
    pub(crate) fn pin(self: &Arc<Self>) -> PinGuard {
        self.pins().count += 1;
        PinGuard(self.clone())
    }

    /// Marks the object destroyed and releases it if owned. Only the first call has any
    /// effect.
    ///
    /// While a job holds a pin the release is deferred until that job has finished.
    /// Datasets are never deferred: closing waits for the dataset's native lock instead.
    pub fn destroy(&self) {
        let mut pins = self.pins();
        self.retired.store(true, Ordering::Release);
        if pins.count > 0 && !self.root {
            if !pins.deferred {
                log::debug!(
                    "{} #{} is in use by {} job(s), release deferred",
                    self.kind,
                    self.uid,
                    pins.count
                );
            }
            pins.deferred = true;
            return;
        }
        self.release();
    }

    fn release(&self) {
        let ptr = self.ptr.swap(ptr::null_mut(), Ordering::AcqRel);
        if ptr.is_null() {
            return;
        }
        if let Some(release) = self.release.filter(|_| self.ownership.releases()) {
            log::debug!("releasing {} #{} at {:p}", self.kind, self.uid, ptr);
            unsafe { release(ptr) };
        } else {
            log::trace!("dropping view of {} #{} at {:p}", self.kind, self.uid, ptr);
        }
    }
}

/// A job's hold on a [`NativeObject`], see [`NativeObject::pin`].
pub(crate) struct PinGuard(Arc<NativeObject>);

impl Drop for PinGuard {
    fn drop(&mut self) {
        let object = &self.0;
        let mut pins = object.pins();
        pins.count -= 1;
        if pins.count == 0 && std::mem::take(&mut pins.deferred) {
            object.release();
        }
    }
}

impl Drop for NativeObject {
    fn drop(&mut self) {
        self.destroy();
        if let Some(key) = self.store_key {
            store::unregister(key);
        }
    }
}

impl Debug for NativeObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeObject")
            .field("kind", &self.kind)
            .field("uid", &self.uid)
            .field("ptr", &self.ptr.load(Ordering::Relaxed))
            .field("ownership", &self.ownership)
            .finish()
    }
}

/// Common surface of every wrapper type.
pub trait Wrapper {
    /// The shared native object behind this wrapper.
    fn native_object(&self) -> &Arc<NativeObject>;

    fn is_alive(&self) -> bool {
        self.native_object().is_alive()
    }

    /// Releases the native object now instead of when the last handle is dropped.
    fn destroy(&self) {
        self.native_object().destroy()
    }

    /// Whether both wrappers are handles to the same native object.
    fn ptr_eq(&self, other: &Self) -> bool
    where
        Self: Sized,
    {
        Arc::ptr_eq(self.native_object(), other.native_object())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    unsafe fn count_release(ptr: *mut c_void) {
        let released = Box::from_raw(ptr as *mut Arc<AtomicUsize>);
        released.fetch_add(1, Ordering::SeqCst);
    }

    fn boxed() -> NativePtr {
        tracked(&Arc::default())
    }

    /// A native value whose release increments `released`.
    fn tracked(released: &Arc<AtomicUsize>) -> NativePtr {
        NativePtr::new(Box::into_raw(Box::new(released.clone())) as *mut c_void)
    }

    #[test]
    fn test_destroy_releases_owned_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let object = Arc::new(NativeObject::owned("feature", tracked(&released), count_release));
        assert!(object.is_alive());
        object.destroy();
        object.destroy();
        assert!(!object.is_alive());
        assert!(matches!(object.handle(), Err(GdalError::Destroyed("feature"))));
        drop(object);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_borrowed_children_follow_their_root() {
        let mut value = 1u32;
        let root = Arc::new(NativeObject::root("dataset", boxed(), count_release));
        let child = Arc::new(NativeObject::borrowed(
            "layer",
            NativePtr::new(&mut value as *mut u32 as *mut c_void),
            &root,
        ));
        let grandchild = NativeObject::borrowed("geometry", child.handle().unwrap(), &child);
        assert_eq!(child.ownership(), Ownership::Borrowed);
        assert!(grandchild.is_alive());

        root.destroy();
        assert!(matches!(child.handle(), Err(GdalError::DestroyedDataset)));
        assert!(matches!(grandchild.handle(), Err(GdalError::DestroyedDataset)));
        assert!(matches!(root.handle(), Err(GdalError::DestroyedDataset)));
    }

    #[test]
    fn test_destroyed_child_of_live_parent() {
        let mut value = 1u32;
        let parent = Arc::new(NativeObject::owned("geometry", boxed(), count_release));
        let child = NativeObject::borrowed(
            "ring",
            NativePtr::new(&mut value as *mut u32 as *mut c_void),
            &parent,
        );
        child.destroy();
        assert!(parent.is_alive());
        assert!(matches!(child.handle(), Err(GdalError::Destroyed("ring"))));
        assert_eq!(value, 1);
    }

    #[test]
    fn test_destroy_waits_for_pins() {
        let released = Arc::new(AtomicUsize::new(0));
        let object = Arc::new(NativeObject::owned("feature", tracked(&released), count_release));
        let first = object.pin();
        let second = object.pin();
        object.destroy();
        assert!(!object.is_alive());
        assert!(matches!(object.handle(), Err(GdalError::Destroyed("feature"))));
        assert!(object.pinned_handle().is_ok());

        drop(first);
        assert!(object.pinned_handle().is_ok());
        drop(second);
        assert!(object.pinned_handle().is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);

        drop(object);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_root_is_released_despite_pins() {
        let root = Arc::new(NativeObject::root("dataset", boxed(), count_release));
        let _pin = root.pin();
        root.destroy();
        assert!(matches!(root.pinned_handle(), Err(GdalError::DestroyedDataset)));
    }
}
