//! Process-wide identity map from native handles to their wrappers.
//!
//! GDAL hands out the same pointer every time a layer, a band or a sub-geometry is
//! requested from its parent. Registering those views here keeps a single
//! [`NativeObject`] per pointer, so `dataset.layers().get(0)` and
//! `dataset.layers().get_by_name("towns")` return handles that compare equal, and lets
//! a parent invalidate all of its views at once when it goes away.
//!
//! Entries hold [`Weak`] references; they are removed when the wrapper is dropped or
//! when the parent is purged.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use once_cell::sync::Lazy;

use crate::wrapper::{NativeObject, NativePtr};

/// `(parent uid, native address)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StoreKey {
    parent: u64,
    addr: usize,
}

impl StoreKey {
    pub(crate) fn new(parent: &NativeObject, ptr: NativePtr) -> Self {
        StoreKey {
            parent: parent.uid(),
            addr: ptr.addr(),
        }
    }
}

static OBJECTS: Lazy<Mutex<HashMap<StoreKey, Weak<NativeObject>>>> = Lazy::new(Default::default);

fn objects() -> MutexGuard<'static, HashMap<StoreKey, Weak<NativeObject>>> {
    match OBJECTS.lock() {
        Ok(guard) => guard,
        // entries are plain weak references, a panic cannot leave them half-written
        Err(poison_error) => poison_error.into_inner(),
    }
}

/// Returns the live object registered for `key`, if any.
///
/// A destroyed object still held by someone counts as absent.
pub fn lookup(key: StoreKey) -> Option<Arc<NativeObject>> {
    let object = objects().get(&key).and_then(Weak::upgrade)?;
    object.is_alive().then_some(object)
}

/// Registers `object` under `key`, replacing a dead entry.
pub fn register(key: StoreKey, object: &Arc<NativeObject>) {
    log::trace!("registering {} #{} under {:?}", object.kind(), object.uid(), key);
    objects().insert(key, Arc::downgrade(object));
}

/// Removes `key` unless it has been re-registered to a referenced object meanwhile.
pub fn unregister(key: StoreKey) {
    let mut objects = objects();
    if objects.get(&key).is_some_and(|weak| weak.strong_count() == 0) {
        objects.remove(&key);
    }
}

/// Returns the live object registered for `key` or registers the one built by `make`.
///
/// A destroyed entry is replaced, so a native object that is still valid never comes
/// back wrapped in a destroyed wrapper. `make` runs under the store lock and must not
/// touch the store itself.
pub(crate) fn get_or_register(
    key: StoreKey,
    make: impl FnOnce() -> NativeObject,
) -> Arc<NativeObject> {
    // a stale wrapper may be the last handle; it unregisters itself on drop, so it
    // must outlive the store lock
    let _stale: Option<Arc<NativeObject>>;
    let mut objects = objects();
    match objects.get(&key).and_then(Weak::upgrade) {
        Some(existing) if existing.is_alive() => return existing,
        other => _stale = other,
    }
    let object = Arc::new(make().with_store_key(key));
    log::trace!("registering {} #{} under {:?}", object.kind(), object.uid(), key);
    objects.insert(key, Arc::downgrade(&object));
    object
}

/// Unregisters `key` and destroys the object registered under it, if still alive.
pub(crate) fn evict(key: StoreKey) -> bool {
    let evicted = objects().remove(&key).and_then(|weak| weak.upgrade());
    match evicted {
        Some(object) => {
            log::debug!("evicting {} #{}", object.kind(), object.uid());
            object.destroy();
            true
        }
        None => false,
    }
}

/// Unregisters and destroys every live view registered under `parent`.
pub fn purge_parent(parent: &NativeObject) -> usize {
    let purged: Vec<Arc<NativeObject>> = {
        let mut objects = objects();
        let keys: Vec<StoreKey> = objects
            .keys()
            .filter(|key| key.parent == parent.uid())
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|key| objects.remove(&key))
            .filter_map(|weak| weak.upgrade())
            .collect()
    };
    for object in &purged {
        object.destroy();
    }
    if !purged.is_empty() {
        log::debug!(
            "purged {} view(s) of {} #{}",
            purged.len(),
            parent.kind(),
            parent.uid()
        );
    }
    purged.len()
}

#[cfg(test)]
pub(crate) fn registered_under(parent: &NativeObject) -> usize {
    objects()
        .iter()
        .filter(|(key, weak)| key.parent == parent.uid() && weak.strong_count() > 0)
        .count()
}

#[cfg(test)]
mod tests {
    use std::ffi::c_void;

    use super::*;
    use crate::errors::GdalError;

    unsafe fn release_nothing(_: *mut c_void) {}

    fn parent() -> Arc<NativeObject> {
        let mut value = Box::new(0u8);
        let ptr = NativePtr::new(&mut *value as *mut u8 as *mut c_void);
        // the parent pointer is never dereferenced
        std::mem::forget(value);
        Arc::new(NativeObject::owned("geometry", ptr, release_nothing))
    }

    fn child_ptr(n: usize) -> NativePtr {
        NativePtr::new((0x1000 + n * 8) as *mut c_void)
    }

    #[test]
    fn test_lookup_unknown_is_absent() {
        let parent = parent();
        assert!(lookup(StoreKey::new(&parent, child_ptr(1))).is_none());
    }

    #[test]
    fn test_get_or_register_preserves_identity() {
        let parent = parent();
        let key = StoreKey::new(&parent, child_ptr(2));
        let first = get_or_register(key, || NativeObject::borrowed("ring", child_ptr(2), &parent));
        let second = get_or_register(key, || NativeObject::borrowed("ring", child_ptr(2), &parent));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&lookup(key).unwrap(), &first));
        assert_eq!(registered_under(&parent), 1);
    }

    #[test]
    fn test_entry_removed_when_wrapper_dropped() {
        let parent = parent();
        let key = StoreKey::new(&parent, child_ptr(3));
        let child = get_or_register(key, || NativeObject::borrowed("ring", child_ptr(3), &parent));
        drop(child);
        assert!(lookup(key).is_none());
        assert!(!objects().contains_key(&key));
    }

    #[test]
    fn test_stale_unregister_keeps_new_entry() {
        let parent = parent();
        let key = StoreKey::new(&parent, child_ptr(4));
        let fresh = Arc::new(NativeObject::borrowed("ring", child_ptr(4), &parent));
        register(key, &fresh);
        unregister(key);
        assert!(Arc::ptr_eq(&lookup(key).unwrap(), &fresh));
    }

    #[test]
    fn test_purge_parent_destroys_views() {
        let parent = parent();
        let a = get_or_register(StoreKey::new(&parent, child_ptr(5)), || {
            NativeObject::borrowed("ring", child_ptr(5), &parent)
        });
        let b = get_or_register(StoreKey::new(&parent, child_ptr(6)), || {
            NativeObject::borrowed("ring", child_ptr(6), &parent)
        });
        assert_eq!(purge_parent(&parent), 2);
        assert!(matches!(a.handle(), Err(GdalError::Destroyed("ring"))));
        assert!(matches!(b.handle(), Err(GdalError::Destroyed("ring"))));
        assert!(parent.is_alive());
        assert_eq!(registered_under(&parent), 0);
    }

    #[test]
    fn test_destroyed_entry_is_replaced() {
        let parent = parent();
        let key = StoreKey::new(&parent, child_ptr(7));
        let old = get_or_register(key, || NativeObject::borrowed("ring", child_ptr(7), &parent));
        old.destroy();
        assert!(lookup(key).is_none());

        let fresh = get_or_register(key, || NativeObject::borrowed("ring", child_ptr(7), &parent));
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(fresh.is_alive());

        // dropping the stale wrapper keeps the new entry
        drop(old);
        assert!(Arc::ptr_eq(&lookup(key).unwrap(), &fresh));
    }
}
