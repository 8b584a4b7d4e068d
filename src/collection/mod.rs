//! Generic collections over the children of a wrapper.
//!
//! GDAL exposes the same shape of accessor for many kinds of children: a count, a
//! getter by position, sometimes a getter by name and an append. Each kind describes
//! its accessors once by implementing [`ChildAccess`] (plus [`IndexedAccess`] and
//! [`ChildAppend`] where they apply); [`Collection`] and [`DatasetCollection`] turn
//! that description into the public `count`/`get`/`iter`/`add` surface.
//!
//! [`Collection`] serves children whose parent is a standalone object (the points of a
//! line string, the rings of a polygon, the fields of a feature definition).
//! [`DatasetCollection`] serves children living inside a dataset (layers, bands,
//! features, overviews): every operation re-checks that the dataset is open, holds the
//! dataset's native lock and is also available as an `_async` [`Job`](crate::Job).

use std::ffi::CStr;

use crate::errors::{GdalError, Result};
use crate::wrapper::{NativePtr, Wrapper};

mod dataset_bound;
mod standalone;

pub use dataset_bound::{DatasetCollection, DatasetCollectionIter};
pub use standalone::{Collection, CollectionIter};

/// How to count and wrap the children of a parent wrapper.
pub trait ChildAccess: Sized + 'static {
    /// Wrapper owning the children.
    type Parent: Wrapper + Clone + 'static;
    /// Wrapper handed out for one child.
    type Element: 'static;
    /// What the native side hands to [`ChildAccess::wrap`]. Must be movable to a job worker.
    type Native: Send + 'static;

    /// Name of the child kind, used in error messages.
    const KIND: &'static str;

    /// # Safety
    /// `parent` must be a live handle of the parent's native type.
    unsafe fn count(parent: NativePtr) -> Result<usize>;

    /// Turns the native value into the element wrapper, deciding whether it is
    /// borrowed from `parent`, cloned or owned.
    fn wrap(parent: &Self::Parent, native: Self::Native) -> Result<Self::Element>;
}

/// Children addressable by position (and possibly by name).
pub trait IndexedAccess: ChildAccess {
    /// Position of the first child. GDAL numbers raster bands from 1.
    const FIRST_INDEX: usize = 0;
    /// Whether GDAL can look children up by name.
    const BY_NAME: bool = false;

    /// # Safety
    /// `parent` must be a live handle and `index` within the range reported by `count`.
    unsafe fn fetch(parent: NativePtr, index: usize) -> Result<Self::Native>;

    /// Returns `Ok(None)` when no child has that name.
    ///
    /// # Safety
    /// `parent` must be a live handle of the parent's native type.
    unsafe fn fetch_by_name(_parent: NativePtr, _name: &CStr) -> Result<Option<Self::Native>> {
        Err(unsupported::<Self>("get_by_name"))
    }
}

/// Children that can be appended to a standalone parent.
pub trait ChildAppend: ChildAccess {
    type Input<'a>;

    fn append(parent: &Self::Parent, input: Self::Input<'_>) -> Result<()>;
}

pub(crate) fn unsupported<A: ChildAccess>(operation: &'static str) -> GdalError {
    GdalError::Unsupported {
        kind: A::KIND,
        operation,
    }
}

pub(crate) fn check_index<A: IndexedAccess>(index: usize, count: usize) -> Result<()> {
    if index < A::FIRST_INDEX || index >= A::FIRST_INDEX + count {
        return Err(GdalError::IndexOutOfRange {
            kind: A::KIND,
            index,
            first: A::FIRST_INDEX,
            count,
        });
    }
    Ok(())
}

pub(crate) fn not_found<A: ChildAccess>(key: &str) -> GdalError {
    GdalError::NotFound {
        kind: A::KIND,
        key: key.to_string(),
    }
}

/// Fetches the child at `index` after checking it against the current count.
///
/// # Safety
/// `parent` must be a live handle of the parent's native type.
pub(crate) unsafe fn fetch_checked<A: IndexedAccess>(
    parent: NativePtr,
    index: usize,
) -> Result<A::Native> {
    let count = A::count(parent)?;
    check_index::<A>(index, count)?;
    A::fetch(parent, index)
}
