use std::ffi::CString;
use std::marker::PhantomData;

use crate::collection::{
    fetch_checked, not_found, unsupported, ChildAccess, ChildAppend, IndexedAccess,
};
use crate::errors::{GdalError, Result};
use crate::wrapper::Wrapper;

/// Children of a standalone parent such as a geometry or a feature definition.
///
/// The collection holds a handle to its parent and nothing else; every call goes
/// to GDAL, so counts always reflect the current native state.
pub struct Collection<A: ChildAccess> {
    parent: A::Parent,
    _access: PhantomData<fn() -> A>,
}

impl<A: ChildAccess> Collection<A> {
    pub(crate) fn new(parent: A::Parent) -> Self {
        Collection {
            parent,
            _access: PhantomData,
        }
    }

    pub fn parent(&self) -> &A::Parent {
        &self.parent
    }

    /// Number of children.
    pub fn count(&self) -> Result<usize> {
        let c_parent = self.parent.native_object().handle()?;
        unsafe { A::count(c_parent) }
    }
}

impl<A: IndexedAccess> Collection<A> {
    /// Returns the child at `index`.
    ///
    /// Fails with [`GdalError::IndexOutOfRange`] unless
    /// `FIRST_INDEX <= index < FIRST_INDEX + count()`.
    pub fn get(&self, index: usize) -> Result<A::Element> {
        let c_parent = self.parent.native_object().handle()?;
        let native = unsafe { fetch_checked::<A>(c_parent, index)? };
        A::wrap(&self.parent, native)
    }

    /// Returns the child called `name`.
    pub fn get_by_name(&self, name: &str) -> Result<A::Element> {
        if !A::BY_NAME {
            return Err(unsupported::<A>("get_by_name"));
        }
        let c_name = CString::new(name)?;
        let c_parent = self.parent.native_object().handle()?;
        match unsafe { A::fetch_by_name(c_parent, &c_name)? } {
            Some(native) => A::wrap(&self.parent, native),
            None => Err(not_found::<A>(name)),
        }
    }

    /// Iterates over the children present when the iterator is created.
    pub fn iter(&self) -> CollectionIter<'_, A> {
        match self.count() {
            Ok(count) => CollectionIter {
                collection: self,
                next: A::FIRST_INDEX,
                end: A::FIRST_INDEX + count,
                error: None,
            },
            Err(e) => CollectionIter {
                collection: self,
                next: 0,
                end: 0,
                error: Some(e),
            },
        }
    }
}

impl<A: ChildAppend> Collection<A> {
    /// Appends one child.
    pub fn add<'a>(&self, input: impl Into<A::Input<'a>>) -> Result<()> {
        A::append(&self.parent, input.into())
    }

    /// Appends children in order.
    ///
    /// Stops at the first rejected input and reports its position; inputs appended
    /// before it stay appended.
    pub fn add_all<'a, I>(&self, inputs: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<A::Input<'a>>,
    {
        for (position, input) in inputs.into_iter().enumerate() {
            A::append(&self.parent, input.into()).map_err(|e| e.at_position(position))?;
        }
        Ok(())
    }
}

/// Iterator over a [`Collection`], yielding one `Result` per child.
pub struct CollectionIter<'a, A: IndexedAccess> {
    collection: &'a Collection<A>,
    next: usize,
    end: usize,
    error: Option<GdalError>,
}

impl<A: IndexedAccess> Iterator for CollectionIter<'_, A> {
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

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next + usize::from(self.error.is_some());
        (remaining, Some(remaining))
    }
}

impl<'a, A: IndexedAccess> IntoIterator for &'a Collection<A> {
    type Item = Result<A::Element>;
    type IntoIter = CollectionIter<'a, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
