//! GDAL Common Portability Library string lists
//!
//! Options handed to GDAL (layer creation, band creation, layer copy) travel as
//! `KEY=VALUE` string lists. [`CslStringList`] owns such a list and validates
//! every entry before it reaches the native side.

use std::collections::{BTreeMap, HashMap};
use std::ffi::CString;
use std::fmt::{Debug, Formatter};
use std::ptr;

use gdal_sys::{CSLAddString, CSLCount, CSLDestroy, CSLDuplicate, CSLFetchNameValue, CSLSetNameValue};
use libc::c_char;

use crate::errors::{GdalError, Result};
use crate::utils::{_string, _string_tuple};

/// Wraps a [`gdal_sys::CSLConstList`] (a.k.a. `char **papszStrList`): a null-terminated
/// array of null-terminated strings used throughout GDAL to pass `KEY=VALUE` options.
pub struct CslStringList {
    list_ptr: *mut *mut c_char,
}

// SAFETY: the list is exclusively owned by this value and GDAL keeps no reference
// to it, so moving it to a job worker thread is sound.
unsafe impl Send for CslStringList {}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(GdalError::BadArgument(format!(
            "Invalid characters in name: '{name}'"
        )));
    }
    Ok(())
}

fn check_value(value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(GdalError::BadArgument(format!(
            "Invalid characters in value: '{value}'"
        )));
    }
    Ok(())
}

impl CslStringList {
    /// Creates an empty GDAL string list.
    pub fn new() -> Self {
        Self {
            list_ptr: ptr::null_mut(),
        }
    }

    /// Assigns `value` to `name`, overwriting any previous value for `name`.
    ///
    /// Fails with [`GdalError::BadArgument`] if `name` has characters other than
    /// ASCII alphanumerics, `_` and `-`, or if `value` contains a line break.
    pub fn set_name_value(&mut self, name: &str, value: &str) -> Result<()> {
        check_name(name)?;
        check_value(value)?;
        let psz_name = CString::new(name)?;
        let psz_value = CString::new(value)?;

        unsafe {
            self.list_ptr = CSLSetNameValue(self.list_ptr, psz_name.as_ptr(), psz_value.as_ptr());
        }

        Ok(())
    }

    /// Appends a raw `KEY=VALUE` entry, keeping insertion order and duplicates.
    ///
    /// The entry is split on the first `=`; both halves are validated as in
    /// [`CslStringList::set_name_value`].
    pub fn add_string(&mut self, entry: &str) -> Result<()> {
        let Some((name, value)) = entry.split_once('=') else {
            return Err(GdalError::BadArgument(format!(
                "Option '{entry}' is not of the form KEY=VALUE"
            )));
        };
        check_name(name)?;
        check_value(value)?;
        let psz_entry = CString::new(entry)?;
        unsafe {
            self.list_ptr = CSLAddString(self.list_ptr, psz_entry.as_ptr());
        }
        Ok(())
    }

    /// Builds a list from ordered `KEY=VALUE` strings, rejecting the first malformed one.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        let mut list = Self::new();
        for entry in entries {
            list.add_string(entry.as_ref())?;
        }
        Ok(list)
    }

    /// Builds a list from `(name, value)` pairs.
    pub fn from_pairs<K: AsRef<str>, V: AsRef<str>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self> {
        let mut list = Self::new();
        for (k, v) in pairs {
            list.set_name_value(k.as_ref(), v.as_ref())?;
        }
        Ok(list)
    }

    /// Looks up the value corresponding to `key`.
    pub fn fetch_name_value(&self, key: &str) -> Result<Option<String>> {
        let key = CString::new(key)?;
        let c_value = unsafe { CSLFetchNameValue(self.as_ptr(), key.as_ptr()) };
        let value = if c_value.is_null() {
            None
        } else {
            Some(_string(c_value))
        };
        Ok(value)
    }

    /// Determine the number of entries in the list.
    pub fn len(&self) -> usize {
        (unsafe { CSLCount(self.as_ptr()) }) as usize
    }

    /// Determine if the list has any values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get an iterator over the name/value elements of the list.
    pub fn iter(&self) -> CslStringListIterator<'_> {
        CslStringListIterator::new(self)
    }

    /// Get the raw pointer to the underlying data.
    pub fn as_ptr(&self) -> gdal_sys::CSLConstList {
        self.list_ptr
    }
}

impl Drop for CslStringList {
    fn drop(&mut self) {
        unsafe { CSLDestroy(self.list_ptr) }
    }
}

impl Default for CslStringList {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CslStringList {
    fn clone(&self) -> Self {
        let list_ptr = unsafe { CSLDuplicate(self.list_ptr) };
        Self { list_ptr }
    }
}

/// State for iterator over [`CslStringList`] entries.
pub struct CslStringListIterator<'a> {
    list: &'a CslStringList,
    idx: usize,
    count: usize,
}

impl<'a> CslStringListIterator<'a> {
    fn new(list: &'a CslStringList) -> Self {
        Self {
            list,
            idx: 0,
            count: list.len(),
        }
    }
}

impl Iterator for CslStringListIterator<'_> {
    type Item = (String, String);

    fn next(&mut self) -> Option<Self::Item> {
        while self.idx < self.count {
            let field = unsafe {
                let slice = std::slice::from_raw_parts(self.list.list_ptr, self.count);
                slice[self.idx]
            };
            self.idx += 1;
            if field.is_null() {
                return None;
            }
            if let Some(pair) = _string_tuple(field, '=') {
                return Some(pair);
            }
        }
        None
    }
}

impl Debug for CslStringList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (k, v) in self.iter() {
            f.write_fmt(format_args!("{k}={v}\n"))?;
        }
        Ok(())
    }
}

/// Convenience shorthand for an empty option list.
impl From<()> for CslStringList {
    fn from(_: ()) -> Self {
        CslStringList::default()
    }
}

impl<const N: usize> TryFrom<&[(&str, &str); N]> for CslStringList {
    type Error = GdalError;

    fn try_from(pairs: &[(&str, &str); N]) -> Result<Self> {
        Self::from_pairs(pairs.iter().copied())
    }
}

impl TryFrom<&[&str]> for CslStringList {
    type Error = GdalError;

    fn try_from(entries: &[&str]) -> Result<Self> {
        Self::from_entries(entries)
    }
}

impl<K: AsRef<str>, V: AsRef<str>> TryFrom<&HashMap<K, V>> for CslStringList {
    type Error = GdalError;

    fn try_from(map: &HashMap<K, V>) -> Result<Self> {
        Self::from_pairs(map.iter())
    }
}

impl<K: AsRef<str>, V: AsRef<str>> TryFrom<&BTreeMap<K, V>> for CslStringList {
    type Error = GdalError;

    fn try_from(map: &BTreeMap<K, V>) -> Result<Self> {
        Self::from_pairs(map.iter())
    }
}
