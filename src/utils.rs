use gdal_sys::{self, CPLErr, OGRErr};
use libc::c_char;
use std::ffi::{CStr, CString};
use std::path::Path;

use crate::errors::*;

pub fn _string(raw_ptr: *const c_char) -> String {
    if raw_ptr.is_null() {
        return String::new();
    }
    let c_str = unsafe { CStr::from_ptr(raw_ptr) };
    c_str.to_string_lossy().into_owned()
}

/// Splits a `KEY<delim>VALUE` C string into its two halves.
pub(crate) fn _string_tuple(raw_ptr: *const c_char, delim: char) -> Option<(String, String)> {
    let entry = _string(raw_ptr);
    entry
        .split_once(delim)
        .map(|(k, v)| (k.to_string(), v.to_string()))
}

/// Takes ownership of a string allocated by GDAL (e.g. by `OGR_G_ExportToWkt`).
pub(crate) fn _owned_string(raw_ptr: *mut c_char) -> String {
    let value = _string(raw_ptr);
    unsafe { gdal_sys::VSIFree(raw_ptr.cast()) };
    value
}

pub fn _last_cpl_err(cpl_err_class: CPLErr::Type) -> GdalError {
    let last_err_no = unsafe { gdal_sys::CPLGetLastErrorNo() };
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
    unsafe { gdal_sys::CPLErrorReset() };
    GdalError::CplError {
        class: cpl_err_class.into(),
        number: last_err_no,
        msg: last_err_msg,
    }
}

pub fn _last_null_pointer_err(method_name: &'static str) -> GdalError {
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
    unsafe { gdal_sys::CPLErrorReset() };
    GdalError::NullPointer {
        method_name,
        msg: last_err_msg,
    }
}

pub fn _last_ogr_err(err: OGRErr::Type, method_name: &'static str) -> GdalError {
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() });
    unsafe { gdal_sys::CPLErrorReset() };
    GdalError::OgrError {
        err,
        method_name,
        msg: last_err_msg,
    }
}

/// Maps an `OGRErr` return code to `Ok(())` or the matching [`GdalError::OgrError`].
pub(crate) fn _ogr_result(err: OGRErr::Type, method_name: &'static str) -> Result<()> {
    if err != OGRErr::OGRERR_NONE {
        return Err(_last_ogr_err(err, method_name));
    }
    Ok(())
}

/// Maps a `CPLErr` return code to `Ok(())` or the matching [`GdalError::CplError`].
pub(crate) fn _cpl_result(err: CPLErr::Type) -> Result<()> {
    if err != CPLErr::CE_None {
        return Err(_last_cpl_err(err));
    }
    Ok(())
}

pub fn _path_to_c_string(path: &Path) -> Result<CString> {
    let path_str = path.to_string_lossy();
    CString::new(path_str.as_ref()).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_tuple_splits_on_first_delimiter() {
        let raw = CString::new("KEY=a=b").unwrap();
        assert_eq!(
            _string_tuple(raw.as_ptr(), '='),
            Some(("KEY".to_string(), "a=b".to_string()))
        );

        let raw = CString::new("no delimiter").unwrap();
        assert_eq!(_string_tuple(raw.as_ptr(), '='), None);
    }

    #[test]
    fn test_null_string_is_empty() {
        assert_eq!(_string(std::ptr::null()), "");
    }

    #[test]
    fn test_ogr_result() {
        assert!(_ogr_result(OGRErr::OGRERR_NONE, "OGR_L_CreateFeature").is_ok());
        let err = _ogr_result(OGRErr::OGRERR_FAILURE, "OGR_L_CreateFeature").unwrap_err();
        assert!(matches!(
            err,
            GdalError::OgrError {
                err: OGRErr::OGRERR_FAILURE,
                method_name: "OGR_L_CreateFeature",
                ..
            }
        ));
    }
}
