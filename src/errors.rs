use libc::c_int;
use std::ffi::{IntoStringError, NulError};
use std::str::Utf8Error;
use thiserror::Error;

use gdal_sys::{CPLErr, OGRErr};

pub type Result<T> = std::result::Result<T, GdalError>;

#[derive(Clone, Debug, Error)]
pub enum GdalError {
    #[error("FfiNulError")]
    FfiNulError(#[from] NulError),
    #[error("FfiIntoStringError")]
    FfiIntoStringError(#[from] IntoStringError),
    #[error("StrUtf8Error")]
    StrUtf8Error(#[from] Utf8Error),
    #[error("CPL error class: '{class:?}', error number: '{number}', error msg: '{msg}'")]
    CplError {
        class: CplErrType,
        number: c_int,
        msg: String,
    },
    #[error("GDAL method '{method_name}' returned a NULL pointer. Error msg: '{msg}'")]
    NullPointer {
        method_name: &'static str,
        msg: String,
    },
    #[error("OGR method '{method_name}' returned error: '{err:?}'. Error msg: '{msg}'")]
    OgrError {
        err: OGRErr::Type,
        method_name: &'static str,
        msg: String,
    },
    #[error("{0} object has already been destroyed")]
    Destroyed(&'static str),
    #[error("Dataset object has already been destroyed")]
    DestroyedDataset,
    #[error("Invalid {kind} index {index}, expected a value in {first}..{end}", end = .first + .count)]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        first: usize,
        count: usize,
    },
    #[error("No {kind} found for '{key}'")]
    NotFound { kind: &'static str, key: String },
    #[error("Invalid {kind} at position {position}, expected {expected}")]
    InvalidElement {
        kind: &'static str,
        position: usize,
        expected: &'static str,
    },
    #[error("Bad argument: {0}")]
    BadArgument(String),
    #[error("{operation} is not supported on {kind} collections")]
    Unsupported {
        kind: &'static str,
        operation: &'static str,
    },
    #[error("Job was dropped by its worker before reporting a result")]
    JobAborted,
}

impl GdalError {
    /// Whether the error was reported by GDAL itself rather than raised by this crate.
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            GdalError::CplError { .. } | GdalError::NullPointer { .. } | GdalError::OgrError { .. }
        )
    }

    /// Rewrites the position carried by an [`GdalError::InvalidElement`] error,
    /// so batch operations can report which input was rejected.
    pub(crate) fn at_position(self, position: usize) -> Self {
        match self {
            GdalError::InvalidElement { kind, expected, .. } => GdalError::InvalidElement {
                kind,
                position,
                expected,
            },
            other => other,
        }
    }
}

/// A wrapper for [`CPLErr::Type`] that reflects it as an enum
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub enum CplErrType {
    None = 0,
    Debug = 1,
    Warning = 2,
    Failure = 3,
    Fatal = 4,
}

impl From<CPLErr::Type> for CplErrType {
    fn from(error_type: CPLErr::Type) -> Self {
        if error_type > 4 {
            return Self::None;
        }

        match error_type {
            CPLErr::CE_Debug => Self::Debug,
            CPLErr::CE_Warning => Self::Warning,
            CPLErr::CE_Failure => Self::Failure,
            CPLErr::CE_Fatal => Self::Fatal,
            _ => Self::None,
        }
    }
}
