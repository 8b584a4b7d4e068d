//! Runtime configuration
//!
//! GDAL itself is configured through config options, which can also be set from the
//! environment. Options set by calling functions in this module override options set
//! in environment variables.
//!
//! ```no_run
//! use gdal_bridge::config::*;
//!
//! set_config_option("GDAL_CACHEMAX", "1024").unwrap();
//! assert_eq!(get_config_option("GDAL_CACHEMAX", "").unwrap(), "1024");
//! clear_config_option("GDAL_CACHEMAX").unwrap();
//!
//! // forward GDAL diagnostics to the `log` facade
//! route_errors_to_log();
//!
//! // size of the async job worker pool, read when the first job is dispatched
//! set_job_workers(2);
//! ```

use std::ffi::CString;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use gdal_sys::{CPLErr, CPLErrorNum, CPLGetErrorHandlerUserData};
use libc::{c_char, c_void};
use once_cell::sync::Lazy;

use crate::errors::{CplErrType, Result};
use crate::utils::_string;

/// Upper bound of the default worker pool size.
const DEFAULT_MAX_JOB_WORKERS: usize = 4;

static JOB_WORKERS: AtomicUsize = AtomicUsize::new(0);

/// Set a GDAL library configuration option
pub fn set_config_option(key: &str, value: &str) -> Result<()> {
    let c_key = CString::new(key.as_bytes())?;
    let c_val = CString::new(value.as_bytes())?;
    unsafe {
        gdal_sys::CPLSetConfigOption(c_key.as_ptr(), c_val.as_ptr());
    };
    Ok(())
}

/// Get the value of a GDAL library configuration option
///
/// If the config option specified by `key` is not found, `default` is returned.
pub fn get_config_option(key: &str, default: &str) -> Result<String> {
    let c_key = CString::new(key.as_bytes())?;
    let c_default = CString::new(default.as_bytes())?;
    let rv = unsafe { gdal_sys::CPLGetConfigOption(c_key.as_ptr(), c_default.as_ptr()) };
    Ok(_string(rv))
}

/// Clear the value of a GDAL library configuration option
pub fn clear_config_option(key: &str) -> Result<()> {
    let c_key = CString::new(key.as_bytes())?;
    unsafe {
        gdal_sys::CPLSetConfigOption(c_key.as_ptr(), ::std::ptr::null());
    };
    Ok(())
}

/// Set a GDAL library configuration option with **thread local** scope
///
/// Job workers run on their own threads, so thread-local options set by the caller
/// do not apply to `_async` operations.
pub fn set_thread_local_config_option(key: &str, value: &str) -> Result<()> {
    let c_key = CString::new(key.as_bytes())?;
    let c_val = CString::new(value.as_bytes())?;
    unsafe {
        gdal_sys::CPLSetThreadLocalConfigOption(c_key.as_ptr(), c_val.as_ptr());
    };
    Ok(())
}

/// Get the value of a GDAL library configuration option with **thread local** scope
pub fn get_thread_local_config_option(key: &str, default: &str) -> Result<String> {
    let c_key = CString::new(key.as_bytes())?;
    let c_default = CString::new(default.as_bytes())?;
    let rv = unsafe { gdal_sys::CPLGetThreadLocalConfigOption(c_key.as_ptr(), c_default.as_ptr()) };
    Ok(_string(rv))
}

/// Clear the value of a GDAL library configuration option with **thread local** scope
pub fn clear_thread_local_config_option(key: &str) -> Result<()> {
    let c_key = CString::new(key.as_bytes())?;
    unsafe {
        gdal_sys::CPLSetThreadLocalConfigOption(c_key.as_ptr(), ::std::ptr::null());
    };
    Ok(())
}

/// Sets the number of threads running `_async` jobs.
///
/// The pool is started by the first dispatched job; later calls have no effect on it.
/// `0` restores the default (available parallelism, capped at 4).
pub fn set_job_workers(workers: usize) {
    JOB_WORKERS.store(workers, Ordering::Relaxed);
}

/// Number of job worker threads the pool starts with.
pub fn job_workers() -> usize {
    match JOB_WORKERS.load(Ordering::Relaxed) {
        0 => std::thread::available_parallelism()
            .map(|n| n.get().min(DEFAULT_MAX_JOB_WORKERS))
            .unwrap_or(1),
        n => n,
    }
}

type ErrorCallbackType = dyn FnMut(CplErrType, i32, &str) + 'static + Send;
// Double-boxed: the outer `Box` gives a stable address to hand to GDAL, the inner
// sized `Box` turns the fat trait object pointer into a thin one we can cast from `*mut c_void`.
type PinnedErrorCallback = Box<Box<ErrorCallbackType>>;

/// Static variable that holds the current error callback function
static ERROR_CALLBACK: Lazy<Mutex<Option<PinnedErrorCallback>>> = Lazy::new(Default::default);

/// Set a custom error handler for GDAL.
///
/// The callback is shared by every thread, job workers included, so it must be `Send`.
pub fn set_error_handler<F>(callback: F)
where
    F: FnMut(CplErrType, i32, &str) + 'static + Send,
{
    unsafe extern "C" fn error_handler(
        error_type: CPLErr::Type,
        error_num: CPLErrorNum,
        error_msg_ptr: *const c_char,
    ) {
        let error_msg = _string(error_msg_ptr);
        let error_type: CplErrType = error_type.into();

        let callback_raw = CPLGetErrorHandlerUserData();
        let callback: &mut Box<ErrorCallbackType> = &mut *(callback_raw as *mut Box<_>);

        callback(error_type, error_num, &error_msg);
    }

    let mut callback: PinnedErrorCallback = Box::new(Box::new(callback));

    let callback_ref: &mut Box<ErrorCallbackType> = callback.as_mut();

    let mut callback_lock = match ERROR_CALLBACK.lock() {
        Ok(guard) => guard,
        // poisoning could only occur on `CPLSetErrorHandler(Ex)` panicking, the value is still valid
        Err(poison_error) => poison_error.into_inner(),
    };

    unsafe {
        gdal_sys::CPLSetErrorHandlerEx(Some(error_handler), callback_ref as *mut _ as *mut c_void);
    };

    // keep the callback alive for as long as GDAL holds its pointer
    callback_lock.replace(callback);
}

/// Remove a custom error handler for GDAL.
pub fn remove_error_handler() {
    let mut callback_lock = match ERROR_CALLBACK.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    };

    unsafe {
        gdal_sys::CPLSetErrorHandler(None);
    };

    callback_lock.take();
}

/// Installs an error handler that forwards GDAL diagnostics to the [`log`] facade.
///
/// Failures and fatal errors are logged at `error`, warnings at `warn` and GDAL debug
/// output (enabled with the `CPL_DEBUG` config option) at `debug`.
pub fn route_errors_to_log() {
    set_error_handler(|class, number, msg| match class {
        CplErrType::Fatal | CplErrType::Failure => {
            log::error!(target: "gdal", "[{number}] {msg}")
        }
        CplErrType::Warning => log::warn!(target: "gdal", "[{number}] {msg}"),
        CplErrType::Debug => log::debug!(target: "gdal", "{msg}"),
        CplErrType::None => log::trace!(target: "gdal", "{msg}"),
    });
}
