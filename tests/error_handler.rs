use std::ffi::CString;
use std::sync::{Arc, Mutex};

use gdal_bridge::cpl::CslStringList;
use gdal_bridge::errors::{CplErrType, GdalError};
use gdal_bridge::{config, Driver};
use gdal_sys::{CPLErr, CPLError};

type Recorded = Arc<Mutex<Vec<(CplErrType, i32, String)>>>;

fn record_errors() -> Recorded {
    let errors: Recorded = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = errors.clone();
    config::set_error_handler(move |class, number, msg| {
        errors_clone.lock().unwrap().push((class, number, msg.to_string()));
    });
    errors
}

#[test_log::test]
fn test_error_handler() {
    // The handler is process-wide, so the scenarios run one after the other.
    handler_sees_calling_thread();
    handler_sees_job_workers();
    errors_routed_to_log();
}

fn handler_sees_calling_thread() {
    let errors = record_errors();

    let msg = CString::new("foo").unwrap();
    unsafe { CPLError(CPLErr::CE_Failure, 42, msg.as_ptr()) };
    let msg = CString::new("bar").unwrap();
    unsafe { CPLError(CPLErr::CE_Warning, 1, msg.as_ptr()) };

    config::remove_error_handler();

    let recorded = errors.lock().unwrap().clone();
    assert_eq!(
        recorded,
        vec![
            (CplErrType::Failure, 42, "foo".to_string()),
            (CplErrType::Warning, 1, "bar".to_string())
        ]
    );
}

fn handler_sees_job_workers() {
    let dir = tempfile::tempdir().unwrap();
    let ds = Driver::get_by_name("GTiff")
        .unwrap()
        .create(dir.path().join("fixed.tif"), 4, 4, 1)
        .unwrap();

    let errors = record_errors();
    // GeoTIFF datasets cannot grow bands after creation
    let result = ds
        .bands()
        .create_async(Some("Byte"), &CslStringList::new())
        .wait();
    config::remove_error_handler();

    let err = result.unwrap_err();
    assert!(err.is_native());
    assert!(matches!(
        err,
        GdalError::CplError {
            class: CplErrType::Failure,
            ..
        }
    ));
    let recorded = errors.lock().unwrap();
    assert!(recorded
        .iter()
        .any(|(class, _, _)| *class == CplErrType::Failure));
    assert_eq!(ds.bands().count().unwrap(), 1);
}

fn errors_routed_to_log() {
    config::route_errors_to_log();
    let msg = CString::new("routed through log").unwrap();
    unsafe { CPLError(CPLErr::CE_Warning, 7, msg.as_ptr()) };
    config::remove_error_handler();
}
