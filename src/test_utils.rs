use std::ffi::c_void;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::dataset::Dataset;
use crate::driver::Driver;

/// A struct that contains a temporary directory and a path to a file in that directory.
pub struct TempFixture {
    _temp_dir: tempfile::TempDir,
    temp_path: PathBuf,
}

impl TempFixture {
    /// Creates a temporary directory and path to a non-existent file with given `name`.
    /// Useful for writing results to during testing
    ///
    /// Returns the struct `TempFixture` that contains the temp dir (for clean-up on `drop`)
    /// as well as the empty file path.
    pub fn empty(name: &str) -> Self {
        let _temp_dir = tempfile::tempdir().unwrap();
        let temp_path = _temp_dir.path().join(name);
        Self {
            _temp_dir,
            temp_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.temp_path
    }
}

impl AsRef<Path> for TempFixture {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// Scoped value for temporarily suppressing thread-local GDAL log messages.
///
/// Useful for tests that expect GDAL errors and want to keep the output log clean
/// of distracting yet expected error messages.
pub(crate) struct SuppressGDALErrorLog {
    // Make !Sync and !Send, and force use of `new`.
    _private: PhantomData<*mut c_void>,
}

impl SuppressGDALErrorLog {
    pub(crate) fn new() -> Self {
        unsafe { gdal_sys::CPLPushErrorHandler(Some(gdal_sys::CPLQuietErrorHandler)) };
        SuppressGDALErrorLog {
            _private: PhantomData,
        }
    }
}

impl Drop for SuppressGDALErrorLog {
    fn drop(&mut self) {
        unsafe { gdal_sys::CPLPopErrorHandler() };
    }
}

/// An in-memory raster of `u8` bands.
pub(crate) fn mem_raster(size_x: usize, size_y: usize, bands: usize) -> Dataset {
    Driver::get_by_name("MEM")
        .unwrap()
        .create("", size_x, size_y, bands)
        .unwrap()
}

/// An empty in-memory dataset that accepts vector layers.
///
/// GDAL 3.11 folded the `Memory` driver into `MEM`.
pub(crate) fn mem_vector() -> Dataset {
    let driver = {
        let _nolog = SuppressGDALErrorLog::new();
        Driver::get_by_name("Memory")
    };
    driver
        .or_else(|_| Driver::get_by_name("MEM"))
        .unwrap()
        .create_vector_only("")
        .unwrap()
}
