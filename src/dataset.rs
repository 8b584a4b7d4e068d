use std::ffi::{c_void, CString, NulError};
use std::path::Path;
use std::ptr;
use std::sync::{Arc, Once};

use gdal_sys::{self, GDALDatasetH};
use libc::{c_char, c_int};

use crate::driver::Driver;
use crate::errors::*;
use crate::job::Executor;
use crate::options::DatasetOptions;
use crate::raster::DatasetBands;
use crate::store;
use crate::utils::{_cpl_result, _last_null_pointer_err, _path_to_c_string, _string};
use crate::vector::DatasetLayers;
use crate::wrapper::{NativeObject, NativePtr, Wrapper};

static START: Once = Once::new();

pub fn _register_drivers() {
    START.call_once(|| unsafe {
        gdal_sys::GDALAllRegister();
    });
}

unsafe fn close_dataset(c_dataset: *mut c_void) {
    gdal_sys::GDALClose(c_dataset);
}

struct DatasetInner {
    object: Arc<NativeObject>,
    executor: Arc<Executor>,
}

/// Wrapper around a `GDALDataset`, the root of every layer, band and feature.
///
/// `Dataset` is a shared handle: clones refer to the same native dataset. It is
/// closed by [`Dataset::close`] or once the last handle, including the handles held
/// by its layers and bands, is dropped.
#[derive(Clone)]
pub struct Dataset {
    inner: Arc<DatasetInner>,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("object", &self.inner.object)
            .finish()
    }
}

/// Holds the `CString`s backing a null-terminated `char**` argument.
struct CStringArray {
    _strings: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl CStringArray {
    fn new(values: Option<&[&str]>) -> std::result::Result<Option<Self>, NulError> {
        let Some(values) = values else {
            return Ok(None);
        };
        let strings = values
            .iter()
            .map(|&s| CString::new(s))
            .collect::<std::result::Result<Vec<CString>, NulError>>()?;
        let mut ptrs: Vec<*const c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(ptr::null());
        Ok(Some(CStringArray {
            _strings: strings,
            ptrs,
        }))
    }

    fn as_ptr(array: &Option<Self>) -> *const *const c_char {
        array.as_ref().map_or(ptr::null(), |a| a.ptrs.as_ptr())
    }
}

impl Dataset {
    /// Open a dataset at the given `path` with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Dataset> {
        Self::open_ex(path, DatasetOptions::default())
    }

    /// Open a dataset with extended options. See [`GDALOpenEx`].
    ///
    /// [`GDALOpenEx`]: https://gdal.org/doxygen/gdal_8h.html#a9cb8585d0b3c16726b08e25bcc94274a
    pub fn open_ex<P: AsRef<Path>>(path: P, options: DatasetOptions) -> Result<Dataset> {
        _register_drivers();
        let c_filename = _path_to_c_string(path.as_ref())?;
        let c_open_flags = options.open_flags.bits();

        let c_allowed_drivers = CStringArray::new(options.allowed_drivers)?;
        let c_open_options = CStringArray::new(options.open_options)?;
        let c_sibling_files = CStringArray::new(options.sibling_files)?;

        let c_dataset = unsafe {
            gdal_sys::GDALOpenEx(
                c_filename.as_ptr(),
                c_open_flags,
                CStringArray::as_ptr(&c_allowed_drivers),
                CStringArray::as_ptr(&c_open_options),
                CStringArray::as_ptr(&c_sibling_files),
            )
        };
        if c_dataset.is_null() {
            return Err(_last_null_pointer_err("GDALOpenEx"));
        }
        Ok(unsafe { Dataset::from_c_dataset(c_dataset) })
    }

    /// Creates a new Dataset by wrapping a C pointer
    ///
    /// # Safety
    /// The pointer must be a valid dataset handle not owned by anything else; it is
    /// closed by the returned wrapper.
    pub unsafe fn from_c_dataset(c_dataset: GDALDatasetH) -> Dataset {
        let object = NativeObject::root("dataset", NativePtr::new(c_dataset), close_dataset);
        log::debug!("opened dataset #{}", object.uid());
        Dataset {
            inner: Arc::new(DatasetInner {
                object: Arc::new(object),
                executor: Arc::default(),
            }),
        }
    }

    pub(crate) fn executor(&self) -> &Arc<Executor> {
        &self.inner.executor
    }

    /// Fails with [`GdalError::DestroyedDataset`] once the dataset is closed.
    pub(crate) fn check_open(&self) -> Result<()> {
        self.inner.executor.check_open(&self.inner.object)
    }

    /// Runs `f` with the dataset's native lock held, failing with
    /// [`GdalError::DestroyedDataset`] if the dataset is closed.
    pub(crate) fn with_native<T>(&self, f: impl FnOnce(NativePtr) -> Result<T>) -> Result<T> {
        let object = &self.inner.object;
        self.inner.executor.exec(object, || f(object.handle()?))
    }

    /// Number of native sections run against this dataset so far.
    pub fn native_call_count(&self) -> usize {
        self.inner.executor.native_calls()
    }

    /// Closes the dataset.
    ///
    /// Waits for the job currently running on this dataset, then releases the native
    /// handle. Layers and bands obtained from it become destroyed, and jobs still
    /// queued fail with [`GdalError::DestroyedDataset`]. Closing twice is a no-op.
    pub fn close(&self) {
        let object = &self.inner.object;
        self.inner.executor.shutdown(|| {
            if object.is_alive() {
                object.destroy();
                store::purge_parent(object);
                log::debug!("closed dataset #{}", object.uid());
            }
        });
    }

    /// The driver this dataset was opened with.
    pub fn driver(&self) -> Result<Driver> {
        self.with_native(|c_dataset| {
            let c_driver = unsafe { gdal_sys::GDALGetDatasetDriver(c_dataset.as_ptr()) };
            if c_driver.is_null() {
                return Err(_last_null_pointer_err("GDALGetDatasetDriver"));
            }
            Ok(unsafe { Driver::from_c_driver(c_driver) })
        })
    }

    /// The dataset description, usually the path it was opened from.
    pub fn description(&self) -> Result<String> {
        self.with_native(|c_dataset| {
            let rv = unsafe { gdal_sys::GDALGetDescription(c_dataset.as_ptr()) };
            Ok(_string(rv))
        })
    }

    /// Raster size as `(width, height)`.
    pub fn raster_size(&self) -> Result<(usize, usize)> {
        self.with_native(|c_dataset| {
            let size_x = unsafe { gdal_sys::GDALGetRasterXSize(c_dataset.as_ptr()) } as usize;
            let size_y = unsafe { gdal_sys::GDALGetRasterYSize(c_dataset.as_ptr()) } as usize;
            Ok((size_x, size_y))
        })
    }

    /// Builds reduced resolution overviews for every band.
    ///
    /// `levels` are decimation factors, e.g. `&[2, 4]`.
    pub fn build_overviews(&self, resampling: &str, levels: &[i32]) -> Result<()> {
        let c_resampling = CString::new(resampling)?;
        let mut c_levels: Vec<c_int> = levels.to_vec();
        self.with_native(|c_dataset| {
            let rv = unsafe {
                gdal_sys::GDALBuildOverviews(
                    c_dataset.as_ptr(),
                    c_resampling.as_ptr(),
                    c_levels.len() as c_int,
                    c_levels.as_mut_ptr(),
                    0,
                    ptr::null_mut::<c_int>(),
                    None,
                    ptr::null_mut(),
                )
            };
            _cpl_result(rv)
        })
    }

    /// The layers of this dataset.
    pub fn layers(&self) -> DatasetLayers {
        DatasetLayers::new(self.clone())
    }

    /// The raster bands of this dataset, numbered from 1.
    pub fn bands(&self) -> DatasetBands {
        DatasetBands::new(self.clone())
    }
}

impl Wrapper for Dataset {
    fn native_object(&self) -> &Arc<NativeObject> {
        &self.inner.object
    }

    fn destroy(&self) {
        self.close()
    }
}

/// Gives dataset-bound collections access to the dataset their parent belongs to.
pub trait DatasetBound: Wrapper + Clone + 'static {
    fn dataset(&self) -> &Dataset;
}

impl DatasetBound for Dataset {
    fn dataset(&self) -> &Dataset {
        self
    }
}
