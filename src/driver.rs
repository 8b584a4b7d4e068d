use std::ffi::CString;
use std::path::Path;
use std::ptr;

use gdal_sys::{self, GDALDriverH};
use libc::c_int;

use crate::cpl::CslStringList;
use crate::dataset::{Dataset, _register_drivers};
use crate::errors::*;
use crate::raster::GdalType;
use crate::utils::{_last_null_pointer_err, _path_to_c_string, _string};

/// A GDAL format driver. Drivers are owned by GDAL's driver manager and never released.
#[allow(missing_copy_implementations)]
#[derive(Debug)]
pub struct Driver {
    c_driver: GDALDriverH,
}

impl Driver {
    /// Looks a driver up by its short name, e.g. `"MEM"`, `"GTiff"` or `"Memory"`.
    pub fn get_by_name(name: &str) -> Result<Driver> {
        _register_drivers();
        let c_name = CString::new(name)?;
        let c_driver = unsafe { gdal_sys::GDALGetDriverByName(c_name.as_ptr()) };
        if c_driver.is_null() {
            return Err(_last_null_pointer_err("GDALGetDriverByName"));
        };
        Ok(Driver { c_driver })
    }

    /// Creates a new Driver object by wrapping a C pointer
    ///
    /// # Safety
    /// This method operates on a raw C pointer
    pub unsafe fn from_c_driver(c_driver: GDALDriverH) -> Driver {
        Driver { c_driver }
    }

    pub fn short_name(&self) -> String {
        let rv = unsafe { gdal_sys::GDALGetDriverShortName(self.c_driver) };
        _string(rv)
    }

    pub fn long_name(&self) -> String {
        let rv = unsafe { gdal_sys::GDALGetDriverLongName(self.c_driver) };
        _string(rv)
    }

    /// Creates a dataset with `bands` bands of type `u8`.
    pub fn create<P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
    ) -> Result<Dataset> {
        self.create_with_band_type::<u8, P>(filename, size_x, size_y, bands)
    }

    pub fn create_with_band_type<T: GdalType, P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
    ) -> Result<Dataset> {
        self.create_with_band_type_with_options::<T, P>(
            filename,
            size_x,
            size_y,
            bands,
            &CslStringList::new(),
        )
    }

    pub fn create_with_band_type_with_options<T: GdalType, P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
        options: &CslStringList,
    ) -> Result<Dataset> {
        let c_filename = _path_to_c_string(filename.as_ref())?;
        let c_dataset = unsafe {
            gdal_sys::GDALCreate(
                self.c_driver,
                c_filename.as_ptr(),
                size_x as c_int,
                size_y as c_int,
                bands as c_int,
                T::gdal_type(),
                options.as_ptr(),
            )
        };

        if c_dataset.is_null() {
            return Err(_last_null_pointer_err("GDALCreate"));
        };

        Ok(unsafe { Dataset::from_c_dataset(c_dataset) })
    }

    /// Creates a dataset without raster bands, to hold vector layers.
    pub fn create_vector_only<P: AsRef<Path>>(&self, filename: P) -> Result<Dataset> {
        let c_filename = _path_to_c_string(filename.as_ref())?;
        let c_dataset = unsafe {
            gdal_sys::GDALCreate(
                self.c_driver,
                c_filename.as_ptr(),
                0,
                0,
                0,
                gdal_sys::GDALDataType::GDT_Unknown,
                ptr::null_mut(),
            )
        };
        if c_dataset.is_null() {
            return Err(_last_null_pointer_err("GDALCreate"));
        };
        Ok(unsafe { Dataset::from_c_dataset(c_dataset) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SuppressGDALErrorLog;

    #[test]
    fn test_get_driver_by_name() {
        let driver = Driver::get_by_name("MEM").unwrap();
        assert_eq!(driver.short_name(), "MEM");
        assert!(!driver.long_name().is_empty());
    }

    #[test]
    fn test_unknown_driver() {
        let _nolog = SuppressGDALErrorLog::new();
        let err = Driver::get_by_name("NOT_A_DRIVER").unwrap_err();
        assert!(err.is_native());
    }

    #[test]
    fn test_create_with_band_type() {
        let driver = Driver::get_by_name("MEM").unwrap();
        let ds = driver
            .create_with_band_type::<f32, _>("", 10, 20, 3)
            .unwrap();
        assert_eq!(ds.raster_size().unwrap(), (10, 20));
        let band = ds.bands().get(3).unwrap();
        assert_eq!(band.band_type().unwrap().name(), "Float32");
    }

    #[test]
    fn test_create_vector_only() {
        let ds = crate::test_utils::mem_vector();
        assert_eq!(ds.bands().count().unwrap(), 0);
        assert_eq!(ds.layers().count().unwrap(), 0);
    }
}
