use gdal_sys::{self, GDALDataType};
use libc::c_int;

use crate::collection::{ChildAccess, DatasetCollection, IndexedAccess};
use crate::cpl::CslStringList;
use crate::dataset::Dataset;
use crate::errors::*;
use crate::job::{AsyncJob, Job};
use crate::raster::rasterband::RasterBand;
use crate::raster::types::GdalTypeDescriptor;
use crate::utils::{_cpl_result, _last_null_pointer_err};
use crate::wrapper::NativePtr;

/// Raster bands of a dataset. GDAL numbers them from 1.
pub struct BandAccess;

impl ChildAccess for BandAccess {
    type Parent = Dataset;
    type Element = RasterBand;
    type Native = NativePtr;

    const KIND: &'static str = "raster band";

    unsafe fn count(c_dataset: NativePtr) -> Result<usize> {
        Ok(gdal_sys::GDALGetRasterCount(c_dataset.as_ptr()).max(0) as usize)
    }

    fn wrap(dataset: &Dataset, c_band: NativePtr) -> Result<RasterBand> {
        Ok(RasterBand::from_store(dataset, c_band))
    }
}

impl IndexedAccess for BandAccess {
    const FIRST_INDEX: usize = 1;

    unsafe fn fetch(c_dataset: NativePtr, index: usize) -> Result<NativePtr> {
        let c_band = gdal_sys::GDALGetRasterBand(c_dataset.as_ptr(), index as c_int);
        if c_band.is_null() {
            return Err(_last_null_pointer_err("GDALGetRasterBand"));
        }
        Ok(NativePtr::new(c_band))
    }
}

pub type DatasetBands = DatasetCollection<BandAccess>;

impl DatasetCollection<BandAccess> {
    fn create_job(
        &self,
        data_type: Option<&str>,
        options: &CslStringList,
    ) -> Result<AsyncJob<NativePtr, RasterBand>> {
        self.dataset().check_open()?;
        let c_type = match data_type {
            Some(name) => GdalTypeDescriptor::from_name(name)?.gdal_type(),
            None => GDALDataType::GDT_Unknown,
        };
        let options = options.clone();
        Ok(self.job(
            move |c_dataset| unsafe {
                let rv = gdal_sys::GDALAddBand(c_dataset.as_ptr(), c_type, options.as_ptr());
                _cpl_result(rv)?;
                let count = gdal_sys::GDALGetRasterCount(c_dataset.as_ptr());
                BandAccess::fetch(c_dataset, count.max(0) as usize)
            },
            BandAccess::wrap,
        ))
    }

    /// Appends a band and returns it.
    ///
    /// `data_type` is a GDAL type name such as `"Float32"`; `None` passes `Unknown` and
    /// leaves the choice to the driver.
    /// Only drivers supporting band addition (e.g. `MEM`) accept this.
    pub fn create(&self, data_type: Option<&str>, options: &CslStringList) -> Result<RasterBand> {
        self.create_job(data_type, options)?.run()
    }

    pub fn create_async(&self, data_type: Option<&str>, options: &CslStringList) -> Job<RasterBand> {
        match self.create_job(data_type, options) {
            Ok(job) => job.spawn(),
            Err(e) => Job::ready(Err(e)),
        }
    }
}
