use libc::c_int;

use crate::collection::{ChildAccess, DatasetCollection, IndexedAccess};
use crate::dataset::DatasetBound;
use crate::errors::*;
use crate::job::{AsyncJob, Job};
use crate::raster::rasterband::RasterBand;
use crate::utils::_last_null_pointer_err;
use crate::wrapper::NativePtr;

/// Overviews of a raster band, from the finest to the coarsest.
pub struct OverviewAccess;

impl ChildAccess for OverviewAccess {
    type Parent = RasterBand;
    type Element = RasterBand;
    type Native = NativePtr;

    const KIND: &'static str = "overview";

    unsafe fn count(c_band: NativePtr) -> Result<usize> {
        Ok(gdal_sys::GDALGetOverviewCount(c_band.as_ptr()).max(0) as usize)
    }

    fn wrap(band: &RasterBand, c_overview: NativePtr) -> Result<RasterBand> {
        Ok(RasterBand::from_store(band.dataset(), c_overview))
    }
}

impl IndexedAccess for OverviewAccess {
    unsafe fn fetch(c_band: NativePtr, index: usize) -> Result<NativePtr> {
        let c_overview = gdal_sys::GDALGetOverview(c_band.as_ptr(), index as c_int);
        if c_overview.is_null() {
            return Err(_last_null_pointer_err("GDALGetOverview"));
        }
        Ok(NativePtr::new(c_overview))
    }
}

pub type RasterBandOverviews = DatasetCollection<OverviewAccess>;

impl DatasetCollection<OverviewAccess> {
    fn sample_count_job(&self, samples: u64) -> AsyncJob<NativePtr, RasterBand> {
        self.job(
            move |c_band| {
                let c_overview =
                    unsafe { gdal_sys::GDALGetRasterSampleOverviewEx(c_band.as_ptr(), samples) };
                if c_overview.is_null() {
                    return Err(GdalError::NotFound {
                        kind: OverviewAccess::KIND,
                        key: format!("{samples} samples"),
                    });
                }
                Ok(NativePtr::new(c_overview))
            },
            OverviewAccess::wrap,
        )
    }

    /// The coarsest overview that still has at least `samples` pixels.
    ///
    /// Returns the band itself when no overview is coarse enough.
    pub fn get_by_sample_count(&self, samples: u64) -> Result<RasterBand> {
        self.sample_count_job(samples).run()
    }

    pub fn get_by_sample_count_async(&self, samples: u64) -> Job<RasterBand> {
        self.sample_count_job(samples).spawn()
    }
}
