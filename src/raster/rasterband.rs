use std::ffi::CString;
use std::ptr;
use std::sync::Arc;

use bitflags::bitflags;
use gdal_sys::{self, GDALAccess, GDALColorInterp, GDALRasterBandH};
use libc::{c_char, c_int};

use crate::cpl::CslStringList;
use crate::dataset::{Dataset, DatasetBound};
use crate::errors::*;
use crate::job::{AsyncJob, Job};
use crate::raster::overviews::RasterBandOverviews;
use crate::raster::types::GdalTypeDescriptor;
use crate::store::{self, StoreKey};
use crate::utils::{_cpl_result, _last_null_pointer_err, _string, _string_tuple};
use crate::wrapper::{NativeObject, NativePtr, Wrapper};

bitflags! {
    /// Status of a band's mask, as reported by `GDALGetMaskFlags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MaskFlags: c_int {
        /// Every pixel is valid; the mask is all 255.
        const GMF_ALL_VALID = 0x01;
        /// The mask is shared by all bands of the dataset.
        const GMF_PER_DATASET = 0x02;
        /// The mask is an alpha band and may hold values other than 0 and 255.
        const GMF_ALPHA = 0x04;
        /// The mask is derived from the no-data value.
        const GMF_NODATA = 0x08;
    }
}

/// Minimum, maximum, mean and standard deviation of a band's pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Represents a single band (or overview) of a dataset.
///
/// Bands are owned by their dataset: the wrapper is a borrowed view, and fetching the
/// same band twice returns handles to the same wrapper.
#[derive(Clone, Debug)]
pub struct RasterBand {
    object: Arc<NativeObject>,
    dataset: Dataset,
}

impl RasterBand {
    pub(crate) fn from_store(dataset: &Dataset, c_band: NativePtr) -> Self {
        let parent = dataset.native_object();
        let object = store::get_or_register(StoreKey::new(parent, c_band), || {
            NativeObject::borrowed("raster band", c_band, parent)
        });
        RasterBand {
            object,
            dataset: dataset.clone(),
        }
    }

    fn with_native<T>(&self, f: impl FnOnce(GDALRasterBandH) -> Result<T>) -> Result<T> {
        let object = &self.object;
        self.dataset.with_native(|_| f(object.handle()?.as_ptr()))
    }

    /// Builds a job on this band; the band stays pinned until the job ends.
    fn job<N, T, M, R>(&self, main: M, rval: R) -> AsyncJob<N, T>
    where
        N: Send + 'static,
        T: 'static,
        M: FnOnce(GDALRasterBandH) -> Result<N> + Send + 'static,
        R: FnOnce(&RasterBand, N) -> Result<T> + 'static,
    {
        let object = self.object.clone();
        let band = self.clone();
        AsyncJob::new(
            &self.dataset,
            move || main(object.pinned_handle()?.as_ptr()),
            move |native| rval(&band, native),
        )
        .pin(self)
    }

    /// 1-based band number within its dataset.
    pub fn number(&self) -> Result<usize> {
        self.with_native(|c_band| Ok(unsafe { gdal_sys::GDALGetBandNumber(c_band) }.max(0) as usize))
    }

    pub fn description(&self) -> Result<String> {
        self.with_native(|c_band| Ok(_string(unsafe { gdal_sys::GDALGetDescription(c_band) })))
    }

    /// Get dimensions of the band as `(width, height)`.
    pub fn size(&self) -> Result<(usize, usize)> {
        self.with_native(|c_band| {
            let size_x = unsafe { gdal_sys::GDALGetRasterBandXSize(c_band) } as usize;
            let size_y = unsafe { gdal_sys::GDALGetRasterBandYSize(c_band) } as usize;
            Ok((size_x, size_y))
        })
    }

    /// Natural block size as `(width, height)`.
    pub fn block_size(&self) -> Result<(usize, usize)> {
        self.with_native(|c_band| {
            let (mut size_x, mut size_y): (c_int, c_int) = (0, 0);
            unsafe { gdal_sys::GDALGetBlockSize(c_band, &mut size_x, &mut size_y) };
            Ok((size_x.max(0) as usize, size_y.max(0) as usize))
        })
    }

    pub fn band_type(&self) -> Result<GdalTypeDescriptor> {
        self.with_native(|c_band| {
            GdalTypeDescriptor::try_from(unsafe { gdal_sys::GDALGetRasterDataType(c_band) })
        })
    }

    pub fn is_read_only(&self) -> Result<bool> {
        self.with_native(|c_band| {
            Ok(unsafe { gdal_sys::GDALGetRasterAccess(c_band) } == GDALAccess::GA_ReadOnly)
        })
    }

    /// The no-data value, if one is set.
    pub fn no_data_value(&self) -> Result<Option<f64>> {
        self.with_native(|c_band| {
            let mut pb_success: c_int = 1;
            let no_data = unsafe { gdal_sys::GDALGetRasterNoDataValue(c_band, &mut pb_success) };
            Ok((pb_success == 1).then_some(no_data))
        })
    }

    /// Sets the no-data value, or clears it with `None`.
    pub fn set_no_data_value(&self, no_data: Option<f64>) -> Result<()> {
        self.with_native(|c_band| {
            let rv = match no_data {
                Some(value) => unsafe { gdal_sys::GDALSetRasterNoDataValue(c_band, value) },
                None => unsafe { gdal_sys::GDALDeleteRasterNoDataValue(c_band) },
            };
            _cpl_result(rv)
        })
    }

    /// Minimum value the band claims to hold, if known without scanning.
    pub fn minimum(&self) -> Result<Option<f64>> {
        self.with_native(|c_band| {
            let mut pb_success: c_int = 0;
            let value = unsafe { gdal_sys::GDALGetRasterMinimum(c_band, &mut pb_success) };
            Ok((pb_success == 1).then_some(value))
        })
    }

    /// Maximum value the band claims to hold, if known without scanning.
    pub fn maximum(&self) -> Result<Option<f64>> {
        self.with_native(|c_band| {
            let mut pb_success: c_int = 0;
            let value = unsafe { gdal_sys::GDALGetRasterMaximum(c_band, &mut pb_success) };
            Ok((pb_success == 1).then_some(value))
        })
    }

    pub fn scale(&self) -> Result<Option<f64>> {
        self.with_native(|c_band| {
            let mut pb_success: c_int = 0;
            let scale = unsafe { gdal_sys::GDALGetRasterScale(c_band, &mut pb_success) };
            Ok((pb_success == 1).then_some(scale))
        })
    }

    pub fn set_scale(&self, scale: f64) -> Result<()> {
        self.with_native(|c_band| _cpl_result(unsafe { gdal_sys::GDALSetRasterScale(c_band, scale) }))
    }

    pub fn offset(&self) -> Result<Option<f64>> {
        self.with_native(|c_band| {
            let mut pb_success: c_int = 0;
            let offset = unsafe { gdal_sys::GDALGetRasterOffset(c_band, &mut pb_success) };
            Ok((pb_success == 1).then_some(offset))
        })
    }

    pub fn set_offset(&self, offset: f64) -> Result<()> {
        self.with_native(|c_band| {
            _cpl_result(unsafe { gdal_sys::GDALSetRasterOffset(c_band, offset) })
        })
    }

    /// Unit of the pixel values, such as `"m"`; empty when unknown.
    pub fn unit_type(&self) -> Result<String> {
        self.with_native(|c_band| Ok(_string(unsafe { gdal_sys::GDALGetRasterUnitType(c_band) })))
    }

    pub fn set_unit_type(&self, unit: &str) -> Result<()> {
        self.dataset.check_open()?;
        let c_unit = CString::new(unit)?;
        self.with_native(|c_band| {
            _cpl_result(unsafe { gdal_sys::GDALSetRasterUnitType(c_band, c_unit.as_ptr()) })
        })
    }

    /// Color interpretation name, such as `"Gray"`, `"Red"` or `"Undefined"`.
    pub fn color_interpretation(&self) -> Result<String> {
        self.with_native(|c_band| {
            let interp = unsafe { gdal_sys::GDALGetRasterColorInterpretation(c_band) };
            Ok(_string(unsafe { gdal_sys::GDALGetColorInterpretationName(interp) }))
        })
    }

    /// Sets the color interpretation by name. Unknown names are rejected up front.
    pub fn set_color_interpretation(&self, name: &str) -> Result<()> {
        self.dataset.check_open()?;
        let c_name = CString::new(name)?;
        let interp = unsafe { gdal_sys::GDALGetColorInterpretationByName(c_name.as_ptr()) };
        if interp == GDALColorInterp::GCI_Undefined && !name.eq_ignore_ascii_case("Undefined") {
            return Err(GdalError::BadArgument(format!(
                "unknown color interpretation '{name}'"
            )));
        }
        self.with_native(|c_band| {
            _cpl_result(unsafe { gdal_sys::GDALSetRasterColorInterpretation(c_band, interp) })
        })
    }

    fn flush_job(&self) -> AsyncJob<(), ()> {
        self.job(
            |c_band| _cpl_result(unsafe { gdal_sys::GDALFlushRasterCache(c_band) }),
            |_, ()| Ok(()),
        )
    }

    /// Writes cached blocks to the underlying storage.
    pub fn flush(&self) -> Result<()> {
        self.flush_job().run()
    }

    pub fn flush_async(&self) -> Job<()> {
        self.flush_job().spawn()
    }

    fn fill_job(&self, real: f64, imaginary: Option<f64>) -> AsyncJob<(), ()> {
        self.job(
            move |c_band| {
                _cpl_result(unsafe {
                    gdal_sys::GDALFillRaster(c_band, real, imaginary.unwrap_or(0.0))
                })
            },
            |_, ()| Ok(()),
        )
    }

    /// Sets every pixel to `real` (and `imaginary` for complex bands).
    pub fn fill(&self, real: f64, imaginary: Option<f64>) -> Result<()> {
        self.fill_job(real, imaginary).run()
    }

    pub fn fill_async(&self, real: f64, imaginary: Option<f64>) -> Job<()> {
        self.fill_job(real, imaginary).spawn()
    }

    fn compute_statistics_job(&self, approx_ok: bool) -> AsyncJob<BandStatistics, BandStatistics> {
        self.job(
            move |c_band| {
                let mut stats = BandStatistics {
                    min: 0.,
                    max: 0.,
                    mean: 0.,
                    std_dev: 0.,
                };
                let rv = unsafe {
                    gdal_sys::GDALComputeRasterStatistics(
                        c_band,
                        approx_ok as c_int,
                        &mut stats.min,
                        &mut stats.max,
                        &mut stats.mean,
                        &mut stats.std_dev,
                        None,
                        ptr::null_mut(),
                    )
                };
                _cpl_result(rv)?;
                Ok(stats)
            },
            |_, stats| Ok(stats),
        )
    }

    /// Scans the band and computes its statistics.
    ///
    /// With `approx_ok`, overviews or a subset of the blocks may be used.
    pub fn compute_statistics(&self, approx_ok: bool) -> Result<BandStatistics> {
        self.compute_statistics_job(approx_ok).run()
    }

    pub fn compute_statistics_async(&self, approx_ok: bool) -> Job<BandStatistics> {
        self.compute_statistics_job(approx_ok).spawn()
    }

    /// Stored statistics of the band.
    ///
    /// Without `force`, `None` when they are not known without scanning the band.
    pub fn statistics(&self, approx_ok: bool, force: bool) -> Result<Option<BandStatistics>> {
        self.with_native(|c_band| {
            let (mut min, mut max, mut mean, mut std_dev) = (0., 0., 0., 0.);
            let rv = unsafe {
                gdal_sys::GDALGetRasterStatistics(
                    c_band,
                    approx_ok as c_int,
                    force as c_int,
                    &mut min,
                    &mut max,
                    &mut mean,
                    &mut std_dev,
                )
            };
            if rv == gdal_sys::CPLErr::CE_Warning && !force {
                unsafe { gdal_sys::CPLErrorReset() };
                return Ok(None);
            }
            _cpl_result(rv)?;
            Ok(Some(BandStatistics {
                min,
                max,
                mean,
                std_dev,
            }))
        })
    }

    pub fn set_statistics(&self, stats: &BandStatistics) -> Result<()> {
        self.with_native(|c_band| {
            _cpl_result(unsafe {
                gdal_sys::GDALSetRasterStatistics(
                    c_band,
                    stats.min,
                    stats.max,
                    stats.mean,
                    stats.std_dev,
                )
            })
        })
    }

    pub fn mask_flags(&self) -> Result<MaskFlags> {
        self.with_native(|c_band| {
            Ok(MaskFlags::from_bits_retain(unsafe {
                gdal_sys::GDALGetMaskFlags(c_band)
            }))
        })
    }

    /// The mask band, owned by this band or shared across the dataset.
    pub fn mask_band(&self) -> Result<RasterBand> {
        let c_mask = self.with_native(|c_band| {
            let c_mask = unsafe { gdal_sys::GDALGetMaskBand(c_band) };
            if c_mask.is_null() {
                return Err(_last_null_pointer_err("GDALGetMaskBand"));
            }
            Ok(NativePtr::new(c_mask))
        })?;
        Ok(RasterBand::from_store(&self.dataset, c_mask))
    }

    /// Adds a mask band. Wrappers of the previous mask become destroyed.
    pub fn create_mask_band(&self, flags: MaskFlags) -> Result<()> {
        let dataset_object = self.dataset.native_object().clone();
        self.with_native(|c_band| {
            let c_previous = unsafe { gdal_sys::GDALGetMaskBand(c_band) };
            _cpl_result(unsafe { gdal_sys::GDALCreateMaskBand(c_band, flags.bits()) })?;
            if !c_previous.is_null() {
                store::evict(StoreKey::new(&dataset_object, NativePtr::new(c_previous)));
            }
            Ok(())
        })
    }

    fn metadata_job(&self, domain: &str) -> Result<AsyncJob<Vec<(String, String)>, Vec<(String, String)>>> {
        self.dataset.check_open()?;
        let c_domain = CString::new(domain)?;
        Ok(self.job(
            move |c_band| {
                let mut c_entry = unsafe { gdal_sys::GDALGetMetadata(c_band, c_domain.as_ptr()) };
                let mut entries = Vec::new();
                if c_entry.is_null() {
                    return Ok(entries);
                }
                unsafe {
                    while !(*c_entry).is_null() {
                        entries.extend(_string_tuple(*c_entry as *const c_char, '='));
                        c_entry = c_entry.add(1);
                    }
                }
                Ok(entries)
            },
            |_, entries| Ok(entries),
        ))
    }

    /// `KEY=VALUE` metadata entries of `domain` (`""` for the default domain), in order.
    pub fn metadata(&self, domain: &str) -> Result<Vec<(String, String)>> {
        self.metadata_job(domain)?.run()
    }

    pub fn metadata_async(&self, domain: &str) -> Job<Vec<(String, String)>> {
        match self.metadata_job(domain) {
            Ok(job) => job.spawn(),
            Err(e) => Job::ready(Err(e)),
        }
    }

    fn set_metadata_job(&self, entries: &CslStringList, domain: &str) -> Result<AsyncJob<(), ()>> {
        self.dataset.check_open()?;
        let c_domain = CString::new(domain)?;
        let entries = entries.clone();
        Ok(self.job(
            move |c_band| {
                _cpl_result(unsafe {
                    gdal_sys::GDALSetMetadata(c_band, entries.as_ptr(), c_domain.as_ptr())
                })
            },
            |_, ()| Ok(()),
        ))
    }

    /// Replaces the metadata of `domain` with `entries`.
    pub fn set_metadata(&self, entries: &CslStringList, domain: &str) -> Result<()> {
        self.set_metadata_job(entries, domain)?.run()
    }

    pub fn set_metadata_async(&self, entries: &CslStringList, domain: &str) -> Job<()> {
        match self.set_metadata_job(entries, domain) {
            Ok(job) => job.spawn(),
            Err(e) => Job::ready(Err(e)),
        }
    }

    /// Reduced resolution versions of this band.
    pub fn overviews(&self) -> RasterBandOverviews {
        RasterBandOverviews::new(self.clone())
    }
}

impl Wrapper for RasterBand {
    fn native_object(&self) -> &Arc<NativeObject> {
        &self.object
    }
}

impl DatasetBound for RasterBand {
    fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}
