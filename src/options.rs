use std::ffi::c_uint;

use bitflags::bitflags;
use gdal_sys::GDALAccess;

/// Open options for [`crate::Dataset`]
#[derive(Debug, Default)]
pub struct DatasetOptions<'a> {
    pub open_flags: GdalOpenFlags,
    pub allowed_drivers: Option<&'a [&'a str]>,
    pub open_options: Option<&'a [&'a str]>,
    pub sibling_files: Option<&'a [&'a str]>,
}

bitflags! {
    /// GDAL extended open flags used by [`Dataset::open_ex`](crate::Dataset::open_ex).
    ///
    /// Used in the `nOpenFlags` argument to `GDALOpenEx`.
    ///
    /// `GDAL_OF_SHARED` is deliberately missing: a shared handle could be returned to
    /// two datasets, which would then close it twice.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GdalOpenFlags: c_uint {
        /// Open in read-only mode (default).
        const GDAL_OF_READONLY = 0x00;
        /// Open in update mode.
        const GDAL_OF_UPDATE = 0x01;
        /// Allow raster and vector drivers to be used.
        const GDAL_OF_ALL = 0x00;
        /// Allow raster drivers to be used.
        const GDAL_OF_RASTER = 0x02;
        /// Allow vector drivers to be used.
        const GDAL_OF_VECTOR = 0x04;
        /// Allow gnm drivers to be used.
        const GDAL_OF_GNM = 0x08;
        /// Emit error message in case of failed open.
        const GDAL_OF_VERBOSE_ERROR = 0x40;
        /// Open as internal dataset, not registered in the global list of opened datasets.
        const GDAL_OF_INTERNAL = 0x80;
    }
}

impl Default for GdalOpenFlags {
    fn default() -> GdalOpenFlags {
        GdalOpenFlags::GDAL_OF_READONLY
    }
}

impl From<GDALAccess::Type> for GdalOpenFlags {
    fn from(val: GDALAccess::Type) -> GdalOpenFlags {
        if val == GDALAccess::GA_Update {
            GdalOpenFlags::GDAL_OF_UPDATE
        } else {
            GdalOpenFlags::GDAL_OF_READONLY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_to_open_flags() {
        assert_eq!(
            GdalOpenFlags::from(GDALAccess::GA_Update),
            GdalOpenFlags::GDAL_OF_UPDATE
        );
        assert_eq!(
            GdalOpenFlags::from(GDALAccess::GA_ReadOnly),
            GdalOpenFlags::GDAL_OF_READONLY
        );
        let flags = GdalOpenFlags::GDAL_OF_UPDATE | GdalOpenFlags::GDAL_OF_VECTOR;
        assert_eq!(flags.bits(), 0x05);
    }
}
