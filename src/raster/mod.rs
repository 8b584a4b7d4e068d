//! GDAL Raster Data

mod bands;
mod overviews;
mod rasterband;
mod types;

pub use bands::{BandAccess, DatasetBands};
pub use overviews::{OverviewAccess, RasterBandOverviews};
pub use rasterband::{BandStatistics, MaskFlags, RasterBand};
pub use types::{GDALDataType, GdalType, GdalTypeDescriptor};
