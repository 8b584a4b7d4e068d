//! Ownership-aware wrappers over the [GDAL](http://gdal.org/) C API.
//!
//! Every GDAL object reached through this crate is held by a [`NativeObject`] that
//! knows who releases it ([`Ownership`]) and whether it, or any object it was borrowed
//! from, has already been destroyed. Using a wrapper whose native side is gone fails
//! with [`errors::GdalError::Destroyed`] or [`errors::GdalError::DestroyedDataset`]
//! instead of touching freed memory.
//!
//! Children are exposed as collections: the layers and raster bands of a
//! [`Dataset`], the features of a [`vector::Layer`], the overviews of a
//! [`raster::RasterBand`], the points, rings and curves of a [`vector::Geometry`] and the
//! fields of a [`vector::FeatureDefn`]. Collections bound to a dataset offer each
//! operation twice: a blocking form and an `_async` form returning a [`Job`], whose
//! native half runs on a worker thread while the dataset stays locked.
//!
//! ## Use
//!
//! ```no_run
//! use gdal_bridge::vector::{Feature, FieldValue, LayerOptions};
//! use gdal_bridge::Driver;
//!
//! # fn main() -> gdal_bridge::errors::Result<()> {
//! let dataset = Driver::get_by_name("Memory")?.create_vector_only("")?;
//! let layer = dataset.layers().create(LayerOptions {
//!     name: "towns",
//!     ..Default::default()
//! })?;
//! let feature = Feature::new(&layer)?;
//! layer.features().add(&feature)?;
//!
//! // the same operation, run on a job worker
//! let count = layer.features().count_async().wait()?;
//! assert_eq!(count, 1);
//!
//! dataset.close();
//! assert!(layer.name().is_err());
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: object lifetimes at `trace`, releases and
//! store purges at `debug`. GDAL's own diagnostics can be forwarded to the same
//! facade with [`config::route_errors_to_log`].

pub mod collection;
pub mod config;
pub mod cpl;
mod dataset;
mod driver;
pub mod errors;
mod job;
mod options;
pub mod raster;
pub mod spatial_ref;
pub mod store;
mod utils;
pub mod vector;
mod wrapper;

pub use dataset::{Dataset, DatasetBound};
pub use driver::Driver;
pub use job::{Job, JobState};
pub use options::{DatasetOptions, GdalOpenFlags};
pub use wrapper::{NativeObject, NativePtr, Ownership, Wrapper};

#[cfg(test)]
mod test_utils;
