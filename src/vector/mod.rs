//! GDAL Vector Data
//!
//! Layers and features live inside a [`Dataset`](crate::Dataset) and are reached
//! through [`DatasetLayers`] and [`LayerFeatures`]. Geometries and feature definitions
//! are standalone objects; their parts (points, rings, curves, fields) are exposed
//! as collections borrowed from the parent.

mod curves;
mod defn;
mod feature;
mod features;
mod geometry;
mod layer;
mod layers;
mod options;
mod points;
mod rings;

pub use curves::{CompoundCurves, CurveAccess};
pub use defn::{FeatureDefn, FeatureDefnFields, FieldAccess, FieldDefn};
pub use feature::{Feature, FieldValue};
pub use features::{FeatureAccess, FeatureCursor, LayerFeatures};
pub use geometry::{
    CircularString, CompoundCurve, Geometry, LineString, LinearRing, Point, Polygon,
};
pub use layer::Layer;
pub use layers::{DatasetLayers, LayerAccess};
pub use options::LayerOptions;
pub use points::{CurvePoints, PointAccess, PointArg};
pub use rings::{PolygonRings, RingAccess};

pub use gdal_sys::{OGRFieldSubType, OGRFieldType, OGRwkbGeometryType};

#[cfg(test)]
mod tests;
