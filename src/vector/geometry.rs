use std::ffi::{c_void, CString};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::null_mut;
use std::sync::Arc;

use gdal_sys::{self, OGRGeometryH, OGRwkbGeometryType};
use libc::c_char;

use crate::errors::*;
use crate::store::{self, StoreKey};
use crate::utils::{_last_null_pointer_err, _ogr_result, _owned_string, _string};
use crate::vector::curves::CompoundCurves;
use crate::vector::points::CurvePoints;
use crate::vector::rings::PolygonRings;
use crate::wrapper::{NativeObject, NativePtr, Wrapper};

unsafe fn destroy_geometry(c_geom: *mut c_void) {
    gdal_sys::OGR_G_DestroyGeometry(c_geom);
}

/// OGR Geometry
///
/// Either owned (created here or cloned) or borrowed from the feature, polygon or
/// compound curve containing it. A borrowed geometry becomes destroyed together with
/// its container.
#[derive(Clone)]
pub struct Geometry {
    object: Arc<NativeObject>,
    // OGR geometries must not be used from several threads at once
    _local: PhantomData<*mut c_void>,
}

impl Geometry {
    /// Takes ownership of `c_geom`.
    ///
    /// # Safety
    /// `c_geom` must be a valid geometry owned by nothing else.
    pub(crate) unsafe fn with_c_geometry(c_geom: OGRGeometryH) -> Geometry {
        Geometry::from_object(Arc::new(NativeObject::owned(
            "geometry",
            NativePtr::new(c_geom),
            destroy_geometry,
        )))
    }

    /// Registers `c_geom` as a view owned by `parent`, reusing the existing wrapper if any.
    pub(crate) fn borrowed(parent: &Arc<NativeObject>, c_geom: NativePtr) -> Geometry {
        let object = store::get_or_register(StoreKey::new(parent, c_geom), || {
            NativeObject::borrowed("geometry", c_geom, parent)
        });
        Geometry::from_object(object)
    }

    fn from_object(object: Arc<NativeObject>) -> Geometry {
        Geometry {
            object,
            _local: PhantomData,
        }
    }

    /// Creates an empty geometry of the given type.
    pub fn empty(wkb_type: OGRwkbGeometryType::Type) -> Result<Geometry> {
        let c_geom = unsafe { gdal_sys::OGR_G_CreateGeometry(wkb_type) };
        if c_geom.is_null() {
            return Err(_last_null_pointer_err("OGR_G_CreateGeometry"));
        };
        Ok(unsafe { Geometry::with_c_geometry(c_geom) })
    }

    /// Create a geometry by parsing a
    /// [WKT](https://en.wikipedia.org/wiki/Well-known_text_representation_of_geometry) string.
    pub fn from_wkt(wkt: &str) -> Result<Geometry> {
        let c_wkt = CString::new(wkt)?;
        // OGR_G_CreateFromWkt does not write to the pointed-to memory, but this is not reflected
        // in its signature (`char**` instead of `char const**`), so we need a scary looking cast.
        let mut c_wkt_ptr = c_wkt.as_ptr() as *mut c_char;
        let mut c_geom = null_mut();
        let rv = unsafe { gdal_sys::OGR_G_CreateFromWkt(&mut c_wkt_ptr, null_mut(), &mut c_geom) };
        _ogr_result(rv, "OGR_G_CreateFromWkt")?;
        Ok(unsafe { Geometry::with_c_geometry(c_geom) })
    }

    /// Returns the live native handle.
    pub fn c_geometry(&self) -> Result<OGRGeometryH> {
        Ok(self.object.handle()?.as_ptr())
    }

    /// Serialize the geometry as WKT.
    pub fn wkt(&self) -> Result<String> {
        let c_geom = self.c_geometry()?;
        let mut c_wkt = null_mut();
        let rv = unsafe { gdal_sys::OGR_G_ExportToWkt(c_geom, &mut c_wkt) };
        _ogr_result(rv, "OGR_G_ExportToWkt")?;
        Ok(_owned_string(c_wkt))
    }

    pub fn geometry_type(&self) -> Result<OGRwkbGeometryType::Type> {
        Ok(unsafe { gdal_sys::OGR_G_GetGeometryType(self.c_geometry()?) })
    }

    /// Geometry type with the Z/M flags stripped.
    pub fn flat_geometry_type(&self) -> Result<OGRwkbGeometryType::Type> {
        Ok(unsafe { gdal_sys::OGR_GT_Flatten(self.geometry_type()?) })
    }

    /// Upper case OGR name such as `"POINT"` or `"LINEARRING"`.
    pub fn geometry_name(&self) -> Result<String> {
        Ok(_string(unsafe { gdal_sys::OGR_G_GetGeometryName(self.c_geometry()?) }))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(unsafe { gdal_sys::OGR_G_IsEmpty(self.c_geometry()?) } != 0)
    }

    /// Deep copy, owned by the returned wrapper.
    pub fn duplicate(&self) -> Result<Geometry> {
        let c_geom = unsafe { gdal_sys::OGR_G_Clone(self.c_geometry()?) };
        if c_geom.is_null() {
            return Err(_last_null_pointer_err("OGR_G_Clone"));
        }
        Ok(unsafe { Geometry::with_c_geometry(c_geom) })
    }
}

impl Wrapper for Geometry {
    fn native_object(&self) -> &Arc<NativeObject> {
        &self.object
    }
}

impl Debug for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.wkt() {
            Ok(wkt) => f.write_fmt(format_args!("Geometry({wkt})")),
            Err(_) => f.write_str("Geometry(<destroyed>)"),
        }
    }
}

fn invalid_geometry(expected: &'static str) -> GdalError {
    GdalError::InvalidElement {
        kind: "geometry",
        position: 0,
        expected,
    }
}

/// Declares a typed view over [`Geometry`], checked on conversion.
macro_rules! geometry_view {
    ($(#[$meta:meta])* $name:ident, $label:literal, $matches:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        pub struct $name(Geometry);

        impl $name {
            pub fn into_inner(self) -> Geometry {
                self.0
            }

            fn accepts(geometry: &Geometry) -> Result<bool> {
                let check: fn(&Geometry) -> Result<bool> = $matches;
                check(geometry)
            }
        }

        impl Deref for $name {
            type Target = Geometry;

            fn deref(&self) -> &Geometry {
                &self.0
            }
        }

        impl AsRef<Geometry> for $name {
            fn as_ref(&self) -> &Geometry {
                &self.0
            }
        }

        impl<'a> From<&'a $name> for &'a Geometry {
            fn from(view: &'a $name) -> &'a Geometry {
                &view.0
            }
        }

        impl From<$name> for Geometry {
            fn from(view: $name) -> Geometry {
                view.0
            }
        }

        impl TryFrom<Geometry> for $name {
            type Error = GdalError;

            fn try_from(geometry: Geometry) -> Result<Self> {
                if !Self::accepts(&geometry)? {
                    return Err(invalid_geometry($label));
                }
                Ok($name(geometry))
            }
        }

        impl Wrapper for $name {
            fn native_object(&self) -> &Arc<NativeObject> {
                self.0.native_object()
            }
        }
    };
}

fn has_flat_type(geometry: &Geometry, wkb_type: OGRwkbGeometryType::Type) -> Result<bool> {
    Ok(geometry.flat_geometry_type()? == wkb_type)
}

geometry_view!(
    /// A single position, 2D or 3D.
    Point,
    "Point",
    |g| has_flat_type(g, OGRwkbGeometryType::wkbPoint)
);
geometry_view!(
    LineString,
    "LineString",
    |g| Ok(has_flat_type(g, OGRwkbGeometryType::wkbLineString)? && g.geometry_name()? == "LINESTRING")
);
geometry_view!(
    /// Closed line string used as a polygon ring. OGR reports its type as `wkbLineString`.
    LinearRing,
    "LinearRing",
    |g| Ok(g.geometry_name()? == "LINEARRING")
);
geometry_view!(
    CircularString,
    "CircularString",
    |g| has_flat_type(g, OGRwkbGeometryType::wkbCircularString)
);
geometry_view!(
    Polygon,
    "Polygon",
    |g| has_flat_type(g, OGRwkbGeometryType::wkbPolygon)
);
geometry_view!(
    /// Sequence of line strings and circular strings joined end to end.
    CompoundCurve,
    "CompoundCurve",
    |g| has_flat_type(g, OGRwkbGeometryType::wkbCompoundCurve)
);

impl Point {
    pub fn new(x: f64, y: f64) -> Result<Point> {
        let geometry = Geometry::empty(OGRwkbGeometryType::wkbPoint)?;
        unsafe { gdal_sys::OGR_G_SetPoint_2D(geometry.c_geometry()?, 0, x, y) };
        Ok(Point(geometry))
    }

    pub fn new_3d(x: f64, y: f64, z: f64) -> Result<Point> {
        let geometry = Geometry::empty(OGRwkbGeometryType::wkbPoint25D)?;
        unsafe { gdal_sys::OGR_G_SetPoint(geometry.c_geometry()?, 0, x, y, z) };
        Ok(Point(geometry))
    }

    pub fn x(&self) -> Result<f64> {
        Ok(unsafe { gdal_sys::OGR_G_GetX(self.c_geometry()?, 0) })
    }

    pub fn y(&self) -> Result<f64> {
        Ok(unsafe { gdal_sys::OGR_G_GetY(self.c_geometry()?, 0) })
    }

    /// The Z coordinate, `None` for a 2D point.
    pub fn z(&self) -> Result<Option<f64>> {
        let c_geom = self.c_geometry()?;
        if unsafe { gdal_sys::OGR_G_GetCoordinateDimension(c_geom) } < 3 {
            return Ok(None);
        }
        Ok(Some(unsafe { gdal_sys::OGR_G_GetZ(c_geom, 0) }))
    }

    pub fn coord(&self) -> Result<geo_types::Coord<f64>> {
        Ok(geo_types::coord! { x: self.x()?, y: self.y()? })
    }
}

impl LineString {
    pub fn new() -> Result<LineString> {
        Ok(LineString(Geometry::empty(OGRwkbGeometryType::wkbLineString)?))
    }

    pub fn points(&self) -> CurvePoints {
        CurvePoints::new(self.0.clone())
    }
}

impl LinearRing {
    pub fn new() -> Result<LinearRing> {
        Ok(LinearRing(Geometry::empty(OGRwkbGeometryType::wkbLinearRing)?))
    }

    pub fn points(&self) -> CurvePoints {
        CurvePoints::new(self.0.clone())
    }
}

impl CircularString {
    pub fn new() -> Result<CircularString> {
        Ok(CircularString(Geometry::empty(
            OGRwkbGeometryType::wkbCircularString,
        )?))
    }

    pub fn points(&self) -> CurvePoints {
        CurvePoints::new(self.0.clone())
    }
}

impl Polygon {
    pub fn new() -> Result<Polygon> {
        Ok(Polygon(Geometry::empty(OGRwkbGeometryType::wkbPolygon)?))
    }

    /// Exterior ring first, then the interior rings.
    pub fn rings(&self) -> PolygonRings {
        PolygonRings::new(self.0.clone())
    }
}

impl CompoundCurve {
    pub fn new() -> Result<CompoundCurve> {
        Ok(CompoundCurve(Geometry::empty(
            OGRwkbGeometryType::wkbCompoundCurve,
        )?))
    }

    pub fn curves(&self) -> CompoundCurves {
        CompoundCurves::new(self.0.clone())
    }
}
