use gdal_sys::{self, OGRwkbGeometryType};
use libc::c_int;

use crate::collection::{ChildAccess, ChildAppend, Collection, IndexedAccess};
use crate::errors::*;
use crate::utils::{_last_null_pointer_err, _ogr_result};
use crate::vector::geometry::Geometry;
use crate::wrapper::{NativePtr, Wrapper};

/// Simple curves making up a compound curve, borrowed from it.
///
/// Each added curve must start where the previous one ends.
pub struct CurveAccess;

impl ChildAccess for CurveAccess {
    type Parent = Geometry;
    type Element = Geometry;
    type Native = NativePtr;

    const KIND: &'static str = "curve";

    unsafe fn count(c_compound: NativePtr) -> Result<usize> {
        Ok(gdal_sys::OGR_G_GetGeometryCount(c_compound.as_ptr()).max(0) as usize)
    }

    fn wrap(compound: &Geometry, c_curve: NativePtr) -> Result<Geometry> {
        Ok(Geometry::borrowed(compound.native_object(), c_curve))
    }
}

impl IndexedAccess for CurveAccess {
    unsafe fn fetch(c_compound: NativePtr, index: usize) -> Result<NativePtr> {
        let c_curve = gdal_sys::OGR_G_GetGeometryRef(c_compound.as_ptr(), index as c_int);
        if c_curve.is_null() {
            return Err(_last_null_pointer_err("OGR_G_GetGeometryRef"));
        }
        Ok(NativePtr::new(c_curve))
    }
}

impl ChildAppend for CurveAccess {
    type Input<'a> = &'a Geometry;

    fn append(compound: &Geometry, curve: &Geometry) -> Result<()> {
        let simple = match curve.flat_geometry_type()? {
            OGRwkbGeometryType::wkbLineString => curve.geometry_name()? == "LINESTRING",
            OGRwkbGeometryType::wkbCircularString => true,
            _ => false,
        };
        if !simple {
            return Err(GdalError::InvalidElement {
                kind: CurveAccess::KIND,
                position: 0,
                expected: "LineString or CircularString",
            });
        }
        let rv =
            unsafe { gdal_sys::OGR_G_AddGeometry(compound.c_geometry()?, curve.c_geometry()?) };
        _ogr_result(rv, "OGR_G_AddGeometry")
    }
}

pub type CompoundCurves = Collection<CurveAccess>;
