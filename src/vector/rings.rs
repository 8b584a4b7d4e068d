use libc::c_int;

use crate::collection::{ChildAccess, ChildAppend, Collection, IndexedAccess};
use crate::errors::*;
use crate::utils::{_last_null_pointer_err, _ogr_result};
use crate::vector::geometry::{Geometry, LinearRing};
use crate::wrapper::{NativePtr, Wrapper};

/// Rings of a polygon. Index 0 is the exterior ring.
///
/// Rings are borrowed from the polygon; adding a ring copies it.
pub struct RingAccess;

impl ChildAccess for RingAccess {
    type Parent = Geometry;
    type Element = LinearRing;
    type Native = NativePtr;

    const KIND: &'static str = "ring";

    unsafe fn count(c_polygon: NativePtr) -> Result<usize> {
        Ok(gdal_sys::OGR_G_GetGeometryCount(c_polygon.as_ptr()).max(0) as usize)
    }

    fn wrap(polygon: &Geometry, c_ring: NativePtr) -> Result<LinearRing> {
        LinearRing::try_from(Geometry::borrowed(polygon.native_object(), c_ring))
    }
}

impl IndexedAccess for RingAccess {
    unsafe fn fetch(c_polygon: NativePtr, index: usize) -> Result<NativePtr> {
        let c_ring = gdal_sys::OGR_G_GetGeometryRef(c_polygon.as_ptr(), index as c_int);
        if c_ring.is_null() {
            return Err(_last_null_pointer_err("OGR_G_GetGeometryRef"));
        }
        Ok(NativePtr::new(c_ring))
    }
}

impl ChildAppend for RingAccess {
    type Input<'a> = &'a Geometry;

    fn append(polygon: &Geometry, ring: &Geometry) -> Result<()> {
        if ring.geometry_name()? != "LINEARRING" {
            return Err(GdalError::InvalidElement {
                kind: RingAccess::KIND,
                position: 0,
                expected: "LinearRing",
            });
        }
        let rv = unsafe { gdal_sys::OGR_G_AddGeometry(polygon.c_geometry()?, ring.c_geometry()?) };
        _ogr_result(rv, "OGR_G_AddGeometry")
    }
}

pub type PolygonRings = Collection<RingAccess>;
