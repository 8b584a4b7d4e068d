use gdal_sys::{self, OGRwkbGeometryType};
use libc::c_int;

use crate::collection::{check_index, ChildAccess, ChildAppend, Collection, IndexedAccess};
use crate::errors::*;
use crate::vector::geometry::{Geometry, Point};
use crate::wrapper::{NativePtr, Wrapper};

/// A point argument: plain coordinates or an existing point geometry.
#[derive(Clone, Copy, Debug)]
pub enum PointArg<'a> {
    Xy(f64, f64),
    Xyz(f64, f64, f64),
    Geometry(&'a Geometry),
}

impl From<(f64, f64)> for PointArg<'_> {
    fn from((x, y): (f64, f64)) -> Self {
        PointArg::Xy(x, y)
    }
}

impl From<(f64, f64, f64)> for PointArg<'_> {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        PointArg::Xyz(x, y, z)
    }
}

impl From<geo_types::Coord<f64>> for PointArg<'_> {
    fn from(coord: geo_types::Coord<f64>) -> Self {
        PointArg::Xy(coord.x, coord.y)
    }
}

impl From<geo_types::Point<f64>> for PointArg<'_> {
    fn from(point: geo_types::Point<f64>) -> Self {
        PointArg::Xy(point.x(), point.y())
    }
}

impl<'a> From<&'a Geometry> for PointArg<'a> {
    fn from(geometry: &'a Geometry) -> Self {
        PointArg::Geometry(geometry)
    }
}

impl<'a> From<&'a Point> for PointArg<'a> {
    fn from(point: &'a Point) -> Self {
        PointArg::Geometry(point)
    }
}

impl PointArg<'_> {
    /// Resolves the argument to `(x, y, z)`, rejecting geometries that are not points.
    fn coordinates(self) -> Result<(f64, f64, Option<f64>)> {
        match self {
            PointArg::Xy(x, y) => Ok((x, y, None)),
            PointArg::Xyz(x, y, z) => Ok((x, y, Some(z))),
            PointArg::Geometry(geometry) => {
                if geometry.flat_geometry_type()? != OGRwkbGeometryType::wkbPoint {
                    return Err(GdalError::InvalidElement {
                        kind: PointAccess::KIND,
                        position: 0,
                        expected: "Point",
                    });
                }
                let c_geom = geometry.c_geometry()?;
                let (x, y) = unsafe { (gdal_sys::OGR_G_GetX(c_geom, 0), gdal_sys::OGR_G_GetY(c_geom, 0)) };
                let z = (unsafe { gdal_sys::OGR_G_GetCoordinateDimension(c_geom) } >= 3)
                    .then(|| unsafe { gdal_sys::OGR_G_GetZ(c_geom, 0) });
                Ok((x, y, z))
            }
        }
    }
}

/// Vertices of a line string, linear ring or circular string.
///
/// Points are copied out: [`CurvePoints::get`] returns an independent [`Point`].
pub struct PointAccess;

impl ChildAccess for PointAccess {
    type Parent = Geometry;
    type Element = Point;
    type Native = (f64, f64, Option<f64>);

    const KIND: &'static str = "point";

    unsafe fn count(c_geom: NativePtr) -> Result<usize> {
        Ok(gdal_sys::OGR_G_GetPointCount(c_geom.as_ptr()).max(0) as usize)
    }

    fn wrap(_curve: &Geometry, (x, y, z): Self::Native) -> Result<Point> {
        match z {
            Some(z) => Point::new_3d(x, y, z),
            None => Point::new(x, y),
        }
    }
}

impl IndexedAccess for PointAccess {
    unsafe fn fetch(c_geom: NativePtr, index: usize) -> Result<Self::Native> {
        let c_geom = c_geom.as_ptr();
        let (mut x, mut y, mut z) = (0., 0., 0.);
        gdal_sys::OGR_G_GetPoint(c_geom, index as c_int, &mut x, &mut y, &mut z);
        let is_3d = gdal_sys::OGR_G_GetCoordinateDimension(c_geom) >= 3;
        Ok((x, y, is_3d.then_some(z)))
    }
}

impl ChildAppend for PointAccess {
    type Input<'a> = PointArg<'a>;

    fn append(curve: &Geometry, input: PointArg<'_>) -> Result<()> {
        let (x, y, z) = input.coordinates()?;
        let c_geom = curve.c_geometry()?;
        match z {
            Some(z) => unsafe { gdal_sys::OGR_G_AddPoint(c_geom, x, y, z) },
            None => unsafe { gdal_sys::OGR_G_AddPoint_2D(c_geom, x, y) },
        }
        Ok(())
    }
}

pub type CurvePoints = Collection<PointAccess>;

impl Collection<PointAccess> {
    /// Overwrites the point at `index`.
    pub fn set<'a>(&self, index: usize, point: impl Into<PointArg<'a>>) -> Result<()> {
        let (x, y, z) = point.into().coordinates()?;
        let c_geom = self.parent().native_object().handle()?;
        check_index::<PointAccess>(index, unsafe { PointAccess::count(c_geom)? })?;
        match z {
            Some(z) => unsafe { gdal_sys::OGR_G_SetPoint(c_geom.as_ptr(), index as c_int, x, y, z) },
            None => unsafe { gdal_sys::OGR_G_SetPoint_2D(c_geom.as_ptr(), index as c_int, x, y) },
        }
        Ok(())
    }

    /// Reverses the order of the points in place.
    pub fn reverse(&self) -> Result<()> {
        let c_geom = self.parent().native_object().handle()?;
        let count = unsafe { PointAccess::count(c_geom)? };
        let points = (0..count)
            .map(|i| unsafe { PointAccess::fetch(c_geom, i) })
            .collect::<Result<Vec<_>>>()?;
        for (i, (x, y, z)) in points.into_iter().rev().enumerate() {
            match z {
                Some(z) => unsafe { gdal_sys::OGR_G_SetPoint(c_geom.as_ptr(), i as c_int, x, y, z) },
                None => unsafe { gdal_sys::OGR_G_SetPoint_2D(c_geom.as_ptr(), i as c_int, x, y) },
            }
        }
        Ok(())
    }

    /// Truncates or extends the point list. New points are at the origin.
    pub fn resize(&self, count: usize) -> Result<()> {
        let c_geom = self.parent().native_object().handle()?;
        unsafe { gdal_sys::OGR_G_SetPointCount(c_geom.as_ptr(), count as c_int) };
        Ok(())
    }

    /// All points as `geo_types` coordinates, Z dropped.
    pub fn coords(&self) -> Result<Vec<geo_types::Coord<f64>>> {
        let c_geom = self.parent().native_object().handle()?;
        let count = unsafe { PointAccess::count(c_geom)? };
        (0..count)
            .map(|i| unsafe { PointAccess::fetch(c_geom, i) })
            .map(|point| point.map(|(x, y, _)| geo_types::coord! { x: x, y: y }))
            .collect()
    }
}
