use std::ffi::{c_void, CString};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ptr;
use std::sync::Arc;

use gdal_sys::{self, OGRSpatialReferenceH};
use libc::{c_char, c_int};

use crate::errors::*;
use crate::utils::{_last_null_pointer_err, _ogr_result, _owned_string, _string};
use crate::wrapper::{NativeObject, NativePtr, Ownership, Wrapper};

unsafe fn release_srs(c_srs: *mut c_void) {
    gdal_sys::OSRRelease(c_srs);
}

/// OGR Spatial Reference System
///
/// Spatial references attached to layers are handed out as copies.
#[derive(Clone)]
pub struct SpatialRef {
    object: Arc<NativeObject>,
    _local: PhantomData<*mut c_void>,
}

impl SpatialRef {
    /// # Safety
    /// `c_srs` must be a valid spatial reference owned by nothing else.
    unsafe fn with_c_srs(c_srs: OGRSpatialReferenceH, ownership: Ownership) -> SpatialRef {
        let ptr = NativePtr::new(c_srs);
        let object = match ownership {
            Ownership::Cloned => NativeObject::cloned("spatial reference", ptr, release_srs),
            _ => NativeObject::owned("spatial reference", ptr, release_srs),
        };
        SpatialRef {
            object: Arc::new(object),
            _local: PhantomData,
        }
    }

    pub fn new() -> Result<SpatialRef> {
        let c_obj = unsafe { gdal_sys::OSRNewSpatialReference(ptr::null()) };
        if c_obj.is_null() {
            return Err(_last_null_pointer_err("OSRNewSpatialReference"));
        }
        Ok(unsafe { SpatialRef::with_c_srs(c_obj, Ownership::Owned) })
    }

    pub fn from_wkt(wkt: &str) -> Result<SpatialRef> {
        let c_str = CString::new(wkt)?;
        let c_obj = unsafe { gdal_sys::OSRNewSpatialReference(c_str.as_ptr()) };
        if c_obj.is_null() {
            return Err(_last_null_pointer_err("OSRNewSpatialReference"));
        }
        Ok(unsafe { SpatialRef::with_c_srs(c_obj, Ownership::Owned) })
    }

    pub fn from_epsg(epsg_code: u32) -> Result<SpatialRef> {
        let srs = SpatialRef::new()?;
        let rv = unsafe { gdal_sys::OSRImportFromEPSG(srs.c_srs()?, epsg_code as c_int) };
        _ogr_result(rv, "OSRImportFromEPSG")?;
        Ok(srs)
    }

    /// Copies a spatial reference owned by someone else, such as a layer.
    ///
    /// # Safety
    /// `c_srs` must be a valid spatial reference.
    pub(crate) unsafe fn from_borrowed_clone(c_srs: OGRSpatialReferenceH) -> Result<SpatialRef> {
        let c_clone = gdal_sys::OSRClone(c_srs);
        if c_clone.is_null() {
            return Err(_last_null_pointer_err("OSRClone"));
        }
        Ok(SpatialRef::with_c_srs(c_clone, Ownership::Cloned))
    }

    /// Returns the live native handle.
    pub fn c_srs(&self) -> Result<OGRSpatialReferenceH> {
        Ok(self.object.handle()?.as_ptr())
    }

    pub fn to_wkt(&self) -> Result<String> {
        let mut c_wkt: *mut c_char = ptr::null_mut();
        let rv = unsafe { gdal_sys::OSRExportToWkt(self.c_srs()?, &mut c_wkt) };
        _ogr_result(rv, "OSRExportToWkt")?;
        Ok(_owned_string(c_wkt))
    }

    pub fn auth_code(&self) -> Result<Option<i32>> {
        let c_code = unsafe { gdal_sys::OSRGetAuthorityCode(self.c_srs()?, ptr::null()) };
        if c_code.is_null() {
            return Ok(None);
        }
        Ok(_string(c_code).parse().ok())
    }

    /// Deep copy, owned by the returned wrapper.
    pub fn duplicate(&self) -> Result<SpatialRef> {
        unsafe { SpatialRef::from_borrowed_clone(self.c_srs()?) }
    }
}

impl Wrapper for SpatialRef {
    fn native_object(&self) -> &Arc<NativeObject> {
        &self.object
    }
}

impl PartialEq for SpatialRef {
    fn eq(&self, other: &SpatialRef) -> bool {
        match (self.c_srs(), other.c_srs()) {
            (Ok(a), Ok(b)) => unsafe { gdal_sys::OSRIsSame(a, b) == 1 },
            _ => false,
        }
    }
}

impl Debug for SpatialRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialRef")
            .field("object", &self.object)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_epsg() {
        let srs = SpatialRef::from_epsg(4326).unwrap();
        assert_eq!(srs.auth_code().unwrap(), Some(4326));
        assert!(srs.to_wkt().unwrap().starts_with("GEOGCS[\"WGS 84\""));
    }

    #[test]
    fn test_wkt_round_trip() {
        let srs = SpatialRef::from_epsg(3857).unwrap();
        let other = SpatialRef::from_wkt(&srs.to_wkt().unwrap()).unwrap();
        assert_eq!(srs, other);
    }

    #[test]
    fn test_duplicate_survives_original() {
        let srs = SpatialRef::from_epsg(4326).unwrap();
        let copy = srs.duplicate().unwrap();
        assert_eq!(copy.native_object().ownership(), Ownership::Cloned);
        srs.destroy();
        assert!(matches!(
            srs.to_wkt(),
            Err(GdalError::Destroyed("spatial reference"))
        ));
        assert_eq!(copy.auth_code().unwrap(), Some(4326));
    }
}
