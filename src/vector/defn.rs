use std::ffi::{c_void, CString};
use std::marker::PhantomData;
use std::sync::Arc;

use gdal_sys::{
    self, OGRFeatureDefnH, OGRFieldDefnH, OGRFieldSubType, OGRFieldType, OGRGeomFieldDefnH,
    OGRwkbGeometryType,
};
use libc::c_int;

use crate::collection::{
    check_index, not_found, ChildAccess, ChildAppend, Collection, IndexedAccess,
};
use crate::errors::*;
use crate::spatial_ref::SpatialRef;
use crate::utils::{_last_null_pointer_err, _ogr_result, _string};
use crate::wrapper::{NativeObject, NativePtr, Ownership, Wrapper};

unsafe fn release_defn(c_defn: *mut c_void) {
    gdal_sys::OGR_FD_Release(c_defn);
}

unsafe fn destroy_field_defn(c_field_defn: *mut c_void) {
    gdal_sys::OGR_Fld_Destroy(c_field_defn);
}

/// Feature definition: the schema shared by the features of a layer.
///
/// Definitions handed out by layers are copies; changing them does not alter the layer.
/// Use [`Layer::create_field`](crate::vector::Layer::create_field) for that.
#[derive(Clone, Debug)]
pub struct FeatureDefn {
    object: Arc<NativeObject>,
    _local: PhantomData<*mut c_void>,
}

impl FeatureDefn {
    pub fn new(name: &str) -> Result<FeatureDefn> {
        let c_name = CString::new(name)?;
        let c_defn = unsafe { gdal_sys::OGR_FD_Create(c_name.as_ptr()) };
        if c_defn.is_null() {
            return Err(_last_null_pointer_err("OGR_FD_Create"));
        }
        Ok(unsafe { FeatureDefn::from_c_defn(c_defn, Ownership::Owned) })
    }

    /// Takes a reference on `c_defn`, released when the wrapper is destroyed.
    ///
    /// # Safety
    /// `c_defn` must be a valid feature definition.
    pub(crate) unsafe fn from_c_defn(c_defn: OGRFeatureDefnH, ownership: Ownership) -> FeatureDefn {
        gdal_sys::OGR_FD_Reference(c_defn);
        let ptr = NativePtr::new(c_defn);
        let object = match ownership {
            Ownership::Cloned => NativeObject::cloned("feature definition", ptr, release_defn),
            _ => NativeObject::owned("feature definition", ptr, release_defn),
        };
        FeatureDefn {
            object: Arc::new(object),
            _local: PhantomData,
        }
    }

    /// Deep copy of a definition owned by someone else.
    ///
    /// # Safety
    /// `c_defn` must be a valid feature definition.
    pub(crate) unsafe fn copy_of(c_defn: OGRFeatureDefnH) -> Result<FeatureDefn> {
        let c_copy = gdal_sys::OGR_FD_Create(gdal_sys::OGR_FD_GetName(c_defn));
        if c_copy.is_null() {
            return Err(_last_null_pointer_err("OGR_FD_Create"));
        }
        // drop the default geometry field, then clone every source one with its name and srs
        while gdal_sys::OGR_FD_GetGeomFieldCount(c_copy) > 0 {
            gdal_sys::OGR_FD_DeleteGeomFieldDefn(c_copy, 0);
        }
        for i in 0..gdal_sys::OGR_FD_GetGeomFieldCount(c_defn) {
            gdal_sys::OGR_FD_AddGeomFieldDefn(c_copy, gdal_sys::OGR_FD_GetGeomFieldDefn(c_defn, i));
        }
        gdal_sys::OGR_FD_SetGeometryIgnored(c_copy, gdal_sys::OGR_FD_IsGeometryIgnored(c_defn));
        gdal_sys::OGR_FD_SetStyleIgnored(c_copy, gdal_sys::OGR_FD_IsStyleIgnored(c_defn));
        for i in 0..gdal_sys::OGR_FD_GetFieldCount(c_defn) {
            gdal_sys::OGR_FD_AddFieldDefn(c_copy, gdal_sys::OGR_FD_GetFieldDefn(c_defn, i));
        }
        Ok(FeatureDefn::from_c_defn(c_copy, Ownership::Cloned))
    }

    /// Returns the live native handle.
    pub fn c_defn(&self) -> Result<OGRFeatureDefnH> {
        Ok(self.object.handle()?.as_ptr())
    }

    pub fn name(&self) -> Result<String> {
        Ok(_string(unsafe { gdal_sys::OGR_FD_GetName(self.c_defn()?) }))
    }

    /// Get the geometry type of the first geometry field
    pub fn geometry_type(&self) -> Result<OGRwkbGeometryType::Type> {
        Ok(unsafe { gdal_sys::OGR_FD_GetGeomType(self.c_defn()?) })
    }

    pub fn set_geometry_type(&self, wkb_type: OGRwkbGeometryType::Type) -> Result<()> {
        unsafe { gdal_sys::OGR_FD_SetGeomType(self.c_defn()?, wkb_type) };
        Ok(())
    }

    pub fn geometry_ignored(&self) -> Result<bool> {
        Ok(unsafe { gdal_sys::OGR_FD_IsGeometryIgnored(self.c_defn()?) } != 0)
    }

    pub fn set_geometry_ignored(&self, ignore: bool) -> Result<()> {
        unsafe { gdal_sys::OGR_FD_SetGeometryIgnored(self.c_defn()?, ignore as c_int) };
        Ok(())
    }

    pub fn style_ignored(&self) -> Result<bool> {
        Ok(unsafe { gdal_sys::OGR_FD_IsStyleIgnored(self.c_defn()?) } != 0)
    }

    pub fn set_style_ignored(&self, ignore: bool) -> Result<()> {
        unsafe { gdal_sys::OGR_FD_SetStyleIgnored(self.c_defn()?, ignore as c_int) };
        Ok(())
    }

    pub fn geometry_field_count(&self) -> Result<usize> {
        Ok(unsafe { gdal_sys::OGR_FD_GetGeomFieldCount(self.c_defn()?) }.max(0) as usize)
    }

    fn c_geometry_field(&self, index: usize) -> Result<OGRGeomFieldDefnH> {
        let c_defn = self.c_defn()?;
        let count = self.geometry_field_count()?;
        if index >= count {
            return Err(GdalError::IndexOutOfRange {
                kind: "geometry field",
                index,
                first: 0,
                count,
            });
        }
        Ok(unsafe { gdal_sys::OGR_FD_GetGeomFieldDefn(c_defn, index as c_int) })
    }

    pub fn geometry_field_name(&self, index: usize) -> Result<String> {
        let c_field = self.c_geometry_field(index)?;
        Ok(_string(unsafe { gdal_sys::OGR_GFld_GetNameRef(c_field) }))
    }

    pub fn geometry_field_type(&self, index: usize) -> Result<OGRwkbGeometryType::Type> {
        let c_field = self.c_geometry_field(index)?;
        Ok(unsafe { gdal_sys::OGR_GFld_GetType(c_field) })
    }

    /// A copy of the spatial reference of a geometry field, if it has one.
    pub fn geometry_field_spatial_ref(&self, index: usize) -> Result<Option<SpatialRef>> {
        let c_field = self.c_geometry_field(index)?;
        let c_srs = unsafe { gdal_sys::OGR_GFld_GetSpatialRef(c_field) };
        if c_srs.is_null() {
            return Ok(None);
        }
        unsafe { SpatialRef::from_borrowed_clone(c_srs) }.map(Some)
    }

    /// Adds a geometry field; the definition keeps its own copy of `srs`.
    pub fn add_geometry_field(
        &self,
        name: &str,
        wkb_type: OGRwkbGeometryType::Type,
        srs: Option<&SpatialRef>,
    ) -> Result<()> {
        let c_defn = self.c_defn()?;
        let c_srs = srs.map(SpatialRef::c_srs).transpose()?;
        let c_name = CString::new(name)?;
        let c_field = unsafe { gdal_sys::OGR_GFld_Create(c_name.as_ptr(), wkb_type) };
        if c_field.is_null() {
            return Err(_last_null_pointer_err("OGR_GFld_Create"));
        }
        unsafe {
            if let Some(c_srs) = c_srs {
                gdal_sys::OGR_GFld_SetSpatialRef(c_field, c_srs);
            }
            gdal_sys::OGR_FD_AddGeomFieldDefn(c_defn, c_field);
            gdal_sys::OGR_GFld_Destroy(c_field);
        }
        Ok(())
    }

    /// Renames a geometry field, such as the unnamed default one.
    pub fn set_geometry_field_name(&self, index: usize, name: &str) -> Result<()> {
        let c_name = CString::new(name)?;
        let c_field = self.c_geometry_field(index)?;
        unsafe { gdal_sys::OGR_GFld_SetName(c_field, c_name.as_ptr()) };
        Ok(())
    }

    pub fn set_geometry_field_spatial_ref(&self, index: usize, srs: &SpatialRef) -> Result<()> {
        let c_srs = srs.c_srs()?;
        let c_field = self.c_geometry_field(index)?;
        unsafe { gdal_sys::OGR_GFld_SetSpatialRef(c_field, c_srs) };
        Ok(())
    }

    /// The attribute fields of this definition.
    pub fn fields(&self) -> FeatureDefnFields {
        FeatureDefnFields::new(self.clone())
    }

    /// Deep copy, owned by the returned wrapper.
    pub fn duplicate(&self) -> Result<FeatureDefn> {
        unsafe { FeatureDefn::copy_of(self.c_defn()?) }
    }
}

impl Wrapper for FeatureDefn {
    fn native_object(&self) -> &Arc<NativeObject> {
        &self.object
    }
}

/// Definition of one attribute field.
#[derive(Clone, Debug)]
pub struct FieldDefn {
    object: Arc<NativeObject>,
    _local: PhantomData<*mut c_void>,
}

impl FieldDefn {
    pub fn new(name: &str, field_type: OGRFieldType::Type) -> Result<FieldDefn> {
        let c_str = CString::new(name)?;
        let c_field_defn = unsafe { gdal_sys::OGR_Fld_Create(c_str.as_ptr(), field_type) };
        if c_field_defn.is_null() {
            return Err(_last_null_pointer_err("OGR_Fld_Create"));
        };
        Ok(FieldDefn::from_object(NativeObject::owned(
            "field definition",
            NativePtr::new(c_field_defn),
            destroy_field_defn,
        )))
    }

    /// Copies a field definition owned by a feature definition.
    ///
    /// # Safety
    /// `c_field_defn` must be a valid field definition.
    pub(crate) unsafe fn copy_of(c_field_defn: OGRFieldDefnH) -> Result<FieldDefn> {
        let c_copy = gdal_sys::OGR_Fld_Create(
            gdal_sys::OGR_Fld_GetNameRef(c_field_defn),
            gdal_sys::OGR_Fld_GetType(c_field_defn),
        );
        if c_copy.is_null() {
            return Err(_last_null_pointer_err("OGR_Fld_Create"));
        }
        gdal_sys::OGR_Fld_SetWidth(c_copy, gdal_sys::OGR_Fld_GetWidth(c_field_defn));
        gdal_sys::OGR_Fld_SetPrecision(c_copy, gdal_sys::OGR_Fld_GetPrecision(c_field_defn));
        gdal_sys::OGR_Fld_SetNullable(c_copy, gdal_sys::OGR_Fld_IsNullable(c_field_defn));
        gdal_sys::OGR_Fld_SetJustify(c_copy, gdal_sys::OGR_Fld_GetJustify(c_field_defn));
        gdal_sys::OGR_Fld_SetSubType(c_copy, gdal_sys::OGR_Fld_GetSubType(c_field_defn));
        gdal_sys::OGR_Fld_SetDefault(c_copy, gdal_sys::OGR_Fld_GetDefault(c_field_defn));
        gdal_sys::OGR_Fld_SetAlternativeName(
            c_copy,
            gdal_sys::OGR_Fld_GetAlternativeNameRef(c_field_defn),
        );
        Ok(FieldDefn::from_object(NativeObject::cloned(
            "field definition",
            NativePtr::new(c_copy),
            destroy_field_defn,
        )))
    }

    fn from_object(object: NativeObject) -> FieldDefn {
        FieldDefn {
            object: Arc::new(object),
            _local: PhantomData,
        }
    }

    /// Returns the live native handle.
    pub fn c_field_defn(&self) -> Result<OGRFieldDefnH> {
        Ok(self.object.handle()?.as_ptr())
    }

    pub fn name(&self) -> Result<String> {
        Ok(_string(unsafe { gdal_sys::OGR_Fld_GetNameRef(self.c_field_defn()?) }))
    }

    pub fn set_name(&self, name: &str) -> Result<()> {
        let c_str = CString::new(name)?;
        unsafe { gdal_sys::OGR_Fld_SetName(self.c_field_defn()?, c_str.as_ptr()) };
        Ok(())
    }

    pub fn field_type(&self) -> Result<OGRFieldType::Type> {
        Ok(unsafe { gdal_sys::OGR_Fld_GetType(self.c_field_defn()?) })
    }

    pub fn set_field_type(&self, field_type: OGRFieldType::Type) -> Result<()> {
        unsafe { gdal_sys::OGR_Fld_SetType(self.c_field_defn()?, field_type) };
        Ok(())
    }

    /// Formatting width, 0 when unset.
    pub fn width(&self) -> Result<i32> {
        Ok(unsafe { gdal_sys::OGR_Fld_GetWidth(self.c_field_defn()?) })
    }

    pub fn set_width(&self, width: i32) -> Result<()> {
        unsafe { gdal_sys::OGR_Fld_SetWidth(self.c_field_defn()?, width as c_int) };
        Ok(())
    }

    pub fn precision(&self) -> Result<i32> {
        Ok(unsafe { gdal_sys::OGR_Fld_GetPrecision(self.c_field_defn()?) })
    }

    pub fn set_precision(&self, precision: i32) -> Result<()> {
        unsafe { gdal_sys::OGR_Fld_SetPrecision(self.c_field_defn()?, precision as c_int) };
        Ok(())
    }

    pub fn is_nullable(&self) -> Result<bool> {
        Ok(unsafe { gdal_sys::OGR_Fld_IsNullable(self.c_field_defn()?) } != 0)
    }

    pub fn set_nullable(&self, nullable: bool) -> Result<()> {
        unsafe { gdal_sys::OGR_Fld_SetNullable(self.c_field_defn()?, nullable as c_int) };
        Ok(())
    }

    pub fn subtype(&self) -> Result<OGRFieldSubType::Type> {
        Ok(unsafe { gdal_sys::OGR_Fld_GetSubType(self.c_field_defn()?) })
    }

    pub fn set_subtype(&self, subtype: OGRFieldSubType::Type) -> Result<()> {
        unsafe { gdal_sys::OGR_Fld_SetSubType(self.c_field_defn()?, subtype) };
        Ok(())
    }

    /// Default value expression, such as `'unnamed'` or `CURRENT_TIMESTAMP`.
    pub fn default_value(&self) -> Result<Option<String>> {
        let rv = unsafe { gdal_sys::OGR_Fld_GetDefault(self.c_field_defn()?) };
        Ok((!rv.is_null()).then(|| _string(rv)))
    }

    /// Sets the default value expression, or clears it with `None`.
    ///
    /// String literals must be quoted: `set_default_value(Some("'unnamed'"))`.
    pub fn set_default_value(&self, default: Option<&str>) -> Result<()> {
        let c_default = default.map(CString::new).transpose()?;
        let c_field_defn = self.c_field_defn()?;
        let ptr = c_default.as_ref().map_or(std::ptr::null(), |c| c.as_ptr());
        unsafe { gdal_sys::OGR_Fld_SetDefault(c_field_defn, ptr) };
        Ok(())
    }

    /// Alternative name (alias), empty when unset.
    pub fn alternative_name(&self) -> Result<String> {
        Ok(_string(unsafe {
            gdal_sys::OGR_Fld_GetAlternativeNameRef(self.c_field_defn()?)
        }))
    }

    pub fn set_alternative_name(&self, name: &str) -> Result<()> {
        let c_str = CString::new(name)?;
        unsafe { gdal_sys::OGR_Fld_SetAlternativeName(self.c_field_defn()?, c_str.as_ptr()) };
        Ok(())
    }

    /// Deep copy, owned by the returned wrapper.
    pub fn duplicate(&self) -> Result<FieldDefn> {
        unsafe { FieldDefn::copy_of(self.c_field_defn()?) }
    }
}

impl Wrapper for FieldDefn {
    fn native_object(&self) -> &Arc<NativeObject> {
        &self.object
    }
}

/// Attribute fields of a feature definition.
///
/// [`FeatureDefnFields::get`] returns copies; adding a field copies the given definition.
pub struct FieldAccess;

impl ChildAccess for FieldAccess {
    type Parent = FeatureDefn;
    type Element = FieldDefn;
    type Native = NativePtr;

    const KIND: &'static str = "field";

    unsafe fn count(c_defn: NativePtr) -> Result<usize> {
        Ok(gdal_sys::OGR_FD_GetFieldCount(c_defn.as_ptr()).max(0) as usize)
    }

    fn wrap(_defn: &FeatureDefn, c_field_defn: NativePtr) -> Result<FieldDefn> {
        unsafe { FieldDefn::copy_of(c_field_defn.as_ptr()) }
    }
}

impl IndexedAccess for FieldAccess {
    const BY_NAME: bool = true;

    unsafe fn fetch(c_defn: NativePtr, index: usize) -> Result<NativePtr> {
        let c_field_defn = gdal_sys::OGR_FD_GetFieldDefn(c_defn.as_ptr(), index as c_int);
        if c_field_defn.is_null() {
            return Err(_last_null_pointer_err("OGR_FD_GetFieldDefn"));
        }
        Ok(NativePtr::new(c_field_defn))
    }

    unsafe fn fetch_by_name(c_defn: NativePtr, name: &std::ffi::CStr) -> Result<Option<NativePtr>> {
        let index = gdal_sys::OGR_FD_GetFieldIndex(c_defn.as_ptr(), name.as_ptr());
        if index < 0 {
            return Ok(None);
        }
        Self::fetch(c_defn, index as usize).map(Some)
    }
}

impl ChildAppend for FieldAccess {
    type Input<'a> = &'a FieldDefn;

    fn append(defn: &FeatureDefn, field_defn: &FieldDefn) -> Result<()> {
        unsafe { gdal_sys::OGR_FD_AddFieldDefn(defn.c_defn()?, field_defn.c_field_defn()?) };
        Ok(())
    }
}

pub type FeatureDefnFields = Collection<FieldAccess>;

impl Collection<FieldAccess> {
    /// Position of the field called `name`.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        let c_name = CString::new(name)?;
        let index =
            unsafe { gdal_sys::OGR_FD_GetFieldIndex(self.parent().c_defn()?, c_name.as_ptr()) };
        if index < 0 {
            return Err(not_found::<FieldAccess>(name));
        }
        Ok(index as usize)
    }

    pub fn names(&self) -> Result<Vec<String>> {
        let c_defn = self.parent().c_defn()?;
        (0..self.count()?)
            .map(|i| {
                let c_field_defn = unsafe { FieldAccess::fetch(NativePtr::new(c_defn), i)? };
                Ok(_string(unsafe { gdal_sys::OGR_Fld_GetNameRef(c_field_defn.as_ptr()) }))
            })
            .collect()
    }

    pub fn remove(&self, index: usize) -> Result<()> {
        check_index::<FieldAccess>(index, self.count()?)?;
        let rv =
            unsafe { gdal_sys::OGR_FD_DeleteFieldDefn(self.parent().c_defn()?, index as c_int) };
        _ogr_result(rv, "OGR_FD_DeleteFieldDefn")
    }

    pub fn remove_by_name(&self, name: &str) -> Result<()> {
        self.remove(self.index_of(name)?)
    }

    /// Reorders the fields: the field at position `map[i]` moves to position `i`.
    ///
    /// `map` must be a permutation of `0..count()`.
    pub fn reorder(&self, map: &[usize]) -> Result<()> {
        let count = self.count()?;
        let mut seen = vec![false; count];
        let is_permutation = map.len() == count
            && map
                .iter()
                .all(|&i| i < count && !std::mem::replace(&mut seen[i], true));
        if !is_permutation {
            return Err(GdalError::BadArgument(format!(
                "field map {map:?} is not a permutation of 0..{count}"
            )));
        }
        let mut c_map: Vec<c_int> = map.iter().map(|&i| i as c_int).collect();
        let rv =
            unsafe { gdal_sys::OGR_FD_ReorderFieldDefns(self.parent().c_defn()?, c_map.as_mut_ptr()) };
        _ogr_result(rv, "OGR_FD_ReorderFieldDefns")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defn_with_fields(names: &[&str]) -> FeatureDefn {
        let defn = FeatureDefn::new("towns").unwrap();
        for name in names {
            let field = FieldDefn::new(name, OGRFieldType::OFTString).unwrap();
            defn.fields().add(&field).unwrap();
        }
        defn
    }

    #[test]
    fn test_field_defn_properties() {
        let field = FieldDefn::new("population", OGRFieldType::OFTInteger).unwrap();
        field.set_width(10).unwrap();
        field.set_nullable(false).unwrap();
        assert_eq!(field.name().unwrap(), "population");
        assert_eq!(field.field_type().unwrap(), OGRFieldType::OFTInteger);
        assert_eq!(field.width().unwrap(), 10);
        assert!(!field.is_nullable().unwrap());

        let copy = field.duplicate().unwrap();
        assert_eq!(copy.native_object().ownership(), Ownership::Cloned);
        copy.set_name("pop").unwrap();
        assert_eq!(field.name().unwrap(), "population");
        assert_eq!(copy.width().unwrap(), 10);
    }

    #[test]
    fn test_defn_flags() {
        let defn = FeatureDefn::new("towns").unwrap();
        assert_eq!(defn.name().unwrap(), "towns");
        defn.set_geometry_type(OGRwkbGeometryType::wkbPoint).unwrap();
        assert_eq!(defn.geometry_type().unwrap(), OGRwkbGeometryType::wkbPoint);
        assert!(!defn.geometry_ignored().unwrap());
        defn.set_geometry_ignored(true).unwrap();
        defn.set_style_ignored(true).unwrap();
        assert!(defn.geometry_ignored().unwrap());
        assert!(defn.style_ignored().unwrap());
    }

    #[test]
    fn test_fields_add_get() {
        let defn = defn_with_fields(&["name", "kind"]);
        let fields = defn.fields();
        assert_eq!(fields.count().unwrap(), 2);
        assert_eq!(fields.get(1).unwrap().name().unwrap(), "kind");
        assert_eq!(fields.get_by_name("name").unwrap().name().unwrap(), "name");
        assert_eq!(fields.index_of("kind").unwrap(), 1);
        assert_eq!(fields.names().unwrap(), vec!["name", "kind"]);
        assert!(matches!(
            fields.get_by_name("missing"),
            Err(GdalError::NotFound { kind: "field", .. })
        ));
        assert!(matches!(
            fields.get(2),
            Err(GdalError::IndexOutOfRange { index: 2, count: 2, .. })
        ));
    }

    #[test]
    fn test_fetched_field_is_a_copy() {
        let defn = defn_with_fields(&["name"]);
        let field = defn.fields().get(0).unwrap();
        field.set_name("renamed").unwrap();
        assert_eq!(defn.fields().names().unwrap(), vec!["name"]);
    }

    #[test]
    fn test_fields_remove() {
        let defn = defn_with_fields(&["a", "b", "c"]);
        let fields = defn.fields();
        fields.remove(0).unwrap();
        assert_eq!(fields.names().unwrap(), vec!["b", "c"]);
        fields.remove_by_name("c").unwrap();
        assert_eq!(fields.names().unwrap(), vec!["b"]);
        assert!(matches!(
            fields.remove(1),
            Err(GdalError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            fields.remove_by_name("zzz"),
            Err(GdalError::NotFound { .. })
        ));
    }

    #[test]
    fn test_fields_reorder() {
        let defn = defn_with_fields(&["a", "b", "c"]);
        let fields = defn.fields();
        fields.reorder(&[2, 0, 1]).unwrap();
        assert_eq!(fields.names().unwrap(), vec!["c", "a", "b"]);

        for bad in [&[0, 1][..], &[0, 0, 1][..], &[0, 1, 3][..]] {
            assert!(matches!(fields.reorder(bad), Err(GdalError::BadArgument(_))));
        }
        assert_eq!(fields.names().unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_duplicate_defn() {
        let defn = defn_with_fields(&["a"]);
        defn.set_geometry_type(OGRwkbGeometryType::wkbPolygon).unwrap();
        let copy = defn.duplicate().unwrap();
        copy.fields()
            .add(&FieldDefn::new("b", OGRFieldType::OFTReal).unwrap())
            .unwrap();
        assert_eq!(copy.fields().names().unwrap(), vec!["a", "b"]);
        assert_eq!(defn.fields().count().unwrap(), 1);
        assert_eq!(copy.geometry_type().unwrap(), OGRwkbGeometryType::wkbPolygon);
        assert_eq!(copy.name().unwrap(), "towns");
    }

    #[test]
    fn test_field_copy_keeps_subtype_default_and_alias() {
        let field = FieldDefn::new("active", OGRFieldType::OFTInteger).unwrap();
        field.set_subtype(OGRFieldSubType::OFSTBoolean).unwrap();
        field.set_default_value(Some("1")).unwrap();
        field.set_alternative_name("Is active").unwrap();

        let copy = field.duplicate().unwrap();
        assert_eq!(copy.subtype().unwrap(), OGRFieldSubType::OFSTBoolean);
        assert_eq!(copy.default_value().unwrap().as_deref(), Some("1"));
        assert_eq!(copy.alternative_name().unwrap(), "Is active");

        let defn = FeatureDefn::new("flags").unwrap();
        defn.fields().add(&field).unwrap();
        let fetched = defn.fields().get(0).unwrap();
        assert_eq!(fetched.subtype().unwrap(), OGRFieldSubType::OFSTBoolean);
        assert_eq!(fetched.default_value().unwrap().as_deref(), Some("1"));

        fetched.set_default_value(None).unwrap();
        assert_eq!(fetched.default_value().unwrap(), None);
    }

    #[test]
    fn test_defn_copy_keeps_geometry_fields() {
        let defn = defn_with_fields(&["a"]);
        defn.set_geometry_type(OGRwkbGeometryType::wkbPoint).unwrap();
        defn.set_geometry_field_name(0, "location").unwrap();
        defn.set_geometry_field_spatial_ref(0, &SpatialRef::from_epsg(4326).unwrap())
            .unwrap();
        defn.add_geometry_field(
            "outline",
            OGRwkbGeometryType::wkbPolygon,
            Some(&SpatialRef::from_epsg(3857).unwrap()),
        )
        .unwrap();
        defn.add_geometry_field("path", OGRwkbGeometryType::wkbLineString, None)
            .unwrap();

        let copy = defn.duplicate().unwrap();
        assert_eq!(copy.geometry_field_count().unwrap(), 3);
        assert_eq!(copy.geometry_field_name(0).unwrap(), "location");
        assert_eq!(copy.geometry_type().unwrap(), OGRwkbGeometryType::wkbPoint);
        assert_eq!(
            copy.geometry_field_spatial_ref(0).unwrap().unwrap().auth_code().unwrap(),
            Some(4326)
        );
        assert_eq!(copy.geometry_field_name(1).unwrap(), "outline");
        assert_eq!(
            copy.geometry_field_type(1).unwrap(),
            OGRwkbGeometryType::wkbPolygon
        );
        assert_eq!(
            copy.geometry_field_spatial_ref(1).unwrap().unwrap().auth_code().unwrap(),
            Some(3857)
        );
        assert!(copy.geometry_field_spatial_ref(2).unwrap().is_none());
        assert!(matches!(
            copy.geometry_field_name(3),
            Err(GdalError::IndexOutOfRange { index: 3, count: 3, .. })
        ));
    }

    #[test]
    fn test_defn_copy_without_geometry() {
        let defn = defn_with_fields(&["a"]);
        defn.set_geometry_type(OGRwkbGeometryType::wkbNone).unwrap();
        let copy = defn.duplicate().unwrap();
        assert_eq!(copy.geometry_field_count().unwrap(), 0);
        assert_eq!(copy.geometry_type().unwrap(), OGRwkbGeometryType::wkbNone);
    }

    #[test]
    fn test_destroyed_defn() {
        let defn = defn_with_fields(&["a"]);
        let fields = defn.fields();
        defn.destroy();
        assert!(matches!(
            fields.count(),
            Err(GdalError::Destroyed("feature definition"))
        ));
    }
}
