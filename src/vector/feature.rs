use std::ffi::{c_void, CString};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Timelike};
use gdal_sys::{self, OGRFeatureH, OGRFieldType};
use libc::{c_double, c_float, c_int, c_longlong};

use crate::errors::*;
use crate::store;
use crate::utils::{_last_null_pointer_err, _ogr_result, _string};
use crate::vector::defn::FeatureDefn;
use crate::vector::geometry::Geometry;
use crate::vector::layer::Layer;
use crate::wrapper::{NativeObject, NativePtr, Wrapper};

/// `OGRNullFID`
const NULL_FID: i64 = -1;

unsafe fn destroy_feature(c_feature: *mut c_void) {
    gdal_sys::OGR_F_Destroy(c_feature);
}

/// A feature handed out by `OGR_L_GetFeature` and friends, owned until wrapped.
///
/// Destroys the feature if it is dropped before reaching [`Feature::from_owned`],
/// e.g. when nobody awaits the job that fetched it.
pub struct OwnedFeaturePtr(NativePtr);

impl OwnedFeaturePtr {
    /// # Safety
    /// `c_feature` must be a valid feature owned by the caller.
    pub(crate) unsafe fn new(c_feature: OGRFeatureH) -> Self {
        OwnedFeaturePtr(NativePtr::new(c_feature))
    }

    fn into_ptr(self) -> NativePtr {
        let ptr = self.0;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for OwnedFeaturePtr {
    fn drop(&mut self) {
        log::trace!("dropping unclaimed feature at {:p}", self.0.as_ptr());
        unsafe { destroy_feature(self.0.as_ptr()) };
    }
}

/// OGR Feature
///
/// Features are always owned by the wrapper: reading a feature from a layer returns a
/// copy, and changes reach the layer through
/// [`LayerFeatures::set`](crate::vector::LayerFeatures::set).
#[derive(Clone)]
pub struct Feature {
    object: Arc<NativeObject>,
    _local: PhantomData<*mut c_void>,
}

impl Feature {
    /// Creates an empty feature following the schema of `layer`.
    pub fn new(layer: &Layer) -> Result<Feature> {
        layer.with_native(|c_layer| {
            let c_defn = unsafe { gdal_sys::OGR_L_GetLayerDefn(c_layer) };
            let c_feature = unsafe { gdal_sys::OGR_F_Create(c_defn) };
            if c_feature.is_null() {
                return Err(_last_null_pointer_err("OGR_F_Create"));
            }
            Ok(Feature::from_owned(unsafe { OwnedFeaturePtr::new(c_feature) }))
        })
    }

    /// Creates an empty feature following `defn`.
    pub fn from_defn(defn: &FeatureDefn) -> Result<Feature> {
        let c_feature = unsafe { gdal_sys::OGR_F_Create(defn.c_defn()?) };
        if c_feature.is_null() {
            return Err(_last_null_pointer_err("OGR_F_Create"));
        }
        Ok(Feature::from_owned(unsafe { OwnedFeaturePtr::new(c_feature) }))
    }

    pub(crate) fn from_owned(c_feature: OwnedFeaturePtr) -> Feature {
        Feature {
            object: Arc::new(NativeObject::owned(
                "feature",
                c_feature.into_ptr(),
                destroy_feature,
            )),
            _local: PhantomData,
        }
    }

    /// Returns the live native handle.
    pub fn c_feature(&self) -> Result<OGRFeatureH> {
        Ok(self.object.handle()?.as_ptr())
    }

    /// The feature identifier, `None` until the feature is written to a layer.
    pub fn fid(&self) -> Result<Option<i64>> {
        let fid = unsafe { gdal_sys::OGR_F_GetFID(self.c_feature()?) };
        Ok((fid >= 0).then_some(fid))
    }

    pub fn set_fid(&self, fid: Option<i64>) -> Result<()> {
        let fid = fid.unwrap_or(NULL_FID);
        let rv = unsafe { gdal_sys::OGR_F_SetFID(self.c_feature()?, fid as c_longlong) };
        _ogr_result(rv, "OGR_F_SetFID")
    }

    fn field_index(&self, c_feature: OGRFeatureH, name: &str) -> Result<c_int> {
        let c_name = CString::new(name)?;
        let field_id = unsafe { gdal_sys::OGR_F_GetFieldIndex(c_feature, c_name.as_ptr()) };
        if field_id == -1 {
            return Err(GdalError::NotFound {
                kind: "field",
                key: name.to_string(),
            });
        }
        Ok(field_id)
    }

    /// Get the value of a named field.
    ///
    /// Returns `None` for unset and null fields. Field types without a dedicated
    /// [`FieldValue`] variant are read as strings.
    pub fn field(&self, name: &str) -> Result<Option<FieldValue>> {
        let c_feature = self.c_feature()?;
        let field_id = self.field_index(c_feature, name)?;
        if unsafe { gdal_sys::OGR_F_IsFieldSetAndNotNull(c_feature, field_id) } == 0 {
            return Ok(None);
        }
        let field_defn = unsafe { gdal_sys::OGR_F_GetFieldDefnRef(c_feature, field_id) };
        let field_type = unsafe { gdal_sys::OGR_Fld_GetType(field_defn) };
        let value = match field_type {
            OGRFieldType::OFTInteger => FieldValue::IntegerValue(unsafe {
                gdal_sys::OGR_F_GetFieldAsInteger(c_feature, field_id)
            }),
            OGRFieldType::OFTInteger64 => FieldValue::Integer64Value(unsafe {
                gdal_sys::OGR_F_GetFieldAsInteger64(c_feature, field_id)
            }),
            OGRFieldType::OFTReal => FieldValue::RealValue(unsafe {
                gdal_sys::OGR_F_GetFieldAsDouble(c_feature, field_id)
            }),
            OGRFieldType::OFTDate => {
                FieldValue::DateValue(Self::field_datetime(c_feature, field_id)?.date_naive())
            }
            OGRFieldType::OFTDateTime => {
                FieldValue::DateTimeValue(Self::field_datetime(c_feature, field_id)?)
            }
            _ => FieldValue::StringValue(_string(unsafe {
                gdal_sys::OGR_F_GetFieldAsString(c_feature, field_id)
            })),
        };
        Ok(Some(value))
    }

    fn field_datetime(c_feature: OGRFeatureH, field_id: c_int) -> Result<DateTime<FixedOffset>> {
        let (mut year, mut month, mut day): (c_int, c_int, c_int) = (0, 0, 0);
        let (mut hour, mut minute, mut tzflag): (c_int, c_int, c_int) = (0, 0, 0);
        let mut second: c_float = 0.;
        let success = unsafe {
            gdal_sys::OGR_F_GetFieldAsDateTimeEx(
                c_feature,
                field_id,
                &mut year,
                &mut month,
                &mut day,
                &mut hour,
                &mut minute,
                &mut second,
                &mut tzflag,
            )
        };
        if success == 0 {
            return Err(_last_null_pointer_err("OGR_F_GetFieldAsDateTimeEx"));
        }

        // 0: unknown, 1: local time, 100: UTC, otherwise UTC + (tzflag - 100) * 15 minutes
        let tzoffset_secs = if matches!(tzflag, 0 | 1 | 100) {
            0
        } else {
            (tzflag - 100) * 15 * 60
        };
        let invalid = || {
            GdalError::BadArgument(format!(
                "invalid date {year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second}"
            ))
        };
        let offset = FixedOffset::east_opt(tzoffset_secs).ok_or_else(invalid)?;
        let naive = NaiveDate::from_ymd_opt(year, month as u32, day as u32)
            .and_then(|date| {
                let millis = ((second.fract() * 1000.) as u32).min(999);
                date.and_hms_milli_opt(hour as u32, minute as u32, second as u32, millis)
            })
            .ok_or_else(invalid)?;
        offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(invalid)
    }

    /// Set the value of a named field.
    pub fn set_field(&self, name: &str, value: &FieldValue) -> Result<()> {
        let c_feature = self.c_feature()?;
        let idx = self.field_index(c_feature, name)?;
        match value {
            FieldValue::IntegerValue(value) => unsafe {
                gdal_sys::OGR_F_SetFieldInteger(c_feature, idx, *value as c_int)
            },
            FieldValue::Integer64Value(value) => unsafe {
                gdal_sys::OGR_F_SetFieldInteger64(c_feature, idx, *value as c_longlong)
            },
            FieldValue::RealValue(value) => unsafe {
                gdal_sys::OGR_F_SetFieldDouble(c_feature, idx, *value as c_double)
            },
            FieldValue::StringValue(value) => {
                let c_str_value = CString::new(value.as_str())?;
                unsafe { gdal_sys::OGR_F_SetFieldString(c_feature, idx, c_str_value.as_ptr()) }
            }
            FieldValue::DateValue(value) => unsafe {
                gdal_sys::OGR_F_SetFieldDateTime(
                    c_feature,
                    idx,
                    value.year() as c_int,
                    value.month() as c_int,
                    value.day() as c_int,
                    0,
                    0,
                    0,
                    0,
                )
            },
            FieldValue::DateTimeValue(value) => {
                let offset_secs = value.offset().local_minus_utc();
                let tzflag: c_int = 100 + offset_secs / (15 * 60);
                let second = value.second() as c_float
                    + value.timestamp_subsec_millis() as c_float / 1000.;
                unsafe {
                    gdal_sys::OGR_F_SetFieldDateTimeEx(
                        c_feature,
                        idx,
                        value.year() as c_int,
                        value.month() as c_int,
                        value.day() as c_int,
                        value.hour() as c_int,
                        value.minute() as c_int,
                        second,
                        tzflag,
                    )
                }
            }
        }
        Ok(())
    }

    /// Marks a field as null.
    pub fn set_field_null(&self, name: &str) -> Result<()> {
        let c_feature = self.c_feature()?;
        let idx = self.field_index(c_feature, name)?;
        unsafe { gdal_sys::OGR_F_SetFieldNull(c_feature, idx) };
        Ok(())
    }

    /// Get the feature's geometry, borrowed from the feature.
    pub fn geometry(&self) -> Result<Option<Geometry>> {
        let c_geom = unsafe { gdal_sys::OGR_F_GetGeometryRef(self.c_feature()?) };
        if c_geom.is_null() {
            return Ok(None);
        }
        Ok(Some(Geometry::borrowed(&self.object, NativePtr::new(c_geom))))
    }

    /// Replaces the feature's geometry with a copy of `geometry`.
    ///
    /// Geometries previously obtained from [`Feature::geometry`] become destroyed.
    pub fn set_geometry(&self, geometry: &Geometry) -> Result<()> {
        let c_feature = self.c_feature()?;
        let c_geom = geometry.c_geometry()?;
        store::purge_parent(&self.object);
        let rv = unsafe { gdal_sys::OGR_F_SetGeometry(c_feature, c_geom) };
        _ogr_result(rv, "OGR_F_SetGeometry")
    }

    /// Deep copy, owned by the returned wrapper.
    pub fn duplicate(&self) -> Result<Feature> {
        let c_feature = unsafe { gdal_sys::OGR_F_Clone(self.c_feature()?) };
        if c_feature.is_null() {
            return Err(_last_null_pointer_err("OGR_F_Clone"));
        }
        Ok(Feature::from_owned(unsafe { OwnedFeaturePtr::new(c_feature) }))
    }
}

impl Wrapper for Feature {
    fn native_object(&self) -> &Arc<NativeObject> {
        &self.object
    }

    fn destroy(&self) {
        store::purge_parent(&self.object);
        self.object.destroy();
    }
}

impl Debug for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feature")
            .field("object", &self.object)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    IntegerValue(i32),
    Integer64Value(i64),
    StringValue(String),
    RealValue(f64),
    DateValue(NaiveDate),
    DateTimeValue(DateTime<FixedOffset>),
}

impl FieldValue {
    /// Interpret the value as `String`.
    pub fn into_string(self) -> Option<String> {
        match self {
            FieldValue::StringValue(rv) => Some(rv),
            _ => None,
        }
    }

    /// Interpret the value as `f64`.
    pub fn into_real(self) -> Option<f64> {
        match self {
            FieldValue::RealValue(rv) => Some(rv),
            _ => None,
        }
    }

    /// Interpret the value as `i32`.
    pub fn into_int(self) -> Option<i32> {
        match self {
            FieldValue::IntegerValue(rv) => Some(rv),
            _ => None,
        }
    }

    /// Interpret the value as `i64`, widening 32 bit integers.
    pub fn into_int64(self) -> Option<i64> {
        match self {
            FieldValue::IntegerValue(rv) => Some(rv as i64),
            FieldValue::Integer64Value(rv) => Some(rv),
            _ => None,
        }
    }

    pub fn into_date(self) -> Option<NaiveDate> {
        match self {
            FieldValue::DateValue(rv) => Some(rv),
            FieldValue::DateTimeValue(rv) => Some(rv.date_naive()),
            _ => None,
        }
    }

    pub fn into_datetime(self) -> Option<DateTime<FixedOffset>> {
        match self {
            FieldValue::DateTimeValue(rv) => Some(rv),
            _ => None,
        }
    }
}
