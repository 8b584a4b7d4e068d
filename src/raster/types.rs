use std::ffi::CString;
use std::fmt::{Display, Formatter};

pub use gdal_sys::GDALDataType;
use gdal_sys::{
    GDALDataTypeIsFloating, GDALDataTypeIsInteger, GDALDataTypeIsSigned, GDALGetDataTypeByName,
    GDALGetDataTypeName, GDALGetDataTypeSizeBits,
};

use crate::errors::{GdalError, Result};
use crate::utils::_string;

/// Rust types with a matching GDAL pixel type.
pub trait GdalType {
    fn gdal_type() -> GDALDataType::Type;

    fn descriptor() -> GdalTypeDescriptor {
        GdalTypeDescriptor(Self::gdal_type())
    }
}

impl GdalType for u8 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_Byte
    }
}

impl GdalType for u16 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_UInt16
    }
}

impl GdalType for u32 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_UInt32
    }
}

impl GdalType for i16 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_Int16
    }
}

impl GdalType for i32 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_Int32
    }
}

impl GdalType for f32 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_Float32
    }
}

impl GdalType for f64 {
    fn gdal_type() -> GDALDataType::Type {
        GDALDataType::GDT_Float64
    }
}

/// A known GDAL pixel data type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct GdalTypeDescriptor(GDALDataType::Type);

impl GdalTypeDescriptor {
    /// Looks a data type up by its GDAL name (`"Byte"`, `"Int16"`, `"Float32"`, ...).
    ///
    /// Names GDAL does not know are rejected with [`GdalError::BadArgument`].
    pub fn from_name(name: &str) -> Result<Self> {
        let c_name = CString::new(name)?;
        let gdal_type = unsafe { GDALGetDataTypeByName(c_name.as_ptr()) };
        if gdal_type == GDALDataType::GDT_Unknown {
            return Err(GdalError::BadArgument(format!(
                "unknown data type name '{name}'"
            )));
        }
        Ok(GdalTypeDescriptor(gdal_type))
    }

    pub fn gdal_type(&self) -> GDALDataType::Type {
        self.0
    }

    pub fn name(&self) -> String {
        _string(unsafe { GDALGetDataTypeName(self.gdal_type()) })
    }

    pub fn bits(&self) -> u32 {
        unsafe { GDALGetDataTypeSizeBits(self.gdal_type()) }.max(0) as u32
    }

    pub fn is_integer(&self) -> bool {
        (unsafe { GDALDataTypeIsInteger(self.gdal_type()) }) > 0
    }

    pub fn is_floating(&self) -> bool {
        (unsafe { GDALDataTypeIsFloating(self.gdal_type()) }) > 0
    }

    pub fn is_signed(&self) -> bool {
        (unsafe { GDALDataTypeIsSigned(self.gdal_type()) }) > 0
    }

    /// Data types available on every supported GDAL version.
    pub fn available_types() -> &'static [GdalTypeDescriptor] {
        use GDALDataType::*;
        &[
            GdalTypeDescriptor(GDT_Byte),
            GdalTypeDescriptor(GDT_UInt16),
            GdalTypeDescriptor(GDT_Int16),
            GdalTypeDescriptor(GDT_UInt32),
            GdalTypeDescriptor(GDT_Int32),
            GdalTypeDescriptor(GDT_Float32),
            GdalTypeDescriptor(GDT_Float64),
            GdalTypeDescriptor(GDT_CInt16),
            GdalTypeDescriptor(GDT_CInt32),
            GdalTypeDescriptor(GDT_CFloat32),
            GdalTypeDescriptor(GDT_CFloat64),
        ]
    }
}

impl Display for GdalTypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

impl TryFrom<GDALDataType::Type> for GdalTypeDescriptor {
    type Error = GdalError;

    fn try_from(value: GDALDataType::Type) -> std::result::Result<Self, Self::Error> {
        if value == GDALDataType::GDT_Unknown || value >= GDALDataType::GDT_TypeCount {
            return Err(GdalError::BadArgument(format!(
                "unknown GDALDataType {value}"
            )));
        }
        Ok(GdalTypeDescriptor(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        let d = GdalTypeDescriptor::from_name("Float32").unwrap();
        assert_eq!(d, f32::descriptor());
        assert_eq!(d.name(), "Float32");
        assert_eq!(d.bits(), 32);
        assert!(d.is_floating());
        assert!(!d.is_integer());
    }

    #[test]
    fn test_unknown_name_is_bad_argument() {
        let err = GdalTypeDescriptor::from_name("Float33").unwrap_err();
        assert!(matches!(err, GdalError::BadArgument(_)));
    }

    #[test]
    fn test_every_available_type_round_trips_by_name() {
        for d in GdalTypeDescriptor::available_types() {
            assert_eq!(&GdalTypeDescriptor::from_name(&d.name()).unwrap(), d);
        }
    }

    #[test]
    fn test_try_from_rejects_unknown() {
        assert!(GdalTypeDescriptor::try_from(GDALDataType::GDT_Unknown).is_err());
        assert!(GdalTypeDescriptor::try_from(GDALDataType::GDT_Int16).is_ok());
    }
}
