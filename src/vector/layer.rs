use std::ffi::CString;
use std::sync::Arc;

use gdal_sys::{self, OGRLayerH, OGRwkbGeometryType};

use crate::dataset::{Dataset, DatasetBound};
use crate::errors::*;
use crate::spatial_ref::SpatialRef;
use crate::store::{self, StoreKey};
use crate::utils::{_ogr_result, _string};
use crate::vector::defn::{FeatureDefn, FieldDefn};
use crate::vector::features::LayerFeatures;
use crate::wrapper::{NativeObject, NativePtr, Wrapper};

/// Layer in a vector dataset
///
/// Layers are owned by their dataset. Fetching the same layer twice, by index or by
/// name, returns handles to the same wrapper.
#[derive(Clone, Debug)]
pub struct Layer {
    object: Arc<NativeObject>,
    dataset: Dataset,
}

impl Layer {
    pub(crate) fn from_store(dataset: &Dataset, c_layer: NativePtr) -> Layer {
        let parent = dataset.native_object();
        let object = store::get_or_register(StoreKey::new(parent, c_layer), || {
            NativeObject::borrowed("layer", c_layer, parent)
        });
        Layer {
            object,
            dataset: dataset.clone(),
        }
    }

    /// Runs `f` with the layer handle, under the dataset's native lock.
    pub(crate) fn with_native<T>(&self, f: impl FnOnce(OGRLayerH) -> Result<T>) -> Result<T> {
        let object = &self.object;
        self.dataset.with_native(|_| f(object.handle()?.as_ptr()))
    }

    pub fn name(&self) -> Result<String> {
        self.with_native(|c_layer| Ok(_string(unsafe { gdal_sys::OGR_L_GetName(c_layer) })))
    }

    pub fn geometry_type(&self) -> Result<OGRwkbGeometryType::Type> {
        self.with_native(|c_layer| Ok(unsafe { gdal_sys::OGR_L_GetGeomType(c_layer) }))
    }

    /// A copy of the layer's feature definition.
    pub fn defn(&self) -> Result<FeatureDefn> {
        self.with_native(|c_layer| unsafe {
            FeatureDefn::copy_of(gdal_sys::OGR_L_GetLayerDefn(c_layer))
        })
    }

    /// A copy of the layer's spatial reference, if it has one.
    pub fn spatial_ref(&self) -> Result<Option<SpatialRef>> {
        self.with_native(|c_layer| {
            let c_srs = unsafe { gdal_sys::OGR_L_GetSpatialRef(c_layer) };
            if c_srs.is_null() {
                return Ok(None);
            }
            unsafe { SpatialRef::from_borrowed_clone(c_srs) }.map(Some)
        })
    }

    /// Adds a field to the layer's schema.
    pub fn create_field(&self, field_defn: &FieldDefn) -> Result<()> {
        let c_field_defn = field_defn.c_field_defn()?;
        self.with_native(|c_layer| {
            let rv = unsafe { gdal_sys::OGR_L_CreateField(c_layer, c_field_defn, 1) };
            _ogr_result(rv, "OGR_L_CreateField")
        })
    }

    /// Index of the field called `name` in the layer's schema.
    pub fn field_index(&self, name: &str) -> Result<usize> {
        let c_name = CString::new(name)?;
        self.with_native(|c_layer| {
            let c_defn = unsafe { gdal_sys::OGR_L_GetLayerDefn(c_layer) };
            let index = unsafe { gdal_sys::OGR_FD_GetFieldIndex(c_defn, c_name.as_ptr()) };
            if index < 0 {
                return Err(GdalError::NotFound {
                    kind: "field",
                    key: name.to_string(),
                });
            }
            Ok(index as usize)
        })
    }

    /// The features of this layer, addressed by feature id.
    pub fn features(&self) -> LayerFeatures {
        LayerFeatures::new(self.clone())
    }
}

impl Wrapper for Layer {
    fn native_object(&self) -> &Arc<NativeObject> {
        &self.object
    }
}

impl DatasetBound for Layer {
    fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}
