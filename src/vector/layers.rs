use std::ffi::{CStr, CString};
use std::ptr;

use libc::c_int;

use crate::collection::{ChildAccess, DatasetCollection, IndexedAccess};
use crate::cpl::CslStringList;
use crate::dataset::Dataset;
use crate::errors::*;
use crate::job::{AsyncJob, Job};
use crate::store::{self, StoreKey};
use crate::utils::{_last_null_pointer_err, _ogr_result};
use crate::vector::layer::Layer;
use crate::vector::options::LayerOptions;
use crate::wrapper::{NativePtr, Wrapper};

/// Layers of a dataset, addressable by position and by name.
pub struct LayerAccess;

impl ChildAccess for LayerAccess {
    type Parent = Dataset;
    type Element = Layer;
    type Native = NativePtr;

    const KIND: &'static str = "layer";

    unsafe fn count(c_dataset: NativePtr) -> Result<usize> {
        Ok(gdal_sys::GDALDatasetGetLayerCount(c_dataset.as_ptr()).max(0) as usize)
    }

    fn wrap(dataset: &Dataset, c_layer: NativePtr) -> Result<Layer> {
        Ok(Layer::from_store(dataset, c_layer))
    }
}

impl IndexedAccess for LayerAccess {
    const BY_NAME: bool = true;

    unsafe fn fetch(c_dataset: NativePtr, index: usize) -> Result<NativePtr> {
        let c_layer = gdal_sys::GDALDatasetGetLayer(c_dataset.as_ptr(), index as c_int);
        if c_layer.is_null() {
            return Err(_last_null_pointer_err("GDALDatasetGetLayer"));
        }
        Ok(NativePtr::new(c_layer))
    }

    unsafe fn fetch_by_name(c_dataset: NativePtr, name: &CStr) -> Result<Option<NativePtr>> {
        let c_layer = gdal_sys::GDALDatasetGetLayerByName(c_dataset.as_ptr(), name.as_ptr());
        Ok((!c_layer.is_null()).then(|| NativePtr::new(c_layer)))
    }
}

pub type DatasetLayers = DatasetCollection<LayerAccess>;

impl DatasetCollection<LayerAccess> {
    fn create_job(&self, options: LayerOptions<'_>) -> Result<AsyncJob<NativePtr, Layer>> {
        self.dataset().check_open()?;
        let c_name = CString::new(options.name)?;
        let c_options = options.creation_options()?;
        let ty = options.ty;
        let srs = options.srs.map(|srs| srs.native_object().clone());
        let mut job = self.job(
            move |c_dataset| {
                let c_srs = match &srs {
                    Some(srs) => srs.pinned_handle()?.as_ptr(),
                    None => ptr::null_mut(),
                };
                let c_layer = unsafe {
                    gdal_sys::GDALDatasetCreateLayer(
                        c_dataset.as_ptr(),
                        c_name.as_ptr(),
                        c_srs,
                        ty,
                        c_options.as_ptr(),
                    )
                };
                if c_layer.is_null() {
                    return Err(_last_null_pointer_err("GDALDatasetCreateLayer"));
                }
                Ok(NativePtr::new(c_layer))
            },
            LayerAccess::wrap,
        );
        if let Some(srs) = options.srs {
            job = job.pin(srs);
        }
        Ok(job)
    }

    /// Creates a new layer.
    ///
    /// The spatial reference, if any, is copied by GDAL. Creation options are validated
    /// before anything reaches GDAL; unknown keys are left for the driver to judge.
    pub fn create(&self, options: LayerOptions<'_>) -> Result<Layer> {
        self.create_job(options)?.run()
    }

    pub fn create_async(&self, options: LayerOptions<'_>) -> Job<Layer> {
        match self.create_job(options) {
            Ok(job) => job.spawn(),
            Err(e) => Job::ready(Err(e)),
        }
    }

    fn copy_job(
        &self,
        source: &Layer,
        new_name: &str,
        options: &CslStringList,
    ) -> Result<AsyncJob<NativePtr, Layer>> {
        self.dataset().check_open()?;
        let c_name = CString::new(new_name)?;
        let c_options = options.clone();
        let source_object = source.native_object().clone();
        let job = self
            .job(
                move |c_dataset| {
                    let c_source = source_object.pinned_handle()?;
                    let c_layer = unsafe {
                        gdal_sys::GDALDatasetCopyLayer(
                            c_dataset.as_ptr(),
                            c_source.as_ptr(),
                            c_name.as_ptr(),
                            c_options.as_ptr(),
                        )
                    };
                    if c_layer.is_null() {
                        return Err(_last_null_pointer_err("GDALDatasetCopyLayer"));
                    }
                    Ok(NativePtr::new(c_layer))
                },
                LayerAccess::wrap,
            )
            .pin(source);
        Ok(job)
    }

    /// Copies `source`, schema and features, into a new layer of this dataset.
    ///
    /// `source` may belong to another dataset; it must not be used concurrently
    /// while the copy runs.
    pub fn copy(&self, source: &Layer, new_name: &str, options: &CslStringList) -> Result<Layer> {
        self.copy_job(source, new_name, options)?.run()
    }

    pub fn copy_async(&self, source: &Layer, new_name: &str, options: &CslStringList) -> Job<Layer> {
        match self.copy_job(source, new_name, options) {
            Ok(job) => job.spawn(),
            Err(e) => Job::ready(Err(e)),
        }
    }

    fn remove_job(&self, index: usize) -> AsyncJob<(), ()> {
        let dataset_object = self.dataset().native_object().clone();
        self.job(
            move |c_dataset| {
                let c_layer =
                    unsafe { gdal_sys::GDALDatasetGetLayer(c_dataset.as_ptr(), index as c_int) };
                let rv = unsafe { gdal_sys::GDALDatasetDeleteLayer(c_dataset.as_ptr(), index as c_int) };
                _ogr_result(rv, "GDALDatasetDeleteLayer")?;
                if !c_layer.is_null() {
                    store::evict(StoreKey::new(&dataset_object, NativePtr::new(c_layer)));
                }
                Ok(())
            },
            |_, ()| Ok(()),
        )
    }

    /// Deletes the layer at `index`. Its wrappers become destroyed.
    ///
    /// The index is checked by GDAL, not up front: an invalid index surfaces as
    /// GDAL's own error.
    pub fn remove(&self, index: usize) -> Result<()> {
        self.remove_job(index).run()
    }

    pub fn remove_async(&self, index: usize) -> Job<()> {
        self.remove_job(index).spawn()
    }
}
