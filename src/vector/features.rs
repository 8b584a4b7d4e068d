use futures::stream::{self, LocalBoxStream, StreamExt};
use gdal_sys::OGRLayerH;

use crate::collection::{ChildAccess, DatasetCollection};
use crate::errors::*;
use crate::job::{AsyncJob, Job};
use crate::utils::_ogr_result;
use crate::vector::feature::{Feature, OwnedFeaturePtr};
use crate::vector::layer::Layer;
use crate::wrapper::{NativePtr, Wrapper};

/// Features of a layer, addressed by feature id rather than by position.
///
/// Features come out as owned copies. `first`, `next` and [`FeatureCursor`] share the
/// layer's single native read cursor, so only one reader per layer gives coherent
/// results.
pub struct FeatureAccess;

impl ChildAccess for FeatureAccess {
    type Parent = Layer;
    type Element = Feature;
    type Native = OwnedFeaturePtr;

    const KIND: &'static str = "feature";

    unsafe fn count(c_layer: NativePtr) -> Result<usize> {
        Ok(gdal_sys::OGR_L_GetFeatureCount(c_layer.as_ptr(), 1).max(0) as usize)
    }

    fn wrap(_layer: &Layer, c_feature: OwnedFeaturePtr) -> Result<Feature> {
        Ok(Feature::from_owned(c_feature))
    }
}

pub type LayerFeatures = DatasetCollection<FeatureAccess>;

unsafe fn next_feature(c_layer: OGRLayerH) -> Option<OwnedFeaturePtr> {
    let c_feature = gdal_sys::OGR_L_GetNextFeature(c_layer);
    (!c_feature.is_null()).then(|| OwnedFeaturePtr::new(c_feature))
}

fn optional(_layer: &Layer, c_feature: Option<OwnedFeaturePtr>) -> Result<Option<Feature>> {
    Ok(c_feature.map(Feature::from_owned))
}

impl DatasetCollection<FeatureAccess> {
    fn get_job(&self, fid: i64) -> AsyncJob<OwnedFeaturePtr, Feature> {
        self.job(
            move |c_layer| {
                let c_feature = unsafe { gdal_sys::OGR_L_GetFeature(c_layer.as_ptr(), fid) };
                if c_feature.is_null() {
                    return Err(GdalError::NotFound {
                        kind: FeatureAccess::KIND,
                        key: fid.to_string(),
                    });
                }
                Ok(unsafe { OwnedFeaturePtr::new(c_feature) })
            },
            FeatureAccess::wrap,
        )
    }

    /// Returns the feature with id `fid`.
    pub fn get(&self, fid: i64) -> Result<Feature> {
        self.get_job(fid).run()
    }

    pub fn get_async(&self, fid: i64) -> Job<Feature> {
        self.get_job(fid).spawn()
    }

    fn first_job(&self) -> AsyncJob<Option<OwnedFeaturePtr>, Option<Feature>> {
        self.job(
            |c_layer| unsafe {
                gdal_sys::OGR_L_ResetReading(c_layer.as_ptr());
                Ok(next_feature(c_layer.as_ptr()))
            },
            optional,
        )
    }

    /// Rewinds the layer's read cursor and returns the first feature.
    pub fn first(&self) -> Result<Option<Feature>> {
        self.first_job().run()
    }

    pub fn first_async(&self) -> Job<Option<Feature>> {
        self.first_job().spawn()
    }

    fn next_job(&self) -> AsyncJob<Option<OwnedFeaturePtr>, Option<Feature>> {
        self.job(
            |c_layer| Ok(unsafe { next_feature(c_layer.as_ptr()) }),
            optional,
        )
    }

    /// Advances the layer's read cursor. `None` once every feature has been read.
    pub fn next(&self) -> Result<Option<Feature>> {
        self.next_job().run()
    }

    pub fn next_async(&self) -> Job<Option<Feature>> {
        self.next_job().spawn()
    }

    /// The feature handle is resolved on the worker; the feature stays pinned until
    /// the job ends.
    fn write_job(&self, feature: &Feature, fid: Option<i64>, create: bool) -> AsyncJob<(), ()> {
        let feature_object = feature.native_object().clone();
        self.job(
            move |c_layer| {
                let c_feature = feature_object.pinned_handle()?.as_ptr();
                if let Some(fid) = fid {
                    let rv = unsafe { gdal_sys::OGR_F_SetFID(c_feature, fid) };
                    _ogr_result(rv, "OGR_F_SetFID")?;
                }
                if create {
                    let rv = unsafe { gdal_sys::OGR_L_CreateFeature(c_layer.as_ptr(), c_feature) };
                    _ogr_result(rv, "OGR_L_CreateFeature")
                } else {
                    let rv = unsafe { gdal_sys::OGR_L_SetFeature(c_layer.as_ptr(), c_feature) };
                    _ogr_result(rv, "OGR_L_SetFeature")
                }
            },
            |_, ()| Ok(()),
        )
        .pin(feature)
    }

    /// Writes `feature` as a new feature of the layer. GDAL assigns its id.
    pub fn add(&self, feature: &Feature) -> Result<()> {
        self.write_job(feature, None, true).run()
    }

    pub fn add_async(&self, feature: &Feature) -> Job<()> {
        self.write_job(feature, None, true).spawn()
    }

    /// Rewrites the stored feature whose id is the id of `feature`.
    pub fn set(&self, feature: &Feature) -> Result<()> {
        self.write_job(feature, None, false).run()
    }

    pub fn set_async(&self, feature: &Feature) -> Job<()> {
        self.write_job(feature, None, false).spawn()
    }

    /// Gives `feature` the id `fid`, then rewrites the stored feature with that id.
    pub fn set_with_id(&self, fid: i64, feature: &Feature) -> Result<()> {
        self.write_job(feature, Some(fid), false).run()
    }

    pub fn set_with_id_async(&self, fid: i64, feature: &Feature) -> Job<()> {
        self.write_job(feature, Some(fid), false).spawn()
    }

    fn remove_job(&self, fid: i64) -> AsyncJob<(), ()> {
        self.job(
            move |c_layer| {
                let rv = unsafe { gdal_sys::OGR_L_DeleteFeature(c_layer.as_ptr(), fid) };
                _ogr_result(rv, "OGR_L_DeleteFeature")
            },
            |_, ()| Ok(()),
        )
    }

    /// Deletes the feature with id `fid`.
    pub fn remove(&self, fid: i64) -> Result<()> {
        self.remove_job(fid).run()
    }

    pub fn remove_async(&self, fid: i64) -> Job<()> {
        self.remove_job(fid).spawn()
    }

    fn count_with_force_job(&self, force: bool) -> AsyncJob<i64, Option<usize>> {
        self.job(
            move |c_layer| {
                Ok(unsafe { gdal_sys::OGR_L_GetFeatureCount(c_layer.as_ptr(), force as i32) })
            },
            |_, count| Ok(usize::try_from(count).ok()),
        )
    }

    /// Number of features. Without `force`, `None` when the driver cannot tell cheaply.
    pub fn count_with_force(&self, force: bool) -> Result<Option<usize>> {
        self.count_with_force_job(force).run()
    }

    pub fn count_with_force_async(&self, force: bool) -> Job<Option<usize>> {
        self.count_with_force_job(force).spawn()
    }

    /// An iterator over the features, starting from the first one.
    pub fn cursor(&self) -> FeatureCursor {
        FeatureCursor {
            features: LayerFeatures::new(self.parent().clone()),
            state: CursorState::Fresh,
            position: 0,
        }
    }

    pub fn iter(&self) -> FeatureCursor {
        self.cursor()
    }

    /// Asynchronous counterpart of [`LayerFeatures::cursor`]: each step is a
    /// `first_async`/`next_async` job. Ends after the last feature or the first error.
    pub fn stream(&self) -> LocalBoxStream<'static, Result<Feature>> {
        let features = LayerFeatures::new(self.parent().clone());
        stream::unfold(
            (features, CursorState::Fresh),
            |(features, state)| async move {
                let step = match state {
                    CursorState::Exhausted => return None,
                    CursorState::Fresh => features.first_async().await,
                    CursorState::Reading => features.next_async().await,
                };
                match step {
                    Ok(Some(feature)) => Some((Ok(feature), (features, CursorState::Reading))),
                    Ok(None) => None,
                    Err(e) => Some((Err(e), (features, CursorState::Exhausted))),
                }
            },
        )
        .boxed_local()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CursorState {
    Fresh,
    Reading,
    Exhausted,
}

/// Iterator over the features of a layer, yielding one `Result` per feature.
///
/// The cursor rewinds the layer on its first step, and stops after the first error.
pub struct FeatureCursor {
    features: LayerFeatures,
    state: CursorState,
    position: usize,
}

impl FeatureCursor {
    /// Number of features yielded so far.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == CursorState::Exhausted
    }

    /// Restarts from the first feature on the next step.
    pub fn reset(&mut self) {
        self.state = CursorState::Fresh;
        self.position = 0;
    }
}

impl Iterator for FeatureCursor {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        let step = match self.state {
            CursorState::Exhausted => return None,
            CursorState::Fresh => self.features.first(),
            CursorState::Reading => self.features.next(),
        };
        match step {
            Ok(Some(feature)) => {
                self.state = CursorState::Reading;
                self.position += 1;
                Some(Ok(feature))
            }
            Ok(None) => {
                self.state = CursorState::Exhausted;
                None
            }
            Err(e) => {
                self.state = CursorState::Exhausted;
                Some(Err(e))
            }
        }
    }
}
