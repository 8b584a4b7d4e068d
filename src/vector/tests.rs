use std::sync::mpsc;
use std::sync::Mutex;

use futures::StreamExt;

use crate::cpl::CslStringList;
use crate::dataset::Dataset;
use crate::errors::GdalError;
use crate::job::{AsyncJob, Job};
use crate::spatial_ref::SpatialRef;
use crate::test_utils::{mem_vector, SuppressGDALErrorLog};
use crate::vector::{
    CircularString, CompoundCurve, Feature, FieldDefn, FieldValue, Geometry, Layer,
    LayerOptions, LineString, LinearRing, OGRFieldType, OGRwkbGeometryType, PointArg, Polygon,
};
use crate::wrapper::{Ownership, Wrapper};

fn towns(ds: &Dataset) -> Layer {
    let srs = SpatialRef::from_epsg(4326).unwrap();
    let layer = ds
        .layers()
        .create(LayerOptions {
            name: "towns",
            srs: Some(&srs),
            ty: OGRwkbGeometryType::wkbPoint,
            ..Default::default()
        })
        .unwrap();
    layer
        .create_field(&FieldDefn::new("name", OGRFieldType::OFTString).unwrap())
        .unwrap();
    layer
}

fn add_town(layer: &Layer, name: &str) -> i64 {
    let feature = Feature::new(layer).unwrap();
    feature
        .set_field("name", &FieldValue::StringValue(name.to_string()))
        .unwrap();
    layer.features().add(&feature).unwrap();
    feature.fid().unwrap().unwrap()
}

fn town_name(feature: &Feature) -> String {
    feature
        .field("name")
        .unwrap()
        .and_then(FieldValue::into_string)
        .unwrap()
}

#[test]
fn test_create_layer() {
    let ds = mem_vector();
    let layer = towns(&ds);
    assert_eq!(layer.name().unwrap(), "towns");
    assert_eq!(layer.geometry_type().unwrap(), OGRwkbGeometryType::wkbPoint);
    assert_eq!(
        layer.spatial_ref().unwrap().unwrap().auth_code().unwrap(),
        Some(4326)
    );
    assert_eq!(layer.field_index("name").unwrap(), 0);
    assert_eq!(ds.layers().count().unwrap(), 1);
}

#[test]
fn test_layer_identity() {
    let ds = mem_vector();
    let layer = towns(&ds);
    let by_index = ds.layers().get(0).unwrap();
    let by_name = ds.layers().get_by_name("towns").unwrap();
    assert!(by_index.ptr_eq(&layer));
    assert!(by_name.ptr_eq(&layer));
    assert_eq!(layer.native_object().ownership(), Ownership::Borrowed);
}

#[test]
fn test_layer_lookup_failures() {
    let ds = mem_vector();
    towns(&ds);
    assert!(matches!(
        ds.layers().get(1),
        Err(GdalError::IndexOutOfRange {
            kind: "layer",
            index: 1,
            first: 0,
            count: 1,
        })
    ));
    assert!(matches!(
        ds.layers().get_by_name("roads"),
        Err(GdalError::NotFound { kind: "layer", ref key }) if key == "roads"
    ));
}

#[test]
fn test_layer_create_rejects_bad_options() {
    let ds = mem_vector();
    let calls = ds.native_call_count();
    let result = ds.layers().create(LayerOptions {
        name: "towns",
        options: Some(&["GEOMETRY_NAME"]),
        ..Default::default()
    });
    assert!(result.is_err());
    assert_eq!(ds.native_call_count(), calls);
}

#[test]
fn test_remove_layer_destroys_wrappers() {
    let ds = mem_vector();
    let layer = towns(&ds);
    ds.layers().remove(0).unwrap();
    assert_eq!(ds.layers().count().unwrap(), 0);
    assert!(!layer.is_alive());
    assert!(matches!(layer.name(), Err(GdalError::Destroyed("layer"))));
    assert!(ds.is_alive());
}

#[test]
fn test_remove_missing_layer() {
    let ds = mem_vector();
    let _nolog = SuppressGDALErrorLog::new();
    let err = ds.layers().remove(3).unwrap_err();
    assert!(err.is_native());
}

#[test]
fn test_copy_layer() {
    let ds = mem_vector();
    let layer = towns(&ds);
    add_town(&layer, "Utrecht");
    add_town(&layer, "Gouda");

    let copy = ds
        .layers()
        .copy(&layer, "towns_copy", &CslStringList::new())
        .unwrap();
    assert!(!copy.ptr_eq(&layer));
    assert_eq!(copy.name().unwrap(), "towns_copy");
    assert_eq!(copy.features().count().unwrap(), 2);
    assert_eq!(copy.defn().unwrap().fields().names().unwrap(), ["name"]);
    assert_eq!(ds.layers().count().unwrap(), 2);
}

#[test]
fn test_features_add_get_set_remove() {
    let ds = mem_vector();
    let layer = towns(&ds);
    let features = layer.features();
    let fid = add_town(&layer, "Utrecht");
    assert_eq!(features.count().unwrap(), 1);

    let fetched = features.get(fid).unwrap();
    assert_eq!(fetched.fid().unwrap(), Some(fid));
    assert_eq!(town_name(&fetched), "Utrecht");
    assert_eq!(fetched.native_object().ownership(), Ownership::Owned);

    // the fetched feature is a copy until it is written back
    fetched
        .set_field("name", &FieldValue::StringValue("Amersfoort".to_string()))
        .unwrap();
    assert_eq!(town_name(&features.get(fid).unwrap()), "Utrecht");
    features.set(&fetched).unwrap();
    assert_eq!(town_name(&features.get(fid).unwrap()), "Amersfoort");

    features.remove(fid).unwrap();
    assert_eq!(features.count().unwrap(), 0);
    assert!(matches!(
        features.get(fid),
        Err(GdalError::NotFound { kind: "feature", .. })
    ));
}

#[test]
fn test_set_feature_with_id() {
    let ds = mem_vector();
    let layer = towns(&ds);
    let utrecht = add_town(&layer, "Utrecht");
    add_town(&layer, "Gouda");

    let replacement = Feature::new(&layer).unwrap();
    replacement
        .set_field("name", &FieldValue::StringValue("Delft".to_string()))
        .unwrap();
    layer.features().set_with_id(utrecht, &replacement).unwrap();
    assert_eq!(replacement.fid().unwrap(), Some(utrecht));
    assert_eq!(town_name(&layer.features().get(utrecht).unwrap()), "Delft");
    assert_eq!(layer.features().count().unwrap(), 2);
}

#[test]
fn test_feature_cursor() {
    let ds = mem_vector();
    let layer = towns(&ds);
    for name in ["Utrecht", "Gouda", "Delft"] {
        add_town(&layer, name);
    }

    let mut cursor = layer.features().cursor();
    let names: Vec<String> = cursor.by_ref().map(|f| town_name(&f.unwrap())).collect();
    assert_eq!(names, ["Utrecht", "Gouda", "Delft"]);
    assert_eq!(cursor.position(), 3);
    assert!(cursor.is_exhausted());
    assert!(cursor.next().is_none());

    cursor.reset();
    assert!(!cursor.is_exhausted());
    assert_eq!(cursor.count(), 3);
}

#[test]
fn test_first_and_next() {
    let ds = mem_vector();
    let layer = towns(&ds);
    let features = layer.features();
    assert!(features.first().unwrap().is_none());

    add_town(&layer, "Utrecht");
    add_town(&layer, "Gouda");
    assert_eq!(town_name(&features.first().unwrap().unwrap()), "Utrecht");
    assert_eq!(town_name(&features.next().unwrap().unwrap()), "Gouda");
    assert!(features.next().unwrap().is_none());
    assert_eq!(town_name(&features.first().unwrap().unwrap()), "Utrecht");
}

#[test]
fn test_count_with_force() {
    let ds = mem_vector();
    let layer = towns(&ds);
    add_town(&layer, "Utrecht");
    assert_eq!(layer.features().count_with_force(true).unwrap(), Some(1));
}

#[test]
fn test_closed_dataset() {
    let ds = mem_vector();
    let layer = towns(&ds);
    let features = layer.features();
    ds.close();
    let calls = ds.native_call_count();

    assert!(!layer.is_alive());
    assert!(matches!(ds.layers().count(), Err(GdalError::DestroyedDataset)));
    assert!(matches!(ds.layers().get(0), Err(GdalError::DestroyedDataset)));
    assert!(matches!(features.count(), Err(GdalError::DestroyedDataset)));
    assert!(matches!(features.get(0), Err(GdalError::DestroyedDataset)));
    assert!(matches!(layer.name(), Err(GdalError::DestroyedDataset)));
    assert!(matches!(
        features.count_async().wait(),
        Err(GdalError::DestroyedDataset)
    ));
    assert_eq!(ds.native_call_count(), calls);
}

#[test]
fn test_async_layers_and_features() {
    let ds = mem_vector();
    let layer = ds
        .layers()
        .create_async(LayerOptions {
            name: "towns",
            ty: OGRwkbGeometryType::wkbPoint,
            ..Default::default()
        })
        .wait()
        .unwrap();
    let by_name = ds.layers().get_by_name_async("towns").wait().unwrap();
    assert!(by_name.ptr_eq(&layer));
    assert_eq!(ds.layers().count_async().wait().unwrap(), 1);

    let features = layer.features();
    let feature = Feature::new(&layer).unwrap();
    features.add_async(&feature).wait().unwrap();
    let fid = feature.fid().unwrap().unwrap();
    assert_eq!(features.count_async().wait().unwrap(), 1);
    assert_eq!(features.get_async(fid).wait().unwrap().fid().unwrap(), Some(fid));
    assert!(features.first_async().wait().unwrap().is_some());
    assert!(features.next_async().wait().unwrap().is_none());

    features.remove_async(fid).wait().unwrap();
    assert_eq!(features.count_with_force_async(true).wait().unwrap(), Some(0));

    ds.layers().remove_async(0).wait().unwrap();
    assert!(!layer.is_alive());
}

#[test]
fn test_async_jobs_keep_feature_alive() {
    let ds = mem_vector();
    let layer = towns(&ds);
    let job = {
        let feature = Feature::new(&layer).unwrap();
        layer.features().add_async(&feature)
    };
    job.wait().unwrap();
    assert_eq!(layer.features().count().unwrap(), 1);
}

#[test]
fn test_points_add_all_reports_position() {
    let line = LineString::new().unwrap();
    let polygon = Geometry::from_wkt("POLYGON ((0 0,1 0,1 1,0 0))").unwrap();
    let result = line.points().add_all([
        PointArg::from((0.0, 0.0)),
        PointArg::from(&polygon),
        PointArg::from((2.0, 2.0)),
    ]);
    assert!(matches!(
        result,
        Err(GdalError::InvalidElement {
            kind: "point",
            position: 1,
            expected: "Point",
        })
    ));
    // points before the rejected one stay
    assert_eq!(line.points().count().unwrap(), 1);
}

#[test]
fn test_points_collection() {
    let line = LineString::new().unwrap();
    line.points()
        .add_all([(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)])
        .unwrap();
    assert_eq!(line.wkt().unwrap(), "LINESTRING (0 0,1 1,2 0)");

    let point = line.points().get(1).unwrap();
    assert_eq!((point.x().unwrap(), point.y().unwrap()), (1.0, 1.0));
    // fetched points are copies
    assert_eq!(point.native_object().ownership(), Ownership::Owned);
    drop(line);
    assert_eq!(point.x().unwrap(), 1.0);
}

#[test]
fn test_points_set_reverse_resize() {
    let line = LineString::new().unwrap();
    let points = line.points();
    points.add_all([(0.0, 0.0), (1.0, 1.0)]).unwrap();
    points.set(1, (5.0, 5.0)).unwrap();
    assert!(matches!(
        points.set(2, (0.0, 0.0)),
        Err(GdalError::IndexOutOfRange { index: 2, .. })
    ));
    points.reverse().unwrap();
    assert_eq!(
        points.coords().unwrap(),
        [geo_types::coord! { x: 5.0, y: 5.0 }, geo_types::coord! { x: 0.0, y: 0.0 }]
    );
    points.resize(1).unwrap();
    assert_eq!(points.count().unwrap(), 1);
}

#[test]
fn test_polygon_rings() {
    let polygon = Polygon::new().unwrap();
    let ring = LinearRing::new().unwrap();
    ring.points()
        .add_all([(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 0.0)])
        .unwrap();
    polygon.rings().add(&ring).unwrap();
    assert_eq!(polygon.rings().count().unwrap(), 1);

    let line = LineString::new().unwrap();
    assert!(matches!(
        polygon.rings().add(&*line),
        Err(GdalError::InvalidElement {
            kind: "ring",
            expected: "LinearRing",
            ..
        })
    ));

    let exterior = polygon.rings().get(0).unwrap();
    assert_eq!(exterior.native_object().ownership(), Ownership::Borrowed);
    assert!(exterior.ptr_eq(&polygon.rings().get(0).unwrap()));
    assert_eq!(exterior.points().count().unwrap(), 4);

    polygon.destroy();
    assert!(!exterior.is_alive());
    assert!(matches!(
        exterior.points().count(),
        Err(GdalError::Destroyed("geometry"))
    ));
}

#[test]
fn test_compound_curve() {
    let compound = CompoundCurve::new().unwrap();
    let line = LineString::new().unwrap();
    line.points().add_all([(0.0, 0.0), (1.0, 0.0)]).unwrap();
    let arc = CircularString::new().unwrap();
    arc.points()
        .add_all([(1.0, 0.0), (2.0, 1.0), (3.0, 0.0)])
        .unwrap();

    compound.curves().add_all([&*line, &*arc]).unwrap();
    assert_eq!(compound.curves().count().unwrap(), 2);
    let second = compound.curves().get(1).unwrap();
    assert_eq!(
        second.flat_geometry_type().unwrap(),
        OGRwkbGeometryType::wkbCircularString
    );

    let polygon = Polygon::new().unwrap();
    assert!(matches!(
        compound.curves().add_all([&*polygon]),
        Err(GdalError::InvalidElement {
            kind: "curve",
            position: 0,
            ..
        })
    ));
}

/// Occupies the dataset's job queue until the returned sender is used or dropped.
fn block_queue(ds: &Dataset) -> (mpsc::Sender<()>, Job<()>) {
    let (release, gate) = mpsc::channel::<()>();
    let gate = Mutex::new(gate);
    let blocked = AsyncJob::new(
        ds,
        move || {
            let _ = gate.lock().unwrap().recv();
            Ok(())
        },
        Ok,
    )
    .spawn();
    (release, blocked)
}

#[test]
fn test_destroy_feature_while_add_is_queued() {
    let ds = mem_vector();
    let layer = towns(&ds);
    let feature = Feature::new(&layer).unwrap();
    feature
        .set_field("name", &FieldValue::StringValue("Delft".to_string()))
        .unwrap();

    let (release, blocked) = block_queue(&ds);
    let job = layer.features().add_async(&feature);
    feature.destroy();
    assert!(!feature.is_alive());
    assert!(matches!(feature.fid(), Err(GdalError::Destroyed("feature"))));

    release.send(()).unwrap();
    blocked.wait().unwrap();
    job.wait().unwrap();
    assert_eq!(layer.features().count().unwrap(), 1);
    let stored = layer.features().first().unwrap().unwrap();
    assert_eq!(town_name(&stored), "Delft");
}

#[test]
fn test_destroy_srs_while_create_layer_is_queued() {
    let ds = mem_vector();
    let srs = SpatialRef::from_epsg(28992).unwrap();
    let (release, blocked) = block_queue(&ds);
    let job = ds.layers().create_async(LayerOptions {
        name: "parcels",
        srs: Some(&srs),
        ty: OGRwkbGeometryType::wkbPolygon,
        ..Default::default()
    });
    srs.destroy();
    assert!(!srs.is_alive());

    release.send(()).unwrap();
    blocked.wait().unwrap();
    let layer = job.wait().unwrap();
    assert_eq!(
        layer.spatial_ref().unwrap().unwrap().auth_code().unwrap(),
        Some(28992)
    );
}

#[test]
fn test_destroyed_argument_rejects_job() {
    let ds = mem_vector();
    let layer = towns(&ds);
    let feature = Feature::new(&layer).unwrap();
    feature.destroy();
    let calls = ds.native_call_count();
    assert!(matches!(
        layer.features().add_async(&feature).wait(),
        Err(GdalError::Destroyed("feature"))
    ));
    assert_eq!(ds.native_call_count(), calls);
    assert_eq!(layer.features().count().unwrap(), 0);
}

#[test]
fn test_refetch_layer_after_destroy() {
    let ds = mem_vector();
    let layer = towns(&ds);
    layer.destroy();
    assert!(!layer.is_alive());

    let again = ds.layers().get(0).unwrap();
    assert!(again.is_alive());
    assert!(!again.ptr_eq(&layer));
    assert_eq!(again.name().unwrap(), "towns");
    assert!(ds.layers().get_by_name("towns").unwrap().ptr_eq(&again));
    assert!(matches!(layer.name(), Err(GdalError::Destroyed("layer"))));
}

#[test]
fn test_points_reverse_then_get() {
    let line = LineString::new().unwrap();
    let points = line.points();
    points.add((0.0, 0.0)).unwrap();
    points.add((1.0, 1.0)).unwrap();
    points.reverse().unwrap();
    let first = points.get(0).unwrap();
    assert_eq!(first.coord().unwrap(), geo_types::coord! { x: 1.0, y: 1.0 });
    let last = points.get(1).unwrap();
    assert_eq!(last.coord().unwrap(), geo_types::coord! { x: 0.0, y: 0.0 });
}

#[test]
fn test_count_is_repeatable() {
    let ds = mem_vector();
    let layer = towns(&ds);
    add_town(&layer, "Utrecht");
    add_town(&layer, "Gouda");

    let layers = ds.layers();
    assert_eq!(layers.count().unwrap(), 1);
    assert_eq!(layers.count().unwrap(), 1);

    let features = layer.features();
    assert_eq!(features.count().unwrap(), 2);
    assert_eq!(features.count().unwrap(), 2);
    assert_eq!(features.count_async().wait().unwrap(), 2);

    let fields = layer.defn().unwrap().fields();
    assert_eq!(fields.count().unwrap(), 1);
    assert_eq!(fields.count().unwrap(), 1);

    let line = LineString::new().unwrap();
    line.points().add_all([(0.0, 0.0), (1.0, 1.0)]).unwrap();
    assert_eq!(line.points().count().unwrap(), 2);
    assert_eq!(line.points().count().unwrap(), 2);
}

#[test]
fn test_closed_dataset_checked_before_arguments() {
    let ds = mem_vector();
    let layer = towns(&ds);
    ds.close();
    let calls = ds.native_call_count();

    assert!(matches!(
        ds.layers().create(LayerOptions {
            name: "bad",
            options: Some(&["GEOMETRY_NAME"]),
            ..Default::default()
        }),
        Err(GdalError::DestroyedDataset)
    ));
    assert!(matches!(
        ds.layers().copy(&layer, "copy", &CslStringList::new()),
        Err(GdalError::DestroyedDataset)
    ));
    assert!(matches!(
        ds.layers().get_by_name("towns"),
        Err(GdalError::DestroyedDataset)
    ));
    assert_eq!(ds.native_call_count(), calls);
}

#[test]
fn test_layer_defn_keeps_geometry_field_srs() {
    let ds = mem_vector();
    let layer = towns(&ds);
    let defn = layer.defn().unwrap();
    assert_eq!(defn.geometry_field_count().unwrap(), 1);
    assert_eq!(
        defn.geometry_field_spatial_ref(0).unwrap().unwrap().auth_code().unwrap(),
        Some(4326)
    );
}

#[test]
fn test_stream_layers_and_features() {
    let ds = mem_vector();
    let layer = towns(&ds);
    add_town(&layer, "Utrecht");
    add_town(&layer, "Gouda");

    let names: Vec<String> = futures::executor::block_on(
        ds.layers()
            .stream()
            .map(|layer| layer.unwrap().name().unwrap())
            .collect(),
    );
    assert_eq!(names, ["towns"]);

    let towns: Vec<String> = futures::executor::block_on(
        layer
            .features()
            .stream()
            .map(|feature| town_name(&feature.unwrap()))
            .collect(),
    );
    assert_eq!(towns, ["Utrecht", "Gouda"]);
}

#[test]
fn test_stream_of_closed_dataset_yields_one_error() {
    let ds = mem_vector();
    towns(&ds);
    let layers = ds.layers();
    ds.close();
    let results: Vec<_> = futures::executor::block_on(layers.stream().collect());
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(GdalError::DestroyedDataset)));
}
