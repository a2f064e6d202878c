use assert_fs::prelude::*;
use predicates::prelude::*;
use topo_cad::{GeoError, MeshKind, OriginMode, Pipeline, PipelineConfig, SlopeUnit};

#[test]
fn save_and_load_round_trip() {
    let config = PipelineConfig {
        target_crs: Some("EPSG:32615".into()),
        cell_size: Some(2.5),
        contour_interval: 0.5,
        contour_labels: true,
        mesh_mode: MeshKind::Concave,
        alpha: 0.05,
        slope_unit: SlopeUnit::Percent,
        origin_mode: OriginMode::FirstPoint,
        ..Default::default()
    };
    let dir = assert_fs::TempDir::new().unwrap();
    let file = dir.child("topo.json");
    config.save(file.path()).unwrap();
    file.assert(predicate::path::exists());
    file.assert(predicate::str::contains("\"mesh_mode\": \"concave\""));

    let loaded = PipelineConfig::load(file.path()).unwrap();
    assert_eq!(loaded, config);
    Pipeline::new(loaded).unwrap();
    dir.close().unwrap();
}

#[test]
fn invalid_file_is_rejected_on_load() {
    let dir = assert_fs::TempDir::new().unwrap();
    let file = dir.child("bad.json");
    file.write_str(r#"{ "contour_interval": -5 }"#).unwrap();
    assert!(matches!(
        PipelineConfig::load(file.path()),
        Err(GeoError::Configuration(_))
    ));
    dir.close().unwrap();
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = assert_fs::TempDir::new().unwrap();
    assert!(matches!(
        PipelineConfig::load(dir.path().join("absent.json")),
        Err(GeoError::Io(_))
    ));
    dir.close().unwrap();
}
