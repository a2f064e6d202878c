use topo_cad::{
    geometry::{point_in_polygon, Point},
    Crs, ElevationUnit, Fallback, GeoError, InterpolationMethod, MeshKind, NoProgress,
    OriginMode, Pipeline, PipelineConfig, PointSet, RawPoint,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn planar_config() -> PipelineConfig {
    PipelineConfig {
        source_crs: "EPSG:32614".into(),
        translate_to_origin: false,
        ..Default::default()
    }
}

fn triangle() -> Vec<RawPoint> {
    vec![
        RawPoint::new(0.0, 0.0, Some(100.0)),
        RawPoint::new(100.0, 0.0, Some(110.0)),
        RawPoint::new(0.0, 100.0, Some(120.0)),
    ]
}

#[test]
fn scenario_a_triangle_has_full_hull_and_contours() {
    init();
    let config = PipelineConfig {
        grid_resolution: Some(50),
        contour_interval: 5.0,
        ..planar_config()
    };
    let pipeline = Pipeline::new(config).unwrap();
    let points = pipeline.prepare(triangle()).unwrap();

    let grid = pipeline.elevation_grid(&points, &mut NoProgress).unwrap().value;
    assert_eq!((grid.rows, grid.cols), (50, 50));
    assert_eq!(grid.method, InterpolationMethod::Linear);
    let hull = [
        Point::new(0.0, 0.0),
        Point::new(100.0, 0.0),
        Point::new(0.0, 100.0),
    ];
    let mut inside = 0;
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let c = grid.cell_center(row, col);
            if point_in_polygon(c, &hull) && c.x + c.y < 100.0 - 1e-6 {
                inside += 1;
                let z = grid.get(row, col).expect("cell inside hull has data");
                assert!((z - (100.0 + 0.1 * c.x + 0.2 * c.y)).abs() < 1e-9);
            }
        }
    }
    assert!(inside > 1000);

    let contours = pipeline.contours(&points, &mut NoProgress).unwrap().value;
    assert_eq!(contours.levels, vec![100.0, 105.0, 110.0, 115.0, 120.0]);
    for c in &contours.contours {
        assert!(contours.levels.contains(&c.level));
        assert!(c.vertices.len() >= 2);
    }
    for level in [100.0, 105.0, 110.0, 115.0, 120.0] {
        assert!(contours.at_level(level).count() >= 1, "no contour at {level}");
    }
    // The extreme levels touch the surface only at the source vertices.
    let lowest = contours.at_level(100.0).next().unwrap();
    assert_eq!(lowest.vertices[0], Point::new(0.0, 0.0));
    let highest = contours.at_level(120.0).next().unwrap();
    assert_eq!(highest.vertices[0], Point::new(0.0, 100.0));
    let levels: Vec<f64> = contours.contours.iter().map(|c| c.level).collect();
    assert!(levels.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn scenario_b_single_point() {
    init();
    let config = PipelineConfig {
        cell_size: Some(1.0),
        padding: 5.0,
        ..planar_config()
    };
    let pipeline = Pipeline::new(config).unwrap();
    let points = pipeline
        .prepare(vec![RawPoint::new(10.0, 20.0, Some(42.0))])
        .unwrap();

    assert!(matches!(
        pipeline.mesh(&points, &mut NoProgress),
        Err(GeoError::InsufficientData { .. })
    ));

    let grid = pipeline.elevation_grid(&points, &mut NoProgress).unwrap().value;
    assert_eq!((grid.rows, grid.cols), (10, 10));
    assert_eq!(grid.method, InterpolationMethod::NearestNeighbor);
    assert!(grid.values().iter().all(|v| *v == Some(42.0)));
    assert!(matches!(
        grid.diagnostics.fallbacks.as_slice(),
        [Fallback::NearestNeighbor { .. }]
    ));
}

#[test]
fn scenario_c_non_numeric_coordinate_is_dropped() {
    init();
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let raw = vec![
        RawPoint::from_fields("-97.7431", "30.2672", Some("150.0")),
        RawPoint::from_fields("-97.7420", "30.2680", Some("152.5")),
        RawPoint::from_fields("not-a-number", "30.2690", Some("151.0")),
        RawPoint::from_fields("-97.7410", "30.2665", Some("149.0")),
    ];
    let points = pipeline.prepare(raw).unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(points.crs().epsg(), Some(32614));
    assert_eq!(points.diagnostics().rejected_points(), 1);
    assert_eq!(points.diagnostics().rejected[0].index, 2);

    let grid = pipeline.elevation_grid(&points, &mut NoProgress).unwrap();
    assert_eq!(grid.value.diagnostics.rejected_points(), 1);
    assert!(grid.value.valid_count() > 0);
    let mesh = pipeline.mesh(&points, &mut NoProgress).unwrap();
    assert_eq!(mesh.value.faces.len(), 1);
}

#[test]
fn scenario_d_empty_input_fails_everywhere() {
    init();
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    assert!(matches!(pipeline.prepare(Vec::new()), Err(GeoError::EmptyInput)));
    assert!(matches!(
        pipeline.prepare_batch(Vec::new()),
        Err(GeoError::EmptyInput)
    ));

    let empty =
        PointSet::from_raw(Vec::new(), Crs::from_epsg(32614), ElevationUnit::Meters).unwrap();
    assert!(matches!(
        pipeline.elevation_grid(&empty, &mut NoProgress),
        Err(GeoError::EmptyInput)
    ));
    assert!(matches!(
        pipeline.contours(&empty, &mut NoProgress),
        Err(GeoError::EmptyInput)
    ));
    assert!(matches!(
        pipeline.mesh(&empty, &mut NoProgress),
        Err(GeoError::EmptyInput)
    ));
    assert!(matches!(
        pipeline.slope(&empty, &mut NoProgress),
        Err(GeoError::EmptyInput)
    ));
    assert!(matches!(pipeline.localize(&empty), Err(GeoError::EmptyInput)));
}

#[test]
fn scenario_e_zero_alpha_matches_delaunay() {
    init();
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed % 10_000) as f64 / 10.0
    };
    let raw: Vec<RawPoint> = (0..60)
        .map(|_| {
            let (x, y) = (next(), next());
            RawPoint::new(x, y, Some(0.05 * x + 0.02 * y))
        })
        .collect();

    let delaunay = Pipeline::new(planar_config()).unwrap();
    let concave = Pipeline::new(PipelineConfig {
        mesh_mode: MeshKind::Concave,
        alpha: 0.0,
        ..planar_config()
    })
    .unwrap();
    let points = delaunay.prepare(raw).unwrap();
    let a = delaunay.mesh(&points, &mut NoProgress).unwrap().value;
    let b = concave.mesh(&points, &mut NoProgress).unwrap().value;
    assert!(!a.faces.is_empty());
    assert_eq!(a, b);
}

#[test]
fn products_share_the_point_offset() {
    init();
    let config = PipelineConfig {
        source_crs: "EPSG:32614".into(),
        origin_mode: OriginMode::MinCorner,
        grid_resolution: Some(10),
        ..Default::default()
    };
    let pipeline = Pipeline::new(config).unwrap();
    let raw = vec![
        RawPoint::new(500_000.0, 3_000_000.0, Some(10.0)),
        RawPoint::new(500_100.0, 3_000_000.0, Some(12.0)),
        RawPoint::new(500_000.0, 3_000_100.0, Some(14.0)),
        RawPoint::new(500_100.0, 3_000_100.0, Some(16.0)),
    ];
    let points = pipeline.prepare(raw).unwrap();
    let local = pipeline.localize(&points).unwrap();
    let grid = pipeline.elevation_grid(&points, &mut NoProgress).unwrap();
    let mesh = pipeline.mesh(&points, &mut NoProgress).unwrap();
    let slope = pipeline.slope(&points, &mut NoProgress).unwrap();
    let expected = Point::new(500_000.0, 3_000_000.0);
    assert_eq!(local.offset, expected);
    assert_eq!(grid.offset, expected);
    assert_eq!(mesh.offset, expected);
    assert_eq!(slope.offset, expected);
    assert_eq!(grid.value.origin, Point::new(0.0, 0.0));
    assert_eq!(mesh.value.vertices[0].z, 10.0);

    let restored = mesh.restore();
    assert_eq!(restored.vertices[1].x, 500_100.0);
}

#[test]
fn batch_inputs_keep_their_partitions() {
    init();
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let batch = vec![
        (
            "north.csv".to_string(),
            vec![
                RawPoint::new(-97.70, 30.30, Some(160.0)),
                RawPoint::new(-97.69, 30.31, Some(161.0)),
            ],
        ),
        (
            "south.csv".to_string(),
            vec![
                RawPoint::new(-97.70, 30.20, Some(150.0)),
                RawPoint::new(f64::NAN, 30.21, Some(151.0)),
                RawPoint::new(-97.69, 30.21, Some(152.0)),
            ],
        ),
    ];
    let points = pipeline.prepare_batch(batch).unwrap();
    assert_eq!(points.len(), 4);
    assert_eq!(points.crs().epsg(), Some(32614));
    assert_eq!(points.partitions().len(), 2);
    assert_eq!(points.partitions()[1].start, 2);
    assert_eq!(points.partition("south.csv").unwrap()[1].z, 152.0);
    assert_eq!(points.diagnostics().rejected[0].index, 3);
}

#[test]
fn progress_is_reported_per_stage() {
    init();
    let config = PipelineConfig {
        grid_resolution: Some(20),
        contour_interval: 5.0,
        ..planar_config()
    };
    let pipeline = Pipeline::new(config).unwrap();
    let points = pipeline.prepare(triangle()).unwrap();
    let mut stages: Vec<String> = Vec::new();
    let mut sink = |stage: &str, fraction: f64| {
        assert!((0.0..=1.0).contains(&fraction));
        if stages.last().map(String::as_str) != Some(stage) {
            stages.push(stage.to_string());
        }
    };
    pipeline.contours(&points, &mut sink).unwrap();
    assert_eq!(stages, vec!["grid".to_string(), "contours".to_string()]);
}
