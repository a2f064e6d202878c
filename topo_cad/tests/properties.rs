use std::collections::HashSet;

use proptest::prelude::*;
use topo_cad::{
    geometry::{Point, Point3},
    hull::boundary_edges,
    triangulation::Triangulation,
    ContourExtractor, ContourParams, CoordinateTranslator, Crs, ElevationGrid, ElevationUnit,
    NoProgress, OriginMode, PointSet, ProjectionSelector, RawPoint,
};

fn distinct(points: Vec<(f64, f64)>) -> Vec<Point> {
    let mut seen = HashSet::new();
    points
        .into_iter()
        .filter(|(x, y)| seen.insert((x.to_bits(), y.to_bits())))
        .map(|(x, y)| Point::new(x, y))
        .collect()
}

proptest! {
    #[test]
    fn delaunay_face_count_matches_hull(
        raw in prop::collection::vec((0.0f64..1000.0, 0.0f64..1000.0), 3..80),
    ) {
        let points = distinct(raw);
        let tri = Triangulation::delaunay(&points);
        prop_assume!(tri.is_some());
        let tri = tri.unwrap();
        let n = points.len();
        let k = boundary_edges(&tri.triangles).len();
        prop_assert_eq!(tri.triangles.len(), 2 * n - 2 - k);
    }

    #[test]
    fn contour_levels_are_arithmetic(
        values in prop::collection::vec(-50.0f64..250.0, 16),
        interval in 0.5f64..20.0,
    ) {
        let grid = ElevationGrid::new(
            Point::new(0.0, 0.0),
            1.0,
            4,
            4,
            values.iter().copied().map(Some).collect(),
            Crs::from_epsg(32614),
        )
        .unwrap();
        let set = ContourExtractor::new(ContourParams::with_interval(interval))
            .extract(&grid, &mut NoProgress)
            .unwrap();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let first = set.levels[0];
        let last = *set.levels.last().unwrap();
        prop_assert!((first - (min / interval).floor() * interval).abs() < 1e-9);
        prop_assert!((last - (max / interval).ceil() * interval).abs() < 1e-9);
        for w in set.levels.windows(2) {
            prop_assert!(w[1] > w[0]);
            prop_assert!((w[1] - w[0] - interval).abs() < 1e-9);
        }
        for c in &set.contours {
            prop_assert!(set.levels.contains(&c.level));
        }
    }

    #[test]
    fn translation_round_trips(
        raw in prop::collection::vec(
            (-1.0e6f64..1.0e6, -1.0e6f64..1.0e6, -100.0f64..5000.0),
            1..50,
        ),
        mode in prop_oneof![
            Just(OriginMode::MinCorner),
            Just(OriginMode::BoundsCenter),
            Just(OriginMode::FirstPoint),
        ],
    ) {
        let set = PointSet::from_points(
            raw.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect(),
            Crs::from_epsg(32614),
        )
        .unwrap();
        let local = CoordinateTranslator::new(mode).apply(set.clone());
        if mode == OriginMode::MinCorner {
            let b = local.value.bounds().unwrap();
            prop_assert!(b.min.x.abs() < 1e-6 && b.min.y.abs() < 1e-6);
        }
        let back = local.restore();
        for (a, b) in back.points().iter().zip(set.points()) {
            prop_assert!((a.x - b.x).abs() < 1e-6);
            prop_assert!((a.y - b.y).abs() < 1e-6);
            prop_assert_eq!(a.z, b.z);
        }
    }

    #[test]
    fn zone_detection_depends_only_on_centroid(
        quarters in prop::collection::vec((-716i32..716, -320i32..320), 1..30),
    ) {
        // Quarter degrees keep the centroid sums exact in any order.
        let raw: Vec<(f64, f64)> = quarters
            .iter()
            .map(|&(x, y)| (f64::from(x) * 0.25, f64::from(y) * 0.25))
            .collect();
        let build = |coords: &[(f64, f64)]| {
            PointSet::from_raw(
                coords.iter().map(|&(x, y)| RawPoint::new(x, y, Some(1.0))).collect(),
                Crs::wgs84(),
                ElevationUnit::Meters,
            )
            .unwrap()
        };
        let forward = build(&raw);
        let mut reversed = raw.clone();
        reversed.reverse();
        let mut doubled = raw.clone();
        doubled.extend_from_slice(&raw);

        let zone = ProjectionSelector::detect_zone(&forward).unwrap();
        let centroid = forward.centroid().unwrap();
        prop_assert_eq!(zone, topo_cad::UtmZone::from_lon_lat(centroid.x, centroid.y));
        prop_assert_eq!(ProjectionSelector::detect_zone(&build(&reversed)).unwrap(), zone);
        prop_assert_eq!(ProjectionSelector::detect_zone(&build(&doubled)).unwrap(), zone);
    }
}
