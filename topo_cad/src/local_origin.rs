//! Translation of projected products to a local origin.
//!
//! Projected coordinates are large numbers that many CAD packages handle
//! poorly. The translator subtracts a reference point from every horizontal
//! position; elevations are never touched. The offset travels with the
//! result so the true coordinates can be restored.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::contour::ContourSet;
use crate::geometry::{Bounds, Point};
use crate::grid::ElevationGrid;
use crate::mesh::Mesh;
use crate::point_set::PointSet;
use crate::slope::SlopeField;

/// Reference point subtracted from every position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginMode {
    /// Minimum `x` and minimum `y` over all positions.
    #[default]
    MinCorner,
    /// Centre of the bounding box.
    BoundsCenter,
    /// The first position.
    FirstPoint,
    /// Keep the original coordinates.
    Original,
}

/// Something whose horizontal coordinates can be shifted.
pub trait Translate {
    /// Horizontal positions used to choose the reference point, in order.
    fn positions(&self) -> Vec<Point>;

    /// Adds `(dx, dy)` to every horizontal coordinate.
    fn shift(&mut self, dx: f64, dy: f64);
}

impl Translate for PointSet {
    fn positions(&self) -> Vec<Point> {
        self.points().iter().map(|p| p.xy()).collect()
    }

    fn shift(&mut self, dx: f64, dy: f64) {
        for p in self.points_mut() {
            p.x += dx;
            p.y += dy;
        }
    }
}

impl Translate for Mesh {
    fn positions(&self) -> Vec<Point> {
        self.vertices.iter().map(|v| v.xy()).collect()
    }

    fn shift(&mut self, dx: f64, dy: f64) {
        for v in &mut self.vertices {
            v.x += dx;
            v.y += dy;
        }
    }
}

impl Translate for ContourSet {
    fn positions(&self) -> Vec<Point> {
        self.contours
            .iter()
            .flat_map(|c| c.vertices.iter().copied())
            .collect()
    }

    fn shift(&mut self, dx: f64, dy: f64) {
        for contour in &mut self.contours {
            for v in &mut contour.vertices {
                v.x += dx;
                v.y += dy;
            }
            if let Some(label) = &mut contour.label {
                label.anchor.x += dx;
                label.anchor.y += dy;
            }
        }
    }
}

impl Translate for ElevationGrid {
    fn positions(&self) -> Vec<Point> {
        let b = self.bounds();
        vec![b.min, b.max]
    }

    fn shift(&mut self, dx: f64, dy: f64) {
        self.origin.x += dx;
        self.origin.y += dy;
        if let Some((lo, hi)) = &mut self.source_extremes {
            for p in [lo, hi] {
                p.x += dx;
                p.y += dy;
            }
        }
    }
}

impl Translate for SlopeField {
    fn positions(&self) -> Vec<Point> {
        vec![
            self.origin,
            Point::new(
                self.origin.x + self.cols as f64 * self.cell_size,
                self.origin.y + self.rows as f64 * self.cell_size,
            ),
        ]
    }

    fn shift(&mut self, dx: f64, dy: f64) {
        self.origin.x += dx;
        self.origin.y += dy;
    }
}

/// A product expressed relative to `offset`: true coordinates are the local
/// ones plus `offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Localized<T> {
    pub value: T,
    pub offset: Point,
}

impl<T: Translate> Localized<T> {
    /// Moves the value back to its true coordinates.
    pub fn restore(mut self) -> T {
        self.value.shift(self.offset.x, self.offset.y);
        self.value
    }
}

/// Shifts products to a local origin chosen by an [`OriginMode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateTranslator {
    mode: OriginMode,
}

impl CoordinateTranslator {
    pub fn new(mode: OriginMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> OriginMode {
        self.mode
    }

    /// Reference point for `value`; zero for [`OriginMode::Original`] and for
    /// values without positions.
    pub fn offset_for<T: Translate + ?Sized>(&self, value: &T) -> Point {
        let positions = value.positions();
        let origin = match self.mode {
            OriginMode::Original => None,
            OriginMode::MinCorner => Bounds::from_points(positions).map(|b| b.min),
            OriginMode::BoundsCenter => Bounds::from_points(positions).map(|b| b.center()),
            OriginMode::FirstPoint => positions.first().copied(),
        };
        origin.unwrap_or(Point::new(0.0, 0.0))
    }

    /// Translates `value` by its own reference point.
    pub fn apply<T: Translate>(&self, value: T) -> Localized<T> {
        let offset = self.offset_for(&value);
        Self::apply_offset(value, offset)
    }

    /// Translates `value` by a reference point computed elsewhere, so that
    /// several products derived from one point set stay aligned.
    pub fn apply_offset<T: Translate>(mut value: T, offset: Point) -> Localized<T> {
        if offset.x != 0.0 || offset.y != 0.0 {
            debug!("translating by ({}, {})", -offset.x, -offset.y);
            value.shift(-offset.x, -offset.y);
        }
        Localized { value, offset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use crate::geometry::Point3;

    fn set() -> PointSet {
        PointSet::from_points(
            vec![
                Point3::new(500_010.0, 4_000_020.0, 12.0),
                Point3::new(500_000.0, 4_000_030.0, 11.0),
                Point3::new(500_030.0, 4_000_000.0, 10.0),
            ],
            Crs::from_epsg(32614),
        )
        .unwrap()
    }

    #[test]
    fn min_corner_moves_to_zero() {
        let local = CoordinateTranslator::default().apply(set());
        assert_eq!(local.offset, Point::new(500_000.0, 4_000_000.0));
        let b = local.value.bounds().unwrap();
        assert_eq!(b.min, Point::new(0.0, 0.0));
        assert_eq!(local.value.points()[0].z, 12.0);
    }

    #[test]
    fn modes_pick_their_reference() {
        let s = set();
        let center = CoordinateTranslator::new(OriginMode::BoundsCenter).offset_for(&s);
        assert_eq!(center, Point::new(500_015.0, 4_000_015.0));
        let first = CoordinateTranslator::new(OriginMode::FirstPoint).offset_for(&s);
        assert_eq!(first, Point::new(500_010.0, 4_000_020.0));
        let original = CoordinateTranslator::new(OriginMode::Original).apply(s.clone());
        assert_eq!(original.offset, Point::new(0.0, 0.0));
        assert_eq!(original.value, s);
    }

    #[test]
    fn restore_reverses_translation() {
        let s = set();
        let back = CoordinateTranslator::default().apply(s.clone()).restore();
        for (a, b) in back.points().iter().zip(s.points()) {
            assert!((a.x - b.x).abs() < 1e-9);
            assert!((a.y - b.y).abs() < 1e-9);
            assert_eq!(a.z, b.z);
        }
    }
}
