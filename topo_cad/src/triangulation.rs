//! Delaunay triangulation of the horizontal plane.

use crate::geometry::{distance, orient2d, Point};

/// Relative tolerance below which three points are treated as collinear.
const COLLINEAR_EPS: f64 = 1e-12;

/// Delaunay triangles over a point slice, counter-clockwise, indices into
/// the input. Exact duplicate points are left out of the triangulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangulation {
    pub triangles: Vec<[usize; 3]>,
    /// Convex hull vertex indices as reported by the triangulator.
    pub hull: Vec<usize>,
}

impl Triangulation {
    /// Triangulates `points`, returning `None` when no triangle can be formed
    /// (fewer than three distinct points, or all of them collinear).
    pub fn delaunay(points: &[Point]) -> Option<Self> {
        if points.len() < 3 || is_degenerate(points) {
            return None;
        }
        let coords: Vec<delaunator::Point> = points
            .iter()
            .map(|p| delaunator::Point { x: p.x, y: p.y })
            .collect();
        let triangulation = delaunator::triangulate(&coords);
        let triangles: Vec<[usize; 3]> = triangulation
            .triangles
            .chunks(3)
            .map(|c| {
                if orient2d(points[c[0]], points[c[1]], points[c[2]]) < 0.0 {
                    [c[0], c[2], c[1]]
                } else {
                    [c[0], c[1], c[2]]
                }
            })
            .collect();
        if triangles.is_empty() {
            return None;
        }
        Some(Self {
            triangles,
            hull: triangulation.hull,
        })
    }
}

/// `true` when the points do not span an area: fewer than three distinct
/// locations, or all of them on one line.
pub fn is_degenerate(points: &[Point]) -> bool {
    let Some(&a) = points.first() else {
        return true;
    };
    let Some(&b) = points
        .iter()
        .max_by(|p, q| distance(a, **p).total_cmp(&distance(a, **q)))
    else {
        return true;
    };
    let span = distance(a, b);
    if span == 0.0 {
        return true;
    }
    points
        .iter()
        .all(|&c| orient2d(a, b, c).abs() <= COLLINEAR_EPS * span * span)
}

/// Radius of the circle through `a`, `b` and `c`; infinite for degenerate
/// triangles.
pub fn circumradius(a: Point, b: Point, c: Point) -> f64 {
    let area2 = orient2d(a, b, c).abs();
    if area2 <= f64::EPSILON * (distance(a, b) * distance(b, c)).max(f64::MIN_POSITIVE) {
        return f64::INFINITY;
    }
    distance(a, b) * distance(b, c) * distance(c, a) / (2.0 * area2)
}
