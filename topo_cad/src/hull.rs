//! Alpha shapes and boundary extraction over triangle sets.
//!
//! A Delaunay triangle belongs to the alpha complex when its circumradius
//! is at most `1 / alpha`; `alpha = 0` keeps every triangle, which yields the
//! convex hull.

use std::collections::HashMap;

use crate::geometry::Point;
use crate::triangulation::{circumradius, Triangulation};

/// Triangles kept by the alpha test and the loops bounding them.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaShape {
    pub triangles: Vec<[usize; 3]>,
    /// Boundary loops of `triangles`; outer loops run counter-clockwise,
    /// holes clockwise. The first vertex is not repeated.
    pub loops: Vec<Vec<usize>>,
    /// Number of Delaunay triangles dropped by the alpha test.
    pub removed: usize,
}

pub fn alpha_shape(points: &[Point], tri: &Triangulation, alpha: f64) -> AlphaShape {
    let triangles: Vec<[usize; 3]> = if alpha > 0.0 {
        let max_radius = 1.0 / alpha;
        tri.triangles
            .iter()
            .copied()
            .filter(|t| circumradius(points[t[0]], points[t[1]], points[t[2]]) <= max_radius)
            .collect()
    } else {
        tri.triangles.clone()
    };
    let removed = tri.triangles.len() - triangles.len();
    let loops = boundary_loops(&triangles);
    AlphaShape {
        triangles,
        loops,
        removed,
    }
}

/// Directed edges used by exactly one triangle, oriented as in that
/// triangle, in triangle order.
pub fn boundary_edges(triangles: &[[usize; 3]]) -> Vec<(usize, usize)> {
    let key = |a: usize, b: usize| if a < b { (a, b) } else { (b, a) };
    let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
    for t in triangles {
        for i in 0..3 {
            *counts.entry(key(t[i], t[(i + 1) % 3])).or_insert(0) += 1;
        }
    }
    let mut edges = Vec::new();
    for t in triangles {
        for i in 0..3 {
            let (a, b) = (t[i], t[(i + 1) % 3]);
            if counts.get(&key(a, b)) == Some(&1) {
                edges.push((a, b));
            }
        }
    }
    edges
}

/// Chains the boundary edges into closed loops.
pub fn boundary_loops(triangles: &[[usize; 3]]) -> Vec<Vec<usize>> {
    let edges = boundary_edges(triangles);
    let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, &(a, _)) in edges.iter().enumerate() {
        outgoing.entry(a).or_default().push(i);
    }
    let mut used = vec![false; edges.len()];
    let mut loops = Vec::new();
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (first, mut current) = edges[start];
        let mut ring = vec![first];
        while current != first {
            ring.push(current);
            let next = outgoing
                .get(&current)
                .and_then(|ids| ids.iter().copied().find(|&id| !used[id]));
            match next {
                Some(id) => {
                    used[id] = true;
                    current = edges[id].1;
                }
                None => break,
            }
        }
        if ring.len() >= 3 {
            loops.push(ring);
        }
    }
    loops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::signed_area;

    fn grid_points() -> Vec<Point> {
        let mut pts = Vec::new();
        for y in 0..4 {
            for x in 0..4 {
                pts.push(Point::new(x as f64, y as f64 + 0.01 * x as f64));
            }
        }
        pts
    }

    #[test]
    fn zero_alpha_keeps_everything() {
        let pts = grid_points();
        let tri = Triangulation::delaunay(&pts).unwrap();
        let shape = alpha_shape(&pts, &tri, 0.0);
        assert_eq!(shape.removed, 0);
        assert_eq!(shape.triangles, tri.triangles);
        assert_eq!(shape.loops.len(), 1);
    }

    #[test]
    fn loops_are_counter_clockwise() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(1.0, 1.0),
        ];
        let tri = Triangulation::delaunay(&pts).unwrap();
        let loops = boundary_loops(&tri.triangles);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 4);
        let ring: Vec<Point> = loops[0].iter().map(|&i| pts[i]).collect();
        assert!(signed_area(&ring) > 0.0);
    }

    #[test]
    fn large_alpha_drops_long_triangles() {
        let mut pts = grid_points();
        pts.push(Point::new(20.0, 1.5));
        let tri = Triangulation::delaunay(&pts).unwrap();
        let shape = alpha_shape(&pts, &tri, 0.5);
        assert!(shape.removed > 0);
        assert!(shape
            .triangles
            .iter()
            .all(|t| !t.contains(&(pts.len() - 1))));
    }
}
