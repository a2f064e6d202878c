//! Iso-elevation lines traced from an [`ElevationGrid`] by marching squares.
//!
//! The lattice is formed by the cell centres of the grid. A square whose
//! four samples are all valid contributes at most two segments per level;
//! segments sharing a lattice edge are chained into polylines.

use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::diagnostics::Diagnostics;
use crate::error::{GeoError, Result};
use crate::geometry::{Point, Polyline};
use crate::grid::ElevationGrid;
use crate::progress::Progress;

/// Upper bound on the number of levels one extraction may visit.
pub const MAX_LEVELS: usize = 100_000;
/// Upper bound on Chaikin iterations; each one doubles the vertex count.
pub const MAX_SMOOTHING: usize = 10;

/// Relative tolerance for a level to count as touching a source extreme.
const TOUCH_EPS: f64 = 1e-9;

/// Parameters of [`ContourExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourParams {
    /// Elevation difference between adjacent levels, in metres.
    pub interval: f64,
    /// Attach a label anchor and text to every contour.
    pub labels: bool,
    /// Chaikin smoothing iterations; `0` keeps the traced vertices.
    pub smoothing: usize,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            interval: 1.0,
            labels: false,
            smoothing: 0,
        }
    }
}

impl ContourParams {
    pub fn with_interval(interval: f64) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.interval.is_finite() && self.interval > 0.0) {
            return Err(GeoError::config(format!(
                "contour interval must be positive, got {}",
                self.interval
            )));
        }
        if self.smoothing > MAX_SMOOTHING {
            return Err(GeoError::config(format!(
                "contour smoothing must be at most {MAX_SMOOTHING} iterations, got {}",
                self.smoothing
            )));
        }
        Ok(())
    }
}

/// Text placed at the middle vertex of a contour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourLabel {
    pub anchor: Point,
    pub text: String,
}

/// One polyline at a single elevation level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    pub level: f64,
    pub vertices: Vec<Point>,
    /// `true` when the polyline forms a ring; the first vertex is then
    /// repeated at the end.
    pub closed: bool,
    pub label: Option<ContourLabel>,
}

impl Contour {
    pub fn length(&self) -> f64 {
        self.to_polyline().length()
    }

    pub fn to_polyline(&self) -> Polyline {
        Polyline::new(self.vertices.clone())
    }
}

impl From<&Contour> for geo_types::LineString<f64> {
    fn from(contour: &Contour) -> Self {
        contour
            .vertices
            .iter()
            .map(|p| geo_types::Coord { x: p.x, y: p.y })
            .collect::<Vec<_>>()
            .into()
    }
}

/// Contours of one grid, ordered by ascending level and, within a level,
/// by the row-major position of their first segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourSet {
    pub interval: f64,
    /// Every level visited, including those without crossings.
    pub levels: Vec<f64>,
    pub contours: Vec<Contour>,
    pub crs: Crs,
    pub diagnostics: Diagnostics,
}

impl ContourSet {
    pub fn len(&self) -> usize {
        self.contours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    pub fn at_level(&self, level: f64) -> impl Iterator<Item = &Contour> {
        self.contours.iter().filter(move |c| c.level == level)
    }
}

/// Lattice edge between two adjacent samples. `H(r, c)` joins `(r, c)` and
/// `(r, c + 1)`, `V(r, c)` joins `(r, c)` and `(r + 1, c)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Edge {
    H(usize, usize),
    V(usize, usize),
}

#[derive(Debug, Clone, Default)]
pub struct ContourExtractor {
    params: ContourParams,
}

impl ContourExtractor {
    pub fn new(params: ContourParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ContourParams {
        &self.params
    }

    /// Levels `k * interval` for every integer `k` from
    /// `floor(min / interval)` to `ceil(max / interval)`. The range is that of
    /// the source points when the grid was sampled from them, otherwise that
    /// of the valid grid samples.
    pub fn levels(&self, grid: &ElevationGrid) -> Result<Vec<f64>> {
        self.params.validate()?;
        let sampled = grid
            .z_range()
            .ok_or_else(|| GeoError::insufficient("contours", "grid has no valid samples"))?;
        let (min, max) = grid
            .source_extremes
            .map_or(sampled, |(lo, hi)| (lo.z, hi.z));
        let interval = self.params.interval;
        let first = (min / interval).floor();
        let last = (max / interval).ceil();
        let count = last - first + 1.0;
        if count > MAX_LEVELS as f64 {
            return Err(GeoError::config(format!(
                "interval {interval} yields more than {MAX_LEVELS} levels"
            )));
        }
        Ok((0..count as usize)
            .map(|k| (first + k as f64) * interval)
            .collect())
    }

    pub fn extract(&self, grid: &ElevationGrid, progress: &mut dyn Progress) -> Result<ContourSet> {
        let levels = self.levels(grid)?;
        info!(
            "tracing {} levels at interval {} over {}x{} grid",
            levels.len(),
            self.params.interval,
            grid.rows,
            grid.cols
        );
        let mut contours = Vec::new();
        for (i, &level) in levels.iter().enumerate() {
            let mut traced = trace_level(grid, level);
            if traced.is_empty() {
                if let Some(p) = touch_point(grid, level) {
                    debug!("level {level} touches the surface only at {p:?}");
                    traced.push((vec![p, p], false));
                }
            }
            debug!("level {level}: {} polylines", traced.len());
            contours.extend(
                traced
                    .into_iter()
                    .map(|(vertices, closed)| self.finish(level, vertices, closed)),
            );
            progress.report("contours", (i + 1) as f64 / levels.len() as f64);
        }
        info!("extracted {} contours", contours.len());
        Ok(ContourSet {
            interval: self.params.interval,
            levels,
            contours,
            crs: grid.crs.clone(),
            diagnostics: grid.diagnostics.clone(),
        })
    }

    fn finish(&self, level: f64, vertices: Vec<Point>, closed: bool) -> Contour {
        let vertices = if self.params.smoothing > 0 {
            Polyline::new(vertices).smooth(self.params.smoothing).vertices
        } else {
            vertices
        };
        let label = if self.params.labels {
            vertices.get(vertices.len() / 2).map(|&anchor| ContourLabel {
                anchor,
                text: label_text(level),
            })
        } else {
            None
        };
        Contour {
            level,
            vertices,
            closed,
            label,
        }
    }
}

/// Source extreme lying exactly on `level`. Cell-centre samples never reach
/// it, so such a level would otherwise have no contour at all.
fn touch_point(grid: &ElevationGrid, level: f64) -> Option<Point> {
    let (lo, hi) = grid.source_extremes?;
    [lo, hi]
        .into_iter()
        .find(|p| (p.z - level).abs() <= TOUCH_EPS * p.z.abs().max(1.0))
        .map(|p| Point::new(p.x, p.y))
}

fn label_text(level: f64) -> String {
    let rounded = (level * 1e6).round() / 1e6;
    format!("{rounded} m")
}

/// Segments of one square for the corner mask `bl | br << 1 | tr << 2 |
/// tl << 3`. Saddles are split according to the mean of the four corners.
fn square_segments(mask: u8, center_above: bool, r: usize, c: usize) -> Vec<(Edge, Edge)> {
    let bottom = Edge::H(r, c);
    let top = Edge::H(r + 1, c);
    let left = Edge::V(r, c);
    let right = Edge::V(r, c + 1);
    match mask {
        1 | 14 => vec![(left, bottom)],
        2 | 13 => vec![(bottom, right)],
        3 | 12 => vec![(left, right)],
        4 | 11 => vec![(right, top)],
        6 | 9 => vec![(bottom, top)],
        7 | 8 => vec![(left, top)],
        5 if center_above => vec![(bottom, right), (left, top)],
        5 => vec![(left, bottom), (right, top)],
        10 if center_above => vec![(left, bottom), (right, top)],
        10 => vec![(bottom, right), (left, top)],
        _ => Vec::new(),
    }
}

fn crossing(grid: &ElevationGrid, edge: Edge, level: f64) -> Option<Point> {
    let (a, b) = match edge {
        Edge::H(r, c) => ((r, c), (r, c + 1)),
        Edge::V(r, c) => ((r, c), (r + 1, c)),
    };
    let za = grid.get(a.0, a.1)?;
    let zb = grid.get(b.0, b.1)?;
    let pa = grid.cell_center(a.0, a.1);
    let pb = grid.cell_center(b.0, b.1);
    let t = (level - za) / (zb - za);
    Some(Point::new(pa.x + t * (pb.x - pa.x), pa.y + t * (pb.y - pa.y)))
}

/// Polylines at `level`, each with its closed flag.
fn trace_level(grid: &ElevationGrid, level: f64) -> Vec<(Vec<Point>, bool)> {
    let mut segments: Vec<(Edge, Edge)> = Vec::new();
    for r in 0..grid.rows.saturating_sub(1) {
        for c in 0..grid.cols.saturating_sub(1) {
            let (Some(bl), Some(br), Some(tr), Some(tl)) = (
                grid.get(r, c),
                grid.get(r, c + 1),
                grid.get(r + 1, c + 1),
                grid.get(r + 1, c),
            ) else {
                continue;
            };
            let mask = u8::from(bl >= level)
                | u8::from(br >= level) << 1
                | u8::from(tr >= level) << 2
                | u8::from(tl >= level) << 3;
            let center_above = (bl + br + tr + tl) / 4.0 >= level;
            segments.extend(square_segments(mask, center_above, r, c));
        }
    }

    let mut by_edge: HashMap<Edge, Vec<usize>> = HashMap::new();
    for (i, (a, b)) in segments.iter().enumerate() {
        by_edge.entry(*a).or_default().push(i);
        by_edge.entry(*b).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let walk = |from: Edge, used: &mut Vec<bool>| -> Vec<Edge> {
        let mut path = Vec::new();
        let mut current = from;
        while let Some(&next) = by_edge
            .get(&current)
            .and_then(|ids| ids.iter().find(|&&id| !used[id]))
        {
            used[next] = true;
            let (a, b) = segments[next];
            current = if a == current { b } else { a };
            path.push(current);
        }
        path
    };

    let mut lines = Vec::new();
    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (a, b) = segments[start];
        let mut edges = vec![a, b];
        edges.extend(walk(b, &mut used));
        let closed = edges.len() > 2 && edges.first() == edges.last();
        if !closed {
            let mut back = walk(a, &mut used);
            back.reverse();
            back.extend(edges);
            edges = back;
        }
        let vertices: Vec<Point> = edges
            .iter()
            .filter_map(|&e| crossing(grid, e, level))
            .collect();
        if vertices.len() >= 2 {
            lines.push((vertices, closed));
        }
    }
    lines
}
