//! Interpolation of scattered survey points onto a regular elevation grid.
//!
//! Cells are sampled at their centres. Row `0` lies along the minimum `y`
//! edge and column `0` along the minimum `x` edge; values are stored
//! row-major.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::diagnostics::{Diagnostics, Fallback};
use crate::error::{GeoError, Result};
use crate::geometry::{barycentric, Bounds, Point, Point3};
use crate::point_set::PointSet;
use crate::progress::Progress;
use crate::triangulation::Triangulation;

/// Upper bound on the number of cells a single grid may allocate.
pub const MAX_CELLS: usize = 25_000_000;

/// Barycentric weights above this count as inside a triangle.
const INSIDE_TOL: f64 = -1e-9;
const SPAN_EPS: f64 = 1e-9;

/// How the cell size of a grid is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridSpec {
    /// Fixed cell edge length in CRS units.
    CellSize(f64),
    /// Number of cells along the longer axis of the padded bounds.
    Resolution(usize),
}

impl Default for GridSpec {
    fn default() -> Self {
        GridSpec::Resolution(100)
    }
}

/// Parameters of [`GridSampler`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    pub spec: GridSpec,
    /// Extra margin around the point bounds, in CRS units.
    pub padding: f64,
    /// Fill cells outside the convex hull from the nearest point instead of
    /// leaving them as no-data.
    pub extrapolate: bool,
}

impl GridParams {
    pub fn with_cell_size(cell_size: f64) -> Self {
        Self {
            spec: GridSpec::CellSize(cell_size),
            ..Default::default()
        }
    }

    pub fn with_resolution(cells: usize) -> Self {
        Self {
            spec: GridSpec::Resolution(cells),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.spec {
            GridSpec::CellSize(size) if !(size.is_finite() && size > 0.0) => {
                return Err(GeoError::config(format!(
                    "cell size must be positive and finite, got {size}"
                )))
            }
            GridSpec::Resolution(0) => {
                return Err(GeoError::config("grid resolution must be at least 1"))
            }
            _ => {}
        }
        if !(self.padding.is_finite() && self.padding >= 0.0) {
            return Err(GeoError::config(format!(
                "padding must be non-negative, got {}",
                self.padding
            )));
        }
        Ok(())
    }
}

/// How the values of an [`ElevationGrid`] were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    Linear,
    NearestNeighbor,
}

/// Regular grid of elevation samples. `None` marks a no-data cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationGrid {
    /// Lower-left corner of cell `(0, 0)`.
    pub origin: Point,
    pub cell_size: f64,
    pub rows: usize,
    pub cols: usize,
    values: Vec<Option<f64>>,
    pub crs: Crs,
    pub method: InterpolationMethod,
    pub diagnostics: Diagnostics,
    /// Lowest and highest source point when the grid was sampled from a
    /// point set. Cell-centre samples rarely reach these elevations.
    #[serde(default)]
    pub source_extremes: Option<(Point3, Point3)>,
}

impl ElevationGrid {
    /// Wraps precomputed row-major values.
    pub fn new(
        origin: Point,
        cell_size: f64,
        rows: usize,
        cols: usize,
        values: Vec<Option<f64>>,
        crs: Crs,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(GeoError::config("grid needs at least one row and column"));
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(GeoError::config(format!(
                "cell size must be positive and finite, got {cell_size}"
            )));
        }
        if values.len() != rows * cols {
            return Err(GeoError::config(format!(
                "{} values do not fill a {rows}x{cols} grid",
                values.len()
            )));
        }
        Ok(Self {
            origin,
            cell_size,
            rows,
            cols,
            values,
            crs,
            method: InterpolationMethod::Linear,
            diagnostics: Diagnostics::default(),
            source_extremes: None,
        })
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            self.values[row * self.cols + col]
        } else {
            None
        }
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn cell_center(&self, row: usize, col: usize) -> Point {
        Point::new(
            self.origin.x + (col as f64 + 0.5) * self.cell_size,
            self.origin.y + (row as f64 + 0.5) * self.cell_size,
        )
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn no_data_count(&self) -> usize {
        self.values.len() - self.valid_count()
    }

    /// Lowest and highest valid sample.
    pub fn z_range(&self) -> Option<(f64, f64)> {
        self.values.iter().flatten().fold(None, |acc, &z| match acc {
            None => Some((z, z)),
            Some((lo, hi)) => Some((f64::min(lo, z), f64::max(hi, z))),
        })
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            min: self.origin,
            max: Point::new(
                self.origin.x + self.cols as f64 * self.cell_size,
                self.origin.y + self.rows as f64 * self.cell_size,
            ),
        }
    }
}

/// Resamples a [`PointSet`] onto an [`ElevationGrid`].
#[derive(Debug, Clone, Default)]
pub struct GridSampler {
    params: GridParams,
}

impl GridSampler {
    pub fn new(params: GridParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GridParams {
        &self.params
    }

    /// Linear interpolation over the Delaunay triangulation of the points.
    /// Falls back to nearest-neighbour assignment when the points do not
    /// span an area; the fallback is noted in the grid diagnostics.
    pub fn sample(&self, points: &PointSet, progress: &mut dyn Progress) -> Result<ElevationGrid> {
        points.ensure_non_empty()?;
        self.params.validate()?;
        let bounds = points
            .bounds()
            .ok_or(GeoError::EmptyInput)?
            .padded(self.params.padding);
        let mut grid = self.layout(bounds, points.crs().clone())?;
        grid.diagnostics = points.diagnostics().clone();
        grid.source_extremes = points.extremes();
        info!(
            "sampling {} points onto {}x{} grid (cell {})",
            points.len(),
            grid.rows,
            grid.cols,
            grid.cell_size
        );

        let xy: Vec<Point> = points.points().iter().map(|p| p.xy()).collect();
        let z: Vec<f64> = points.points().iter().map(|p| p.z).collect();
        match Triangulation::delaunay(&xy) {
            Some(tri) => {
                rasterize(&mut grid, &xy, &z, &tri, progress);
                if self.params.extrapolate {
                    let filled = fill_nearest(&mut grid, &xy, &z, progress);
                    if filled > 0 {
                        grid.diagnostics.record(Fallback::Extrapolated { cells: filled });
                    }
                }
            }
            None => {
                let reason = if points.len() < 3 {
                    format!("{} point(s) cannot be triangulated", points.len())
                } else {
                    "points are collinear or coincident".to_string()
                };
                grid.diagnostics.record(Fallback::NearestNeighbor { reason });
                grid.method = InterpolationMethod::NearestNeighbor;
                fill_nearest(&mut grid, &xy, &z, progress);
            }
        }
        progress.report("grid", 1.0);
        info!(
            "grid complete: {} valid, {} no-data cells",
            grid.valid_count(),
            grid.no_data_count()
        );
        Ok(grid)
    }

    fn layout(&self, bounds: Bounds, crs: Crs) -> Result<ElevationGrid> {
        let (width, height) = (bounds.width(), bounds.height());
        let cell_size = match self.params.spec {
            GridSpec::CellSize(size) => size,
            GridSpec::Resolution(cells) => {
                let longer = width.max(height);
                if longer > 0.0 {
                    longer / cells as f64
                } else {
                    1.0
                }
            }
        };
        let cols = cells_along(width, cell_size);
        let rows = cells_along(height, cell_size);
        if rows.saturating_mul(cols) > MAX_CELLS {
            return Err(GeoError::config(format!(
                "{rows}x{cols} grid exceeds the limit of {MAX_CELLS} cells"
            )));
        }
        let center = bounds.center();
        let origin = Point::new(
            center.x - cols as f64 * cell_size / 2.0,
            center.y - rows as f64 * cell_size / 2.0,
        );
        ElevationGrid::new(origin, cell_size, rows, cols, vec![None; rows * cols], crs)
    }
}

fn cells_along(extent: f64, cell_size: f64) -> usize {
    (extent / cell_size - SPAN_EPS).ceil().max(1.0) as usize
}

/// Indices of the cells whose centres fall in `[lo, hi]` along one axis.
fn span(lo: f64, hi: f64, origin: f64, cell_size: f64, count: usize) -> Option<(usize, usize)> {
    let first = ((lo - origin) / cell_size - 0.5 - SPAN_EPS).ceil().max(0.0);
    let last = ((hi - origin) / cell_size - 0.5 + SPAN_EPS)
        .floor()
        .min(count as f64 - 1.0);
    if last < first {
        None
    } else {
        Some((first as usize, last as usize))
    }
}

/// Assigns every cell whose centre lies in a triangle. Triangles are visited
/// in triangulation order and the first one to claim a cell wins.
fn rasterize(
    grid: &mut ElevationGrid,
    xy: &[Point],
    z: &[f64],
    tri: &Triangulation,
    progress: &mut dyn Progress,
) {
    let total = tri.triangles.len();
    let step = (total / 20).max(1);
    for (n, t) in tri.triangles.iter().enumerate() {
        let (a, b, c) = (xy[t[0]], xy[t[1]], xy[t[2]]);
        let cols = span(
            a.x.min(b.x).min(c.x),
            a.x.max(b.x).max(c.x),
            grid.origin.x,
            grid.cell_size,
            grid.cols,
        );
        let rows = span(
            a.y.min(b.y).min(c.y),
            a.y.max(b.y).max(c.y),
            grid.origin.y,
            grid.cell_size,
            grid.rows,
        );
        if let (Some((c0, c1)), Some((r0, r1))) = (cols, rows) {
            for row in r0..=r1 {
                for col in c0..=c1 {
                    let idx = row * grid.cols + col;
                    if grid.values[idx].is_some() {
                        continue;
                    }
                    let p = grid.cell_center(row, col);
                    if let Some((u, v, w)) = barycentric(p, a, b, c) {
                        if u >= INSIDE_TOL && v >= INSIDE_TOL && w >= INSIDE_TOL {
                            grid.values[idx] = Some(u * z[t[0]] + v * z[t[1]] + w * z[t[2]]);
                        }
                    }
                }
            }
        }
        if n % step == 0 {
            debug!("rasterized {n}/{total} triangles");
            progress.report("grid", n as f64 / total as f64);
        }
    }
}

/// Fills every no-data cell from the nearest point, ties going to the lower
/// index. Returns the number of cells filled.
fn fill_nearest(
    grid: &mut ElevationGrid,
    xy: &[Point],
    z: &[f64],
    progress: &mut dyn Progress,
) -> usize {
    let mut filled = 0;
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let idx = row * grid.cols + col;
            if grid.values[idx].is_some() {
                continue;
            }
            let p = grid.cell_center(row, col);
            let mut best = (f64::INFINITY, 0);
            for (i, q) in xy.iter().enumerate() {
                let d = (q.x - p.x).powi(2) + (q.y - p.y).powi(2);
                if d < best.0 {
                    best = (d, i);
                }
            }
            grid.values[idx] = Some(z[best.1]);
            filled += 1;
        }
        progress.report("grid", (row + 1) as f64 / grid.rows as f64);
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;
    use crate::progress::NoProgress;

    fn planar(points: &[(f64, f64, f64)]) -> PointSet {
        PointSet::from_points(
            points.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect(),
            Crs::from_epsg(32614),
        )
        .unwrap()
    }

    #[test]
    fn plane_is_reproduced_exactly() {
        let set = planar(&[
            (0.0, 0.0, 0.0),
            (10.0, 0.0, 10.0),
            (10.0, 10.0, 20.0),
            (0.0, 10.0, 10.0),
        ]);
        let grid = GridSampler::new(GridParams::with_cell_size(1.0))
            .sample(&set, &mut NoProgress)
            .unwrap();
        assert_eq!((grid.rows, grid.cols), (10, 10));
        assert_eq!(grid.no_data_count(), 0);
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let c = grid.cell_center(row, col);
                let z = grid.get(row, col).unwrap();
                assert!((z - (c.x + c.y)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn resolution_counts_cells_on_longer_axis() {
        let set = planar(&[(0.0, 0.0, 1.0), (20.0, 0.0, 1.0), (0.0, 5.0, 1.0)]);
        let grid = GridSampler::new(GridParams::with_resolution(40))
            .sample(&set, &mut NoProgress)
            .unwrap();
        assert_eq!(grid.cols, 40);
        assert_eq!(grid.rows, 10);
        assert!((grid.cell_size - 0.5).abs() < 1e-12);
    }

    #[test]
    fn outside_hull_is_no_data_unless_extrapolated() {
        let pts = [(0.0, 0.0, 1.0), (10.0, 0.0, 2.0), (0.0, 10.0, 3.0)];
        let sparse = GridSampler::new(GridParams::with_cell_size(1.0))
            .sample(&planar(&pts), &mut NoProgress)
            .unwrap();
        assert!(sparse.get(9, 9).is_none());
        assert!(sparse.get(0, 0).is_some());

        let params = GridParams {
            extrapolate: true,
            ..GridParams::with_cell_size(1.0)
        };
        let filled = GridSampler::new(params)
            .sample(&planar(&pts), &mut NoProgress)
            .unwrap();
        assert_eq!(filled.no_data_count(), 0);
        assert!(matches!(
            filled.diagnostics.fallbacks.as_slice(),
            [Fallback::Extrapolated { .. }]
        ));
    }

    #[test]
    fn collinear_points_fall_back_to_nearest() {
        let set = planar(&[(0.0, 0.0, 1.0), (5.0, 5.0, 2.0), (10.0, 10.0, 3.0)]);
        let grid = GridSampler::new(GridParams::with_resolution(4))
            .sample(&set, &mut NoProgress)
            .unwrap();
        assert_eq!(grid.method, InterpolationMethod::NearestNeighbor);
        assert_eq!(grid.no_data_count(), 0);
        assert_eq!(grid.get(0, 0), Some(1.0));
        assert_eq!(grid.get(3, 3), Some(3.0));
    }

    #[test]
    fn rejects_bad_params() {
        let set = planar(&[(0.0, 0.0, 1.0)]);
        for params in [
            GridParams::with_cell_size(0.0),
            GridParams::with_cell_size(f64::NAN),
            GridParams::with_resolution(0),
            GridParams {
                padding: -1.0,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                GridSampler::new(params).sample(&set, &mut NoProgress),
                Err(GeoError::Configuration(_))
            ));
        }
    }

    #[test]
    fn progress_reaches_completion() {
        let set = planar(&[(0.0, 0.0, 1.0), (4.0, 0.0, 2.0), (0.0, 4.0, 3.0)]);
        let mut last = 0.0;
        let mut sink = |_: &str, f: f64| last = f;
        GridSampler::new(GridParams::with_resolution(8))
            .sample(&set, &mut sink)
            .unwrap();
        assert_eq!(last, 1.0);
    }
}
