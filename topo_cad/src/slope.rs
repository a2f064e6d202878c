//! Slope and aspect derived from an [`ElevationGrid`] by finite differences.

use log::info;
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::diagnostics::Diagnostics;
use crate::error::{GeoError, Result};
use crate::geometry::Point;
use crate::grid::ElevationGrid;
use crate::progress::Progress;

/// Gradients below this magnitude have no defined aspect.
const FLAT_EPS: f64 = 1e-12;
/// Largest accepted smoothing sigma, in cells.
pub const MAX_SIGMA: f64 = 50.0;

/// Unit in which slope magnitudes are reported.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeUnit {
    /// `atan(|∇z|)` in degrees.
    #[default]
    Degrees,
    /// `|∇z| * 100`.
    Percent,
    /// `|∇z|`.
    Ratio,
    /// Rise over a horizontal run of `run` units, `|∇z| * run`.
    RiseRun { run: f64 },
}

impl SlopeUnit {
    /// Converts a gradient magnitude (rise over run) to this unit.
    pub fn convert(&self, gradient: f64) -> f64 {
        match *self {
            SlopeUnit::Degrees => gradient.atan().to_degrees(),
            SlopeUnit::Percent => gradient * 100.0,
            SlopeUnit::Ratio => gradient,
            SlopeUnit::RiseRun { run } => gradient * run,
        }
    }
}

/// Parameters of [`SlopeAnalyzer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlopeParams {
    pub unit: SlopeUnit,
    /// Gaussian smoothing of the slope values in cells; `0` disables it.
    pub sigma: f64,
    /// Also compute the downslope aspect of every cell.
    pub aspect: bool,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            unit: SlopeUnit::Degrees,
            sigma: 0.0,
            aspect: true,
        }
    }
}

impl SlopeParams {
    pub fn with_unit(unit: SlopeUnit) -> Self {
        Self {
            unit,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let SlopeUnit::RiseRun { run } = self.unit {
            if !(run.is_finite() && run > 0.0) {
                return Err(GeoError::config(format!(
                    "rise/run length must be positive, got {run}"
                )));
            }
        }
        if !(self.sigma.is_finite() && (0.0..=MAX_SIGMA).contains(&self.sigma)) {
            return Err(GeoError::config(format!(
                "smoothing sigma must be between 0 and {MAX_SIGMA} cells, got {}",
                self.sigma
            )));
        }
        Ok(())
    }
}

/// Summary of the valid cells of a [`SlopeField`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlopeStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

/// Per-cell slope on the lattice of the source grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopeField {
    pub origin: Point,
    pub cell_size: f64,
    pub rows: usize,
    pub cols: usize,
    values: Vec<Option<f64>>,
    /// Downslope bearing in degrees clockwise from grid north.
    aspect: Option<Vec<Option<f64>>>,
    pub unit: SlopeUnit,
    pub crs: Crs,
    pub diagnostics: Diagnostics,
}

impl SlopeField {
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            self.values[row * self.cols + col]
        } else {
            None
        }
    }

    pub fn aspect(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            self.aspect.as_ref()?[row * self.cols + col]
        } else {
            None
        }
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn has_aspect(&self) -> bool {
        self.aspect.is_some()
    }

    pub fn no_data_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub fn stats(&self) -> Option<SlopeStats> {
        let mut valid: Vec<f64> = self.values.iter().flatten().copied().collect();
        if valid.is_empty() {
            return None;
        }
        valid.sort_by(f64::total_cmp);
        let n = valid.len();
        let median = if n % 2 == 1 {
            valid[n / 2]
        } else {
            (valid[n / 2 - 1] + valid[n / 2]) / 2.0
        };
        Some(SlopeStats {
            min: valid[0],
            max: valid[n - 1],
            mean: valid.iter().sum::<f64>() / n as f64,
            median,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SlopeAnalyzer {
    params: SlopeParams,
}

impl SlopeAnalyzer {
    pub fn new(params: SlopeParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SlopeParams {
        &self.params
    }

    /// Slope using the grid cell size as the spacing in metres.
    pub fn analyze(&self, grid: &ElevationGrid, progress: &mut dyn Progress) -> Result<SlopeField> {
        self.analyze_with_spacing(grid, grid.cell_size, grid.cell_size, progress)
    }

    /// Slope with explicit column (`dx`) and row (`dy`) spacing in metres.
    pub fn analyze_with_spacing(
        &self,
        grid: &ElevationGrid,
        dx: f64,
        dy: f64,
        progress: &mut dyn Progress,
    ) -> Result<SlopeField> {
        self.params.validate()?;
        if !(dx.is_finite() && dx > 0.0 && dy.is_finite() && dy > 0.0) {
            return Err(GeoError::config(format!(
                "grid spacing must be positive, got {dx} x {dy}"
            )));
        }
        info!(
            "slope over {}x{} grid, spacing {} x {}, unit {:?}",
            grid.rows, grid.cols, dx, dy, self.params.unit
        );
        let mut values = Vec::with_capacity(grid.rows * grid.cols);
        let mut aspect = Vec::with_capacity(if self.params.aspect { values.capacity() } else { 0 });
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                match gradient(grid, row, col, dx, dy) {
                    Some((gx, gy)) => {
                        values.push(Some(self.params.unit.convert(gx.hypot(gy))));
                        if self.params.aspect {
                            aspect.push(bearing(gx, gy));
                        }
                    }
                    None => {
                        values.push(None);
                        if self.params.aspect {
                            aspect.push(None);
                        }
                    }
                }
            }
            progress.report("slope", (row + 1) as f64 / grid.rows as f64);
        }
        if self.params.sigma > 0.0 {
            values = gaussian(&values, grid.rows, grid.cols, self.params.sigma);
        }
        let field = SlopeField {
            origin: grid.origin,
            cell_size: grid.cell_size,
            rows: grid.rows,
            cols: grid.cols,
            values,
            aspect: self.params.aspect.then_some(aspect),
            unit: self.params.unit,
            crs: grid.crs.clone(),
            diagnostics: grid.diagnostics.clone(),
        };
        info!("slope complete: {} no-data cells", field.no_data_count());
        Ok(field)
    }
}

/// `(dz/dx, dz/dy)` at a cell, or `None` when its 3x3 neighbourhood holds a
/// no-data sample.
fn gradient(grid: &ElevationGrid, row: usize, col: usize, dx: f64, dy: f64) -> Option<(f64, f64)> {
    for r in row.saturating_sub(1)..=(row + 1).min(grid.rows - 1) {
        for c in col.saturating_sub(1)..=(col + 1).min(grid.cols - 1) {
            grid.get(r, c)?;
        }
    }
    let diff = |lo: (usize, usize), hi: (usize, usize), span: f64| -> Option<f64> {
        Some((grid.get(hi.0, hi.1)? - grid.get(lo.0, lo.1)?) / span)
    };
    let gx = if grid.cols == 1 {
        0.0
    } else if col == 0 {
        diff((row, 0), (row, 1), dx)?
    } else if col == grid.cols - 1 {
        diff((row, col - 1), (row, col), dx)?
    } else {
        diff((row, col - 1), (row, col + 1), 2.0 * dx)?
    };
    let gy = if grid.rows == 1 {
        0.0
    } else if row == 0 {
        diff((0, col), (1, col), dy)?
    } else if row == grid.rows - 1 {
        diff((row - 1, col), (row, col), dy)?
    } else {
        diff((row - 1, col), (row + 1, col), 2.0 * dy)?
    };
    Some((gx, gy))
}

/// Compass bearing of the steepest descent.
fn bearing(gx: f64, gy: f64) -> Option<f64> {
    if gx.hypot(gy) < FLAT_EPS {
        return None;
    }
    Some((-gx).atan2(-gy).to_degrees().rem_euclid(360.0))
}

/// Gaussian blur weighted over valid cells only; no-data cells stay no-data.
fn gaussian(values: &[Option<f64>], rows: usize, cols: usize, sigma: f64) -> Vec<Option<f64>> {
    // Weights beyond the grid never apply.
    let radius = ((3.0 * sigma).ceil() as isize).min(rows.max(cols) as isize);
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|d| (-((d * d) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let mut out = Vec::with_capacity(values.len());
    for row in 0..rows as isize {
        for col in 0..cols as isize {
            if values[(row * cols as isize + col) as usize].is_none() {
                out.push(None);
                continue;
            }
            let (mut sum, mut weight) = (0.0, 0.0);
            for dr in -radius..=radius {
                let r = row + dr;
                if r < 0 || r >= rows as isize {
                    continue;
                }
                for dc in -radius..=radius {
                    let c = col + dc;
                    if c < 0 || c >= cols as isize {
                        continue;
                    }
                    if let Some(v) = values[(r * cols as isize + c) as usize] {
                        let w = kernel[(dr + radius) as usize] * kernel[(dc + radius) as usize];
                        sum += w * v;
                        weight += w;
                    }
                }
            }
            out.push(Some(sum / weight));
        }
    }
    out
}
