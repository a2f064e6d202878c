//! Pipeline configuration, loadable from and savable to JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::contour::ContourParams;
use crate::crs::Crs;
use crate::error::{GeoError, Result};
use crate::grid::{GridParams, GridSpec};
use crate::local_origin::OriginMode;
use crate::mesh::{MeshKind, MeshMode, MeshParams};
use crate::point_set::ElevationUnit;
use crate::projection::CrsChoice;
use crate::slope::{SlopeParams, SlopeUnit};

/// Every parameter of a derivation run. Missing JSON fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// CRS of the incoming points.
    pub source_crs: String,
    pub elevation_unit: ElevationUnit,
    /// Explicit target CRS; `None` selects the UTM zone automatically.
    pub target_crs: Option<String>,
    /// Keep longitude/latitude instead of projecting.
    pub geographic: bool,

    /// Cells along the longer axis. Exclusive with `cell_size`.
    pub grid_resolution: Option<usize>,
    /// Cell edge length in CRS units. Exclusive with `grid_resolution`.
    pub cell_size: Option<f64>,
    pub padding: f64,
    pub extrapolate: bool,

    pub contour_interval: f64,
    pub contour_labels: bool,
    pub contour_smoothing: usize,

    pub mesh_mode: MeshKind,
    pub alpha: f64,
    pub boundary_edges: bool,
    pub quads_as_triangles: bool,

    pub slope_unit: SlopeUnit,
    pub slope_sigma: f64,
    pub slope_aspect: bool,

    pub translate_to_origin: bool,
    pub origin_mode: OriginMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_crs: "EPSG:4326".to_string(),
            elevation_unit: ElevationUnit::Meters,
            target_crs: None,
            geographic: false,
            grid_resolution: None,
            cell_size: None,
            padding: 0.0,
            extrapolate: false,
            contour_interval: 1.0,
            contour_labels: false,
            contour_smoothing: 0,
            mesh_mode: MeshKind::Delaunay,
            alpha: 0.0,
            boundary_edges: true,
            quads_as_triangles: false,
            slope_unit: SlopeUnit::Degrees,
            slope_sigma: 0.0,
            slope_aspect: true,
            translate_to_origin: true,
            origin_mode: OriginMode::MinCorner,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Rejects out-of-range values and conflicting options before any
    /// computation starts.
    pub fn validate(&self) -> Result<()> {
        if self.grid_resolution.is_some() && self.cell_size.is_some() {
            return Err(GeoError::config(
                "grid_resolution and cell_size are mutually exclusive",
            ));
        }
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return Err(GeoError::config(format!(
                "alpha must be non-negative and finite, got {}",
                self.alpha
            )));
        }
        self.crs_choice()?;
        self.source()?;
        self.grid_params().validate()?;
        self.contour_params().validate()?;
        self.mesh_params().validate()?;
        self.slope_params().validate()
    }

    pub fn source(&self) -> Result<Crs> {
        Crs::parse(&self.source_crs)
    }

    pub fn crs_choice(&self) -> Result<CrsChoice> {
        CrsChoice::from_options(self.target_crs.as_deref(), self.geographic)
    }

    pub fn grid_params(&self) -> GridParams {
        let spec = match (self.cell_size, self.grid_resolution) {
            (Some(size), _) => GridSpec::CellSize(size),
            (None, Some(cells)) => GridSpec::Resolution(cells),
            (None, None) => GridSpec::default(),
        };
        GridParams {
            spec,
            padding: self.padding,
            extrapolate: self.extrapolate,
        }
    }

    pub fn contour_params(&self) -> ContourParams {
        ContourParams {
            interval: self.contour_interval,
            labels: self.contour_labels,
            smoothing: self.contour_smoothing,
        }
    }

    pub fn mesh_params(&self) -> MeshParams {
        let mode = match self.mesh_mode {
            MeshKind::Delaunay => MeshMode::Delaunay,
            MeshKind::Grid => MeshMode::Grid(self.grid_params()),
            MeshKind::Concave => MeshMode::Concave { alpha: self.alpha },
        };
        MeshParams {
            mode,
            boundary_edges: self.boundary_edges,
            quads_as_triangles: self.quads_as_triangles,
        }
    }

    pub fn slope_params(&self) -> SlopeParams {
        SlopeParams {
            unit: self.slope_unit,
            sigma: self.slope_sigma,
            aspect: self.slope_aspect,
        }
    }

    /// [`OriginMode::Original`] when translation is disabled.
    pub fn origin(&self) -> OriginMode {
        if self.translate_to_origin {
            self.origin_mode
        } else {
            OriginMode::Original
        }
    }
}
