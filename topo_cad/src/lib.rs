//! Derivation of topographic products from sparse survey points.
//!
//! Points are validated into a [`PointSet`], projected to a planar CRS by
//! [`ProjectionSelector`] and then resampled onto an [`ElevationGrid`],
//! traced into contours, triangulated into a [`Mesh`] or analysed for slope.
//! [`Pipeline`] wires the stages together from a [`PipelineConfig`].

pub mod config;
pub mod contour;
pub mod crs;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod hull;
pub mod local_origin;
pub mod mesh;
pub mod pipeline;
pub mod point_set;
pub mod progress;
pub mod projection;
pub mod slope;
pub mod triangulation;

pub use config::PipelineConfig;
pub use contour::{Contour, ContourExtractor, ContourLabel, ContourParams, ContourSet};
pub use crs::{Crs, UtmZone};
pub use diagnostics::{Diagnostics, Fallback, RejectedPoint};
pub use error::{GeoError, Result};
pub use grid::{ElevationGrid, GridParams, GridSampler, GridSpec, InterpolationMethod};
pub use local_origin::{CoordinateTranslator, Localized, OriginMode, Translate};
pub use mesh::{Face, Mesh, MeshBuilder, MeshKind, MeshMode, MeshParams};
pub use pipeline::Pipeline;
pub use point_set::{ElevationUnit, Partition, PointSet, RawPoint, SurveyPoint};
pub use progress::{NoProgress, Progress};
pub use projection::{CrsChoice, CrsTransform, ProjectionSelector};
pub use slope::{SlopeAnalyzer, SlopeField, SlopeParams, SlopeStats, SlopeUnit};
