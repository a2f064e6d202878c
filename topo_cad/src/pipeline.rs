//! End-to-end derivation: raw points to localized products.
//!
//! Stages run one after another on complete inputs. Every product derived
//! from one point set is translated by the same offset, computed from the
//! projected points, so the products stay aligned with each other.

use log::info;

use crate::config::PipelineConfig;
use crate::contour::{ContourExtractor, ContourSet};
use crate::crs::Crs;
use crate::error::{GeoError, Result};
use crate::grid::{ElevationGrid, GridSampler};
use crate::local_origin::{CoordinateTranslator, Localized, Translate};
use crate::mesh::{Mesh, MeshBuilder};
use crate::point_set::{PointSet, RawPoint};
use crate::progress::Progress;
use crate::projection::{CrsChoice, ProjectionSelector};
use crate::slope::{SlopeAnalyzer, SlopeField};

/// Derives grids, contours, meshes and slope fields from prepared points.
///
/// Every product is shifted by the offset of the points it came from, not by
/// its own extent. With `MinCorner` and non-zero padding the grid origin is
/// therefore negative, about `(-padding, -padding)`. A product that
/// needs its own origin can be restored and passed to
/// [`CoordinateTranslator::apply`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    source: Crs,
    selector: ProjectionSelector,
    translator: CoordinateTranslator,
}

impl Pipeline {
    /// Validates `config` and resolves its CRS options.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let source = config.source()?;
        let choice = match config.crs_choice()? {
            // Planar input without an explicit target stays where it is.
            CrsChoice::AutoUtm if !source.is_geographic() => CrsChoice::Target(source.clone()),
            choice => choice,
        };
        Ok(Self {
            translator: CoordinateTranslator::new(config.origin()),
            selector: ProjectionSelector::new(choice),
            source,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validates raw records and projects them to the target CRS.
    pub fn prepare(&self, raw: Vec<RawPoint>) -> Result<PointSet> {
        let set = PointSet::from_raw(raw, self.source.clone(), self.config.elevation_unit)?;
        self.selector.project(&set)
    }

    /// Validates several inputs, merges them in the given order with one
    /// partition per label, and projects the merged set with one transform.
    pub fn prepare_batch(&self, inputs: Vec<(String, Vec<RawPoint>)>) -> Result<PointSet> {
        let count = inputs.len();
        let sets = inputs
            .into_iter()
            .map(|(label, raw)| {
                let set = PointSet::from_raw(raw, self.source.clone(), self.config.elevation_unit)?;
                Ok((label, set))
            })
            .collect::<Result<Vec<_>>>()?;
        let merged = PointSet::merge(sets)?;
        info!("merged {} inputs into {} points", count, merged.len());
        self.selector.project(&merged)
    }

    /// Points translated like the products derived from them.
    pub fn localize(&self, points: &PointSet) -> Result<Localized<PointSet>> {
        points.ensure_non_empty()?;
        Ok(self.translator.apply(points.clone()))
    }

    pub fn elevation_grid(
        &self,
        points: &PointSet,
        progress: &mut dyn Progress,
    ) -> Result<Localized<ElevationGrid>> {
        let grid = self.grid(points, progress)?;
        Ok(self.localized(points, grid))
    }

    pub fn contours(
        &self,
        points: &PointSet,
        progress: &mut dyn Progress,
    ) -> Result<Localized<ContourSet>> {
        let grid = self.grid(points, progress)?;
        let contours =
            ContourExtractor::new(self.config.contour_params()).extract(&grid, progress)?;
        Ok(self.localized(points, contours))
    }

    pub fn mesh(&self, points: &PointSet, progress: &mut dyn Progress) -> Result<Localized<Mesh>> {
        let mesh = MeshBuilder::new(self.config.mesh_params()).build(points, progress)?;
        Ok(self.localized(points, mesh))
    }

    /// Slope needs horizontal distances in metres, so geographic point sets
    /// are refused.
    pub fn slope(
        &self,
        points: &PointSet,
        progress: &mut dyn Progress,
    ) -> Result<Localized<SlopeField>> {
        points.ensure_non_empty()?;
        if points.crs().is_geographic() {
            return Err(GeoError::config(format!(
                "slope needs planar coordinates, points are in {}",
                points.crs()
            )));
        }
        let grid = self.grid(points, progress)?;
        let slope = SlopeAnalyzer::new(self.config.slope_params()).analyze(&grid, progress)?;
        Ok(self.localized(points, slope))
    }

    fn grid(&self, points: &PointSet, progress: &mut dyn Progress) -> Result<ElevationGrid> {
        GridSampler::new(self.config.grid_params()).sample(points, progress)
    }

    fn localized<T: Translate>(&self, points: &PointSet, value: T) -> Localized<T> {
        let offset = self.translator.offset_for(points);
        CoordinateTranslator::apply_offset(value, offset)
    }
}
