//! Planar CRS selection and forward/inverse transforms.
//!
//! Every transform between two different systems is delegated to PROJ; a
//! transform from a system to itself is the identity.

use std::fmt;

use log::{debug, info};

use crate::crs::{Crs, UtmZone};
use crate::error::{GeoError, Result};
use crate::point_set::{PointSet, SurveyPoint};

mod proj_engine;

use proj_engine::ProjPair;

/// How the target CRS is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CrsChoice {
    /// UTM zone of the centroid of the input points.
    #[default]
    AutoUtm,
    /// Explicit target system.
    Target(Crs),
    /// Leave longitude/latitude untouched.
    Geographic,
}

impl CrsChoice {
    /// Resolves the mutually exclusive `target_crs` / `geographic` options.
    pub fn from_options(target_crs: Option<&str>, geographic: bool) -> Result<Self> {
        match (target_crs, geographic) {
            (Some(code), true) => Err(GeoError::config(format!(
                "target CRS '{code}' cannot be combined with geographic output"
            ))),
            (Some(code), false) => Ok(CrsChoice::Target(Crs::parse(code)?)),
            (None, true) => Ok(CrsChoice::Geographic),
            (None, false) => Ok(CrsChoice::AutoUtm),
        }
    }
}

/// A transform between a source and a target CRS. Built once per point set
/// and reused for every point.
pub struct CrsTransform {
    source: Crs,
    target: Crs,
    /// `None` for the identity.
    pair: Option<ProjPair>,
}

impl fmt::Debug for CrsTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrsTransform")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl CrsTransform {
    /// Builds the transform, failing with [`GeoError::Projection`] when PROJ
    /// does not recognise either system.
    pub fn new(source: &Crs, target: &Crs) -> Result<Self> {
        let pair = if source == target {
            None
        } else {
            Some(ProjPair::new(source.definition(), target.definition())?)
        };
        Ok(Self {
            source: source.clone(),
            target: target.clone(),
            pair,
        })
    }

    pub fn source(&self) -> &Crs {
        &self.source
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    pub fn is_identity(&self) -> bool {
        self.pair.is_none()
    }

    /// Source coordinates (longitude, latitude for geographic systems) to
    /// target coordinates.
    pub fn forward(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let out = match &self.pair {
            None => (x, y),
            Some(pair) => pair.forward(x, y)?,
        };
        check_finite(out, "forward")
    }

    /// Target coordinates back to the source system.
    pub fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let out = match &self.pair {
            None => (x, y),
            Some(pair) => pair.inverse(x, y)?,
        };
        check_finite(out, "inverse")
    }

    /// Re-projects a whole set into a new [`PointSet`]; elevations,
    /// partitions and diagnostics carry over unchanged.
    pub fn apply(&self, points: &PointSet) -> Result<PointSet> {
        points.ensure_non_empty()?;
        if points.crs() != &self.source {
            return Err(GeoError::Projection(format!(
                "point set is in {}, transform expects {}",
                points.crs(),
                self.source
            )));
        }
        let projected = points
            .points()
            .iter()
            .map(|p| {
                let (x, y) = self.forward(p.x, p.y)?;
                Ok(SurveyPoint { x, y, ..*p })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("projected {} points to {}", projected.len(), self.target);
        Ok(points.derive(projected, self.target.clone()))
    }
}

fn check_finite(out: (f64, f64), direction: &str) -> Result<(f64, f64)> {
    if out.0.is_finite() && out.1.is_finite() {
        Ok(out)
    } else {
        Err(GeoError::Projection(format!(
            "{direction} transform produced a non-finite coordinate"
        )))
    }
}

/// Chooses the planar CRS for a geographic point set and projects it.
#[derive(Debug, Clone, Default)]
pub struct ProjectionSelector {
    choice: CrsChoice,
}

impl ProjectionSelector {
    pub fn new(choice: CrsChoice) -> Self {
        Self { choice }
    }

    /// UTM zone for the centroid of `points`.
    pub fn detect_zone(points: &PointSet) -> Result<UtmZone> {
        let centroid = points.centroid().ok_or(GeoError::EmptyInput)?;
        Ok(UtmZone::from_lon_lat(centroid.x, centroid.y))
    }

    /// Target CRS for `points` under the configured choice.
    pub fn target_crs(&self, points: &PointSet) -> Result<Crs> {
        points.ensure_non_empty()?;
        Ok(match &self.choice {
            CrsChoice::AutoUtm => Crs::utm(Self::detect_zone(points)?),
            CrsChoice::Target(crs) => crs.clone(),
            CrsChoice::Geographic => points.crs().clone(),
        })
    }

    /// Builds the transform that [`project`](Self::project) would apply.
    pub fn resolve(&self, points: &PointSet) -> Result<CrsTransform> {
        let target = self.target_crs(points)?;
        if matches!(self.choice, CrsChoice::AutoUtm) && !points.crs().is_geographic() {
            return Err(GeoError::Projection(format!(
                "UTM auto-detection needs geographic input, got {}",
                points.crs()
            )));
        }
        CrsTransform::new(points.crs(), &target)
    }

    /// Returns a re-projected copy of `points`; the resolved CRS is available
    /// from [`PointSet::crs`] on the result.
    pub fn project(&self, points: &PointSet) -> Result<PointSet> {
        let transform = self.resolve(points)?;
        info!(
            "projecting {} points from {} to {}",
            points.len(),
            transform.source(),
            transform.target()
        );
        transform.apply(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point_set::{ElevationUnit, RawPoint};

    fn geographic(coords: &[(f64, f64, f64)]) -> PointSet {
        let raw = coords
            .iter()
            .map(|&(x, y, z)| RawPoint::new(x, y, Some(z)))
            .collect();
        PointSet::from_raw(raw, Crs::wgs84(), ElevationUnit::Meters).unwrap()
    }

    #[test]
    fn options_are_exclusive() {
        assert!(matches!(
            CrsChoice::from_options(Some("EPSG:32614"), true),
            Err(GeoError::Configuration(_))
        ));
        assert_eq!(CrsChoice::from_options(None, false).unwrap(), CrsChoice::AutoUtm);
        assert_eq!(CrsChoice::from_options(None, true).unwrap(), CrsChoice::Geographic);
    }

    #[test]
    fn auto_utm_from_centroid() {
        let set = geographic(&[(-97.7, 30.2, 150.0), (-97.6, 30.3, 160.0)]);
        let projected = ProjectionSelector::default().project(&set).unwrap();
        assert_eq!(projected.crs().epsg(), Some(32614));
        assert_eq!(projected.points()[0].z, 150.0);
        assert!(projected.points()[0].x > 100_000.0 && projected.points()[0].x < 900_000.0);
    }

    #[test]
    fn southern_hemisphere() {
        let set = geographic(&[(151.2, -33.9, 10.0)]);
        let crs = ProjectionSelector::default().target_crs(&set).unwrap();
        assert_eq!(crs.epsg(), Some(32756));
    }

    #[test]
    fn geographic_mode_is_identity() {
        let set = geographic(&[(-97.7, 30.2, 150.0)]);
        let selector = ProjectionSelector::new(CrsChoice::Geographic);
        assert!(selector.resolve(&set).unwrap().is_identity());
        let out = selector.project(&set).unwrap();
        assert_eq!(out.points(), set.points());
    }

    #[test]
    fn unknown_target_is_a_projection_error() {
        let set = geographic(&[(-97.7, 30.2, 150.0)]);
        let selector = ProjectionSelector::new(CrsChoice::Target(Crs::from_epsg(999_999)));
        assert!(matches!(selector.project(&set), Err(GeoError::Projection(_))));
    }

    #[test]
    fn any_known_target_is_accepted() {
        let set = geographic(&[(2.35, 48.85, 35.0)]);
        let selector = ProjectionSelector::new(CrsChoice::Target(Crs::from_epsg(2154)));
        let out = selector.project(&set).unwrap();
        assert_eq!(out.crs().epsg(), Some(2154));
        // Lambert-93 puts Paris near (652 km, 6862 km).
        assert!((out.points()[0].x - 652_000.0).abs() < 5_000.0);
        assert!((out.points()[0].y - 6_862_000.0).abs() < 5_000.0);
    }

    #[test]
    fn empty_set_fails_fast() {
        let set = PointSet::from_raw(Vec::new(), Crs::wgs84(), ElevationUnit::Meters).unwrap();
        assert!(matches!(
            ProjectionSelector::default().project(&set),
            Err(GeoError::EmptyInput)
        ));
    }
}
