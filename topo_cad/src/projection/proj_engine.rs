//! PROJ-backed forward/inverse pair. Axis order is normalised so geographic
//! systems take (longitude, latitude).

use proj::Proj;

use crate::error::{GeoError, Result};

pub(crate) struct ProjPair {
    forward: Proj,
    inverse: Proj,
}

impl ProjPair {
    pub(crate) fn new(source: &str, target: &str) -> Result<Self> {
        let forward = Proj::new_known_crs(source, target, None)
            .map_err(|e| GeoError::Projection(format!("{source} -> {target}: {e}")))?;
        let inverse = Proj::new_known_crs(target, source, None)
            .map_err(|e| GeoError::Projection(format!("{target} -> {source}: {e}")))?;
        Ok(Self { forward, inverse })
    }

    pub(crate) fn forward(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        self.forward
            .convert((x, y))
            .map_err(|e| GeoError::Projection(e.to_string()))
    }

    pub(crate) fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        self.inverse
            .convert((x, y))
            .map_err(|e| GeoError::Projection(e.to_string()))
    }
}
