//! Normalised survey point sets.
//!
//! External readers hand over [`RawPoint`] records; [`PointSet::from_raw`]
//! validates them, normalises elevations to metres and counts everything it
//! drops or defaults.

use log::{info, warn};

use crate::crs::Crs;
use crate::diagnostics::Diagnostics;
use crate::error::{GeoError, Result};
use crate::geometry::{Bounds, Point, Point3};

const FEET_TO_METERS: f64 = 0.3048;

/// Unit of the incoming elevation values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevationUnit {
    #[default]
    Meters,
    Feet,
}

impl ElevationUnit {
    /// Multiplier converting this unit to metres.
    pub fn to_meters(self) -> f64 {
        match self {
            ElevationUnit::Meters => 1.0,
            ElevationUnit::Feet => FEET_TO_METERS,
        }
    }
}

/// A point record as produced by an external reader, before validation.
/// Non-numeric fields are represented as NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub label: Option<String>,
}

impl RawPoint {
    pub fn new(x: f64, y: f64, z: Option<f64>) -> Self {
        Self {
            x,
            y,
            z,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builds a record from text fields. Unparsable fields become NaN so the
    /// point is rejected during validation; a blank elevation is treated as
    /// missing.
    pub fn from_fields(x: &str, y: &str, z: Option<&str>) -> Self {
        let parse = |s: &str| s.trim().parse::<f64>().unwrap_or(f64::NAN);
        let z = match z.map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(parse(s)),
        };
        Self::new(parse(x), parse(y), z)
    }
}

/// A validated survey point. `z` is in metres; `has_elevation` is `false`
/// when the source carried no elevation and `z` was defaulted to `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SurveyPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub has_elevation: bool,
}

impl SurveyPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            has_elevation: true,
        }
    }

    pub fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn xyz(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

/// Contiguous run of points that came from one input source.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Partition {
    pub label: String,
    pub start: usize,
    pub len: usize,
}

/// Ordered survey points expressed in a single CRS.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointSet {
    points: Vec<SurveyPoint>,
    crs: Crs,
    partitions: Vec<Partition>,
    diagnostics: Diagnostics,
}

impl PointSet {
    /// Validates raw records. Points with non-finite coordinates (or, for
    /// geographic systems, longitude/latitude outside ±180/±90) are rejected
    /// and counted. Fails only when the input was non-empty and nothing
    /// survived; an empty input yields an empty set, which every stage then
    /// refuses with [`GeoError::EmptyInput`].
    pub fn from_raw(raw: Vec<RawPoint>, crs: Crs, unit: ElevationUnit) -> Result<Self> {
        let total = raw.len();
        let geographic = crs.is_geographic();
        let factor = unit.to_meters();
        let mut diagnostics = Diagnostics {
            input_points: total,
            ..Default::default()
        };
        let mut points = Vec::with_capacity(total);
        for (index, record) in raw.into_iter().enumerate() {
            if !record.x.is_finite() || !record.y.is_finite() {
                diagnostics.reject(index, "non-numeric or non-finite horizontal coordinate");
                continue;
            }
            if geographic && !(-180.0..=180.0).contains(&record.x) {
                diagnostics.reject(index, format!("longitude {} out of range", record.x));
                continue;
            }
            if geographic && !(-90.0..=90.0).contains(&record.y) {
                diagnostics.reject(index, format!("latitude {} out of range", record.y));
                continue;
            }
            let point = match record.z {
                Some(z) if z.is_finite() => SurveyPoint::new(record.x, record.y, z * factor),
                Some(_) => {
                    diagnostics.reject(index, "non-numeric or non-finite elevation");
                    continue;
                }
                None => {
                    diagnostics.defaulted_elevations += 1;
                    SurveyPoint {
                        x: record.x,
                        y: record.y,
                        z: 0.0,
                        has_elevation: false,
                    }
                }
            };
            points.push(point);
        }
        diagnostics.accepted_points = points.len();
        if total > 0 && points.is_empty() {
            return Err(GeoError::InvalidCoordinate {
                rejected: diagnostics.rejected_points(),
                total,
            });
        }
        if diagnostics.defaulted_elevations > 0 {
            warn!(
                "{} points had no elevation and were set to 0.0",
                diagnostics.defaulted_elevations
            );
        }
        info!(
            "validated {} of {} points in {}",
            points.len(),
            total,
            crs
        );
        let partitions = vec![Partition {
            label: String::new(),
            start: 0,
            len: points.len(),
        }];
        Ok(Self {
            points,
            crs,
            partitions,
            diagnostics,
        })
    }

    /// Wraps already projected 3D points, rejecting non-finite ones.
    pub fn from_points(points: Vec<Point3>, crs: Crs) -> Result<Self> {
        let raw = points
            .into_iter()
            .map(|p| RawPoint::new(p.x, p.y, Some(p.z)))
            .collect();
        Self::from_raw(raw, crs, ElevationUnit::Meters)
    }

    /// Concatenates point sets in the given order, one labelled partition per
    /// input. All inputs must share a CRS.
    pub fn merge(sets: Vec<(String, PointSet)>) -> Result<Self> {
        let crs = match sets.first() {
            Some((_, set)) => set.crs.clone(),
            None => return Err(GeoError::EmptyInput),
        };
        let mut points = Vec::new();
        let mut partitions = Vec::with_capacity(sets.len());
        let mut diagnostics = Diagnostics::default();
        let mut input_offset = 0;
        for (label, set) in sets {
            if set.crs != crs {
                return Err(GeoError::config(format!(
                    "cannot merge '{}' in {} with points in {}",
                    label, set.crs, crs
                )));
            }
            partitions.push(Partition {
                label,
                start: points.len(),
                len: set.points.len(),
            });
            diagnostics.absorb(&set.diagnostics, input_offset);
            input_offset += set.diagnostics.input_points;
            points.extend(set.points);
        }
        Ok(Self {
            points,
            crs,
            partitions,
            diagnostics,
        })
    }

    /// New set sharing partitions and diagnostics but holding `points` in
    /// `crs`. Used for re-projected and translated copies.
    pub(crate) fn derive(&self, points: Vec<SurveyPoint>, crs: Crs) -> Self {
        Self {
            points,
            crs,
            partitions: self.partitions.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }

    /// Fails with [`GeoError::EmptyInput`] for an empty set.
    pub fn ensure_non_empty(&self) -> Result<()> {
        if self.points.is_empty() {
            Err(GeoError::EmptyInput)
        } else {
            Ok(())
        }
    }

    pub fn points(&self) -> &[SurveyPoint] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut [SurveyPoint] {
        &mut self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Points of the partition with the given label.
    pub fn partition(&self, label: &str) -> Option<&[SurveyPoint]> {
        self.partitions
            .iter()
            .find(|p| p.label == label)
            .map(|p| &self.points[p.start..p.start + p.len])
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.points.iter().map(SurveyPoint::xy))
    }

    /// Arithmetic mean of the horizontal coordinates.
    pub fn centroid(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }

    /// Lowest and highest elevation.
    pub fn z_range(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?.z;
        Some(
            self.points
                .iter()
                .fold((first, first), |(lo, hi), p| (lo.min(p.z), hi.max(p.z))),
        )
    }

    /// First lowest and first highest point by elevation.
    pub fn extremes(&self) -> Option<(Point3, Point3)> {
        let first = self.points.first()?;
        let (lo, hi) = self.points.iter().fold((first, first), |(lo, hi), p| {
            (
                if p.z.total_cmp(&lo.z).is_lt() { p } else { lo },
                if p.z.total_cmp(&hi.z).is_gt() { p } else { hi },
            )
        });
        Some((lo.xyz(), hi.xyz()))
    }
}

impl From<&PointSet> for geo_types::MultiPoint<f64> {
    fn from(set: &PointSet) -> Self {
        set.points
            .iter()
            .map(|p| geo_types::Point::new(p.x, p.y))
            .collect::<Vec<_>>()
            .into()
    }
}
