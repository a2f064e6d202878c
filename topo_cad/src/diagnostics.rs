//! Diagnostic metadata carried alongside every derived product.
//!
//! Rejected points, defaulted elevations and every fallback taken by a stage
//! are recorded here instead of being hidden in the numbers.

use log::warn;

/// A point dropped during validation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RejectedPoint {
    /// Position of the record in the caller's input.
    pub index: usize,
    pub reason: String,
}

/// A documented substitute a stage used instead of its primary algorithm.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fallback {
    /// The grid was filled by nearest-neighbour assignment.
    NearestNeighbor { reason: String },
    /// Cells outside the convex hull were filled from the nearest point.
    Extrapolated { cells: usize },
    /// The constrained triangulation failed and the alpha complex triangles
    /// were used directly.
    UnconstrainedTriangulation { reason: String },
}

/// Counts and notes accumulated while a point set flows through the stages.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostics {
    pub input_points: usize,
    pub accepted_points: usize,
    pub rejected: Vec<RejectedPoint>,
    /// Points whose missing elevation was replaced by `0.0`.
    pub defaulted_elevations: usize,
    pub fallbacks: Vec<Fallback>,
}

impl Diagnostics {
    pub fn rejected_points(&self) -> usize {
        self.rejected.len()
    }

    pub(crate) fn reject(&mut self, index: usize, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("rejecting point {}: {}", index, reason);
        self.rejected.push(RejectedPoint { index, reason });
    }

    pub(crate) fn record(&mut self, fallback: Fallback) {
        warn!("fallback: {:?}", fallback);
        self.fallbacks.push(fallback);
    }

    /// Folds the counts of another partition into this one. Rejected indices
    /// of `other` are shifted by `index_offset`.
    pub(crate) fn absorb(&mut self, other: &Diagnostics, index_offset: usize) {
        self.input_points += other.input_points;
        self.accepted_points += other.accepted_points;
        self.defaulted_elevations += other.defaulted_elevations;
        self.rejected.extend(other.rejected.iter().map(|r| RejectedPoint {
            index: r.index + index_offset,
            reason: r.reason.clone(),
        }));
        self.fallbacks.extend(other.fallbacks.iter().cloned());
    }
}
