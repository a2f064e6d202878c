//! Error taxonomy shared by every stage of the derivation pipeline.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GeoError>;

/// Errors raised while deriving surfaces from survey points.
#[derive(Debug, Error)]
pub enum GeoError {
    /// The point set handed to a stage contains no points at all.
    #[error("point set is empty")]
    EmptyInput,

    /// Every input point was rejected during validation.
    #[error("no valid points remain: {rejected} of {total} rejected")]
    InvalidCoordinate { rejected: usize, total: usize },

    /// The algorithm needs more (or less degenerate) data than it was given.
    #[error("{operation}: {reason}")]
    InsufficientData {
        operation: &'static str,
        reason: String,
    },

    /// The coordinate reference system is unknown or the transform failed.
    #[error("projection error: {0}")]
    Projection(String),

    /// Parameters are out of range or mutually exclusive.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

impl GeoError {
    pub(crate) fn insufficient(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
