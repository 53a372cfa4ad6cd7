//! Error types for the Moran's I pipeline.

use thiserror::Error;

/// Errors raised before or during an analysis run.
///
/// Degenerate statistics (constant attribute) are not errors: they surface as
/// a NaN sentinel plus a [`crate::analysis::Warning`] on the result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Insufficient data: {available} features available, at least {required} required")]
    InsufficientData { available: usize, required: usize },

    #[error("Length mismatch: {polygons} polygons but {values} attribute values")]
    LengthMismatch { polygons: usize, values: usize },

    #[error("Attribute value at index {index} is not finite")]
    NonFiniteValue { index: usize },

    #[error("Polygon at index {index} is empty and has no centroid")]
    EmptyGeometry { index: usize },

    #[error("Matrix dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Permutation test cancelled after {completed} of {requested} trials")]
    Cancelled { completed: usize, requested: usize },
}

impl Error {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for Moran's I operations.
pub type Result<T> = std::result::Result<T, Error>;
