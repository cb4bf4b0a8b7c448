//! Error types for transform setup and evaluation.
//!
//! Setup errors (`Geometry`, `LengthMismatch`, `InvalidConfiguration`) abort
//! configuration. `OutOfSupport` is the expected, per-point condition raised by
//! derivative queries near the grid border.

use thiserror::Error;

/// Main error type for transform operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Invalid grid geometry (singular direction, degenerate spacing, ...).
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Parameters or fixed parameters used before being set.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// The query point has no complete control-point window.
    #[error("Point {point:?} is outside the B-spline support region")]
    OutOfSupport { point: Vec<f64> },

    /// A parameter vector has the wrong length.
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// An output dimension or grid index beyond the stored coefficients.
    #[error("Index out of range: {index} (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Unsupported spline order, dimension, or malformed configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

impl TransformError {
    /// Create a geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    /// Create a not-initialized error.
    pub fn not_initialized(msg: impl Into<String>) -> Self {
        Self::NotInitialized(msg.into())
    }

    /// Create an out-of-support error for the given point coordinates.
    pub fn out_of_support(point: &[f64]) -> Self {
        Self::OutOfSupport {
            point: point.to_vec(),
        }
    }

    /// Create a length mismatch error.
    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        Self::LengthMismatch { expected, actual }
    }

    /// Create an index out of range error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Whether this is the non-fatal out-of-support condition.
    pub fn is_out_of_support(&self) -> bool {
        matches!(self, Self::OutOfSupport { .. })
    }
}
