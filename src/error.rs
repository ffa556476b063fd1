//! Error types for mixed-precision training.

use thiserror::Error;

/// Mixed-precision errors
///
/// Numeric trouble (overflowing or NaN gradients) is never an error; it is
/// absorbed by the skip-and-rescale mechanism. These variants cover
/// structural inconsistencies that indicate a programming error and must
/// abort the step.
#[derive(Debug, Error)]
pub enum MpError {
    #[error("no fp32 master copy for reduced-precision parameter '{name}': promote and apply were called on inconsistent data")]
    MissingMaster { name: String },

    #[error("shape mismatch for '{name}': expected {expected} elements, got {got}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for mixed-precision operations
pub type Result<T> = std::result::Result<T, MpError>;
