//! Core error types for metadata and value parsing.
//!
//! All errors are explicit, typed and recoverable.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("time: invalid duration \"{value}\": {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("invalid quantity \"{value}\": {reason}")]
    InvalidQuantity { value: String, reason: String },

    #[error("invalid apiVersion \"{0}\"")]
    InvalidApiVersion(String),

    #[error("object kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },

    #[error("failed to convert {kind}: {reason}")]
    ConversionFailed { kind: String, reason: String },
}

impl Error {
    /// Create an invalid duration error.
    pub fn invalid_duration(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid quantity error.
    pub fn invalid_quantity(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a kind mismatch error.
    pub fn kind_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::KindMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a conversion error.
    pub fn conversion_failed(kind: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ConversionFailed {
            kind: kind.into(),
            reason: reason.to_string(),
        }
    }
}
