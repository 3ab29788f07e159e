//! Error types for the operator binary.

use thiserror::Error;

/// Result type alias for operator operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A config or manifest file could not be read.
    #[error("io error: {0}")]
    IoError(String),

    /// A config or manifest file is malformed.
    #[error("parse error: {0}")]
    ParseError(String),

    /// An environment override has an unusable value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The merged configuration is inconsistent.
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Reconciler(#[from] autoscaler_reconciler::Error),

    #[error(transparent)]
    Store(#[from] autoscaler_store::Error),

    #[error(transparent)]
    Core(#[from] autoscaler_core::Error),
}

impl Error {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}
