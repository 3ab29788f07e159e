//! Error types for the reconciler crate.

use thiserror::Error;

use crate::target::TargetError;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Store error, returned unchanged.
    #[error(transparent)]
    Store(#[from] autoscaler_store::Error),

    /// Object model error.
    #[error(transparent)]
    Core(#[from] autoscaler_core::Error),

    /// Target lookup or ownership failure.
    #[error(transparent)]
    Target(#[from] TargetError),

    /// The resource failed validation.
    #[error("{kind} validation error: {message}")]
    Validation { kind: String, message: String },

    /// None of the candidate target kinds can be resolved.
    #[error("no supported target types available")]
    NoSupportedTargets,

    /// The status loop was asked to run after it stopped.
    #[error("status loop stopped")]
    LoopStopped,
}

impl Error {
    pub fn validation(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// True for a store `NotFound`.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }

    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }
}
