//! Error types for the store crate.

use std::fmt;

use autoscaler_core::ObjectKey;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Store error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The addressed object does not exist.
    NotFound { key: ObjectKey },
    /// Create was called for an object that already exists.
    AlreadyExists { key: ObjectKey },
    /// The caller's resource version is stale.
    Conflict {
        key: ObjectKey,
        expected: String,
        found: String,
    },
    /// The object could not be encoded or decoded.
    Conversion { reason: String },
    /// The object itself is unusable (bad apiVersion, empty name).
    Invalid { reason: String },
    /// The backend could not serve the request; retrying may succeed.
    Unavailable { operation: String, reason: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "{key} not found"),
            Self::AlreadyExists { key } => write!(f, "{key} already exists"),
            Self::Conflict {
                key,
                expected,
                found,
            } => write!(
                f,
                "conflict on {key}: object has been modified (resource version {found}, expected {expected})"
            ),
            Self::Conversion { reason } => write!(f, "conversion error: {reason}"),
            Self::Invalid { reason } => write!(f, "invalid object: {reason}"),
            Self::Unavailable { operation, reason } => {
                write!(f, "store operation '{operation}' failed: {reason}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<autoscaler_core::Error> for Error {
    fn from(err: autoscaler_core::Error) -> Self {
        match err {
            autoscaler_core::Error::InvalidApiVersion(_) => Self::invalid(err.to_string()),
            _ => Self::conversion(err.to_string()),
        }
    }
}

impl Error {
    pub fn not_found(key: ObjectKey) -> Self {
        Self::NotFound { key }
    }

    pub fn already_exists(key: ObjectKey) -> Self {
        Self::AlreadyExists { key }
    }

    pub fn conflict(key: ObjectKey, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::Conflict {
            key,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn conversion(reason: impl Into<String>) -> Self {
        Self::Conversion {
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    pub fn unavailable(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
