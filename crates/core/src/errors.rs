//! Error taxonomy shared across the sync core.

use thiserror::Error;

/// Result type alias for ledgerbook operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Retry policy class for sync failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Errors that can occur in the sync core.
#[derive(Debug, Error)]
pub enum Error {
    /// Local persistence layer unusable. Non-recoverable in place; the only
    /// remedy is a full cache rebuild from the remote authority.
    #[error("local storage failure: {0}")]
    LocalStorage(String),

    /// Non-success HTTP status from the remote authority.
    #[error("remote error ({status}): {body}")]
    Remote { status: u16, body: String },

    /// Network-level failure (connect, timeout, body transfer).
    #[error("remote unreachable: {0}")]
    Unreachable(String),

    /// Missing or rejected credentials (401/403 or no token configured).
    #[error("authentication error: {0}")]
    Auth(String),

    /// Malformed record rejected before reaching the local store.
    #[error("validation error: {0}")]
    Validation(String),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a local storage error.
    pub fn local_storage(message: impl Into<String>) -> Self {
        Self::LocalStorage(message.into())
    }

    /// Create a remote error from status and body.
    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        Self::Remote {
            status,
            body: body.into(),
        }
    }

    /// Create an unreachable error.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable(message.into())
    }

    /// Create an auth error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status if this is a remote error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Remote { status, .. } => crate::sync::classify_http_status(*status),
            Self::Unreachable(_) => RetryClass::Retryable,
            Self::Auth(_) => RetryClass::ReauthRequired,
            Self::LocalStorage(_) => RetryClass::Permanent,
            Self::Validation(_) => RetryClass::Permanent,
            Self::Serialization(_) => RetryClass::Permanent,
        }
    }
}
