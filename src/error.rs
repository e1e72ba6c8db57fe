//! Error types for the PagerDuty provider.
//!
//! Every remote failure is folded into a [`ProviderError`] variant, and every
//! variant maps onto exactly one [`ErrorClass`]. The reconciler's retry loop
//! only ever consults [`ProviderError::class`].

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// How the retry loop and the reconciler treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient failure (timeout, 5xx, throttling); worth another attempt.
    Retryable,
    /// Permanent failure; abort immediately and surface to the caller.
    Terminal,
    /// The remote object does not exist.
    NotFound,
}

/// Errors that can occur while managing a PagerDuty user.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An HTTP transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The remote rejected the request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }

    /// Classify this error for the retry loop.
    ///
    /// Pure: depends only on the variant (and, for transport errors, on the
    /// kind reported by reqwest).
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::ResourceExhausted(_) | Self::Unavailable(_) | Self::DeadlineExceeded(_) => {
                ErrorClass::Retryable
            },
            Self::Transport(err) if err.is_timeout() || err.is_connect() => ErrorClass::Retryable,
            Self::Transport(err) => match err.status() {
                Some(status) if status.is_server_error() || status.as_u16() == 429 => {
                    ErrorClass::Retryable
                },
                _ => ErrorClass::Terminal,
            },
            _ => ErrorClass::Terminal,
        }
    }

    /// Shorthand for `self.class() == ErrorClass::Retryable`.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Shorthand for `self.class() == ErrorClass::NotFound`.
    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }
}
