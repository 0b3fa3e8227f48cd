//! Client error taxonomy
//!
//! Local validation failures surface before any network operation is
//! attempted. Network failures split into transient (retried for reads)
//! and rejected (never retried); both carry enough detail to triage a
//! single batch item without re-running the batch.

use thiserror::Error;

use cirrus_select::SelectError;
use cirrus_types::TypeError;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Remote error statuses, one per protocol rejection class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Target does not exist (404)
    NotFound,
    /// Missing or invalid credentials (401)
    Unauthorized,
    /// Authenticated but not permitted (403)
    Forbidden,
    /// Conflicting concurrent modification (409)
    Conflict,
    /// Request body exceeds the service limit (413)
    PayloadTooLarge,
    /// Rate limit hit (429)
    RateLimited,
    /// Service temporarily unavailable (503)
    ServerUnavailable,
    /// Any other server-side failure (5xx)
    Internal,
}

impl RemoteStatus {
    /// Map an HTTP status code to a remote status class
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            404 => Some(Self::NotFound),
            401 => Some(Self::Unauthorized),
            403 => Some(Self::Forbidden),
            409 => Some(Self::Conflict),
            413 => Some(Self::PayloadTooLarge),
            429 => Some(Self::RateLimited),
            503 => Some(Self::ServerUnavailable),
            500..=599 => Some(Self::Internal),
            _ => None,
        }
    }

    /// True when a read hitting this status is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerUnavailable | Self::Internal
        )
    }
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::PayloadTooLarge => "payload too large",
            Self::RateLimited => "rate limited",
            Self::ServerUnavailable => "server unavailable",
            Self::Internal => "internal server error",
        };
        f.write_str(s)
    }
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Selection validation or planning failure
    #[error(transparent)]
    Select(#[from] SelectError),

    /// Type descriptor or buffer codec failure
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Rejected configuration value
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The caller-supplied deadline elapsed; the in-flight operation is
    /// abandoned, not necessarily cancelled server-side
    #[error("Request timed out after {elapsed_ms}ms")]
    Timeout {
        /// Elapsed time before abandonment
        elapsed_ms: u64,
    },

    /// Connection-level failure, retried automatically for reads
    #[error("Transient network error: {0}")]
    Transient(String),

    /// The service rejected the request; never retried
    #[error("Remote rejected request ({status}): {message}")]
    RemoteRejected {
        /// Classified remote status
        status: RemoteStatus,
        /// Response detail, when the service provided one
        message: String,
    },

    /// The batch was cancelled before this item was dispatched
    #[error("Request cancelled")]
    Cancelled,
}

impl ClientError {
    /// Classify an HTTP status code into a client error
    ///
    /// Retryable statuses become `Transient` so the executor's retry
    /// policy treats them like connection failures.
    pub fn from_status(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match RemoteStatus::from_code(code) {
            Some(status) if status.is_retryable() => {
                ClientError::Transient(format!("{status}: {message}"))
            }
            Some(status) => ClientError::RemoteRejected { status, message },
            None => ClientError::RemoteRejected {
                status: RemoteStatus::Internal,
                message: format!("unexpected status {code}: {message}"),
            },
        }
    }

    /// True when the retry policy may re-issue the request
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_) | ClientError::Timeout { .. })
    }
}
