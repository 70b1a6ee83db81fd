//! Error types for trace delivery.

use thiserror::Error;

/// Result type alias for tracing operations.
pub type Result<T> = std::result::Result<T, TraceError>;

/// Errors raised by the tracing layer itself.
///
/// None of these ever escape a traced function: the wrappers log them and
/// carry on with the caller's own result.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The record is missing a required field and was not queued.
    #[error("Invalid trace record: {0}")]
    InvalidRecord(String),

    /// The sender could not be built from its configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single delivery attempt failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure of one HTTP attempt. Every variant is retryable.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint answered with something other than 201.
    #[error("Unexpected status: {status}")]
    Status { status: u16, body: String },

    /// The attempt exceeded its request timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection or protocol failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The record could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Serialization(e.to_string())
    }
}
