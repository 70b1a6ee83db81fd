//! Error types for the HuggingPlace client.

use std::fmt::Display;

use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, HuggingPlaceError>;

/// Errors that can occur while configuring the client or logging.
#[derive(Debug, Error)]
pub enum HuggingPlaceError {
    /// Missing or malformed configuration. Raised at construction.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed log call, or HTTP 400 from the backend.
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP 401.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// HTTP 429.
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// HTTP 5xx.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other unexpected status.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Connection failure or timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HuggingPlaceError {
    /// Map a non-success HTTP status to the matching error kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => HuggingPlaceError::Validation(message),
            401 => HuggingPlaceError::Authentication(message),
            429 => HuggingPlaceError::RateLimit(message),
            500..=599 => HuggingPlaceError::Server { status, message },
            _ => HuggingPlaceError::Api { status, message },
        }
    }

    /// HTTP status that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HuggingPlaceError::Authentication(_) => Some(401),
            HuggingPlaceError::RateLimit(_) => Some(429),
            HuggingPlaceError::Server { status, .. } | HuggingPlaceError::Api { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HuggingPlaceError {
    fn from(e: reqwest::Error) -> Self {
        HuggingPlaceError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for HuggingPlaceError {
    fn from(e: serde_json::Error) -> Self {
        HuggingPlaceError::Serialization(e.to_string())
    }
}

impl From<huggingplace_trace::TraceError> for HuggingPlaceError {
    fn from(e: huggingplace_trace::TraceError) -> Self {
        HuggingPlaceError::Configuration(e.to_string())
    }
}

/// Failure of [`HuggingPlace::log_with_timing`](crate::HuggingPlace::log_with_timing).
#[derive(Debug, Error)]
pub enum TimedLogError<E: Display> {
    /// The response generator failed. Its error was logged before returning.
    #[error("Response generation failed: {0}")]
    Generator(E),

    /// Logging the interaction failed.
    #[error(transparent)]
    Log(#[from] HuggingPlaceError),
}
