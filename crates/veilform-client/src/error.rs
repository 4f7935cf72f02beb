//! Error types for the form service client

use thiserror::Error;
use veilform_core::EnvelopeError;

/// Errors that can occur talking to the form storage service
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with a non-empty `err`
    #[error("Rejected by service: {0}")]
    Rejected(String),

    /// Connection or protocol failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status without a service error message
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Client misconfiguration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Envelope received from the service is malformed
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
}

impl ClientError {
    /// Create a new Rejected error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Create a new Decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Timeout(_) => true,
            ClientError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
