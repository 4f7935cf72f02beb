//! Error types for response sessions

use thiserror::Error;
use veilform_core::{EnvelopeError, FormId, Recovery};

use crate::session::SessionMode;

/// Errors that can occur while composing or submitting a response
#[derive(Debug, Error)]
pub enum SessionError {
    /// Opening or sealing an envelope failed
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Form service error
    #[error("Service error: {0}")]
    Client(#[from] veilform_client::ClientError),

    /// Draft storage error
    #[error("Storage error: {0}")]
    Storage(#[from] veilform_storage::StorageError),

    /// The form does not accept new responses
    #[error("Form {0} is closed to new responses")]
    FormClosed(FormId),

    /// The session cannot change answers or submit in its current mode
    #[error("Session is read-only ({0})")]
    ReadOnly(SessionMode),

    /// The guard is closed after a failed submission until rearmed
    #[error("Previous submission failed; rearm before submitting again")]
    AwaitingRearm,
}

impl SessionError {
    /// Map the failure to the action the UI is expected to take
    pub fn recovery(&self) -> Recovery {
        match self {
            SessionError::Envelope(e)
            | SessionError::Client(veilform_client::ClientError::Envelope(e)) => e.recovery(),
            SessionError::Client(e) if e.is_transient() => Recovery::Retry,
            SessionError::Client(_)
            | SessionError::Storage(_)
            | SessionError::FormClosed(_)
            | SessionError::ReadOnly(_)
            | SessionError::AwaitingRearm => Recovery::HardStop,
        }
    }
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
