//! Error types for Veilform

use thiserror::Error;

/// Failures produced while sealing, validating or opening an envelope
///
/// The variants are deliberately distinct so callers can tell a wrong
/// credential apart from corrupted data.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Access denied: reader is not a recipient and supplied no access code")]
    AccessDenied,

    #[error("Credential mismatch: recovered key does not match the key hash")]
    CredentialMismatch,

    #[error("Integrity mismatch: content does not match the content hash")]
    IntegrityMismatch,

    #[error("Key wrap error: {0}")]
    KeyWrap(String),

    #[error("Transient failure: {0}")]
    TransientFailure(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// What the user-facing layer should do after an envelope failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Ask for the credential again (wrong password or key)
    Reprompt,
    /// Stop; retrying with the same input cannot succeed
    HardStop,
    /// The operation may succeed if attempted again later
    Retry,
}

impl EnvelopeError {
    /// Create a new Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new KeyWrap error
    pub fn key_wrap(message: impl Into<String>) -> Self {
        Self::KeyWrap(message.into())
    }

    /// Create a new TransientFailure error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientFailure(message.into())
    }

    /// Map the failure to the action the UI is expected to take
    pub fn recovery(&self) -> Recovery {
        match self {
            EnvelopeError::CredentialMismatch => Recovery::Reprompt,
            EnvelopeError::TransientFailure(_) => Recovery::Retry,
            EnvelopeError::AccessDenied
            | EnvelopeError::IntegrityMismatch
            | EnvelopeError::KeyWrap(_)
            | EnvelopeError::Validation(_)
            | EnvelopeError::Serialization(_) => Recovery::HardStop,
        }
    }
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(err: serde_json::Error) -> Self {
        EnvelopeError::Serialization(err.to_string())
    }
}

/// Errors related to identifiers and key material encodings
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

impl From<IdentityError> for EnvelopeError {
    fn from(err: IdentityError) -> Self {
        EnvelopeError::KeyWrap(err.to_string())
    }
}

/// Result type alias for envelope operations
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;
