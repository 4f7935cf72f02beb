//! Identifiers used across the envelope protocol
//!
//! - [`RecipientId`]: key of the recipient keys map. For key-holding
//!   recipients it is the lowercase hex of their X25519 public key; password
//!   recipients use a free-form label.
//! - [`FormId`]: identifier the storage service addresses forms by.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Size of an X25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Identifier of a recipient in an envelope's recipient keys map
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    /// Reserved id under which public envelopes expose their content key
    pub const PUBLIC: &'static str = "public";

    /// Default label for password recipients
    pub const PASSWORD: &'static str = "password";

    /// Create a recipient id from an arbitrary label
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The recipient id for a public key
    pub fn from_public_key(public_key: &[u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(hex::encode(public_key))
    }

    /// The reserved id of the public access entry
    pub fn public() -> Self {
        Self(Self::PUBLIC.to_string())
    }

    /// Whether this is the reserved public access entry
    pub fn is_public(&self) -> bool {
        self.0 == Self::PUBLIC
    }

    /// Decode the id back into public key bytes
    pub fn to_public_key(&self) -> Result<[u8; PUBLIC_KEY_SIZE], IdentityError> {
        let bytes = hex::decode(&self.0)
            .map_err(|e| IdentityError::InvalidFormat(format!("{}: {}", self.short_id(), e)))?;
        <[u8; PUBLIC_KEY_SIZE]>::try_from(bytes.as_slice()).map_err(|_| {
            IdentityError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            }
        })
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get a short display form (for logging)
    pub fn short_id(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecipientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of a published form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormId(String);

impl FormId {
    /// Create a form id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FormId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
