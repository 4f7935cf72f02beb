//! One-time symmetric content keys
//!
//! Every envelope gets a fresh random 256-bit key. The key never leaves the
//! process unwrapped except as an access code distributed out-of-band.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use veilform_core::{CONTENT_KEY_SIZE, EnvelopeError, EnvelopeResult};

/// Symmetric key encrypting a single envelope's plaintext
///
/// The key bytes are zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey {
    bytes: [u8; CONTENT_KEY_SIZE],
}

impl ContentKey {
    /// Generate a new random content key
    pub fn generate() -> Self {
        let mut bytes = [0u8; CONTENT_KEY_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create from raw key bytes
    pub fn from_bytes(bytes: [u8; CONTENT_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Canonical exported form (the raw key bytes)
    ///
    /// The key hash in an envelope proof is the digest of these bytes.
    pub fn as_bytes(&self) -> &[u8; CONTENT_KEY_SIZE] {
        &self.bytes
    }

    /// Encode as an access code for sharing links
    pub fn to_access_code(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.bytes)
    }

    /// Decode an access code
    pub fn from_access_code(code: &str) -> EnvelopeResult<Self> {
        let mut decoded = URL_SAFE_NO_PAD
            .decode(code.trim().as_bytes())
            .map_err(|e| EnvelopeError::key_wrap(format!("malformed access code: {}", e)))?;

        if decoded.len() != CONTENT_KEY_SIZE {
            let actual = decoded.len();
            decoded.zeroize();
            return Err(EnvelopeError::key_wrap(format!(
                "access code has wrong length: {} (expected {})",
                actual, CONTENT_KEY_SIZE
            )));
        }

        let mut bytes = [0u8; CONTENT_KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentKey([REDACTED])")
    }
}

impl PartialEq for ContentKey {
    fn eq(&self, other: &Self) -> bool {
        crate::integrity::constant_time_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for ContentKey {}
