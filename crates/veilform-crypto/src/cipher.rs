//! Symmetric content encryption
//!
//! Uses ChaCha20-Poly1305 with a random nonce per call; the sealed form is
//! `nonce || ciphertext`. [`ContentCipher`] is the seam the sealer and opener
//! encrypt through.

use std::sync::Arc;

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;

use veilform_core::{EnvelopeError, EnvelopeResult};

use crate::content_key::ContentKey;

/// Nonce size for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Symmetric encryption of envelope content
pub trait ContentCipher: Send + Sync {
    /// Encrypt plaintext, returning `nonce || ciphertext`
    fn encrypt(&self, key: &ContentKey, plaintext: &[u8]) -> EnvelopeResult<Vec<u8>>;

    /// Decrypt `nonce || ciphertext`
    ///
    /// Authentication failures are reported as
    /// [`EnvelopeError::IntegrityMismatch`]: the caller only decrypts with a
    /// key it has already verified.
    fn decrypt(&self, key: &ContentKey, sealed: &[u8]) -> EnvelopeResult<Vec<u8>>;
}

impl<C: ContentCipher + ?Sized> ContentCipher for Arc<C> {
    fn encrypt(&self, key: &ContentKey, plaintext: &[u8]) -> EnvelopeResult<Vec<u8>> {
        (**self).encrypt(key, plaintext)
    }

    fn decrypt(&self, key: &ContentKey, sealed: &[u8]) -> EnvelopeResult<Vec<u8>> {
        (**self).decrypt(key, sealed)
    }
}

/// ChaCha20-Poly1305 content cipher
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaChaCipher;

impl ContentCipher for ChaChaCipher {
    fn encrypt(&self, key: &ContentKey, plaintext: &[u8]) -> EnvelopeResult<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
            .map_err(|e| EnvelopeError::key_wrap(e.to_string()))?;

        // Generate random nonce
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| EnvelopeError::Serialization(format!("encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, key: &ContentKey, sealed: &[u8]) -> EnvelopeResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(EnvelopeError::IntegrityMismatch);
        }

        let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
            .map_err(|e| EnvelopeError::key_wrap(e.to_string()))?;

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| EnvelopeError::IntegrityMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = ContentKey::generate();
        let plaintext = b"Hello, sealed world!";

        let sealed = ChaChaCipher.encrypt(&key, plaintext).unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);

        let decrypted = ChaChaCipher.decrypt(&key, &sealed).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_empty_content() {
        let key = ContentKey::generate();
        let sealed = ChaChaCipher.encrypt(&key, b"").unwrap();
        assert!(ChaChaCipher.decrypt(&key, &sealed).unwrap().is_empty());
    }

    #[test]
    fn test_different_nonces_produce_different_ciphertext() {
        let key = ContentKey::generate();
        let sealed1 = ChaChaCipher.encrypt(&key, b"Same content").unwrap();
        let sealed2 = ChaChaCipher.encrypt(&key, b"Same content").unwrap();
        assert_ne!(sealed1, sealed2);
    }

    #[test]
    fn test_tampered_ciphertext_is_integrity_mismatch() {
        let key = ContentKey::generate();
        let mut sealed = ChaChaCipher.encrypt(&key, b"Secret content").unwrap();
        sealed[NONCE_SIZE] ^= 0x01;

        assert!(matches!(
            ChaChaCipher.decrypt(&key, &sealed),
            Err(EnvelopeError::IntegrityMismatch)
        ));
    }

    #[test]
    fn test_truncated_input_is_integrity_mismatch() {
        let key = ContentKey::generate();
        assert!(matches!(
            ChaChaCipher.decrypt(&key, &[0u8; NONCE_SIZE]),
            Err(EnvelopeError::IntegrityMismatch)
        ));
    }
}
