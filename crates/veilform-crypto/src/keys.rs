//! Long-term reader key pairs
//!
//! A key pair is an X25519 static secret plus its public key. The public key,
//! hex encoded, is the reader's [`RecipientId`].

use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use veilform_core::{EnvelopeError, EnvelopeResult, IdentityError, PUBLIC_KEY_SIZE, RecipientId};

/// An X25519 key pair owned by one party
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; PUBLIC_KEY_SIZE]);
        rand::rng().fill_bytes(bytes.as_mut_slice());
        Self::from_secret_bytes(*bytes)
    }

    /// Restore a key pair from its secret bytes
    pub fn from_secret_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Restore a key pair from a hex encoded secret
    pub fn from_secret_hex(encoded: &str) -> EnvelopeResult<Self> {
        let decoded = Zeroizing::new(
            hex::decode(encoded.trim())
                .map_err(|e| IdentityError::InvalidFormat(format!("secret key: {}", e)))?,
        );
        let bytes = <[u8; PUBLIC_KEY_SIZE]>::try_from(decoded.as_slice()).map_err(|_| {
            IdentityError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: decoded.len(),
            }
        })?;
        Ok(Self::from_secret_bytes(bytes))
    }

    /// Hex encoding of the secret, for persisting to a key file
    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.secret.to_bytes()))
    }

    /// The static secret
    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    /// The public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Recipient identifier of this key pair
    pub fn recipient_id(&self) -> RecipientId {
        RecipientId::from_public_key(self.public.as_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.recipient_id().short_id())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Parse a recipient identifier back into an X25519 public key
pub fn public_key_of(recipient: &RecipientId) -> EnvelopeResult<PublicKey> {
    if recipient.is_public() {
        return Err(EnvelopeError::key_wrap(
            "the public entry is not a key-holding recipient",
        ));
    }
    Ok(PublicKey::from(recipient.to_public_key()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_distinct() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_ne!(a.recipient_id(), b.recipient_id());
    }

    #[test]
    fn test_secret_hex_restores_same_identity() {
        let pair = KeyPair::generate();
        let restored = KeyPair::from_secret_hex(&pair.secret_hex()).unwrap();
        assert_eq!(restored.recipient_id(), pair.recipient_id());
    }

    #[test]
    fn test_from_secret_hex_rejects_bad_input() {
        assert!(matches!(
            KeyPair::from_secret_hex("not hex"),
            Err(EnvelopeError::KeyWrap(_))
        ));
        assert!(matches!(
            KeyPair::from_secret_hex("abcd"),
            Err(EnvelopeError::KeyWrap(_))
        ));
    }

    #[test]
    fn test_public_key_of_recipient_id() {
        let pair = KeyPair::generate();
        let parsed = public_key_of(&pair.recipient_id()).unwrap();
        assert_eq!(parsed.as_bytes(), pair.public_key().as_bytes());

        assert!(public_key_of(&RecipientId::public()).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let pair = KeyPair::generate();
        let debug = format!("{:?}", pair);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(pair.secret_hex().as_str()));
    }
}
