//! Envelope data model
//!
//! An [`Envelope`] is created once by the sealer and never mutated; an
//! update produces a new envelope with a new proof. The storage service only
//! stores and returns it.
//!
//! The envelope is generic over the plaintext type it carries through the
//! [`Sealable`] trait, which also fixes the type of the cleartext metadata
//! stored next to the ciphertext.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display};
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::encoding::{base64_array, base64_bytes};
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::identity::RecipientId;

/// Size of a digest in bytes (SHA-256)
pub const DIGEST_SIZE: usize = 32;

/// Size of a content key in bytes
pub const CONTENT_KEY_SIZE: usize = 32;

/// Size of the seed stored with a wrapped key (ephemeral public key or salt)
pub const WRAP_SEED_SIZE: usize = 32;

/// Plaintext types that can be carried inside an envelope
pub trait Sealable:
    Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static
{
    /// Cleartext metadata stored in the payload next to the ciphertext
    type Meta: Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Short name of the plaintext kind (for logging)
    const KIND: &'static str;
}

/// Who may recover the content key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Content key is discoverable by any holder of the record
    Public,
    /// Content key requires a recipient entry or an access code
    #[default]
    Protected,
}

impl Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => write!(f, "public"),
            Access::Protected => write!(f, "protected"),
        }
    }
}

/// Symmetric algorithm used for the content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentAlg {
    #[default]
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

/// Scheme used to wrap the content key for key-holding recipients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecipientWrapAlg {
    #[default]
    #[serde(rename = "x25519-hkdf-sha256")]
    X25519HkdfSha256,
}

/// Password key derivation parameters (Argon2id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordKdf {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl PasswordKdf {
    /// OWASP recommended minimum for Argon2id
    pub const DEFAULT_MEMORY_KIB: u32 = 19_456;
    pub const DEFAULT_ITERATIONS: u32 = 2;
    pub const DEFAULT_PARALLELISM: u32 = 1;

    /// Upper bounds accepted from a header (1 GiB of memory)
    pub const MAX_MEMORY_KIB: u32 = 1 << 20;
    pub const MAX_ITERATIONS: u32 = 64;
    pub const MAX_PARALLELISM: u32 = 16;

    /// Create parameters with explicit costs
    pub const fn argon2id(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    /// Reject costs above the accepted bounds
    ///
    /// Headers arrive from storage, so a reader must not derive with
    /// whatever costs a tampered record names.
    pub fn check_bounds(&self) -> EnvelopeResult<()> {
        if self.memory_kib > Self::MAX_MEMORY_KIB {
            return Err(EnvelopeError::validation(format!(
                "argon2id memory cost {} KiB exceeds {} KiB",
                self.memory_kib,
                Self::MAX_MEMORY_KIB
            )));
        }
        if self.iterations > Self::MAX_ITERATIONS {
            return Err(EnvelopeError::validation(format!(
                "argon2id iterations {} exceed {}",
                self.iterations,
                Self::MAX_ITERATIONS
            )));
        }
        if self.parallelism > Self::MAX_PARALLELISM {
            return Err(EnvelopeError::validation(format!(
                "argon2id parallelism {} exceeds {}",
                self.parallelism,
                Self::MAX_PARALLELISM
            )));
        }
        Ok(())
    }
}

impl Default for PasswordKdf {
    fn default() -> Self {
        Self::argon2id(
            Self::DEFAULT_MEMORY_KIB,
            Self::DEFAULT_ITERATIONS,
            Self::DEFAULT_PARALLELISM,
        )
    }
}

/// Key wrapping suite of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyWrapAlg {
    /// Scheme for public key recipients
    pub recipient: RecipientWrapAlg,
    /// Derivation for password recipients
    pub password: PasswordKdf,
}

/// Envelope header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub content_alg: ContentAlg,
    pub key_wrap_alg: KeyWrapAlg,
    pub access: Access,
}

/// A content key wrapped for one recipient
///
/// `seed` is the ephemeral public key (public key recipients) or the salt
/// (password recipients); which one is decided by the reader's credential,
/// not by these bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    #[serde(with = "base64_array")]
    pub seed: [u8; WRAP_SEED_SIZE],
    #[serde(with = "base64_array")]
    pub masked: [u8; CONTENT_KEY_SIZE],
}

/// Envelope payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload<M> {
    /// `nonce || ciphertext` of the serialized plaintext
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// Cleartext metadata
    pub meta: M,
    /// Public key of the party that sealed the envelope
    pub issuer_key: RecipientId,
    /// Public key of the party the content belongs to
    pub owner: RecipientId,
    /// Wrapped content key per recipient
    pub recipient_keys: BTreeMap<RecipientId, WrappedKey>,
    /// Account identifiers invited to the content
    pub invite_list: Vec<String>,
}

/// A SHA-256 digest, hex on the wire
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Wrap raw digest bytes
    pub const fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw digest bytes
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Parse a hex encoded digest
    pub fn from_hex(encoded: &str) -> EnvelopeResult<Self> {
        let bytes = hex::decode(encoded)
            .map_err(|e| EnvelopeError::validation(format!("invalid digest hex: {}", e)))?;
        let bytes = <[u8; DIGEST_SIZE]>::try_from(bytes.as_slice()).map_err(|_| {
            EnvelopeError::validation(format!(
                "digest has wrong length: {} (expected {})",
                bytes.len(),
                DIGEST_SIZE
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Digest::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Integrity proof of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    /// Digest of the serialized plaintext
    pub content_hash: Digest,
    /// Digest of the exported content key
    pub key_hash: Digest,
}

/// The sealed unit exchanged with storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Envelope<T: Sealable> {
    pub header: Header,
    pub payload: Payload<T::Meta>,
    pub proof: Proof,
    #[serde(skip)]
    plaintext: PhantomData<fn() -> T>,
}

impl<T: Sealable> Envelope<T> {
    /// Assemble an envelope, rejecting structurally invalid input
    pub fn new(header: Header, payload: Payload<T::Meta>, proof: Proof) -> EnvelopeResult<Self> {
        let envelope = Self {
            header,
            payload,
            proof,
            plaintext: PhantomData,
        };
        envelope.validate()?;
        Ok(envelope)
    }

    /// Check the structural invariants
    ///
    /// Envelopes received from storage are deserialized without passing
    /// through [`Envelope::new`], so readers validate before opening.
    pub fn validate(&self) -> EnvelopeResult<()> {
        let payload = &self.payload;

        self.header.key_wrap_alg.password.check_bounds()?;

        if payload.recipient_keys.is_empty() {
            return Err(EnvelopeError::validation("recipient keys are empty"));
        }
        if !payload.recipient_keys.contains_key(&payload.owner) {
            return Err(EnvelopeError::validation(format!(
                "owner {} has no recipient key",
                payload.owner.short_id()
            )));
        }
        if !payload.recipient_keys.contains_key(&payload.issuer_key) {
            return Err(EnvelopeError::validation(format!(
                "issuer {} has no recipient key",
                payload.issuer_key.short_id()
            )));
        }
        if payload.ciphertext.is_empty() {
            return Err(EnvelopeError::validation("ciphertext is empty"));
        }

        let has_public_entry = payload.recipient_keys.contains_key(&RecipientId::public());
        if has_public_entry && self.header.access == Access::Protected {
            return Err(EnvelopeError::validation(
                "protected envelope exposes a public key entry",
            ));
        }

        Ok(())
    }

    /// The access mode of the envelope
    pub fn access(&self) -> Access {
        self.header.access
    }

    /// Whether the given recipient has a wrapped key entry
    pub fn has_recipient(&self, recipient: &RecipientId) -> bool {
        self.payload.recipient_keys.contains_key(recipient)
    }

    /// Recipients with wrapped key entries (excluding the public entry)
    pub fn recipients(&self) -> impl Iterator<Item = &RecipientId> {
        self.payload
            .recipient_keys
            .keys()
            .filter(|id| !id.is_public())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> EnvelopeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> EnvelopeResult<Self> {
        let envelope: Self = serde_json::from_str(json)
            .map_err(|e| EnvelopeError::validation(format!("malformed envelope: {}", e)))?;
        envelope.validate()?;
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FormDocument, FormParams};
    use crate::identity::FormId;

    fn wrapped(byte: u8) -> WrappedKey {
        WrappedKey {
            seed: [byte; WRAP_SEED_SIZE],
            masked: [byte; CONTENT_KEY_SIZE],
        }
    }

    fn payload(keys: &[&str], owner: &str, issuer: &str) -> Payload<FormParams> {
        Payload {
            ciphertext: vec![1, 2, 3],
            meta: FormParams::new(FormId::new("f1")),
            issuer_key: RecipientId::new(issuer),
            owner: RecipientId::new(owner),
            recipient_keys: keys
                .iter()
                .map(|k| (RecipientId::new(*k), wrapped(1)))
                .collect(),
            invite_list: vec!["alice".to_string()],
        }
    }

    fn proof() -> Proof {
        Proof {
            content_hash: Digest::from_bytes([1; DIGEST_SIZE]),
            key_hash: Digest::from_bytes([2; DIGEST_SIZE]),
        }
    }

    #[test]
    fn test_valid_envelope() {
        let envelope = Envelope::<FormDocument>::new(
            Header::default(),
            payload(&["a", "b"], "a", "b"),
            proof(),
        );
        assert!(envelope.is_ok());
    }

    #[test]
    fn test_rejects_empty_recipient_keys() {
        let result =
            Envelope::<FormDocument>::new(Header::default(), payload(&[], "a", "a"), proof());
        assert!(matches!(result, Err(EnvelopeError::Validation(_))));
    }

    #[test]
    fn test_rejects_missing_owner_or_issuer() {
        let missing_owner =
            Envelope::<FormDocument>::new(Header::default(), payload(&["b"], "a", "b"), proof());
        assert!(matches!(missing_owner, Err(EnvelopeError::Validation(_))));

        let missing_issuer =
            Envelope::<FormDocument>::new(Header::default(), payload(&["a"], "a", "b"), proof());
        assert!(matches!(missing_issuer, Err(EnvelopeError::Validation(_))));
    }

    #[test]
    fn test_protected_envelope_cannot_expose_public_entry() {
        let result = Envelope::<FormDocument>::new(
            Header::default(),
            payload(&["a", RecipientId::PUBLIC], "a", "a"),
            proof(),
        );
        assert!(matches!(result, Err(EnvelopeError::Validation(_))));

        let header = Header {
            access: Access::Public,
            ..Header::default()
        };
        let envelope = Envelope::<FormDocument>::new(
            header,
            payload(&["a", RecipientId::PUBLIC], "a", "a"),
            proof(),
        )
        .unwrap();
        assert_eq!(envelope.recipients().count(), 1);
    }

    #[test]
    fn test_json_wire_shape() {
        let envelope =
            Envelope::<FormDocument>::new(Header::default(), payload(&["a"], "a", "a"), proof())
                .unwrap();
        let json = envelope.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["header"]["contentAlg"], "chacha20-poly1305");
        assert_eq!(value["header"]["keyWrapAlg"]["recipient"], "x25519-hkdf-sha256");
        assert_eq!(value["header"]["access"], "protected");
        assert_eq!(value["payload"]["ciphertext"], "AQID");
        assert!(value["payload"]["recipientKeys"]["a"]["seed"].is_string());
        assert_eq!(value["proof"]["keyHash"], "02".repeat(DIGEST_SIZE));

        let parsed = Envelope::<FormDocument>::from_json(&json).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn test_from_json_validates() {
        let mut envelope =
            Envelope::<FormDocument>::new(Header::default(), payload(&["a"], "a", "a"), proof())
                .unwrap();
        envelope.payload.recipient_keys.clear();
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(matches!(
            Envelope::<FormDocument>::from_json(&json),
            Err(EnvelopeError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_unbounded_kdf_costs() {
        let envelope =
            Envelope::<FormDocument>::new(Header::default(), payload(&["a"], "a", "a"), proof())
                .unwrap();
        let mut value = serde_json::to_value(&envelope).unwrap();
        value["header"]["keyWrapAlg"]["password"]["memoryKib"] = serde_json::json!(u32::MAX);
        let json = value.to_string();

        assert!(matches!(
            Envelope::<FormDocument>::from_json(&json),
            Err(EnvelopeError::Validation(_))
        ));

        let oversized = [
            PasswordKdf::argon2id(PasswordKdf::MAX_MEMORY_KIB + 1, 1, 1),
            PasswordKdf::argon2id(64, PasswordKdf::MAX_ITERATIONS + 1, 1),
            PasswordKdf::argon2id(64, 1, PasswordKdf::MAX_PARALLELISM + 1),
        ];
        for kdf in oversized {
            assert!(kdf.check_bounds().is_err());
        }
        assert!(PasswordKdf::default().check_bounds().is_ok());
    }

    #[test]
    fn test_digest_hex() {
        let digest = Digest::from_bytes([0xFF; DIGEST_SIZE]);
        assert_eq!(Digest::from_hex(&digest.to_hex()).unwrap(), digest);
        assert!(Digest::from_hex("abcd").is_err());
        assert!(Digest::from_hex("zz").is_err());
    }
}
