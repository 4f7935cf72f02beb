//! Envelope construction
//!
//! Sealing generates a fresh content key, encrypts the serialized plaintext,
//! wraps the key for every reader, and records digests of both the plaintext
//! and the key. The content key is zeroized when sealing returns.

use std::collections::BTreeMap;

use tracing::{debug, instrument};
use x25519_dalek::PublicKey;

use veilform_core::{
    Access, Envelope, EnvelopeError, EnvelopeResult, Header, KeyWrapAlg, PasswordKdf, Payload,
    Proof, RecipientId, Sealable, WrappedKey,
};

use crate::cipher::{ChaChaCipher, ContentCipher};
use crate::content_key::ContentKey;
use crate::integrity;
use crate::key_wrap::KeyWrapper;
use crate::keys::KeyPair;

/// A reader the content key is wrapped for
#[derive(Clone)]
pub enum Recipient {
    /// Key-holding reader, identified by its public key
    PublicKey(PublicKey),
    /// Password reader, stored under an explicit identifier
    Password { id: RecipientId, password: String },
}

impl Recipient {
    /// Recipient entry for a public key
    pub fn public_key(key: &PublicKey) -> Self {
        Recipient::PublicKey(*key)
    }

    /// Recipient entry for a password
    pub fn password(id: impl Into<RecipientId>, password: impl Into<String>) -> Self {
        Recipient::Password {
            id: id.into(),
            password: password.into(),
        }
    }

    fn id(&self) -> RecipientId {
        match self {
            Recipient::PublicKey(key) => RecipientId::from_public_key(key.as_bytes()),
            Recipient::Password { id, .. } => id.clone(),
        }
    }
}

impl std::fmt::Debug for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recipient::PublicKey(_) => write!(f, "Recipient::PublicKey({})", self.id().short_id()),
            Recipient::Password { id, .. } => {
                write!(f, "Recipient::Password({}, [REDACTED])", id.short_id())
            }
        }
    }
}

/// Everything needed to seal one envelope
#[derive(Debug)]
pub struct SealRequest<'a, T: Sealable> {
    plaintext: &'a T,
    meta: T::Meta,
    issuer: &'a KeyPair,
    owner: PublicKey,
    recipients: Vec<Recipient>,
    access: Access,
    invite_list: Vec<String>,
}

impl<'a, T: Sealable> SealRequest<'a, T> {
    /// Start a protected request; the issuer also owns the content
    pub fn new(plaintext: &'a T, meta: T::Meta, issuer: &'a KeyPair) -> Self {
        Self {
            plaintext,
            meta,
            issuer,
            owner: *issuer.public_key(),
            recipients: Vec::new(),
            access: Access::Protected,
            invite_list: Vec::new(),
        }
    }

    /// Set the owner of the content
    pub fn owner(mut self, owner: PublicKey) -> Self {
        self.owner = owner;
        self
    }

    /// Add a reader
    pub fn recipient(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    /// Add several readers
    pub fn recipients(mut self, recipients: impl IntoIterator<Item = Recipient>) -> Self {
        self.recipients.extend(recipients);
        self
    }

    /// Set the access mode
    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Add an invited account identifier
    pub fn invite(mut self, account: impl Into<String>) -> Self {
        self.invite_list.push(account.into());
        self
    }

    /// Replace the invite list
    pub fn invite_list(mut self, accounts: Vec<String>) -> Self {
        self.invite_list = accounts;
        self
    }
}

/// Builds envelopes
#[derive(Debug, Clone, Default)]
pub struct Sealer<C = ChaChaCipher> {
    cipher: C,
    password_kdf: PasswordKdf,
}

impl Sealer {
    /// Create a sealer with the default cipher and password parameters
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: ContentCipher> Sealer<C> {
    /// Create a sealer encrypting through the given cipher
    pub fn with_cipher(cipher: C) -> Self {
        Self {
            cipher,
            password_kdf: PasswordKdf::default(),
        }
    }

    /// Set the password derivation parameters recorded in new envelopes
    pub fn with_password_kdf(mut self, kdf: PasswordKdf) -> Self {
        self.password_kdf = kdf;
        self
    }

    /// Password derivation parameters used for new envelopes
    pub fn password_kdf(&self) -> &PasswordKdf {
        &self.password_kdf
    }

    /// Seal a plaintext
    ///
    /// The issuer and the owner always get a recipient entry. A public
    /// envelope additionally carries the content key under the reserved
    /// `public` identifier.
    #[instrument(skip_all, fields(kind = T::KIND, access = %request.access))]
    pub fn seal<T: Sealable>(&self, request: SealRequest<'_, T>) -> EnvelopeResult<Envelope<T>> {
        let SealRequest {
            plaintext,
            meta,
            issuer,
            owner,
            recipients,
            access,
            invite_list,
        } = request;

        let content_key = ContentKey::generate();
        let serialized = serde_json::to_vec(plaintext)?;
        let ciphertext = self.cipher.encrypt(&content_key, &serialized)?;

        let proof = Proof {
            content_hash: integrity::digest(&serialized),
            key_hash: integrity::digest(content_key.as_bytes()),
        };

        let mut recipient_keys: BTreeMap<RecipientId, WrappedKey> = BTreeMap::new();

        let issuer_id = issuer.recipient_id();
        let owner_id = RecipientId::from_public_key(owner.as_bytes());
        recipient_keys.insert(
            issuer_id.clone(),
            KeyWrapper::wrap_for_recipient(&content_key, issuer.public_key())?,
        );
        if owner_id != issuer_id {
            recipient_keys.insert(
                owner_id.clone(),
                KeyWrapper::wrap_for_recipient(&content_key, &owner)?,
            );
        }

        for recipient in &recipients {
            let id = recipient.id();
            if id.is_public() {
                return Err(EnvelopeError::validation(
                    "recipient identifier 'public' is reserved",
                ));
            }
            if recipient_keys.contains_key(&id) {
                continue;
            }
            let wrapped = match recipient {
                Recipient::PublicKey(key) => KeyWrapper::wrap_for_recipient(&content_key, key)?,
                Recipient::Password { password, .. } => {
                    KeyWrapper::wrap_with_password(&content_key, password, &self.password_kdf)?
                }
            };
            recipient_keys.insert(id, wrapped);
        }

        if access == Access::Public {
            recipient_keys.insert(RecipientId::public(), KeyWrapper::expose(&content_key));
        }

        let header = Header {
            key_wrap_alg: KeyWrapAlg {
                password: self.password_kdf,
                ..KeyWrapAlg::default()
            },
            access,
            ..Header::default()
        };

        let payload = Payload {
            ciphertext,
            meta,
            issuer_key: issuer_id,
            owner: owner_id,
            recipient_keys,
            invite_list,
        };

        let envelope = Envelope::new(header, payload, proof)?;
        debug!(
            recipients = envelope.recipients().count(),
            content_hash = %envelope.proof.content_hash,
            "Sealed envelope"
        );
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veilform_core::{FormDocument, FormId, FormParams};

    fn form() -> (FormDocument, FormParams) {
        (
            FormDocument(serde_json::json!({"title": "Survey", "questions": []})),
            FormParams::new(FormId::new("form-1")),
        )
    }

    #[test]
    fn test_seal_includes_issuer_and_owner() {
        let issuer = KeyPair::generate();
        let owner = KeyPair::generate();
        let (doc, params) = form();

        let envelope = Sealer::new()
            .seal(SealRequest::new(&doc, params, &issuer).owner(*owner.public_key()))
            .unwrap();

        assert!(envelope.has_recipient(&issuer.recipient_id()));
        assert!(envelope.has_recipient(&owner.recipient_id()));
        assert_eq!(envelope.payload.issuer_key, issuer.recipient_id());
        assert_eq!(envelope.payload.owner, owner.recipient_id());
        assert_eq!(envelope.access(), Access::Protected);
        assert!(!envelope.has_recipient(&RecipientId::public()));
    }

    #[test]
    fn test_seal_public_adds_public_entry() {
        let issuer = KeyPair::generate();
        let (doc, params) = form();

        let envelope = Sealer::new()
            .seal(SealRequest::new(&doc, params, &issuer).access(Access::Public))
            .unwrap();

        assert_eq!(envelope.access(), Access::Public);
        assert!(envelope.has_recipient(&RecipientId::public()));
        assert_eq!(envelope.recipients().count(), 1);
    }

    #[test]
    fn test_seal_records_password_parameters() {
        let issuer = KeyPair::generate();
        let (doc, params) = form();
        let kdf = PasswordKdf::argon2id(64, 1, 1);

        let envelope = Sealer::new()
            .with_password_kdf(kdf)
            .seal(
                SealRequest::new(&doc, params, &issuer)
                    .recipient(Recipient::password("password", "hunter2")),
            )
            .unwrap();

        assert_eq!(envelope.header.key_wrap_alg.password, kdf);
        assert!(envelope.has_recipient(&RecipientId::new(RecipientId::PASSWORD)));
    }

    #[test]
    fn test_seal_rejects_reserved_public_identifier() {
        let issuer = KeyPair::generate();
        let (doc, params) = form();

        let result = Sealer::new().seal(
            SealRequest::new(&doc, params, &issuer)
                .recipient(Recipient::password(RecipientId::PUBLIC, "pw")),
        );
        assert!(matches!(result, Err(EnvelopeError::Validation(_))));
    }

    #[test]
    fn test_each_seal_uses_a_fresh_key() {
        let issuer = KeyPair::generate();
        let (doc, params) = form();
        let sealer = Sealer::new();

        let first = sealer
            .seal(SealRequest::new(&doc, params.clone(), &issuer))
            .unwrap();
        let second = sealer.seal(SealRequest::new(&doc, params, &issuer)).unwrap();

        assert_eq!(first.proof.content_hash, second.proof.content_hash);
        assert_ne!(first.proof.key_hash, second.proof.key_hash);
        assert_ne!(first.payload.ciphertext, second.payload.ciphertext);
    }

    #[test]
    fn test_invite_list_is_kept() {
        let issuer = KeyPair::generate();
        let (doc, params) = form();

        let envelope = Sealer::new()
            .seal(
                SealRequest::new(&doc, params, &issuer)
                    .invite("alice")
                    .invite("bob"),
            )
            .unwrap();
        assert_eq!(envelope.payload.invite_list, vec!["alice", "bob"]);
    }
}
