//! Envelope opening
//!
//! Opening recovers the content key, checks it against the key hash, and
//! only then decrypts. A wrong credential is therefore reported as
//! [`EnvelopeError::CredentialMismatch`] without the payload ever being
//! touched.

use tracing::{debug, instrument, warn};
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use veilform_core::{
    Access, Envelope, EnvelopeError, EnvelopeResult, RecipientId, Sealable, WrappedKey,
};

use crate::cipher::{ChaChaCipher, ContentCipher};
use crate::content_key::ContentKey;
use crate::integrity;
use crate::key_wrap::{KeyWrapper, UnwrapSecret};
use crate::keys::KeyPair;

/// What the reader presents to open an envelope
///
/// The unwrap method follows from the credential kind.
#[derive(Clone)]
pub enum Credential {
    /// Reader's long-term private key
    PrivateKey(StaticSecret),
    /// Password shared with the reader
    Password(Zeroizing<String>),
    /// Content key distributed out-of-band
    AccessCode(ContentKey),
}

impl Credential {
    /// Credential from a key pair's secret
    pub fn private_key(pair: &KeyPair) -> Self {
        Credential::PrivateKey(pair.secret().clone())
    }

    /// Credential from a password
    pub fn password(password: impl Into<String>) -> Self {
        Credential::Password(Zeroizing::new(password.into()))
    }

    /// Credential from an encoded access code
    pub fn access_code(code: &str) -> EnvelopeResult<Self> {
        Ok(Credential::AccessCode(ContentKey::from_access_code(code)?))
    }

    /// Short name of the credential kind (for logging)
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::PrivateKey(_) => "private_key",
            Credential::Password(_) => "password",
            Credential::AccessCode(_) => "access_code",
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential::{}([REDACTED])", self.kind())
    }
}

/// Opens envelopes
#[derive(Debug, Clone, Default)]
pub struct Opener<C = ChaChaCipher> {
    cipher: C,
}

impl Opener {
    /// Create an opener with the default cipher
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: ContentCipher> Opener<C> {
    /// Create an opener decrypting through the given cipher
    pub fn with_cipher(cipher: C) -> Self {
        Self { cipher }
    }

    /// Recover and verify the content key without decrypting
    ///
    /// The reader's own entry is preferred. When the reader has none, a
    /// public envelope falls back to the `public` entry; a protected one
    /// fails with [`EnvelopeError::AccessDenied`]. An access code bypasses
    /// the entry lookup entirely.
    pub fn recover_content_key<T: Sealable>(
        &self,
        envelope: &Envelope<T>,
        reader: &RecipientId,
        credential: &Credential,
    ) -> EnvelopeResult<ContentKey> {
        envelope.validate()?;

        let key = match credential {
            Credential::AccessCode(key) => key.clone(),
            Credential::PrivateKey(secret) => {
                unwrap_entry(envelope, reader, UnwrapSecret::PrivateKey(secret))?
            }
            Credential::Password(password) => unwrap_entry(
                envelope,
                reader,
                UnwrapSecret::Password {
                    password: password.as_str(),
                    kdf: &envelope.header.key_wrap_alg.password,
                },
            )?,
        };

        if !integrity::verify(&envelope.proof.key_hash, key.as_bytes()) {
            warn!(
                reader = %reader.short_id(),
                credential = credential.kind(),
                "Recovered key does not match key hash"
            );
            return Err(EnvelopeError::CredentialMismatch);
        }

        Ok(key)
    }

    /// Open an envelope and return its plaintext
    #[instrument(
        skip_all,
        fields(kind = T::KIND, reader = %reader.short_id(), credential = credential.kind())
    )]
    pub fn open<T: Sealable>(
        &self,
        envelope: &Envelope<T>,
        reader: &RecipientId,
        credential: &Credential,
    ) -> EnvelopeResult<T> {
        let key = self.recover_content_key(envelope, reader, credential)?;

        let serialized = self.cipher.decrypt(&key, &envelope.payload.ciphertext)?;
        if !integrity::verify(&envelope.proof.content_hash, &serialized) {
            warn!("Decrypted content does not match content hash");
            return Err(EnvelopeError::IntegrityMismatch);
        }

        let plaintext = serde_json::from_slice(&serialized)?;
        debug!("Opened envelope");
        Ok(plaintext)
    }
}

fn unwrap_entry<T: Sealable>(
    envelope: &Envelope<T>,
    reader: &RecipientId,
    secret: UnwrapSecret<'_>,
) -> EnvelopeResult<ContentKey> {
    let entries = &envelope.payload.recipient_keys;

    if let Some(wrapped) = entries.get(reader) {
        return KeyWrapper::unwrap(wrapped, secret);
    }

    if envelope.access() == Access::Public {
        let exposed: &WrappedKey = entries
            .get(&RecipientId::public())
            .ok_or(EnvelopeError::AccessDenied)?;
        return KeyWrapper::unwrap(exposed, UnwrapSecret::Exposed);
    }

    Err(EnvelopeError::AccessDenied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sealer::{Recipient, SealRequest, Sealer};
    use veilform_core::{Answers, FormId, FormResponse, PasswordKdf, ResponseMeta};

    const TEST_KDF: PasswordKdf = PasswordKdf::argon2id(64, 1, 1);

    fn response() -> FormResponse {
        let mut answers = Answers::new();
        answers.insert("q1".to_string(), serde_json::json!("blue"));
        answers.insert("q2".to_string(), serde_json::json!(42));
        FormResponse::new(answers)
    }

    fn meta(access: Access) -> ResponseMeta {
        ResponseMeta {
            form_id: FormId::new("form-1"),
            access,
        }
    }

    fn sealer() -> Sealer {
        Sealer::new().with_password_kdf(TEST_KDF)
    }

    #[test]
    fn test_open_as_recipient() {
        let issuer = KeyPair::generate();
        let reader = KeyPair::generate();
        let plaintext = response();

        let envelope = sealer()
            .seal(
                SealRequest::new(&plaintext, meta(Access::Protected), &issuer)
                    .recipient(Recipient::public_key(reader.public_key())),
            )
            .unwrap();

        let opened = Opener::new()
            .open(&envelope, &reader.recipient_id(), &Credential::private_key(&reader))
            .unwrap();
        assert_eq!(opened, plaintext);

        let as_issuer = Opener::new()
            .open(&envelope, &issuer.recipient_id(), &Credential::private_key(&issuer))
            .unwrap();
        assert_eq!(as_issuer, plaintext);
    }

    #[test]
    fn test_open_with_password() {
        let issuer = KeyPair::generate();
        let plaintext = response();
        let reader_id = RecipientId::new(RecipientId::PASSWORD);

        let envelope = sealer()
            .seal(
                SealRequest::new(&plaintext, meta(Access::Protected), &issuer)
                    .recipient(Recipient::password(reader_id.clone(), "hunter2")),
            )
            .unwrap();

        let opened = Opener::new()
            .open(&envelope, &reader_id, &Credential::password("hunter2"))
            .unwrap();
        assert_eq!(opened, plaintext);

        let wrong = Opener::new().open(&envelope, &reader_id, &Credential::password("hunter3"));
        assert!(matches!(wrong, Err(EnvelopeError::CredentialMismatch)));
    }

    #[test]
    fn test_non_recipient_of_protected_envelope_is_denied() {
        let issuer = KeyPair::generate();
        let stranger = KeyPair::generate();
        let plaintext = response();

        let envelope = sealer()
            .seal(SealRequest::new(&plaintext, meta(Access::Protected), &issuer))
            .unwrap();

        let result = Opener::new().open(
            &envelope,
            &stranger.recipient_id(),
            &Credential::private_key(&stranger),
        );
        assert!(matches!(result, Err(EnvelopeError::AccessDenied)));
    }

    #[test]
    fn test_non_recipient_of_public_envelope_reads_via_public_entry() {
        let issuer = KeyPair::generate();
        let stranger = KeyPair::generate();
        let plaintext = response();

        let envelope = sealer()
            .seal(
                SealRequest::new(&plaintext, meta(Access::Public), &issuer).access(Access::Public),
            )
            .unwrap();

        let opened = Opener::new()
            .open(
                &envelope,
                &stranger.recipient_id(),
                &Credential::private_key(&stranger),
            )
            .unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_access_code_opens_protected_envelope() {
        let issuer = KeyPair::generate();
        let plaintext = response();
        let envelope = sealer()
            .seal(SealRequest::new(&plaintext, meta(Access::Protected), &issuer))
            .unwrap();

        let key = Opener::new()
            .recover_content_key(
                &envelope,
                &issuer.recipient_id(),
                &Credential::private_key(&issuer),
            )
            .unwrap();
        let code = Credential::access_code(&key.to_access_code()).unwrap();

        let opened = Opener::new()
            .open(&envelope, &RecipientId::new("anyone"), &code)
            .unwrap();
        assert_eq!(opened, plaintext);

        let bogus = Credential::AccessCode(ContentKey::generate());
        assert!(matches!(
            Opener::new().open(&envelope, &RecipientId::new("anyone"), &bogus),
            Err(EnvelopeError::CredentialMismatch)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_is_integrity_mismatch() {
        let issuer = KeyPair::generate();
        let plaintext = response();
        let mut envelope = sealer()
            .seal(SealRequest::new(&plaintext, meta(Access::Protected), &issuer))
            .unwrap();

        let last = envelope.payload.ciphertext.len() - 1;
        envelope.payload.ciphertext[last] ^= 0xFF;

        let result = Opener::new().open(
            &envelope,
            &issuer.recipient_id(),
            &Credential::private_key(&issuer),
        );
        assert!(matches!(result, Err(EnvelopeError::IntegrityMismatch)));
    }

    #[test]
    fn test_swapped_content_hash_is_integrity_mismatch() {
        let issuer = KeyPair::generate();
        let plaintext = response();
        let mut envelope = sealer()
            .seal(SealRequest::new(&plaintext, meta(Access::Protected), &issuer))
            .unwrap();
        envelope.proof.content_hash = integrity::digest(b"something else");

        let result = Opener::new().open(
            &envelope,
            &issuer.recipient_id(),
            &Credential::private_key(&issuer),
        );
        assert!(matches!(result, Err(EnvelopeError::IntegrityMismatch)));
    }

    #[test]
    fn test_invalid_envelope_is_rejected_before_unwrap() {
        let issuer = KeyPair::generate();
        let plaintext = response();
        let mut envelope = sealer()
            .seal(SealRequest::new(&plaintext, meta(Access::Protected), &issuer))
            .unwrap();
        envelope.payload.recipient_keys.clear();

        let result = Opener::new().open(
            &envelope,
            &issuer.recipient_id(),
            &Credential::private_key(&issuer),
        );
        assert!(matches!(result, Err(EnvelopeError::Validation(_))));
    }

    #[test]
    fn test_credential_debug_redacts() {
        let debug = format!("{:?}", Credential::password("hunter2"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("password"));
    }
}
