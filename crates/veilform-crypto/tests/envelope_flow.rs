//! End-to-end sealing and opening of forms and responses

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use veilform_core::{
    Access, Answers, Envelope, EnvelopeError, EnvelopeResult, FormDocument, FormId, FormParams,
    FormResponse, PasswordKdf, Recovery, RecipientId, ResponseMeta,
};
use veilform_crypto::{
    ChaChaCipher, ContentCipher, ContentKey, Credential, KeyPair, Opener, Recipient, SealRequest,
    Sealer,
};

const TEST_KDF: PasswordKdf = PasswordKdf::argon2id(64, 1, 1);

/// Cipher that counts decrypt calls
#[derive(Default)]
struct CountingCipher {
    inner: ChaChaCipher,
    decrypts: AtomicUsize,
}

impl CountingCipher {
    fn decrypts(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }
}

impl ContentCipher for CountingCipher {
    fn encrypt(&self, key: &ContentKey, plaintext: &[u8]) -> EnvelopeResult<Vec<u8>> {
        self.inner.encrypt(key, plaintext)
    }

    fn decrypt(&self, key: &ContentKey, sealed: &[u8]) -> EnvelopeResult<Vec<u8>> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(key, sealed)
    }
}

fn publish_form(issuer: &KeyPair, access: Access) -> Envelope<FormDocument> {
    let doc = FormDocument(serde_json::json!({
        "title": "Feedback",
        "questions": [{"key": "q1", "type": "text"}],
    }));
    let params = FormParams::new(FormId::new("form-1"))
        .with_title("Feedback")
        .with_access(access);

    Sealer::new()
        .with_password_kdf(TEST_KDF)
        .seal(
            SealRequest::new(&doc, params, issuer)
                .access(access)
                .recipient(Recipient::password(RecipientId::PASSWORD, "open sesame"))
                .invite("issuer-account"),
        )
        .unwrap()
}

#[test]
fn test_wrong_password_never_decrypts() {
    let issuer = KeyPair::generate();
    let envelope = publish_form(&issuer, Access::Protected);

    let cipher = Arc::new(CountingCipher::default());
    let opener = Opener::with_cipher(cipher.clone());
    let reader = RecipientId::new(RecipientId::PASSWORD);

    let result = opener.open(&envelope, &reader, &Credential::password("wrong"));
    let err = result.unwrap_err();
    assert!(matches!(err, EnvelopeError::CredentialMismatch));
    assert_eq!(err.recovery(), Recovery::Reprompt);
    assert_eq!(cipher.decrypts(), 0);

    let opened = opener
        .open(&envelope, &reader, &Credential::password("open sesame"))
        .unwrap();
    assert_eq!(opened.0["title"], "Feedback");
    assert_eq!(cipher.decrypts(), 1);
}

#[test]
fn test_recover_content_key_does_not_decrypt() {
    let issuer = KeyPair::generate();
    let envelope = publish_form(&issuer, Access::Protected);

    let cipher = Arc::new(CountingCipher::default());
    let opener = Opener::with_cipher(cipher.clone());

    opener
        .recover_content_key(
            &envelope,
            &issuer.recipient_id(),
            &Credential::private_key(&issuer),
        )
        .unwrap();
    assert_eq!(cipher.decrypts(), 0);
}

#[test]
fn test_envelope_survives_json_transport() {
    let issuer = KeyPair::generate();
    let envelope = publish_form(&issuer, Access::Public);

    let json = envelope.to_json().unwrap();
    let received = Envelope::<FormDocument>::from_json(&json).unwrap();
    assert_eq!(received, envelope);
    assert_eq!(received.payload.meta.title.as_deref(), Some("Feedback"));

    let stranger = KeyPair::generate();
    let opened = Opener::new()
        .open(
            &received,
            &stranger.recipient_id(),
            &Credential::private_key(&stranger),
        )
        .unwrap();
    assert_eq!(opened.0["questions"][0]["key"], "q1");
}

#[test]
fn test_response_is_readable_by_form_issuer_and_responder_only() {
    let form_issuer = KeyPair::generate();
    let responder = KeyPair::generate();
    let outsider = KeyPair::generate();

    let mut answers = Answers::new();
    answers.insert("q1".to_string(), serde_json::json!("Great form"));
    let response = FormResponse::new(answers);
    let meta = ResponseMeta {
        form_id: FormId::new("form-1"),
        access: Access::Protected,
    };

    let envelope = Sealer::new()
        .seal(
            SealRequest::new(&response, meta, &responder)
                .owner(*form_issuer.public_key())
                .invite_list(vec!["responder-account".into(), "issuer-account".into()]),
        )
        .unwrap();

    assert_eq!(envelope.payload.owner, form_issuer.recipient_id());
    assert_eq!(envelope.payload.issuer_key, responder.recipient_id());
    assert_eq!(envelope.recipients().count(), 2);

    let opener = Opener::new();
    for reader in [&form_issuer, &responder] {
        let opened = opener
            .open(&envelope, &reader.recipient_id(), &Credential::private_key(reader))
            .unwrap();
        assert_eq!(opened, response);
    }

    let denied = opener.open(
        &envelope,
        &outsider.recipient_id(),
        &Credential::private_key(&outsider),
    );
    assert!(matches!(denied, Err(EnvelopeError::AccessDenied)));
}

#[test]
fn test_private_key_presented_under_wrong_identity_is_mismatch() {
    let issuer = KeyPair::generate();
    let other = KeyPair::generate();
    let envelope = publish_form(&issuer, Access::Protected);

    // Right entry, wrong secret
    let result = Opener::new().open(
        &envelope,
        &issuer.recipient_id(),
        &Credential::private_key(&other),
    );
    assert!(matches!(result, Err(EnvelopeError::CredentialMismatch)));
}

#[test]
fn test_tampered_kdf_costs_are_refused_before_derivation() {
    let issuer = KeyPair::generate();
    let envelope = publish_form(&issuer, Access::Protected);

    let mut value = serde_json::to_value(&envelope).unwrap();
    value["header"]["keyWrapAlg"]["password"]["memoryKib"] = serde_json::json!(u32::MAX);
    let json = value.to_string();

    assert!(matches!(
        Envelope::<FormDocument>::from_json(&json),
        Err(EnvelopeError::Validation(_))
    ));

    // Deserialized without validation, the opener still refuses it
    let tampered: Envelope<FormDocument> = serde_json::from_str(&json).unwrap();
    let cipher = Arc::new(CountingCipher::default());
    let err = Opener::with_cipher(cipher.clone())
        .open(
            &tampered,
            &RecipientId::new(RecipientId::PASSWORD),
            &Credential::password("open sesame"),
        )
        .unwrap_err();
    assert!(matches!(err, EnvelopeError::Validation(_)));
    assert_eq!(err.recovery(), Recovery::HardStop);
    assert_eq!(cipher.decrypts(), 0);
}

#[test]
fn test_sealing_with_oversized_kdf_fails() {
    let issuer = KeyPair::generate();
    let doc = FormDocument(serde_json::json!({"title": "Feedback"}));
    let params = FormParams::new(FormId::new("form-2"));

    let result = Sealer::new()
        .with_password_kdf(PasswordKdf::argon2id(PasswordKdf::MAX_MEMORY_KIB + 1, 1, 1))
        .seal(
            SealRequest::new(&doc, params, &issuer)
                .recipient(Recipient::password(RecipientId::PASSWORD, "open sesame")),
        );
    assert!(matches!(result, Err(EnvelopeError::Validation(_))));
}
