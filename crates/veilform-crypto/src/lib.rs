//! # Veilform Crypto
//!
//! Sealing and opening of envelopes.
//!
//! ## Features
//!
//! - ChaCha20-Poly1305 encryption of envelope content under a one-time key
//! - X25519 + HKDF key wrapping for key-holding readers
//! - Argon2id key wrapping for password readers
//! - SHA-256 integrity proofs over the plaintext and the content key
//!
//! ## Key Types
//!
//! - [`Sealer`]: builds an [`Envelope`](veilform_core::Envelope) from a [`SealRequest`]
//! - [`Opener`]: recovers the plaintext given a [`Credential`]
//! - [`KeyWrapper`]: wraps and unwraps content keys
//! - [`KeyPair`]: a reader's long-term X25519 key pair
//!
//! ## Example
//!
//! ```rust,ignore
//! use veilform_core::{Answers, FormId, FormResponse, ResponseMeta, Access};
//! use veilform_crypto::{Credential, KeyPair, Opener, Recipient, SealRequest, Sealer};
//!
//! let responder = KeyPair::generate();
//! let form_issuer = KeyPair::generate();
//!
//! let response = FormResponse::new(Answers::new());
//! let meta = ResponseMeta { form_id: FormId::new("form-1"), access: Access::Protected };
//!
//! let envelope = Sealer::new().seal(
//!     SealRequest::new(&response, meta, &responder).owner(*form_issuer.public_key()),
//! )?;
//!
//! let opened: FormResponse = Opener::new().open(
//!     &envelope,
//!     &form_issuer.recipient_id(),
//!     &Credential::private_key(&form_issuer),
//! )?;
//! ```

pub mod cipher;
pub mod content_key;
pub mod integrity;
pub mod key_wrap;
pub mod keys;
pub mod opener;
pub mod sealer;

// Re-exports
pub use cipher::{ChaChaCipher, ContentCipher, NONCE_SIZE, TAG_SIZE};
pub use content_key::ContentKey;
pub use key_wrap::{KeyWrapper, UnwrapSecret};
pub use keys::{KeyPair, public_key_of};
pub use opener::{Credential, Opener};
pub use sealer::{Recipient, SealRequest, Sealer};

// Re-export x25519 types for convenience
pub use x25519_dalek::{PublicKey, StaticSecret};
