//! # Veilform Core
//!
//! Core types and errors shared by every Veilform crate.
//!
//! A form creator publishes content that only authorized parties can read,
//! while the storage service only ever holds ciphertext. The unit exchanged
//! with storage is an [`Envelope`]: a header naming the algorithms and the
//! access mode, a payload holding the ciphertext and the per-recipient
//! wrapped content keys, and a proof holding the digests a reader checks
//! before trusting decrypted bytes.
//!
//! ## Key Types
//!
//! - [`Envelope`]: Sealed payload, generic over the plaintext it carries
//! - [`Sealable`]: Plaintext types that can travel inside an envelope
//! - [`RecipientId`]: Key of the recipient keys map
//! - [`FormDocument`] / [`FormResponse`]: The two plaintexts the system seals
//! - [`EnvelopeError`]: Failure taxonomy surfaced by the opener

pub mod encoding;
pub mod envelope;
pub mod error;
pub mod form;
pub mod identity;

// Re-export main types
pub use envelope::*;
pub use error::*;
pub use form::*;
pub use identity::*;
