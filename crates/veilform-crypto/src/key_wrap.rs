//! Content key wrapping
//!
//! A wrapped key is `seed || masked` where `masked = content_key XOR mask`.
//!
//! - **Recipient**: the seed is a fresh ephemeral X25519 public key and the
//!   mask is HKDF-SHA256 over the shared secret.
//! - **Password**: the seed is a random salt and the mask is Argon2id over
//!   the password.
//! - **Exposed**: the public entry of a public envelope; the seed is zero
//!   and the mask is empty.
//!
//! The wrap carries no authentication tag of its own. A wrong credential
//! yields a different key, which the caller rejects against the envelope's
//! key hash.

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use veilform_core::{
    CONTENT_KEY_SIZE, EnvelopeError, EnvelopeResult, PasswordKdf, WRAP_SEED_SIZE, WrappedKey,
};

use crate::content_key::ContentKey;

/// HKDF info for recipient wraps
const RECIPIENT_WRAP_INFO: &[u8] = b"veilform/v1/key-wrap/x25519-hkdf-sha256";

type Mask = Zeroizing<[u8; CONTENT_KEY_SIZE]>;

/// Secret material used to unwrap one entry
pub enum UnwrapSecret<'a> {
    /// Reader's long-term X25519 secret
    PrivateKey(&'a StaticSecret),
    /// Password plus the derivation parameters recorded in the header
    Password {
        password: &'a str,
        kdf: &'a PasswordKdf,
    },
    /// No secret; the entry holds the key in the clear
    Exposed,
}

/// Utilities for wrapping content keys
pub struct KeyWrapper;

impl KeyWrapper {
    /// Wrap a content key for a public key recipient
    pub fn wrap_for_recipient(
        key: &ContentKey,
        recipient_public: &PublicKey,
    ) -> EnvelopeResult<WrappedKey> {
        let mut ephemeral_bytes = Zeroizing::new([0u8; WRAP_SEED_SIZE]);
        rand::rng().fill_bytes(ephemeral_bytes.as_mut_slice());
        let ephemeral = StaticSecret::from(*ephemeral_bytes);
        let ephemeral_public = PublicKey::from(&ephemeral);

        let mask = agreement_mask(
            &ephemeral,
            recipient_public,
            &ephemeral_public,
            recipient_public,
        )?;
        Ok(WrappedKey {
            seed: ephemeral_public.to_bytes(),
            masked: apply_mask(key.as_bytes(), &mask),
        })
    }

    /// Wrap a content key under a password
    pub fn wrap_with_password(
        key: &ContentKey,
        password: &str,
        kdf: &PasswordKdf,
    ) -> EnvelopeResult<WrappedKey> {
        let mut salt = [0u8; WRAP_SEED_SIZE];
        rand::rng().fill_bytes(&mut salt);

        let mask = password_mask(password, &salt, kdf)?;
        Ok(WrappedKey {
            seed: salt,
            masked: apply_mask(key.as_bytes(), &mask),
        })
    }

    /// Expose a content key for the public entry
    pub fn expose(key: &ContentKey) -> WrappedKey {
        WrappedKey {
            seed: [0u8; WRAP_SEED_SIZE],
            masked: *key.as_bytes(),
        }
    }

    /// Recover the content key from a wrapped entry
    ///
    /// Fails only on malformed key material. A wrong but well-formed secret
    /// returns a key that will not match the envelope's key hash.
    pub fn unwrap(wrapped: &WrappedKey, secret: UnwrapSecret<'_>) -> EnvelopeResult<ContentKey> {
        let mask = match secret {
            UnwrapSecret::PrivateKey(our_secret) => {
                let ephemeral_public = PublicKey::from(wrapped.seed);
                let our_public = PublicKey::from(our_secret);
                agreement_mask(our_secret, &ephemeral_public, &ephemeral_public, &our_public)?
            }
            UnwrapSecret::Password { password, kdf } => {
                password_mask(password, &wrapped.seed, kdf)?
            }
            UnwrapSecret::Exposed => Zeroizing::new([0u8; CONTENT_KEY_SIZE]),
        };

        Ok(ContentKey::from_bytes(apply_mask(&wrapped.masked, &mask)))
    }
}

/// Derive the mask from an X25519 agreement
///
/// The salt binds both public keys so a wrapped entry cannot be replayed
/// against another recipient.
fn agreement_mask(
    secret: &StaticSecret,
    peer: &PublicKey,
    ephemeral_public: &PublicKey,
    recipient_public: &PublicKey,
) -> EnvelopeResult<Mask> {
    let shared = secret.diffie_hellman(peer);
    if !shared.was_contributory() {
        return Err(EnvelopeError::key_wrap(
            "key agreement with a low-order public key",
        ));
    }

    let mut salt = [0u8; 2 * WRAP_SEED_SIZE];
    salt[..WRAP_SEED_SIZE].copy_from_slice(ephemeral_public.as_bytes());
    salt[WRAP_SEED_SIZE..].copy_from_slice(recipient_public.as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared.as_bytes());
    let mut mask = Zeroizing::new([0u8; CONTENT_KEY_SIZE]);
    hk.expand(RECIPIENT_WRAP_INFO, mask.as_mut_slice())
        .map_err(|e| EnvelopeError::key_wrap(format!("HKDF expand failed: {}", e)))?;
    Ok(mask)
}

fn password_mask(password: &str, salt: &[u8], kdf: &PasswordKdf) -> EnvelopeResult<Mask> {
    kdf.check_bounds()?;
    let params = Params::new(
        kdf.memory_kib,
        kdf.iterations,
        kdf.parallelism,
        Some(CONTENT_KEY_SIZE),
    )
    .map_err(|e| EnvelopeError::key_wrap(format!("Invalid Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut mask = Zeroizing::new([0u8; CONTENT_KEY_SIZE]);
    argon2
        .hash_password_into(password.as_bytes(), salt, mask.as_mut_slice())
        .map_err(|e| EnvelopeError::key_wrap(format!("Argon2id failed: {}", e)))?;
    Ok(mask)
}

fn apply_mask(bytes: &[u8; CONTENT_KEY_SIZE], mask: &Mask) -> [u8; CONTENT_KEY_SIZE] {
    let mut out = [0u8; CONTENT_KEY_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = bytes[i] ^ mask[i];
    }
    out
}
