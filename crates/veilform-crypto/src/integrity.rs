//! Content and key digests
//!
//! A reader checks the key hash right after unwrapping (cheap, catches a
//! wrong credential before the payload is touched) and the content hash
//! after decryption (catches corruption or substitution).

use sha2::{Digest as _, Sha256};

use veilform_core::Digest;

/// SHA-256 digest of the given bytes
pub fn digest(bytes: &[u8]) -> Digest {
    Digest::from_bytes(Sha256::digest(bytes).into())
}

/// Whether `actual` hashes to `expected`
pub fn verify(expected: &Digest, actual: &[u8]) -> bool {
    constant_time_eq(expected.as_bytes(), digest(actual).as_bytes())
}

/// Compare two byte slices without early exit
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
