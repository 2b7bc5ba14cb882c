//! # Hashing Utilities
//!
//! Two hash functions, each with a job:
//!
//! - **BLAKE3** for everything Titan-native: address derivation and the
//!   signing digest of a call envelope. Always used in `derive_key` mode
//!   with a tag from [`crate::config`] so that an address hash can never be
//!   confused with a call digest.
//! - **SHA-256** for integrity checksums on state snapshots the node writes
//!   to disk, where interoperability with ordinary tooling (`sha256sum`)
//!   is worth more than speed.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a fixed-size array.
///
/// ```
/// use titan_protocol::crypto::hash::sha256;
///
/// assert_eq!(sha256(b"titan").len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// BLAKE3 in `derive_key` mode with `context` as the domain tag.
///
/// `domain_separated_hash("a", x)` and `domain_separated_hash("b", x)` never
/// collide, because the context selects a different internal IV. Don't
/// prepend tags by hand.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Domain-separated BLAKE3 over several slices fed in order, without
/// concatenating them first.
pub fn domain_separated_hash_multi(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn domain_separation_changes_output() {
        let a = domain_separated_hash("titan address v1", b"same input");
        let b = domain_separated_hash("titan call v1", b"same input");
        assert_ne!(a, b);
        assert_ne!(a, *blake3::hash(b"same input").as_bytes());
    }

    #[test]
    fn multi_part_matches_concatenation() {
        let joined = domain_separated_hash("ctx", b"helloworld");
        let parts = domain_separated_hash_multi("ctx", &[b"hello".as_slice(), b"world".as_slice()]);
        assert_eq!(joined, parts);
    }
}
