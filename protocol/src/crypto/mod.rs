//! # Cryptographic Primitives
//!
//! Thin, typed wrappers over audited implementations: Ed25519 from
//! `ed25519-dalek`, BLAKE3 and SHA-256 from their reference crates. Nothing
//! in here is clever, and it should stay that way.

pub mod hash;
pub mod keys;

pub use hash::sha256;
pub use keys::{KeyError, TitanKeypair, TitanPublicKey, TitanSignature};
