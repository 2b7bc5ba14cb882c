//! # Key Management
//!
//! Ed25519 keypairs for Titan account identities.
//!
//! An account identity on the wire is a 20-byte [`Address`], but every
//! address a node will accept a call from is derived from one of these
//! keypairs. The node verifies the signature, derives the address, and only
//! then hands the caller to the contracts. The contracts themselves never
//! see a key.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (ed25519-dalek does this for us).
//! - Generation uses `OsRng`.
//! - Key bytes are never logged. Keep it that way.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use crate::address::Address;

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* something failed. Error messages are not
/// the place to leak details about key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not hex")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignature,
}

/// An Ed25519 keypair controlling one Titan account.
///
/// `TitanKeypair` intentionally does NOT implement `Serialize`. Writing a
/// secret key somewhere should be a deliberate act; use
/// [`secret_key_bytes`](Self::secret_key_bytes) and
/// [`from_hex`](Self::from_hex) explicitly.
///
/// # Examples
///
/// ```
/// use titan_protocol::crypto::keys::TitanKeypair;
///
/// let kp = TitanKeypair::generate();
/// let sig = kp.sign(b"payTitan");
/// assert!(kp.verify(b"payTitan", &sig));
/// ```
pub struct TitanKeypair {
    signing_key: SigningKey,
}

/// The public half of a Titan keypair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitanPublicKey {
    bytes: [u8; 32],
}

/// An Ed25519 signature. Always 64 bytes when produced by [`TitanKeypair::sign`];
/// anything else simply fails verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitanSignature {
    bytes: Vec<u8>,
}

impl TitanKeypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds a keypair deterministically from a 32-byte seed.
    ///
    /// Handy in tests where every account needs a stable identity. A weak
    /// seed gives a weak key, so don't use this with anything guessable
    /// outside of tests.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Loads a keypair from a hex-encoded 32-byte secret key, the format
    /// `titan-node init` writes to `owner.key`.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Returns the public key.
    pub fn public_key(&self) -> TitanPublicKey {
        TitanPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Returns the account identity this keypair controls.
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key())
    }

    /// Signs `message`. Ed25519 is deterministic: same key, same message,
    /// same signature.
    pub fn sign(&self, message: &[u8]) -> TitanSignature {
        TitanSignature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Verifies a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &TitanSignature) -> bool {
        self.public_key().verify(message, signature)
    }

    /// Exports the raw secret key. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Clone for TitanKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for TitanKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material, not even partially.
        write!(f, "TitanKeypair(addr={})", self.address())
    }
}

// ---------------------------------------------------------------------------
// TitanPublicKey
// ---------------------------------------------------------------------------

impl TitanPublicKey {
    /// Validates and wraps raw public key bytes.
    ///
    /// Rejects byte strings that are not a valid Ed25519 point, so that a
    /// degenerate key can never be used to derive an address.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Parses a hex-encoded public key and validates it.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Hex encoding, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Returns `true` if `signature` is a valid signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &TitanSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Some(sig) = signature.to_dalek_signature() else {
            return false;
        };
        verifying_key.verify(message, &sig).is_ok()
    }
}

impl Hash for TitanPublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for TitanPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TitanPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TitanPublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// TitanSignature
// ---------------------------------------------------------------------------

impl TitanSignature {
    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn to_dalek_signature(&self) -> Option<DalekSignature> {
        let arr: [u8; 64] = self.bytes.as_slice().try_into().ok()?;
        Some(DalekSignature::from_bytes(&arr))
    }

    /// Hex encoding, 128 characters for a well-formed signature.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Parses a hex-encoded signature. Must decode to exactly 64 bytes.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidSignature)?;
        if bytes.len() != 64 {
            return Err(KeyError::InvalidSignature);
        }
        Ok(Self { bytes })
    }
}

impl fmt::Display for TitanSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TitanSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "TitanSignature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "TitanSignature({})", hex_str)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = TitanKeypair::generate();
        let sig = kp.sign(b"setFeeRatio 500");
        assert!(kp.verify(b"setFeeRatio 500", &sig));
    }

    #[test]
    fn wrong_message_fails_verification() {
        let kp = TitanKeypair::generate();
        let sig = kp.sign(b"setFeeRatio 500");
        assert!(!kp.verify(b"setFeeRatio 10000", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = TitanKeypair::generate();
        let kp2 = TitanKeypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!kp2.verify(b"message", &sig));
    }

    #[test]
    fn secret_hex_roundtrip_preserves_address() {
        let kp = TitanKeypair::generate();
        let restored = TitanKeypair::from_hex(&hex::encode(kp.secret_key_bytes())).unwrap();
        assert_eq!(kp.address(), restored.address());
    }

    #[test]
    fn from_hex_tolerates_trailing_newline() {
        let kp = TitanKeypair::from_seed(&[3u8; 32]);
        let file_contents = format!("{}\n", hex::encode(kp.secret_key_bytes()));
        let restored = TitanKeypair::from_hex(&file_contents).unwrap();
        assert_eq!(kp.address(), restored.address());
    }

    #[test]
    fn invalid_secret_hex_rejected() {
        assert!(TitanKeypair::from_hex("deadbeef").is_err());
        assert!(TitanKeypair::from_hex("not-hex-at-all").is_err());
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let pk = TitanKeypair::generate().public_key();
        assert_eq!(TitanPublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        assert!(TitanPublicKey::try_from_slice(&[0u8; 16]).is_err());
    }

    #[test]
    fn signature_hex_roundtrip() {
        let sig = TitanKeypair::generate().sign(b"test");
        assert_eq!(TitanSignature::from_hex(&sig.to_hex()).unwrap(), sig);
        assert!(TitanSignature::from_hex("abcd").is_err());
    }

    #[test]
    fn seeded_keypairs_are_deterministic() {
        let a = TitanKeypair::from_seed(&[42u8; 32]);
        let b = TitanKeypair::from_seed(&[42u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = TitanKeypair::generate();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("TitanKeypair(addr=0x"));
        assert!(!debug_str.contains(&hex::encode(kp.secret_key_bytes())));
    }
}
