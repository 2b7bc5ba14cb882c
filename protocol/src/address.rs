//! # Account Identity
//!
//! A Titan account is a 20-byte opaque value. It is how the contracts name
//! owners, fee receivers, payers, payees and the value medium itself.
//!
//! Text form is `0x` + 40 lowercase hex digits, which is also the serde
//! representation, so addresses read the same in JSON-RPC payloads, logs
//! and the deployment manifest.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{ADDRESS_DOMAIN, ADDRESS_LENGTH, CONTRACT_ADDRESS_DOMAIN};
use crate::crypto::hash::{domain_separated_hash, domain_separated_hash_multi};
use crate::crypto::keys::TitanPublicKey;

/// Errors from parsing an address string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid address length: expected 40 hex digits, got {0}")]
    InvalidLength(usize),

    #[error("invalid address: not hex")]
    InvalidHex,
}

/// A 20-byte account identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero address. Used as the `from` side of mint transfers; the
    /// contracts attach no other meaning to it.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wraps raw bytes.
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derives the identity controlled by an Ed25519 public key: the last
    /// 20 bytes of its domain-separated BLAKE3 hash.
    pub fn from_public_key(pk: &TitanPublicKey) -> Self {
        let digest = domain_separated_hash(ADDRESS_DOMAIN, pk.as_bytes());
        Self::from_digest_tail(&digest)
    }

    /// Derives a contract address from the deployer and a label
    /// (`"approval"`, `"pay-core"`, `"titan"`). Deterministic, so a node that
    /// restarts from the same manifest assigns the same addresses.
    pub fn derive_contract(deployer: &Address, label: &str) -> Self {
        let digest =
            domain_separated_hash_multi(CONTRACT_ADDRESS_DOMAIN, &[&deployer.0, label.as_bytes()]);
        Self::from_digest_tail(&digest)
    }

    fn from_digest_tail(digest: &[u8; 32]) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[32 - ADDRESS_LENGTH..]);
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.len() != ADDRESS_LENGTH * 2 {
            return Err(AddressError::InvalidLength(digits.len()));
        }
        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::TitanKeypair;

    #[test]
    fn display_is_prefixed_lowercase_hex() {
        let addr = Address::new([0xAB; 20]);
        assert_eq!(addr.to_string(), format!("0x{}", "ab".repeat(20)));
    }

    #[test]
    fn parses_with_and_without_prefix() {
        let text = "0x5FD6eB55D12E759a21C09eF703fe0CBa1DC9d88D";
        let a: Address = text.parse().unwrap();
        let b: Address = text.trim_start_matches("0x").parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), text.to_lowercase());
    }

    #[test]
    fn rejects_wrong_length_and_bad_digits() {
        assert_eq!(
            "0x1234".parse::<Address>(),
            Err(AddressError::InvalidLength(4))
        );
        assert_eq!(
            format!("0x{}", "zz".repeat(20)).parse::<Address>(),
            Err(AddressError::InvalidHex)
        );
    }

    #[test]
    fn serde_uses_text_form() {
        let addr = Address::new([1u8; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "01".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn key_derivation_is_stable_and_distinct() {
        let a = TitanKeypair::from_seed(&[1u8; 32]);
        let b = TitanKeypair::from_seed(&[2u8; 32]);
        assert_eq!(
            Address::from_public_key(&a.public_key()),
            Address::from_public_key(&a.public_key())
        );
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn contract_addresses_depend_on_label_and_deployer() {
        let deployer = Address::new([7u8; 20]);
        let other = Address::new([8u8; 20]);
        let pay_core = Address::derive_contract(&deployer, "pay-core");
        assert_ne!(pay_core, Address::derive_contract(&deployer, "titan"));
        assert_ne!(pay_core, Address::derive_contract(&other, "pay-core"));
        assert_eq!(pay_core, Address::derive_contract(&deployer, "pay-core"));
    }

    #[test]
    fn zero_address() {
        assert_eq!(Address::ZERO.as_bytes(), &[0u8; 20]);
        assert_eq!(Address::default(), Address::ZERO);
    }
}
