//! # Signed Calls
//!
//! The contracts take the caller's identity as a plain [`Address`] and trust
//! it. Somebody has to earn that trust, and that somebody is the host: every
//! state-changing request arrives as a [`SignedCall`], and only a call whose
//! signature checks out gets turned into a caller address.
//!
//! ## Signing digest
//!
//! ```text
//! BLAKE3-derive-key(CALL_DOMAIN,
//!     target (20 bytes) || method || 0x00 || json(args) || nonce (u64, big-endian))
//! ```
//!
//! `target` is the PayCore address of the deployment the call is meant for.
//! A host only accepts calls addressed to itself, so an envelope signed for
//! one deployment cannot be replayed against another.
//!
//! `json(args)` is `serde_json`'s encoding of the args value. Without the
//! `preserve_order` feature, objects serialize with sorted keys, so the
//! encoding does not depend on how the client ordered its fields.
//!
//! The nonce only makes replays detectable. Tracking which nonces were
//! already used is the host's job.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::config::CALL_DOMAIN;
use crate::crypto::hash::domain_separated_hash_multi;
use crate::crypto::keys::{TitanKeypair, TitanPublicKey, TitanSignature};

/// Why a call envelope was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed signature")]
    InvalidSignature,

    #[error("signature verification failed")]
    BadSignature,

    /// The call was signed for a different deployment.
    #[error("call addressed to {got}, this deployment is {expected}")]
    WrongTarget { expected: Address, got: Address },

    #[error("invalid call arguments: {0}")]
    InvalidArgs(String),
}

/// A method invocation authenticated by its caller's Ed25519 key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedCall {
    /// PayCore address of the deployment the call is meant for.
    pub target: Address,
    /// Stable operation name, e.g. `payCore_setFeeRatio`.
    pub method: String,
    /// Named arguments of the operation.
    pub args: serde_json::Value,
    /// Per-caller sequence number. Must strictly increase.
    pub nonce: u64,
    /// Hex-encoded Ed25519 public key of the caller.
    pub public_key: String,
    /// Hex-encoded signature over [`SignedCall::signing_digest`].
    pub signature: String,
}

impl SignedCall {
    /// Builds and signs a call.
    pub fn sign(
        keypair: &TitanKeypair,
        target: Address,
        method: impl Into<String>,
        args: serde_json::Value,
        nonce: u64,
    ) -> Self {
        let method = method.into();
        let digest = Self::signing_digest(&target, &method, &args, nonce);
        Self {
            target,
            method,
            args,
            nonce,
            public_key: keypair.public_key().to_hex(),
            signature: keypair.sign(&digest).to_hex(),
        }
    }

    /// The 32-byte digest a caller signs.
    pub fn signing_digest(
        target: &Address,
        method: &str,
        args: &serde_json::Value,
        nonce: u64,
    ) -> [u8; 32] {
        // Serializing a `Value` cannot fail: its keys are always strings.
        let args_bytes = serde_json::to_vec(args).unwrap_or_default();
        domain_separated_hash_multi(
            CALL_DOMAIN,
            &[
                target.as_bytes(),
                method.as_bytes(),
                &[0u8],
                &args_bytes,
                &nonce.to_be_bytes(),
            ],
        )
    }

    /// Checks the signature and returns the authenticated caller.
    pub fn verify(&self) -> Result<Address, CallError> {
        let public_key =
            TitanPublicKey::from_hex(&self.public_key).map_err(|_| CallError::InvalidPublicKey)?;
        let signature =
            TitanSignature::from_hex(&self.signature).map_err(|_| CallError::InvalidSignature)?;
        let digest = Self::signing_digest(&self.target, &self.method, &self.args, self.nonce);
        if !public_key.verify(&digest, &signature) {
            return Err(CallError::BadSignature);
        }
        Ok(Address::from_public_key(&public_key))
    }

    /// Like [`SignedCall::verify`], but first requires the call to be
    /// addressed to `target`.
    pub fn verify_for(&self, target: &Address) -> Result<Address, CallError> {
        if self.target != *target {
            return Err(CallError::WrongTarget {
                expected: *target,
                got: self.target,
            });
        }
        self.verify()
    }

    /// Decodes the arguments into the operation's typed parameter struct.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T, CallError> {
        serde_json::from_value(self.args.clone()).map_err(|e| CallError::InvalidArgs(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TARGET: Address = Address::new([0xAA; 20]);

    #[derive(Debug, Deserialize, PartialEq)]
    struct SetFeeRatio {
        ratio: u64,
    }

    #[test]
    fn verify_returns_signer_address() {
        let kp = TitanKeypair::from_seed(&[5u8; 32]);
        let call = SignedCall::sign(&kp, TARGET, "payCore_setFeeRatio", json!({ "ratio": 500 }), 1);
        assert_eq!(call.verify().unwrap(), kp.address());
        assert_eq!(call.verify_for(&TARGET).unwrap(), kp.address());
        assert_eq!(
            call.args::<SetFeeRatio>().unwrap(),
            SetFeeRatio { ratio: 500 }
        );
    }

    #[test]
    fn tampered_args_fail_verification() {
        let kp = TitanKeypair::generate();
        let mut call = SignedCall::sign(&kp, TARGET, "payCore_setFeeRatio", json!({ "ratio": 500 }), 1);
        call.args = json!({ "ratio": 10_000 });
        assert!(matches!(call.verify(), Err(CallError::BadSignature)));
    }

    #[test]
    fn tampered_method_or_nonce_fail_verification() {
        let kp = TitanKeypair::generate();
        let call = SignedCall::sign(&kp, TARGET, "approval_setLevel", json!({}), 7);

        let mut other_method = call.clone();
        other_method.method = "payCore_setTitan".into();
        assert!(other_method.verify().is_err());

        let mut other_nonce = call;
        other_nonce.nonce = 8;
        assert!(other_nonce.verify().is_err());
    }

    #[test]
    fn call_for_another_deployment_is_rejected() {
        let kp = TitanKeypair::generate();
        let other = Address::new([0xBB; 20]);
        let call = SignedCall::sign(&kp, TARGET, "titan_approve", json!({ "amount": 1 }), 1);
        assert_eq!(
            call.verify_for(&other),
            Err(CallError::WrongTarget {
                expected: other,
                got: TARGET
            })
        );

        // Re-pointing the envelope breaks the signature.
        let mut moved = call;
        moved.target = other;
        assert_eq!(moved.verify_for(&other), Err(CallError::BadSignature));
    }

    #[test]
    fn key_ordering_does_not_change_digest() {
        let a: serde_json::Value = serde_json::from_str(r#"{"to":"x","amount":1}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"amount":1,"to":"x"}"#).unwrap();
        assert_eq!(
            SignedCall::signing_digest(&TARGET, "m", &a, 1),
            SignedCall::signing_digest(&TARGET, "m", &b, 1)
        );
    }

    #[test]
    fn garbage_key_and_signature_rejected() {
        let kp = TitanKeypair::generate();
        let mut call = SignedCall::sign(&kp, TARGET, "m", json!(null), 1);
        call.public_key = "zz".into();
        assert!(matches!(call.verify(), Err(CallError::InvalidPublicKey)));

        let mut call = SignedCall::sign(&kp, TARGET, "m", json!(null), 1);
        call.signature = "abcd".into();
        assert!(matches!(call.verify(), Err(CallError::InvalidSignature)));
    }

    #[test]
    fn wrong_arg_shape_reported() {
        let kp = TitanKeypair::generate();
        let call = SignedCall::sign(&kp, TARGET, "m", json!({ "ratio": "lots" }), 1);
        assert!(matches!(
            call.args::<SetFeeRatio>(),
            Err(CallError::InvalidArgs(_))
        ));
    }
}
