//! End-to-end tests for the Titan Pay protocol primitives.
//!
//! A caller signs a call with their key, the host verifies it and learns
//! the caller's address, and that address then acts on the token. Each test
//! stands alone with its own keys and token.

use serde::Deserialize;
use serde_json::json;

use titan_protocol::crypto::TitanKeypair;
use titan_protocol::{Address, CallError, MediumError, SignedCall, TitanToken, ValueMedium};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TransferArgs {
    to: Address,
    amount: u64,
}

fn pay_core(owner: &TitanKeypair) -> Address {
    Address::derive_contract(&owner.address(), "pay-core")
}

fn token(owner: &TitanKeypair) -> TitanToken {
    TitanToken::new(
        Address::derive_contract(&owner.address(), "titan"),
        "Titan",
        "tt",
        owner.address(),
    )
}

// ---------------------------------------------------------------------------
// Signed calls drive the token
// ---------------------------------------------------------------------------

#[test]
fn signed_transfer_moves_balance() {
    let owner = TitanKeypair::generate();
    let alice = TitanKeypair::generate();
    let bob = TitanKeypair::generate();
    let mut titan = token(&owner);
    titan
        .mint(&owner.address(), &alice.address(), 1_000)
        .unwrap();

    let call = SignedCall::sign(
        &alice,
        pay_core(&owner),
        "titan_transfer",
        json!({ "to": bob.address(), "amount": 400 }),
        1,
    );
    let wire = serde_json::to_string(&call).unwrap();
    let received: SignedCall = serde_json::from_str(&wire).unwrap();

    let caller = received.verify_for(&pay_core(&owner)).unwrap();
    assert_eq!(caller, alice.address());
    let args: TransferArgs = received.args().unwrap();
    titan.transfer(&caller, &args.to, args.amount).unwrap();

    assert_eq!(titan.balance_of(&alice.address()), 600);
    assert_eq!(titan.balance_of(&bob.address()), 400);
    assert_eq!(titan.total_supply(), 1_000);
}

#[test]
fn tampered_call_is_rejected() {
    let alice = TitanKeypair::generate();
    let mut call = SignedCall::sign(&alice, Address::ZERO, "titan_transfer", json!({ "amount": 1 }), 1);
    call.args = json!({ "amount": 1_000_000 });
    assert_eq!(call.verify().unwrap_err(), CallError::BadSignature);
}

#[test]
fn replayed_signature_under_new_nonce_fails() {
    let alice = TitanKeypair::generate();
    let mut call = SignedCall::sign(&alice, Address::ZERO, "titan_mint", json!({}), 7);
    call.nonce = 8;
    assert!(call.verify().is_err());
}

// ---------------------------------------------------------------------------
// Medium semantics
// ---------------------------------------------------------------------------

#[test]
fn spender_pulls_within_allowance_only() {
    let owner = TitanKeypair::generate();
    let holder = TitanKeypair::generate().address();
    let spender = TitanKeypair::generate().address();
    let sink = TitanKeypair::generate().address();
    let mut titan = token(&owner);
    titan.mint(&owner.address(), &holder, 500).unwrap();
    titan.approve(&holder, &spender, 300);

    titan.transfer_from(&spender, &holder, &sink, 200).unwrap();
    let err = titan
        .transfer_from(&spender, &holder, &sink, 200)
        .unwrap_err();
    assert!(matches!(err, MediumError::InsufficientAllowance { allowance: 100, .. }));
    assert_eq!(titan.balance_of(&sink), 200);
}

#[test]
fn checkpoint_rollback_undoes_a_batch() {
    let owner = TitanKeypair::generate();
    let holder = TitanKeypair::generate().address();
    let spender = TitanKeypair::generate().address();
    let mut titan = token(&owner);
    titan.mint(&owner.address(), &holder, 1_000).unwrap();
    titan.approve(&holder, &spender, 1_000);

    let before = titan.clone();
    let checkpoint = titan.checkpoint();
    titan
        .transfer_from(&spender, &holder, &Address::new([9u8; 20]), 250)
        .unwrap();
    titan
        .transfer_from(&spender, &holder, &Address::new([8u8; 20]), 250)
        .unwrap();
    titan.rollback(checkpoint);

    assert_eq!(titan, before);
}
