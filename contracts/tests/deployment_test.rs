//! Integration tests for a full deployment driven end to end.

use titan_contracts::{Deployment, DeploymentManifest, ErrorKind, PaymentPolicy};
use titan_protocol::crypto::TitanKeypair;
use titan_protocol::ValueMedium;

#[test]
fn manifest_to_payment() {
    let owner = TitanKeypair::generate().address();
    let payer = TitanKeypair::generate().address();
    let payee = TitanKeypair::generate().address();

    let mut manifest = DeploymentManifest::new(owner);
    manifest.pay_core.fee_ratio = 100;
    let mut d = Deployment::from_manifest(&manifest).unwrap();

    d.mint(&owner, &payer, 10_000).unwrap();
    let pay_core = d.pay_core.address();
    d.approve(&payer, &pay_core, 10_000);

    let receipt = d.pay_titan(&payer, &payer, &payee, 5_000).unwrap();
    assert_eq!(receipt.quote.fee, 50);
    assert_eq!(d.titan.balance_of(&owner), 50);
    assert_eq!(d.titan.balance_of(&payee), 4_950);
    assert_eq!(d.titan.balance_of(&payer), 5_000);
    assert_eq!(d.titan.total_supply(), 10_000);
}

#[test]
fn manifest_json_round_trip_preserves_policy() {
    let owner = TitanKeypair::generate().address();
    let mut manifest = DeploymentManifest::new(owner);
    manifest.pay_core.payment_policy = PaymentPolicy::OwnerOnly;

    let json = serde_json::to_string_pretty(&manifest).unwrap();
    let parsed: DeploymentManifest = serde_json::from_str(&json).unwrap();
    let d = Deployment::from_manifest(&parsed).unwrap();
    assert_eq!(d.pay_core.payment_policy(), PaymentPolicy::OwnerOnly);
}

#[test]
fn direct_transfer_errors_surface_as_medium_rejected() {
    let owner = TitanKeypair::generate().address();
    let mut d = Deployment::from_manifest(&DeploymentManifest::new(owner)).unwrap();
    let stranger = TitanKeypair::generate().address();

    let err = d.transfer(&stranger, &owner, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MediumRejected);
}
