//! # Deployment
//!
//! One Titan Pay instance: an [`Approval`] registry, a [`TitanToken`] and a
//! [`PayCore`] wired to that token, all owned by the same deployer.
//!
//! A [`DeploymentManifest`] is the JSON document a host keeps next to its
//! data; [`Deployment::from_manifest`] turns it into live contracts. The
//! whole bundle is serde-serializable so it can be snapshotted and
//! restored as one value.

use serde::{Deserialize, Serialize};

use titan_protocol::config::{DEFAULT_TOKEN_NAME, DEFAULT_TOKEN_SYMBOL};
use titan_protocol::{Address, Amount, TitanToken, ValueMedium};

use crate::approval::Approval;
use crate::error::ContractResult;
use crate::events::ContractEvent;
use crate::pay_core::{PayCore, PayCoreConfig, PaymentReceipt};

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Where each contract of a deployment lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentAddresses {
    pub approval: Address,
    pub pay_core: Address,
    pub titan: Address,
}

impl DeploymentAddresses {
    /// Deterministic addresses for a deployer.
    pub fn derive(owner: &Address) -> Self {
        Self {
            approval: Address::derive_contract(owner, "approval"),
            pay_core: Address::derive_contract(owner, "pay-core"),
            titan: Address::derive_contract(owner, "titan"),
        }
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    pub owner: Address,
    #[serde(default = "default_token_name")]
    pub token_name: String,
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,
    #[serde(default)]
    pub pay_core: PayCoreConfig,
    /// Derived from `owner` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<DeploymentAddresses>,
}

fn default_token_name() -> String {
    DEFAULT_TOKEN_NAME.to_string()
}

fn default_token_symbol() -> String {
    DEFAULT_TOKEN_SYMBOL.to_string()
}

impl DeploymentManifest {
    /// A manifest with default token metadata and PayCore parameters, and
    /// addresses derived from `owner`.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            token_name: default_token_name(),
            token_symbol: default_token_symbol(),
            pay_core: PayCoreConfig::default(),
            addresses: Some(DeploymentAddresses::derive(&owner)),
        }
    }

    pub fn resolved_addresses(&self) -> DeploymentAddresses {
        self.addresses
            .unwrap_or_else(|| DeploymentAddresses::derive(&self.owner))
    }
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub approval: Approval,
    pub pay_core: PayCore,
    pub titan: TitanToken,
}

impl Deployment {
    /// Deploys all three contracts.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidRatio`](crate::ContractError::InvalidRatio)
    /// if the manifest's fee ratio is out of range.
    pub fn from_manifest(manifest: &DeploymentManifest) -> ContractResult<Self> {
        let owner = manifest.owner;
        let addresses = manifest.resolved_addresses();

        let approval = Approval::new(addresses.approval, owner);
        let titan = TitanToken::new(
            addresses.titan,
            manifest.token_name.clone(),
            manifest.token_symbol.clone(),
            owner,
        );
        let pay_core =
            PayCore::with_config(addresses.pay_core, owner, addresses.titan, &manifest.pay_core)?;

        tracing::info!(
            %owner,
            approval = %addresses.approval,
            pay_core = %addresses.pay_core,
            titan = %addresses.titan,
            fee_ratio = pay_core.fee_ratio(),
            "deployment created"
        );
        Ok(Self {
            approval,
            pay_core,
            titan,
        })
    }

    pub fn addresses(&self) -> DeploymentAddresses {
        DeploymentAddresses {
            approval: self.approval.address(),
            pay_core: self.pay_core.address(),
            titan: self.titan.address(),
        }
    }

    /// Routes a payment through the deployment's own token.
    pub fn pay_titan(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> ContractResult<PaymentReceipt> {
        self.pay_core
            .pay_titan(caller, &mut self.titan, from, to, amount)
    }

    pub fn mint(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
    ) -> ContractResult<ContractEvent> {
        Ok(self.titan.mint(caller, to, amount)?.into())
    }

    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) -> ContractEvent {
        self.titan.approve(owner, spender, amount).into()
    }

    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> ContractResult<ContractEvent> {
        Ok(self.titan.transfer(from, to, amount)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn owner() -> Address {
        Address::new([0x0A; 20])
    }

    #[test]
    fn manifest_defaults() {
        let json = format!("{{\"owner\":\"{}\"}}", owner());
        let manifest: DeploymentManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest.token_name, "Titan");
        assert_eq!(manifest.token_symbol, "tt");
        assert_eq!(manifest.pay_core, PayCoreConfig::default());
        assert_eq!(
            manifest.resolved_addresses(),
            DeploymentAddresses::derive(&owner())
        );
    }

    #[test]
    fn deployment_wires_pay_core_to_token() {
        let d = Deployment::from_manifest(&DeploymentManifest::new(owner())).unwrap();
        assert_eq!(d.pay_core.titan(), d.titan.address());
        assert_eq!(d.pay_core.owner(), owner());
        assert_eq!(d.approval.owner(), owner());
        assert_eq!(d.titan.owner(), owner());
        assert_eq!(d.addresses(), DeploymentAddresses::derive(&owner()));
    }

    #[test]
    fn invalid_ratio_rejected() {
        let mut manifest = DeploymentManifest::new(owner());
        manifest.pay_core.fee_ratio = 20_000;
        assert_eq!(
            Deployment::from_manifest(&manifest).unwrap_err().kind(),
            ErrorKind::InvalidRatio
        );
    }

    #[test]
    fn mint_by_stranger_is_unauthorized() {
        let mut d = Deployment::from_manifest(&DeploymentManifest::new(owner())).unwrap();
        let stranger = Address::new([0x0B; 20]);
        let err = d.mint(&stranger, &stranger, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(d.titan.balance_of(&stranger), 0);
    }

    #[test]
    fn snapshot_round_trips() {
        let mut d = Deployment::from_manifest(&DeploymentManifest::new(owner())).unwrap();
        d.mint(&owner(), &owner(), 42).unwrap();
        let restored: Deployment =
            serde_json::from_str(&serde_json::to_string(&d).unwrap()).unwrap();
        assert_eq!(restored, d);
    }
}
