//! # PayCore
//!
//! The fee-split payment processor. It owns a [`FeeLedger`] and coordinates
//! payments through a [`ValueMedium`]:
//!
//! 1. Quote the split of `amount` from the ledger.
//! 2. Move the fee from the payer to the fee receiver.
//! 3. Move the remainder from the payer to the payee.
//!
//! Both legs are spent from PayCore's own allowance on the medium, so the
//! payer must have approved PayCore's address beforehand. PayCore does not
//! duplicate the medium's checks; it surfaces whatever the medium says.
//!
//! ## Atomicity
//!
//! A checkpoint of the medium is taken before the first leg. If either leg
//! fails, the medium is rolled back to it and the caller gets
//! [`ContractError::TransferFailed`]. Callers never observe a payment with
//! only the fee collected.

use serde::{Deserialize, Serialize};
use std::fmt;

use titan_protocol::config::DEFAULT_FEE_RATIO_BPS;
use titan_protocol::{Address, Amount, ValueMedium};

use crate::error::{ContractError, ContractResult, Leg, TransferFailure};
use crate::events::ContractEvent;
use crate::fee_ledger::{FeeLedger, FeeQuote};
use crate::ownership::require_owner;

/// Who may call [`PayCore::pay_titan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPolicy {
    /// Anyone; the medium's allowance is the only gate.
    #[default]
    Open,
    /// Only the PayCore owner.
    OwnerOnly,
}

impl fmt::Display for PaymentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentPolicy::Open => write!(f, "open"),
            PaymentPolicy::OwnerOnly => write!(f, "owner_only"),
        }
    }
}

impl std::str::FromStr for PaymentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "open" => Ok(PaymentPolicy::Open),
            "owner_only" => Ok(PaymentPolicy::OwnerOnly),
            other => Err(format!("unknown payment policy: {}", other)),
        }
    }
}

/// Initial parameters for a PayCore deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayCoreConfig {
    #[serde(default = "default_fee_ratio")]
    pub fee_ratio: u64,
    /// Defaults to the owner when absent.
    #[serde(default)]
    pub fee_receiver: Option<Address>,
    #[serde(default)]
    pub payment_policy: PaymentPolicy,
}

fn default_fee_ratio() -> u64 {
    DEFAULT_FEE_RATIO_BPS
}

impl Default for PayCoreConfig {
    fn default() -> Self {
        Self {
            fee_ratio: DEFAULT_FEE_RATIO_BPS,
            fee_receiver: None,
            payment_policy: PaymentPolicy::Open,
        }
    }
}

/// What a successful payment did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub from: Address,
    pub to: Address,
    pub quote: FeeQuote,
    /// Medium `Transfer`s for the non-zero legs, then `PaymentProcessed`.
    pub events: Vec<ContractEvent>,
}

/// The payment processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayCore {
    address: Address,
    ledger: FeeLedger,
    policy: PaymentPolicy,
}

impl PayCore {
    /// Deploys with default parameters: 0.3% fee to `owner`, open payments.
    pub fn new(address: Address, owner: Address, value_medium: Address) -> Self {
        Self {
            address,
            ledger: FeeLedger::new(owner, value_medium),
            policy: PaymentPolicy::Open,
        }
    }

    /// Deploys with explicit parameters.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidRatio`] if `config.fee_ratio` exceeds 100%.
    pub fn with_config(
        address: Address,
        owner: Address,
        value_medium: Address,
        config: &PayCoreConfig,
    ) -> ContractResult<Self> {
        let mut ledger = FeeLedger::with_ratio(owner, value_medium, config.fee_ratio)?;
        if let Some(receiver) = config.fee_receiver {
            ledger.set_fee_receiver(&owner, receiver)?;
        }
        Ok(Self {
            address,
            ledger,
            policy: config.payment_policy,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.ledger.owner()
    }

    pub fn fee_ratio(&self) -> u64 {
        self.ledger.fee_ratio()
    }

    pub fn fee_receiver(&self) -> Address {
        self.ledger.fee_receiver()
    }

    /// The value medium payments are routed through.
    pub fn titan(&self) -> Address {
        self.ledger.value_medium()
    }

    pub fn payment_policy(&self) -> PaymentPolicy {
        self.policy
    }

    /// Quotes the split of `amount` under the current parameters.
    pub fn fee_info(&self, amount: Amount) -> ContractResult<FeeQuote> {
        self.ledger.fee_info(amount)
    }

    pub fn set_fee_ratio(&mut self, caller: &Address, new_ratio: u64) -> ContractResult<ContractEvent> {
        let old_ratio = self.ledger.set_fee_ratio(caller, new_ratio)?;
        tracing::info!(contract = %self.address, old_ratio, new_ratio, "fee ratio changed");
        Ok(ContractEvent::FeeRatioChanged {
            contract: self.address,
            old_ratio,
            new_ratio,
        })
    }

    pub fn set_fee_receiver(
        &mut self,
        caller: &Address,
        new_receiver: Address,
    ) -> ContractResult<ContractEvent> {
        let old_receiver = self.ledger.set_fee_receiver(caller, new_receiver)?;
        tracing::info!(contract = %self.address, %old_receiver, %new_receiver, "fee receiver changed");
        Ok(ContractEvent::FeeReceiverChanged {
            contract: self.address,
            old_receiver,
            new_receiver,
        })
    }

    /// Points PayCore at a different value medium. Nothing checks that the
    /// new address is actually a medium; payments through anything else
    /// fail with a medium mismatch.
    pub fn set_titan(&mut self, caller: &Address, new_medium: Address) -> ContractResult<ContractEvent> {
        let old_medium = self.ledger.set_value_medium(caller, new_medium)?;
        tracing::info!(contract = %self.address, %old_medium, %new_medium, "value medium changed");
        Ok(ContractEvent::ValueMediumChanged {
            contract: self.address,
            old_medium,
            new_medium,
        })
    }

    pub fn set_payment_policy(
        &mut self,
        caller: &Address,
        new_policy: PaymentPolicy,
    ) -> ContractResult<ContractEvent> {
        require_owner(caller, &self.ledger.owner())?;
        let old_policy = std::mem::replace(&mut self.policy, new_policy);
        tracing::info!(contract = %self.address, %old_policy, %new_policy, "payment policy changed");
        Ok(ContractEvent::PaymentPolicyChanged {
            contract: self.address,
            old_policy,
            new_policy,
        })
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> ContractResult<ContractEvent> {
        let previous_owner = self.ledger.transfer_ownership(caller, new_owner)?;
        tracing::info!(contract = %self.address, %previous_owner, %new_owner, "ownership transferred");
        Ok(ContractEvent::OwnershipTransferred {
            contract: self.address,
            previous_owner,
            new_owner,
        })
    }

    /// Pays `amount` from `from` to `to`, taking the fee on the way.
    ///
    /// # Errors
    ///
    /// - [`ContractError::Unauthorized`] if the payment policy excludes `caller`.
    /// - [`ContractError::TransferFailed`] if `medium` is not the configured
    ///   medium, or if it rejects either leg. The medium is left exactly as
    ///   it was before the call.
    /// - [`ContractError::ArithmeticOverflow`] if the fee cannot be computed.
    pub fn pay_titan<M: ValueMedium>(
        &self,
        caller: &Address,
        medium: &mut M,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> ContractResult<PaymentReceipt> {
        if self.policy == PaymentPolicy::OwnerOnly && !self.ledger.is_owner(caller) {
            tracing::warn!(contract = %self.address, caller = %caller, "payment refused by policy");
            return Err(ContractError::Unauthorized { caller: *caller });
        }

        let expected = self.ledger.value_medium();
        let actual = medium.address();
        if actual != expected {
            return Err(TransferFailure::MediumMismatch { expected, actual }.into());
        }

        let quote = self.ledger.fee_info(amount)?;
        let checkpoint = medium.checkpoint();
        let legs = [
            (Leg::Fee, quote.receiver, quote.fee),
            (Leg::Remainder, *to, quote.remainder),
        ];

        let mut events = Vec::with_capacity(3);
        for (leg, recipient, value) in legs {
            if value == 0 {
                continue;
            }
            match medium.transfer_from(&self.address, from, &recipient, value) {
                Ok(event) => events.push(event.into()),
                Err(error) => {
                    medium.rollback(checkpoint);
                    tracing::warn!(
                        contract = %self.address,
                        %from,
                        %to,
                        amount,
                        %leg,
                        %error,
                        "payment rolled back"
                    );
                    return Err(TransferFailure::LegRejected { leg, error }.into());
                }
            }
        }

        events.push(ContractEvent::PaymentProcessed {
            contract: self.address,
            from: *from,
            to: *to,
            amount,
            fee_amount: quote.fee,
            receiver: quote.receiver,
        });

        tracing::info!(
            contract = %self.address,
            %from,
            %to,
            amount,
            fee = quote.fee,
            receiver = %quote.receiver,
            "payment processed"
        );
        Ok(PaymentReceipt {
            from: *from,
            to: *to,
            quote,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use titan_protocol::{MediumError, TitanToken};

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    const OWNER: u8 = 1;
    const PAYER: u8 = 2;
    const PAYEE: u8 = 3;
    const TOKEN: u8 = 0xEE;
    const CORE: u8 = 0xCC;

    fn setup(ratio: u64, minted: Amount, allowance: Amount) -> (PayCore, TitanToken) {
        let mut core = PayCore::new(addr(CORE), addr(OWNER), addr(TOKEN));
        core.set_fee_ratio(&addr(OWNER), ratio).unwrap();
        let mut token = TitanToken::new(addr(TOKEN), "Titan", "tt", addr(OWNER));
        token.mint(&addr(OWNER), &addr(PAYER), minted).unwrap();
        token.approve(&addr(PAYER), &addr(CORE), allowance);
        (core, token)
    }

    #[test]
    fn splits_fee_and_remainder() {
        let (core, mut token) = setup(500, 100_000, 100_000);
        let receipt = core
            .pay_titan(&addr(9), &mut token, &addr(PAYER), &addr(PAYEE), 10_000)
            .unwrap();
        assert_eq!(receipt.quote.fee, 500);
        assert_eq!(receipt.quote.remainder, 9_500);
        assert_eq!(token.balance_of(&addr(OWNER)), 500);
        assert_eq!(token.balance_of(&addr(PAYEE)), 9_500);
        assert_eq!(token.balance_of(&addr(PAYER)), 90_000);
        assert_eq!(receipt.events.len(), 3);
        assert_eq!(receipt.events[2].name(), "PaymentProcessed");
    }

    #[test]
    fn zero_fee_leg_is_skipped() {
        let (core, mut token) = setup(30, 1_000, 1_000);
        let receipt = core
            .pay_titan(&addr(PAYER), &mut token, &addr(PAYER), &addr(PAYEE), 100)
            .unwrap();
        assert_eq!(receipt.quote.fee, 0);
        assert_eq!(receipt.events.len(), 2);
        assert_eq!(token.balance_of(&addr(PAYEE)), 100);
    }

    #[test]
    fn remainder_failure_rolls_back_fee_leg() {
        // Allowance covers the fee but not the whole amount.
        let (core, mut token) = setup(500, 100_000, 600);
        let before = token.clone();
        let err = core
            .pay_titan(&addr(PAYER), &mut token, &addr(PAYER), &addr(PAYEE), 10_000)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransferFailed);
        assert!(matches!(
            err,
            ContractError::TransferFailed(TransferFailure::LegRejected {
                leg: Leg::Remainder,
                error: MediumError::InsufficientAllowance { .. }
            })
        ));
        assert_eq!(token, before);
    }

    #[test]
    fn insufficient_balance_fails_on_fee_leg() {
        let (core, mut token) = setup(500, 10, 1_000_000);
        let err = core
            .pay_titan(&addr(PAYER), &mut token, &addr(PAYER), &addr(PAYEE), 10_000)
            .unwrap_err();
        assert!(matches!(
            err,
            ContractError::TransferFailed(TransferFailure::LegRejected { leg: Leg::Fee, .. })
        ));
        assert_eq!(token.balance_of(&addr(PAYER)), 10);
    }

    #[test]
    fn wrong_medium_is_rejected() {
        let (core, _) = setup(500, 0, 0);
        let mut other = TitanToken::new(addr(0xDD), "Other", "oo", addr(OWNER));
        let err = core
            .pay_titan(&addr(PAYER), &mut other, &addr(PAYER), &addr(PAYEE), 1)
            .unwrap_err();
        assert_eq!(
            err,
            ContractError::TransferFailed(TransferFailure::MediumMismatch {
                expected: addr(TOKEN),
                actual: addr(0xDD),
            })
        );
    }

    #[test]
    fn owner_only_policy_gates_callers() {
        let (mut core, mut token) = setup(500, 100_000, 100_000);
        core.set_payment_policy(&addr(OWNER), PaymentPolicy::OwnerOnly)
            .unwrap();
        let err = core
            .pay_titan(&addr(PAYER), &mut token, &addr(PAYER), &addr(PAYEE), 100)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(core
            .pay_titan(&addr(OWNER), &mut token, &addr(PAYER), &addr(PAYEE), 100)
            .is_ok());
    }

    #[test]
    fn policy_change_is_owner_gated() {
        let (mut core, _) = setup(30, 0, 0);
        assert!(core
            .set_payment_policy(&addr(PAYER), PaymentPolicy::OwnerOnly)
            .is_err());
        assert_eq!(core.payment_policy(), PaymentPolicy::Open);
    }

    #[test]
    fn with_config_applies_receiver_and_policy() {
        let config = PayCoreConfig {
            fee_ratio: 250,
            fee_receiver: Some(addr(7)),
            payment_policy: PaymentPolicy::OwnerOnly,
        };
        let core = PayCore::with_config(addr(CORE), addr(OWNER), addr(TOKEN), &config).unwrap();
        assert_eq!(core.fee_ratio(), 250);
        assert_eq!(core.fee_receiver(), addr(7));
        assert_eq!(core.payment_policy(), PaymentPolicy::OwnerOnly);

        let bad = PayCoreConfig {
            fee_ratio: 10_001,
            ..PayCoreConfig::default()
        };
        assert_eq!(
            PayCore::with_config(addr(CORE), addr(OWNER), addr(TOKEN), &bad)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidRatio
        );
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: PayCoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PayCoreConfig::default());
    }

    #[test]
    fn policy_parses_from_text() {
        assert_eq!("open".parse::<PaymentPolicy>().unwrap(), PaymentPolicy::Open);
        assert_eq!(
            "owner-only".parse::<PaymentPolicy>().unwrap(),
            PaymentPolicy::OwnerOnly
        );
        assert!("anyone".parse::<PaymentPolicy>().is_err());
    }
}
