//! # Observations
//!
//! Every successful mutation returns the events it produced. Nothing is
//! buffered inside the contracts: the host decides whether to publish,
//! persist, or drop them.

use serde::{Deserialize, Serialize};

use titan_protocol::{Address, Amount, TokenEvent};

use crate::approval::CapabilityLevel;
use crate::pay_core::PaymentPolicy;

/// Everything the contracts can report to indexers and front-ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContractEvent {
    /// A capability level was written. Emitted even when old and new match.
    LevelChanged {
        contract: Address,
        target: Address,
        old_level: CapabilityLevel,
        new_level: CapabilityLevel,
    },
    /// A payment was split and both legs committed.
    PaymentProcessed {
        contract: Address,
        from: Address,
        to: Address,
        amount: Amount,
        fee_amount: Amount,
        receiver: Address,
    },
    FeeRatioChanged {
        contract: Address,
        old_ratio: u64,
        new_ratio: u64,
    },
    FeeReceiverChanged {
        contract: Address,
        old_receiver: Address,
        new_receiver: Address,
    },
    ValueMediumChanged {
        contract: Address,
        old_medium: Address,
        new_medium: Address,
    },
    PaymentPolicyChanged {
        contract: Address,
        old_policy: PaymentPolicy,
        new_policy: PaymentPolicy,
    },
    OwnershipTransferred {
        contract: Address,
        previous_owner: Address,
        new_owner: Address,
    },
    /// Relayed from the value medium.
    Transfer {
        token: Address,
        from: Address,
        to: Address,
        amount: Amount,
    },
    /// Relayed from the value medium.
    Approval {
        token: Address,
        owner: Address,
        spender: Address,
        amount: Amount,
    },
}

impl ContractEvent {
    /// Short name of the variant, used as a metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            ContractEvent::LevelChanged { .. } => "LevelChanged",
            ContractEvent::PaymentProcessed { .. } => "PaymentProcessed",
            ContractEvent::FeeRatioChanged { .. } => "FeeRatioChanged",
            ContractEvent::FeeReceiverChanged { .. } => "FeeReceiverChanged",
            ContractEvent::ValueMediumChanged { .. } => "ValueMediumChanged",
            ContractEvent::PaymentPolicyChanged { .. } => "PaymentPolicyChanged",
            ContractEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
            ContractEvent::Transfer { .. } => "Transfer",
            ContractEvent::Approval { .. } => "Approval",
        }
    }
}

impl From<TokenEvent> for ContractEvent {
    fn from(event: TokenEvent) -> Self {
        match event {
            TokenEvent::Transfer {
                token,
                from,
                to,
                amount,
            } => ContractEvent::Transfer {
                token,
                from,
                to,
                amount,
            },
            TokenEvent::Approval {
                token,
                owner,
                spender,
                amount,
            } => ContractEvent::Approval {
                token,
                owner,
                spender,
                amount,
            },
        }
    }
}
