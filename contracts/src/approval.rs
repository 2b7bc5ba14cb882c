//! # Approval Registry
//!
//! Owner-governed capability levels for accounts. The owner grants, changes
//! and revokes levels; anyone may query them.
//!
//! ## Levels
//!
//! | Value | Level      | RPC query          |
//! |-------|------------|--------------------|
//! | 0     | `None`     |                    |
//! | 1     | `Operator` | `approval_isMiner` |
//! | 2     | `Elevated` | `approval_isSuper` |
//!
//! The two queries are not a hierarchy. [`Approval::is_operator`] is true
//! only for accounts stored at `Operator`, so an `Elevated` account is not
//! an operator. [`Approval::is_elevated`] checks ownership first and only
//! then consults the map: the owner is always elevated, whatever its stored
//! level says.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use titan_protocol::Address;

use crate::error::{ContractError, ContractResult};
use crate::events::ContractEvent;
use crate::ownership::Ownable;

/// Capability rank of an account. Ordered `None < Operator < Elevated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum CapabilityLevel {
    #[default]
    None,
    Operator,
    Elevated,
}

impl CapabilityLevel {
    /// The integer a caller passes on the wire.
    pub fn as_u8(self) -> u8 {
        match self {
            CapabilityLevel::None => 0,
            CapabilityLevel::Operator => 1,
            CapabilityLevel::Elevated => 2,
        }
    }
}

impl TryFrom<u64> for CapabilityLevel {
    type Error = ContractError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CapabilityLevel::None),
            1 => Ok(CapabilityLevel::Operator),
            2 => Ok(CapabilityLevel::Elevated),
            other => Err(ContractError::InvalidLevel(other)),
        }
    }
}

/// The permission registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    address: Address,
    ownable: Ownable,
    /// Absent accounts hold `None`; `None` is never stored.
    levels: BTreeMap<Address, CapabilityLevel>,
}

impl Approval {
    /// Deploys an empty registry at `address`, owned by `owner`.
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            ownable: Ownable::new(owner),
            levels: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.ownable.owner()
    }

    /// Stored level of `account`. The owner's implicit elevation is not
    /// reflected here.
    pub fn level_of(&self, account: &Address) -> CapabilityLevel {
        self.levels.get(account).copied().unwrap_or_default()
    }

    /// Writes `target`'s level. Owner only.
    ///
    /// `level` is the raw wire value so the range check happens here.
    /// Writing `0` revokes; revoking an account that holds nothing succeeds
    /// and still emits `LevelChanged` (with equal old and new levels).
    ///
    /// # Errors
    ///
    /// [`ContractError::Unauthorized`] if `caller` is not the owner (checked
    /// first), [`ContractError::InvalidLevel`] if `level > 2`.
    pub fn set_level(
        &mut self,
        caller: &Address,
        target: &Address,
        level: u64,
    ) -> ContractResult<ContractEvent> {
        self.ownable.require_owner(caller)?;
        let new_level = CapabilityLevel::try_from(level)?;

        let old_level = match new_level {
            CapabilityLevel::None => self.levels.remove(target),
            level => self.levels.insert(*target, level),
        }
        .unwrap_or_default();

        tracing::info!(
            contract = %self.address,
            target = %target,
            ?old_level,
            ?new_level,
            "capability level set"
        );
        Ok(ContractEvent::LevelChanged {
            contract: self.address,
            target: *target,
            old_level,
            new_level,
        })
    }

    /// `true` for the owner, and for any account stored at `Elevated`.
    pub fn is_elevated(&self, account: &Address) -> bool {
        self.ownable.is_owner(account) || self.level_of(account) == CapabilityLevel::Elevated
    }

    /// `true` only for accounts stored at `Operator`.
    pub fn is_operator(&self, account: &Address) -> bool {
        self.level_of(account) == CapabilityLevel::Operator
    }

    /// Number of accounts holding a non-`None` level.
    pub fn granted_count(&self) -> usize {
        self.levels.len()
    }

    /// Hands the registry to a new owner. The previous owner loses its
    /// implicit elevation (but keeps any level stored for it).
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> ContractResult<ContractEvent> {
        let previous_owner = self.ownable.transfer_ownership(caller, new_owner)?;
        tracing::info!(contract = %self.address, %previous_owner, %new_owner, "ownership transferred");
        Ok(ContractEvent::OwnershipTransferred {
            contract: self.address,
            previous_owner,
            new_owner,
        })
    }
}
