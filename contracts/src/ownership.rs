//! # Ownership Gate
//!
//! Every administrative mutation in the crate starts with
//! [`Ownable::require_owner`]. The gate never changes state itself; a
//! contract calls it first and only writes once it has returned `Ok`.

use serde::{Deserialize, Serialize};

use titan_protocol::Address;

use crate::error::{ContractError, ContractResult};

/// Fails with [`ContractError::Unauthorized`] unless `caller == owner`.
pub fn require_owner(caller: &Address, owner: &Address) -> ContractResult<()> {
    if caller != owner {
        return Err(ContractError::Unauthorized { caller: *caller });
    }
    Ok(())
}

/// A single designated owner identity.
///
/// There is no renounce: both contracts rely on always having an owner
/// (the approval registry treats it as implicitly elevated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownable {
    owner: Address,
}

impl Ownable {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_owner(&self, account: &Address) -> bool {
        *account == self.owner
    }

    /// Guard for administrative operations.
    pub fn require_owner(&self, caller: &Address) -> ContractResult<()> {
        require_owner(caller, &self.owner)
    }

    /// Hands ownership to `new_owner`. Returns the previous owner.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> ContractResult<Address> {
        self.require_owner(caller)?;
        let previous = std::mem::replace(&mut self.owner, new_owner);
        Ok(previous)
    }
}
