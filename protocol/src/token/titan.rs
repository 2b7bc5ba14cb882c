//! # Titan Token
//!
//! The reference value medium: a plain ERC-20 style ledger with an
//! owner-gated mint. Every PayCore deployment is paired with one of these.
//!
//! ## Invariants
//!
//! - `total_supply` equals the sum of all balances. Only `mint` changes it.
//! - Every mutation validates completely before writing anything, so a
//!   failed call leaves balances and allowances untouched.
//! - Arithmetic is checked. Wrapping arithmetic and money do not mix.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::medium::{Amount, MediumError, TokenEvent, ValueMedium};
use crate::address::Address;
use crate::config::TOKEN_DECIMALS;

/// Balances and allowances. Split out so a checkpoint is a single clone.
///
/// `BTreeMap` rather than `HashMap` so serialized snapshots are byte-stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    total_supply: Amount,
    balances: BTreeMap<Address, Amount>,
    /// `owner -> spender -> remaining allowance`.
    allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
}

/// An in-memory fungible token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitanToken {
    address: Address,
    name: String,
    symbol: String,
    decimals: u8,
    /// The only identity allowed to mint.
    owner: Address,
    ledger: TokenLedger,
}

impl TitanToken {
    /// Creates a token with zero supply.
    pub fn new(
        address: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        owner: Address,
    ) -> Self {
        Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            decimals: TOKEN_DECIMALS,
            owner,
            ledger: TokenLedger::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn total_supply(&self) -> Amount {
        self.ledger.total_supply
    }

    /// Creates `amount` new units in `to`'s balance.
    ///
    /// # Errors
    ///
    /// [`MediumError::Unauthorized`] if `caller` is not the token owner,
    /// [`MediumError::Overflow`] if the supply or the balance would overflow.
    pub fn mint(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<TokenEvent, MediumError> {
        if *caller != self.owner {
            return Err(MediumError::Unauthorized(*caller));
        }
        let new_supply = self
            .ledger
            .total_supply
            .checked_add(amount)
            .ok_or(MediumError::Overflow)?;
        let new_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(MediumError::Overflow)?;

        self.ledger.total_supply = new_supply;
        self.set_balance(to, new_balance);

        tracing::debug!(token = %self.address, to = %to, amount, "minted");
        Ok(TokenEvent::Transfer {
            token: self.address,
            from: Address::ZERO,
            to: *to,
            amount,
        })
    }

    /// Sets `spender`'s allowance over `owner`'s balance to exactly `amount`,
    /// replacing whatever was there. Setting zero revokes.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) -> TokenEvent {
        let spenders = self.ledger.allowances.entry(*owner).or_default();
        if amount == 0 {
            spenders.remove(spender);
        } else {
            spenders.insert(*spender, amount);
        }
        if spenders.is_empty() {
            self.ledger.allowances.remove(owner);
        }

        TokenEvent::Approval {
            token: self.address,
            owner: *owner,
            spender: *spender,
            amount,
        }
    }

    /// Moves `amount` from `from` to `to` on `from`'s own authority.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<TokenEvent, MediumError> {
        self.move_balance(from, to, amount)?;
        Ok(TokenEvent::Transfer {
            token: self.address,
            from: *from,
            to: *to,
            amount,
        })
    }

    /// Validates, then applies, a balance movement.
    fn move_balance(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), MediumError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(MediumError::InsufficientBalance {
                account: *from,
                balance: from_balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(MediumError::Overflow)?;

        self.set_balance(from, from_balance - amount);
        self.set_balance(to, to_balance);
        Ok(())
    }

    /// Zero balances are not stored, so snapshots don't grow with every
    /// account that ever held and spent funds.
    fn set_balance(&mut self, account: &Address, amount: Amount) {
        if amount == 0 {
            self.ledger.balances.remove(account);
        } else {
            self.ledger.balances.insert(*account, amount);
        }
    }
}

impl ValueMedium for TitanToken {
    type Checkpoint = TokenLedger;

    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.ledger.balances.get(account).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.ledger
            .allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<TokenEvent, MediumError> {
        let allowance = self.allowance(from, spender);
        if allowance < amount {
            return Err(MediumError::InsufficientAllowance {
                owner: *from,
                spender: *spender,
                allowance,
                requested: amount,
            });
        }

        // Balance check happens inside; nothing is written if it fails.
        self.move_balance(from, to, amount)?;

        let remaining = allowance - amount;
        if let Some(spenders) = self.ledger.allowances.get_mut(from) {
            if remaining == 0 {
                spenders.remove(spender);
            } else {
                spenders.insert(*spender, remaining);
            }
            if spenders.is_empty() {
                self.ledger.allowances.remove(from);
            }
        }

        Ok(TokenEvent::Transfer {
            token: self.address,
            from: *from,
            to: *to,
            amount,
        })
    }

    fn checkpoint(&self) -> TokenLedger {
        self.ledger.clone()
    }

    fn rollback(&mut self, checkpoint: TokenLedger) {
        self.ledger = checkpoint;
    }
}
