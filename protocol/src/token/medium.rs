//! The [`ValueMedium`] contract and its error and event types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;

/// An integer count of the medium's smallest unit.
pub type Amount = u64;

/// Reasons a medium refuses to move value.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MediumError {
    /// The source account does not hold enough.
    #[error("insufficient balance: {account} has {balance}, requested {requested}")]
    InsufficientBalance {
        account: Address,
        balance: Amount,
        requested: Amount,
    },

    /// The spender has not been granted enough allowance by the owner.
    #[error(
        "insufficient allowance: {spender} may spend {allowance} of {owner}'s funds, requested {requested}"
    )]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: Amount,
        requested: Amount,
    },

    /// A balance or the total supply would exceed `u64::MAX`.
    #[error("amount overflow")]
    Overflow,

    /// The caller may not perform this medium-level operation (e.g. mint).
    #[error("unauthorized: {0} may not perform this operation")]
    Unauthorized(Address),
}

/// Observations a medium emits, mirroring the ERC-20 event pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenEvent {
    /// Value moved. `from` is [`Address::ZERO`] for mints.
    Transfer {
        token: Address,
        from: Address,
        to: Address,
        amount: Amount,
    },
    /// `owner` set `spender`'s allowance to `amount`.
    Approval {
        token: Address,
        owner: Address,
        spender: Address,
        amount: Amount,
    },
}

/// A fungible value-transfer medium the payment core can delegate to.
///
/// Implementations enforce their own authorization; callers surface the
/// [`MediumError`] rather than second-guessing it.
///
/// ## Atomicity
///
/// A single `transfer_from` must be all-or-nothing on its own. Spanning
/// several calls is the caller's job: take a [`checkpoint`](Self::checkpoint)
/// first and hand it back to [`rollback`](Self::rollback) if a later call
/// fails. After a rollback the medium must be observably identical to the
/// moment the checkpoint was taken.
pub trait ValueMedium {
    /// Opaque state captured by [`checkpoint`](Self::checkpoint).
    type Checkpoint;

    /// The medium's own identity. The payment core compares this with the
    /// medium reference it was configured with.
    fn address(&self) -> Address;

    /// Balance of `account`; unknown accounts hold zero.
    fn balance_of(&self, account: &Address) -> Amount;

    /// How much of `owner`'s balance `spender` may move.
    fn allowance(&self, owner: &Address, spender: &Address) -> Amount;

    /// Moves `amount` from `from` to `to`, spending `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<TokenEvent, MediumError>;

    /// Captures enough state to undo any sequence of later mutations.
    fn checkpoint(&self) -> Self::Checkpoint;

    /// Restores the state captured by `checkpoint`.
    fn rollback(&mut self, checkpoint: Self::Checkpoint);
}
