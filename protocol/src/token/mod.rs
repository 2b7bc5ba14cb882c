//! # Value-Transfer Medium
//!
//! The payment contracts never hold balances themselves. They ask a
//! fungible token (the "medium") to move value on their behalf, subject to
//! whatever authorization the token enforces, usually a prior allowance.
//!
//! - [`medium`] defines the [`ValueMedium`] contract the payment core
//!   depends on, including the checkpoint/rollback hooks that make a
//!   multi-leg payment all-or-nothing.
//! - [`titan`] is the reference implementation: an in-memory ERC-20
//!   equivalent that a node hosts next to the contracts.

pub mod medium;
pub mod titan;

pub use medium::{Amount, MediumError, TokenEvent, ValueMedium};
pub use titan::TitanToken;
