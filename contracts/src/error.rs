//! # Contract Errors
//!
//! One taxonomy for every contract in the crate. Callers (tests, the node,
//! front-ends) should match on [`ContractError::kind`] rather than on the
//! message text, which is for humans and may change.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use titan_protocol::{Address, MediumError};

/// Which half of a payment a medium call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leg {
    /// The fee portion, sent to the fee receiver.
    Fee,
    /// Everything else, sent to the payee.
    Remainder,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Fee => write!(f, "fee"),
            Leg::Remainder => write!(f, "remainder"),
        }
    }
}

/// Why a payment did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferFailure {
    /// The medium handed to the coordinator is not the one it is configured
    /// to use.
    #[error("value medium mismatch: configured {expected}, supplied {actual}")]
    MediumMismatch { expected: Address, actual: Address },

    /// The medium refused one of the legs. Every leg already applied has
    /// been rolled back.
    #[error("{leg} leg rejected: {error}")]
    LegRejected { leg: Leg, error: MediumError },
}

/// Errors returned by contract operations.
///
/// A failed operation never leaves partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The caller failed an ownership (or payment policy) check.
    #[error("unauthorized: {caller} may not perform this operation")]
    Unauthorized { caller: Address },

    /// A capability level outside `0..=2`.
    #[error("invalid capability level: {0}")]
    InvalidLevel(u64),

    /// A fee ratio above the denominator.
    #[error("invalid fee ratio: {ratio} exceeds {max}")]
    InvalidRatio { ratio: u64, max: u64 },

    /// The value medium rejected the payment.
    #[error("transfer failed: {0}")]
    TransferFailed(#[from] TransferFailure),

    /// Fee arithmetic could not be represented.
    #[error("arithmetic overflow in fee computation")]
    ArithmeticOverflow,

    /// A direct medium operation (mint, approve, transfer) was refused.
    #[error("value medium rejected the operation: {0}")]
    MediumRejected(MediumError),
}

impl From<MediumError> for ContractError {
    fn from(error: MediumError) -> Self {
        match error {
            MediumError::Unauthorized(caller) => ContractError::Unauthorized { caller },
            other => ContractError::MediumRejected(other),
        }
    }
}

/// The stable, machine-readable category of a [`ContractError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    InvalidLevel,
    InvalidRatio,
    TransferFailed,
    ArithmeticOverflow,
    MediumRejected,
}

impl ErrorKind {
    /// Snake-case name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidLevel => "invalid_level",
            ErrorKind::InvalidRatio => "invalid_ratio",
            ErrorKind::TransferFailed => "transfer_failed",
            ErrorKind::ArithmeticOverflow => "arithmetic_overflow",
            ErrorKind::MediumRejected => "medium_rejected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ContractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContractError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ContractError::InvalidLevel(_) => ErrorKind::InvalidLevel,
            ContractError::InvalidRatio { .. } => ErrorKind::InvalidRatio,
            ContractError::TransferFailed(_) => ErrorKind::TransferFailed,
            ContractError::ArithmeticOverflow => ErrorKind::ArithmeticOverflow,
            ContractError::MediumRejected(_) => ErrorKind::MediumRejected,
        }
    }
}

pub type ContractResult<T> = Result<T, ContractError>;
