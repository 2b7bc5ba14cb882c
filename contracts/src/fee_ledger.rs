//! # Fee Accounting Ledger
//!
//! Holds the parameters of a payment split (ratio, receiver, medium) and
//! computes quotes. It moves no value; that is [`crate::pay_core`]'s job.
//!
//! ## Fee arithmetic
//!
//! `fee = floor(amount * ratio / 10_000)`. The product is computed in
//! `u128`, where `u64::MAX * 10_000` fits with room to spare, and the
//! quotient is narrowed back with a checked conversion. Since
//! `ratio <= 10_000`, the fee never exceeds the amount, so
//! `fee + remainder == amount` holds exactly for every quote.

use serde::{Deserialize, Serialize};

use titan_protocol::config::{DEFAULT_FEE_RATIO_BPS, FEE_DENOMINATOR, MAX_FEE_RATIO_BPS};
use titan_protocol::{Address, Amount};

use crate::error::{ContractError, ContractResult};
use crate::ownership::Ownable;

/// `floor(amount * ratio / FEE_DENOMINATOR)`, overflow-safe.
pub fn compute_fee(amount: Amount, ratio: u64) -> ContractResult<Amount> {
    let product = u128::from(amount)
        .checked_mul(u128::from(ratio))
        .ok_or(ContractError::ArithmeticOverflow)?;
    let fee = product / u128::from(FEE_DENOMINATOR);
    Amount::try_from(fee).map_err(|_| ContractError::ArithmeticOverflow)
}

/// Rejects ratios above 100%.
pub fn validate_ratio(ratio: u64) -> ContractResult<()> {
    if ratio > MAX_FEE_RATIO_BPS {
        return Err(ContractError::InvalidRatio {
            ratio,
            max: MAX_FEE_RATIO_BPS,
        });
    }
    Ok(())
}

/// The split of one amount under the ledger's current parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    /// Who gets the fee.
    pub receiver: Address,
    /// The amount being split.
    pub amount: Amount,
    /// Fee portion.
    pub fee: Amount,
    /// What the payee receives: `amount - fee`.
    pub remainder: Amount,
}

/// Owner-governed fee parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLedger {
    ownable: Ownable,
    /// Parts per [`FEE_DENOMINATOR`]. Always `<= MAX_FEE_RATIO_BPS`.
    fee_ratio: u64,
    fee_receiver: Address,
    /// Address of the value medium payments are routed through.
    value_medium: Address,
}

impl FeeLedger {
    /// A ledger with the default 0.3% ratio and the owner as receiver.
    pub fn new(owner: Address, value_medium: Address) -> Self {
        Self {
            ownable: Ownable::new(owner),
            fee_ratio: DEFAULT_FEE_RATIO_BPS,
            fee_receiver: owner,
            value_medium,
        }
    }

    /// A ledger starting at `fee_ratio` instead of the default.
    pub fn with_ratio(owner: Address, value_medium: Address, fee_ratio: u64) -> ContractResult<Self> {
        validate_ratio(fee_ratio)?;
        Ok(Self {
            fee_ratio,
            ..Self::new(owner, value_medium)
        })
    }

    pub fn owner(&self) -> Address {
        self.ownable.owner()
    }

    pub fn is_owner(&self, account: &Address) -> bool {
        self.ownable.is_owner(account)
    }

    pub fn fee_ratio(&self) -> u64 {
        self.fee_ratio
    }

    pub fn fee_receiver(&self) -> Address {
        self.fee_receiver
    }

    pub fn value_medium(&self) -> Address {
        self.value_medium
    }

    /// Quotes the split of `amount`. Pure.
    pub fn fee_info(&self, amount: Amount) -> ContractResult<FeeQuote> {
        let fee = compute_fee(amount, self.fee_ratio)?;
        Ok(FeeQuote {
            receiver: self.fee_receiver,
            amount,
            fee,
            // fee <= amount because fee_ratio <= FEE_DENOMINATOR.
            remainder: amount - fee,
        })
    }

    /// Replaces the ratio. Returns the previous one.
    pub fn set_fee_ratio(&mut self, caller: &Address, new_ratio: u64) -> ContractResult<u64> {
        self.ownable.require_owner(caller)?;
        validate_ratio(new_ratio)?;
        Ok(std::mem::replace(&mut self.fee_ratio, new_ratio))
    }

    /// Replaces the receiver. Any address is accepted, including the zero
    /// address and the owner. Returns the previous receiver.
    pub fn set_fee_receiver(
        &mut self,
        caller: &Address,
        new_receiver: Address,
    ) -> ContractResult<Address> {
        self.ownable.require_owner(caller)?;
        Ok(std::mem::replace(&mut self.fee_receiver, new_receiver))
    }

    /// Points the ledger at a different medium. Returns the previous one.
    pub fn set_value_medium(
        &mut self,
        caller: &Address,
        new_medium: Address,
    ) -> ContractResult<Address> {
        self.ownable.require_owner(caller)?;
        Ok(std::mem::replace(&mut self.value_medium, new_medium))
    }

    /// Returns the previous owner.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> ContractResult<Address> {
        self.ownable.transfer_ownership(caller, new_owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn ledger() -> FeeLedger {
        FeeLedger::new(addr(1), addr(0xEE))
    }

    #[test]
    fn defaults() {
        let l = ledger();
        assert_eq!(l.fee_ratio(), 30);
        assert_eq!(l.fee_receiver(), addr(1));
        assert_eq!(l.value_medium(), addr(0xEE));
        assert_eq!(l.owner(), addr(1));
    }

    #[test]
    fn default_ratio_quotes() {
        let l = ledger();
        let q = l.fee_info(1000).unwrap();
        assert_eq!((q.receiver, q.fee, q.remainder), (addr(1), 3, 997));
        assert_eq!(l.fee_info(100).unwrap().fee, 0);
    }

    #[test]
    fn fee_truncates_toward_zero() {
        assert_eq!(compute_fee(333, 30).unwrap(), 0);
        assert_eq!(compute_fee(3334, 30).unwrap(), 10);
        assert_eq!(compute_fee(9_999, 1).unwrap(), 0);
        assert_eq!(compute_fee(10_000, 1).unwrap(), 1);
    }

    #[test]
    fn no_overflow_at_the_top_of_the_range() {
        assert_eq!(compute_fee(u64::MAX, 10_000).unwrap(), u64::MAX);
        assert_eq!(compute_fee(u64::MAX, 5_000).unwrap(), u64::MAX / 2);
        let l = FeeLedger::with_ratio(addr(1), addr(0xEE), 10_000).unwrap();
        let q = l.fee_info(u64::MAX).unwrap();
        assert_eq!(q.fee + q.remainder, u64::MAX);
    }

    #[test]
    fn unvalidated_ratio_overflow_is_reported() {
        // Only reachable by bypassing the ledger's ratio validation.
        assert_eq!(
            compute_fee(u64::MAX, u64::MAX),
            Err(ContractError::ArithmeticOverflow)
        );
    }

    #[test]
    fn set_fee_ratio_bounds() {
        let mut l = ledger();
        assert_eq!(l.set_fee_ratio(&addr(1), 500).unwrap(), 30);
        assert_eq!(l.fee_info(100).unwrap().fee, 5);

        let err = l.set_fee_ratio(&addr(1), 10_001).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRatio);
        assert_eq!(l.fee_ratio(), 500);

        l.set_fee_ratio(&addr(1), 10_000).unwrap();
        assert_eq!(l.fee_info(12_345).unwrap().fee, 12_345);
    }

    #[test]
    fn with_ratio_validates() {
        assert!(FeeLedger::with_ratio(addr(1), addr(2), 10_001).is_err());
        assert_eq!(
            FeeLedger::with_ratio(addr(1), addr(2), 0).unwrap().fee_info(1_000_000).unwrap().fee,
            0
        );
    }

    #[test]
    fn setters_are_owner_gated() {
        let mut l = ledger();
        let before = l.clone();
        assert!(l.set_fee_ratio(&addr(2), 500).is_err());
        assert!(l.set_fee_receiver(&addr(2), addr(2)).is_err());
        assert!(l.set_value_medium(&addr(2), addr(2)).is_err());
        assert!(l.transfer_ownership(&addr(2), addr(2)).is_err());
        assert_eq!(l, before);
    }

    #[test]
    fn receiver_accepts_any_address() {
        let mut l = ledger();
        assert_eq!(l.set_fee_receiver(&addr(1), Address::ZERO).unwrap(), addr(1));
        assert_eq!(l.fee_info(10_000).unwrap().receiver, Address::ZERO);
    }
}
