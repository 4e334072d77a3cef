//! Vault liquidity and protocol-fee accounting.
//!
//! Liquidity held by the vault itself (as opposed to stake on validators)
//! lives in three balances:
//!
//! - `buffer`: idle, free to be staked or committed to redemptions
//! - `reserved`: committed to redemption requests and waiting to be withdrawn
//! - `unbonding`: committed to requests but still in flight from the network
//!
//! The protocol fee is carved out of every claimed reward and kept apart in
//! `fee`. None of these balances can go negative.

use serde::{Deserialize, Serialize};

use crate::constants::{BPS_PRECISION, MAX_PROTOCOL_FEE_BPS};
use crate::error::TreasuryError;
use crate::math::mul_div_floor;
use crate::types::Amount;

/// A claimed reward split into protocol fee and the vault's net share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewardSplit {
    pub total: Amount,
    pub fee: Amount,
    pub net: Amount,
}

/// Split `total` at `fee_bps` basis points. The fee rounds down.
pub fn split_reward(total: Amount, fee_bps: u64) -> RewardSplit {
    let fee = mul_div_floor(total, fee_bps as Amount, BPS_PRECISION as Amount).unwrap_or(0);
    RewardSplit { total, fee, net: total - fee }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    pub buffer: Amount,
    pub fee: Amount,
    pub reserved: Amount,
    pub unbonding: Amount,
    pub protocol_fee_bps: u64,
    pub min_stake_unit: Amount,
    /// Deposits plus net rewards ever brought under management.
    pub total_staked_accumulator: Amount,
    /// Gross rewards ever claimed.
    pub total_reward_accumulator: Amount,
}

impl Treasury {
    pub fn new(protocol_fee_bps: u64, min_stake_unit: Amount) -> Self {
        Self { protocol_fee_bps, min_stake_unit, ..Self::default() }
    }

    /// Liquidity held by the vault: `buffer + reserved + unbonding`.
    pub fn liquid_total(&self) -> Amount {
        self.buffer + self.reserved + self.unbonding
    }

    /// Book a claimed reward: the fee is retained and both accumulators grow.
    /// Returns the split so the caller can route `net`.
    pub fn record_reward(&mut self, total: Amount) -> Result<RewardSplit, TreasuryError> {
        let split = split_reward(total, self.protocol_fee_bps);
        self.fee = add(self.fee, split.fee)?;
        self.total_reward_accumulator = add(self.total_reward_accumulator, split.total)?;
        self.total_staked_accumulator = add(self.total_staked_accumulator, split.net)?;
        Ok(split)
    }

    pub fn record_deposit(&mut self, amount: Amount) -> Result<(), TreasuryError> {
        self.total_staked_accumulator = add(self.total_staked_accumulator, amount)?;
        Ok(())
    }

    pub fn credit_buffer(&mut self, amount: Amount) -> Result<(), TreasuryError> {
        self.buffer = add(self.buffer, amount)?;
        Ok(())
    }

    pub fn credit_reserved(&mut self, amount: Amount) -> Result<(), TreasuryError> {
        self.reserved = add(self.reserved, amount)?;
        Ok(())
    }

    pub fn credit_unbonding(&mut self, amount: Amount) -> Result<(), TreasuryError> {
        self.unbonding = add(self.unbonding, amount)?;
        Ok(())
    }

    /// Move `amount` of idle buffer into the reserved pool.
    pub fn commit_buffer(&mut self, amount: Amount) -> Result<(), TreasuryError> {
        self.buffer = sub("buffer", self.buffer, amount)?;
        self.reserved = add(self.reserved, amount)?;
        Ok(())
    }

    /// Everything in flight has arrived: move `unbonding` into `reserved`.
    /// Returns the amount released.
    pub fn release_unbonding(&mut self) -> Result<Amount, TreasuryError> {
        let released = self.unbonding;
        self.reserved = add(self.reserved, released)?;
        self.unbonding = 0;
        Ok(released)
    }

    /// Pay `amount` out of the reserved pool to a withdrawing requester.
    pub fn pay_out(&mut self, amount: Amount) -> Result<(), TreasuryError> {
        self.reserved = sub("reserved", self.reserved, amount)?;
        Ok(())
    }

    /// Withdraw accrued protocol fee. Returns the remaining fee balance.
    pub fn claim_fee(&mut self, amount: Amount) -> Result<Amount, TreasuryError> {
        if amount > self.fee {
            return Err(TreasuryError::InsufficientFeeBalance { requested: amount, available: self.fee });
        }
        self.fee -= amount;
        Ok(self.fee)
    }

    /// Change the protocol fee rate. Returns the previous rate.
    pub fn set_protocol_fee(&mut self, bps: u64) -> Result<u64, TreasuryError> {
        if bps > MAX_PROTOCOL_FEE_BPS {
            return Err(TreasuryError::FeeTooHigh { bps, max: MAX_PROTOCOL_FEE_BPS });
        }
        Ok(std::mem::replace(&mut self.protocol_fee_bps, bps))
    }
}

fn add(a: Amount, b: Amount) -> Result<Amount, TreasuryError> {
    a.checked_add(b).ok_or(TreasuryError::ArithmeticOverflow)
}

fn sub(account: &'static str, have: Amount, need: Amount) -> Result<Amount, TreasuryError> {
    have.checked_sub(need)
        .ok_or(TreasuryError::InsufficientBalance { account, have, need })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_PROTOCOL_FEE_BPS, UNIT};

    fn treasury() -> Treasury {
        Treasury::new(DEFAULT_PROTOCOL_FEE_BPS, UNIT)
    }

    // ------------------------------------------------------------------
    // reward split
    // ------------------------------------------------------------------

    #[test]
    fn split_ten_percent() {
        let s = split_reward(6 * UNIT, 1_000);
        assert_eq!(s.fee, 6 * UNIT / 10);
        assert_eq!(s.net, 54 * UNIT / 10);
        assert_eq!(s.fee + s.net, s.total);
    }

    #[test]
    fn split_fee_rounds_down() {
        let s = split_reward(9, 1_000);
        assert_eq!((s.fee, s.net), (0, 9));
        assert_eq!(split_reward(0, 1_000), RewardSplit::default());
        assert_eq!(split_reward(100, 0).net, 100);
    }

    #[test]
    fn record_reward_updates_accumulators() {
        let mut t = treasury();
        let s = t.record_reward(6 * UNIT).unwrap();
        assert_eq!(t.fee, s.fee);
        assert_eq!(t.total_reward_accumulator, 6 * UNIT);
        assert_eq!(t.total_staked_accumulator, s.net);
        t.record_deposit(UNIT).unwrap();
        assert_eq!(t.total_staked_accumulator, s.net + UNIT);
    }

    // ------------------------------------------------------------------
    // liquidity moves
    // ------------------------------------------------------------------

    #[test]
    fn commit_buffer_moves_to_reserved() {
        let mut t = treasury();
        t.credit_buffer(100).unwrap();
        t.commit_buffer(60).unwrap();
        assert_eq!((t.buffer, t.reserved), (40, 60));
        assert_eq!(
            t.commit_buffer(41),
            Err(TreasuryError::InsufficientBalance { account: "buffer", have: 40, need: 41 })
        );
        assert_eq!(t.liquid_total(), 100);
    }

    #[test]
    fn release_unbonding_empties_in_flight() {
        let mut t = treasury();
        t.credit_unbonding(30).unwrap();
        t.credit_reserved(5).unwrap();
        assert_eq!(t.release_unbonding().unwrap(), 30);
        assert_eq!((t.unbonding, t.reserved), (0, 35));
        assert_eq!(t.release_unbonding().unwrap(), 0);
    }

    #[test]
    fn pay_out_checks_reserved() {
        let mut t = treasury();
        t.credit_reserved(10).unwrap();
        t.pay_out(10).unwrap();
        assert!(matches!(t.pay_out(1), Err(TreasuryError::InsufficientBalance { account: "reserved", .. })));
    }

    #[test]
    fn credit_overflow_detected() {
        let mut t = treasury();
        t.credit_buffer(Amount::MAX).unwrap();
        assert_eq!(t.credit_buffer(1), Err(TreasuryError::ArithmeticOverflow));
    }

    // ------------------------------------------------------------------
    // protocol fee
    // ------------------------------------------------------------------

    #[test]
    fn claim_fee_bounded_by_balance() {
        let mut t = treasury();
        t.record_reward(10 * UNIT).unwrap();
        assert_eq!(t.fee, UNIT);
        assert_eq!(
            t.claim_fee(UNIT + 1),
            Err(TreasuryError::InsufficientFeeBalance { requested: UNIT + 1, available: UNIT })
        );
        assert_eq!(t.claim_fee(UNIT / 4).unwrap(), 3 * UNIT / 4);
        assert_eq!(t.claim_fee(3 * UNIT / 4).unwrap(), 0);
    }

    #[test]
    fn set_protocol_fee_capped() {
        let mut t = treasury();
        assert_eq!(t.set_protocol_fee(3_000).unwrap(), 1_000);
        assert_eq!(t.set_protocol_fee(3_001), Err(TreasuryError::FeeTooHigh { bps: 3_001, max: 3_000 }));
        assert_eq!(t.protocol_fee_bps, 3_000);
    }
}
