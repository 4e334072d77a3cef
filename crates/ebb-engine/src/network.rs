//! In-memory simulation of the external validator network.
//!
//! Used by the CLI and the scenario tests. Validators are created on first
//! touch. Rewards only accrue through [`InMemoryNetwork::add_reward`], and an
//! outage can be simulated with [`InMemoryNetwork::set_available`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ebb_core::constants::BPS_PRECISION;
use ebb_core::error::NetworkError;
use ebb_core::math::mul_div_floor;
use ebb_core::traits::{UnstakeReceipt, ValidatorNetwork};
use ebb_core::types::{Address, Amount};

/// Per-validator view of the vault's position on the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPosition {
    pub staked: Amount,
    pub pending_reward: Amount,
    /// Unstaked and not yet delivered.
    pub unbonding: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryNetwork {
    positions: BTreeMap<Address, NetworkPosition>,
    available: bool,
    /// Share of each unstake delivered during the call, in basis points.
    immediate_bps: u64,
}

impl Default for InMemoryNetwork {
    fn default() -> Self {
        Self { positions: BTreeMap::new(), available: true, immediate_bps: 0 }
    }
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `immediate_bps / 10000` of every unstake immediately.
    pub fn with_immediate_bps(mut self, immediate_bps: u64) -> Self {
        self.immediate_bps = immediate_bps.min(BPS_PRECISION);
        self
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Accrue `amount` of reward for the vault on `validator`.
    pub fn add_reward(&mut self, validator: &Address, amount: Amount) {
        self.positions.entry(*validator).or_default().pending_reward += amount;
    }

    pub fn position(&self, validator: &Address) -> NetworkPosition {
        self.positions.get(validator).cloned().unwrap_or_default()
    }

    pub fn positions(&self) -> impl Iterator<Item = (&Address, &NetworkPosition)> {
        self.positions.iter()
    }

    pub fn total_staked(&self) -> Amount {
        self.positions.values().map(|p| p.staked).sum()
    }

    pub fn total_unbonding(&self) -> Amount {
        self.positions.values().map(|p| p.unbonding).sum()
    }

    fn check_available(&self) -> Result<(), NetworkError> {
        if self.available {
            Ok(())
        } else {
            Err(NetworkError::Unavailable("simulated outage".into()))
        }
    }
}

impl ValidatorNetwork for InMemoryNetwork {
    fn pending_reward(&self, validator: &Address) -> Result<Amount, NetworkError> {
        self.check_available()?;
        Ok(self.positions.get(validator).map_or(0, |p| p.pending_reward))
    }

    fn claim_pending_reward(&mut self, validator: &Address) -> Result<Amount, NetworkError> {
        self.check_available()?;
        Ok(self
            .positions
            .get_mut(validator)
            .map_or(0, |p| std::mem::take(&mut p.pending_reward)))
    }

    fn stake(&mut self, validator: &Address, amount: Amount) -> Result<(), NetworkError> {
        self.check_available()?;
        self.positions.entry(*validator).or_default().staked += amount;
        Ok(())
    }

    fn unstake(&mut self, validator: &Address, amount: Amount) -> Result<UnstakeReceipt, NetworkError> {
        self.check_available()?;
        let p = self
            .positions
            .get_mut(validator)
            .ok_or(NetworkError::UnknownValidator(*validator))?;
        if p.staked < amount {
            return Err(NetworkError::InsufficientStake { validator: *validator, have: p.staked, need: amount });
        }
        p.staked -= amount;
        let immediate =
            mul_div_floor(amount, self.immediate_bps as Amount, BPS_PRECISION as Amount).unwrap_or(amount);
        let scheduled = amount - immediate;
        p.unbonding += scheduled;
        Ok(UnstakeReceipt { immediate, scheduled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v() -> Address {
        Address::repeat_byte(1)
    }

    #[test]
    fn stake_then_unstake_schedules_everything_by_default() {
        let mut net = InMemoryNetwork::new();
        net.stake(&v(), 100).unwrap();
        let r = net.unstake(&v(), 40).unwrap();
        assert_eq!(r, UnstakeReceipt { immediate: 0, scheduled: 40 });
        assert_eq!(net.position(&v()), NetworkPosition { staked: 60, pending_reward: 0, unbonding: 40 });
    }

    #[test]
    fn immediate_share_delivered_on_call() {
        let mut net = InMemoryNetwork::new().with_immediate_bps(2_500);
        net.stake(&v(), 100).unwrap();
        let r = net.unstake(&v(), 40).unwrap();
        assert_eq!(r, UnstakeReceipt { immediate: 10, scheduled: 30 });
        assert_eq!(net.total_unbonding(), 30);
    }

    #[test]
    fn immediate_share_of_huge_unstake_does_not_overflow() {
        let amount = Amount::MAX - 1;
        let mut net = InMemoryNetwork::new().with_immediate_bps(5_000);
        net.stake(&v(), amount).unwrap();
        let r = net.unstake(&v(), amount).unwrap();
        assert_eq!(r.immediate, amount / 2);
        assert_eq!(r.immediate + r.scheduled, amount);
        assert_eq!(net.position(&v()).unbonding, r.scheduled);
    }

    #[test]
    fn unstake_checks_position() {
        let mut net = InMemoryNetwork::new();
        assert_eq!(net.unstake(&v(), 1), Err(NetworkError::UnknownValidator(v())));
        net.stake(&v(), 5).unwrap();
        assert!(matches!(net.unstake(&v(), 6), Err(NetworkError::InsufficientStake { have: 5, need: 6, .. })));
    }

    #[test]
    fn rewards_claimed_once() {
        let mut net = InMemoryNetwork::new();
        net.add_reward(&v(), 7);
        assert_eq!(net.pending_reward(&v()).unwrap(), 7);
        assert_eq!(net.claim_pending_reward(&v()).unwrap(), 7);
        assert_eq!(net.claim_pending_reward(&v()).unwrap(), 0);
        assert_eq!(net.claim_pending_reward(&Address::repeat_byte(9)).unwrap(), 0);
    }

    #[test]
    fn outage_fails_every_call() {
        let mut net = InMemoryNetwork::new();
        net.set_available(false);
        assert!(matches!(net.stake(&v(), 1), Err(NetworkError::Unavailable(_))));
        assert!(net.pending_reward(&v()).is_err());
        net.set_available(true);
        net.stake(&v(), 1).unwrap();
        assert_eq!(net.total_staked(), 1);
    }
}
