//! Reward compounding.
//!
//! Only rewards of at least one stake unit are claimed; smaller ones stay
//! pending with the network until they grow. Claimed rewards are split into protocol fee and net. The whole-unit part
//! of the net is staked in a single placement; the sub-unit tail rounds
//! toward the buffer.

use tracing::{debug, info};

use ebb_core::allocator::floor_to_unit;
use ebb_core::error::{TreasuryError, VaultError};
use ebb_core::events::VaultEvent;
use ebb_core::traits::ValidatorNetwork;
use ebb_core::treasury::RewardSplit;
use ebb_core::types::{Address, Amount, Timestamp};

use crate::vault::{Vault, VaultState};

/// What a compounding pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompoundReport {
    pub total_reward: Amount,
    pub fee: Amount,
    /// Net reward placed with `validator`.
    pub staked: Amount,
    pub validator: Option<Address>,
    /// Net reward left in the buffer.
    pub to_buffer: Amount,
}

impl VaultState {
    /// Claim pending rewards from every validator that can still earn them:
    /// active ones, and disabled ones that have stake left. Rewards smaller
    /// than `min_claim` stay pending with the network.
    pub(crate) fn claim_rewards<N: ValidatorNetwork>(
        &mut self,
        network: &mut N,
        min_claim: Amount,
    ) -> Result<Amount, VaultError> {
        let mut total: Amount = 0;
        for v in self.registry.all().iter().filter(|v| v.active || v.staked > 0) {
            let pending = network.pending_reward(&v.address)?;
            if pending == 0 || pending < min_claim {
                continue;
            }
            let claimed = network.claim_pending_reward(&v.address)?;
            debug!(validator = %v.address, claimed, "compound: reward claimed");
            total = total.checked_add(claimed).ok_or(TreasuryError::ArithmeticOverflow)?;
        }
        Ok(total)
    }

    /// Claim rewards of at least `min_claim` and book the fee split, without
    /// routing the net.
    pub(crate) fn harvest<N: ValidatorNetwork>(
        &mut self,
        network: &mut N,
        min_claim: Amount,
    ) -> Result<RewardSplit, VaultError> {
        let total = self.claim_rewards(network, min_claim)?;
        Ok(self.treasury.record_reward(total)?)
    }

    fn compound<N: ValidatorNetwork>(&mut self, network: &mut N, now: Timestamp) -> Result<CompoundReport, VaultError> {
        let split = self.harvest(network, self.treasury.min_stake_unit)?;
        if split.total == 0 {
            debug!(now, "compound: nothing to claim");
            return Ok(CompoundReport::default());
        }

        let increment = floor_to_unit(split.net, self.treasury.min_stake_unit);
        let placement = self.place(network, increment)?;
        let tail = split.net - increment;
        self.treasury.credit_buffer(tail)?;
        let to_buffer = tail + placement.remainder;

        let report = CompoundReport {
            total_reward: split.total,
            fee: split.fee,
            staked: placement.staked,
            validator: placement.validator,
            to_buffer,
        };
        info!(
            now,
            total_reward = report.total_reward,
            fee = report.fee,
            staked = report.staked,
            to_buffer,
            "compound: rewards reinvested"
        );
        self.events.push(VaultEvent::Compounded {
            total_reward: report.total_reward,
            fee: report.fee,
            staked: report.staked,
            validator: report.validator,
            to_buffer,
        });
        Ok(report)
    }
}

impl<N: ValidatorNetwork + Clone> Vault<N> {
    /// Claim pending rewards of at least one stake unit, retain the protocol
    /// fee and reinvest the rest.
    pub fn compound(&mut self, now: Timestamp) -> Result<CompoundReport, VaultError> {
        self.atomically(|s, n| s.compound(n, now))
    }
}
