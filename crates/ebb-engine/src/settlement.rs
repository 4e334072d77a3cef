//! Redemption settlement: maturation, commitment and withdrawal.
//!
//! A settlement pass runs in two phases:
//!
//! 1. **Maturation.** Once the oldest committed request has aged strictly
//!    longer than the maturity delay, everything below the redeeming cursor
//!    becomes withdrawable and in-flight unbonding is treated as delivered.
//! 2. **Commitment.** Outstanding assets are committed to the queue in FIFO
//!    order, first from the buffer (topped up with freshly claimed rewards),
//!    then by unstaking from validators. Unstaking is rate limited to one pass
//!    per `unstake_interval_secs`. While limited, the buffer alone is
//!    committed; with an empty buffer the pass fails with `RateLimited`.
//!
//! Every pass is all-or-nothing.

use tracing::{debug, info, warn};

use ebb_core::allocator::unstake_plan;
use ebb_core::error::{SettlementError, VaultError};
use ebb_core::events::{CursorChange, VaultEvent};
use ebb_core::queue::{CommitOutcome, Withdrawal};
use ebb_core::traits::ValidatorNetwork;
use ebb_core::types::{Address, Amount, Timestamp};

use crate::vault::{Vault, VaultState};

/// Where the liquidity committed by a pass came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettlementSource {
    /// Nothing was committed.
    #[default]
    None,
    Buffer,
    BufferAndStaking,
}

/// What a settlement pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettlementReport {
    /// `(before, after)` withdrawing cursor when maturation happened.
    pub matured: Option<(u64, u64)>,
    pub released_unbonding: Amount,
    /// Net reward moved into the buffer before committing.
    pub harvested: Amount,
    pub source: SettlementSource,
    pub committed: Amount,
    pub from_buffer: Amount,
    pub from_staking: Amount,
    pub redeeming_cursor: u64,
    pub withdrawing_cursor: u64,
}

impl VaultState {
    fn cursors(&self, redeeming_before: u64, withdrawing_before: u64) -> CursorChange {
        CursorChange {
            redeeming_before,
            redeeming_after: self.queue.redeeming_cursor(),
            withdrawing_before,
            withdrawing_after: self.queue.withdrawing_cursor(),
        }
    }

    fn unstake_allowed(&self, now: Timestamp) -> bool {
        self.last_unstake_at
            .is_none_or(|last| now.saturating_sub(last) >= self.config.unstake_interval_secs)
    }

    /// Commit `from_buffer` out of the buffer plus `from_staking` already
    /// delivered or scheduled by the network.
    fn commit(&mut self, from_buffer: Amount, from_staking: Amount, now: Timestamp) -> Result<CommitOutcome, VaultError> {
        self.treasury.commit_buffer(from_buffer)?;
        let target = self.queue.committed_point() + from_buffer + from_staking;
        let outcome = self.queue.commit_to(target, now)?;
        self.settled_from_buffer += from_buffer;
        self.settled_from_staking += from_staking;
        Ok(outcome)
    }

    fn commit_buffer_only(
        &mut self,
        amount: Amount,
        now: Timestamp,
        report: &mut SettlementReport,
    ) -> Result<(), VaultError> {
        let withdrawing = self.queue.withdrawing_cursor();
        let outcome = self.commit(amount, 0, now)?;
        report.source = SettlementSource::Buffer;
        report.committed = amount;
        report.from_buffer = amount;
        info!(
            amount,
            redeeming_cursor = outcome.redeeming_after,
            residue = outcome.residue,
            "settlement: committed from buffer"
        );
        self.events.push(VaultEvent::SettledFromBuffer {
            cursors: self.cursors(outcome.redeeming_before, withdrawing),
            amount,
            residue: outcome.residue,
            timestamp: now,
        });
        Ok(())
    }

    /// Unstake up to `shortfall` and return the amount the network accepted.
    fn unstake_for<N: ValidatorNetwork>(&mut self, network: &mut N, shortfall: Amount) -> Result<Amount, VaultError> {
        let mut unstaked: Amount = 0;
        for (validator, amount) in unstake_plan(&self.registry, shortfall) {
            let receipt = network.unstake(&validator, amount)?;
            self.registry.debit_stake(&validator, amount)?;
            self.treasury.credit_reserved(receipt.immediate)?;
            self.treasury.credit_unbonding(receipt.scheduled)?;
            debug!(
                %validator,
                amount,
                immediate = receipt.immediate,
                scheduled = receipt.scheduled,
                "settlement: unstaked"
            );
            unstaked += amount;
        }
        Ok(unstaked)
    }

    fn mature(&mut self, now: Timestamp, report: &mut SettlementReport) -> Result<(), VaultError> {
        if !self.queue.is_mature(now, self.config.maturity_delay_secs) {
            return Ok(());
        }
        let redeeming = self.queue.redeeming_cursor();
        let (before, after) = self.queue.mature();
        let released = self.treasury.release_unbonding()?;
        report.matured = Some((before, after));
        report.released_unbonding = released;
        info!(withdrawing_cursor = after, released, "settlement: requests matured");
        self.events.push(VaultEvent::Matured {
            cursors: self.cursors(redeeming, before),
            released_unbonding: released,
            timestamp: now,
        });
        Ok(())
    }

    fn process_redemption_requests<N: ValidatorNetwork>(
        &mut self,
        network: &mut N,
        now: Timestamp,
    ) -> Result<SettlementReport, VaultError> {
        let mut report = SettlementReport::default();
        self.mature(now, &mut report)?;

        let need = self.queue.outstanding();
        if need == 0 {
            debug!(now, "settlement: nothing outstanding");
            return Ok(self.finish(report));
        }

        if self.treasury.buffer < need {
            let split = self.harvest(network, 0)?;
            self.treasury.credit_buffer(split.net)?;
            report.harvested = split.net;
        }

        let buffer = self.treasury.buffer;
        if buffer >= need {
            self.commit_buffer_only(need, now, &mut report)?;
            return Ok(self.finish(report));
        }

        if self.unstake_allowed(now) {
            let unstaked = self.unstake_for(network, need - buffer)?;
            if unstaked > 0 {
                self.last_unstake_at = Some(now);
                let withdrawing = self.queue.withdrawing_cursor();
                let outcome = self.commit(buffer, unstaked, now)?;
                let amount = buffer + unstaked;
                report.source = SettlementSource::BufferAndStaking;
                report.committed = amount;
                report.from_buffer = buffer;
                report.from_staking = unstaked;
                info!(
                    amount,
                    from_buffer = buffer,
                    from_staking = unstaked,
                    redeeming_cursor = outcome.redeeming_after,
                    residue = outcome.residue,
                    "settlement: committed from buffer and staking"
                );
                self.events.push(VaultEvent::SettledFromBufferAndStaking {
                    cursors: self.cursors(outcome.redeeming_before, withdrawing),
                    amount,
                    from_buffer: buffer,
                    from_staking: unstaked,
                    residue: outcome.residue,
                    timestamp: now,
                });
                return Ok(self.finish(report));
            }
            debug!(need, buffer, "settlement: no stake left to unstake");
        } else if buffer == 0 {
            let last_unstake_at = self.last_unstake_at.unwrap_or_default();
            let retry_at = last_unstake_at + self.config.unstake_interval_secs;
            warn!(now, last_unstake_at, retry_at, "settlement: unstake rate limited");
            return Err(SettlementError::RateLimited { last_unstake_at, retry_at }.into());
        }

        if buffer > 0 {
            self.commit_buffer_only(buffer, now, &mut report)?;
        }
        Ok(self.finish(report))
    }

    fn finish(&self, mut report: SettlementReport) -> SettlementReport {
        report.redeeming_cursor = self.queue.redeeming_cursor();
        report.withdrawing_cursor = self.queue.withdrawing_cursor();
        report
    }

    fn withdraw(&mut self, caller: Address, receiver: Address, owner: Address) -> Result<Withdrawal, VaultError> {
        if caller != owner {
            return Err(VaultError::Unauthorized(caller));
        }
        let withdrawal = self
            .queue
            .take_withdrawable(&owner)
            .ok_or(SettlementError::InsufficientWithdrawable { owner })?;
        self.treasury.pay_out(withdrawal.assets)?;
        let withdrawing_cursor = self.queue.withdrawing_cursor();
        info!(
            %owner,
            %receiver,
            assets = withdrawal.assets,
            requests = withdrawal.ids.len(),
            "settlement: withdrawn"
        );
        self.events.push(VaultEvent::Withdrawn {
            caller,
            receiver,
            owner,
            assets: withdrawal.assets,
            shares: withdrawal.shares,
            withdrawing_cursor,
        });
        Ok(withdrawal)
    }
}

impl<N: ValidatorNetwork + Clone> Vault<N> {
    /// Run one settlement pass at time `now`.
    pub fn process_redemption_requests(&mut self, now: Timestamp) -> Result<SettlementReport, VaultError> {
        self.atomically(|s, n| s.process_redemption_requests(n, now))
    }

    /// Pay out every matured request of `owner` to `receiver`.
    pub fn withdraw(&mut self, caller: Address, receiver: Address, owner: Address) -> Result<Withdrawal, VaultError> {
        self.atomically(|s, _| s.withdraw(caller, receiver, owner))
    }
}
