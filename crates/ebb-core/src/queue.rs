//! FIFO redemption queue with prefix sums and two cursors.
//!
//! Requests are appended in id order and never removed. Each request records
//! the running total of assets requested before it (`prefix_sum_before`), so
//! the prefix-end sums `prefix_sum_before + asset_amount` are strictly
//! increasing and any commit target can be located with a binary search.
//!
//! Cursor layout:
//!
//! ```text
//!   0 ........ withdrawing ........ redeeming ........ length
//!   | withdrawable |  committed, maturing  |  boundary + pending  |
//! ```
//!
//! Requests below `withdrawing_cursor` are matured and payable. Requests in
//! `[withdrawing_cursor, redeeming_cursor)` are fully committed but still
//! maturing. The request at `redeeming_cursor` may carry a partial commitment.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::QueueError;
use crate::types::{Address, Amount, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRequest {
    pub id: u64,
    /// Account that filed the request and may withdraw it.
    pub requester: Address,
    /// Account whose shares were burned.
    pub owner: Address,
    pub share_amount: Amount,
    pub asset_amount: Amount,
    pub prefix_sum_before: Amount,
    /// Committed portion of `asset_amount` so far.
    pub partially_redeemed: Amount,
    /// Time of the most recent commit touching this request.
    pub commit_timestamp: Option<Timestamp>,
    pub paid: bool,
}

impl RedemptionRequest {
    /// Prefix sum including this request.
    pub fn prefix_end(&self) -> Amount {
        self.prefix_sum_before + self.asset_amount
    }
}

/// Scalar view of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueState {
    pub redeeming_cursor: u64,
    pub withdrawing_cursor: u64,
    pub length: u64,
    pub accumulated_asset_amount: Amount,
    pub total_paid: Amount,
}

/// Result of [`RedemptionQueue::commit_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    pub redeeming_before: u64,
    pub redeeming_after: u64,
    /// Committed portion of the request now at `redeeming_after` (0 if none).
    pub residue: Amount,
}

/// Requests paid out by [`RedemptionQueue::take_withdrawable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub ids: Vec<u64>,
    pub assets: Amount,
    pub shares: Amount,
}

/// Scalar position of the queue when [`RedemptionQueue::checkpoint`] was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCheckpoint {
    redeeming_cursor: u64,
    withdrawing_cursor: u64,
    accumulated_asset_amount: Amount,
    total_paid: Amount,
}

/// Prior state of one per-request write, replayed newest first on rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Undo {
    Appended,
    Committed { id: u64, partially_redeemed: Amount, commit_timestamp: Option<Timestamp> },
    Paid { requester: Address, ids: Vec<u64> },
}

impl Undo {
    fn committed(r: &RedemptionRequest) -> Self {
        Undo::Committed { id: r.id, partially_redeemed: r.partially_redeemed, commit_timestamp: r.commit_timestamp }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionQueue {
    requests: Vec<RedemptionRequest>,
    redeeming_cursor: u64,
    withdrawing_cursor: u64,
    accumulated_asset_amount: Amount,
    total_paid: Amount,
    /// Unpaid request ids per requester, ascending.
    unpaid: BTreeMap<Address, VecDeque<u64>>,
    /// Writes since the open checkpoint, if any.
    #[serde(skip)]
    journal: Option<Vec<Undo>>,
}

impl RedemptionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> u64 {
        self.requests.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn redeeming_cursor(&self) -> u64 {
        self.redeeming_cursor
    }

    pub fn withdrawing_cursor(&self) -> u64 {
        self.withdrawing_cursor
    }

    pub fn accumulated(&self) -> Amount {
        self.accumulated_asset_amount
    }

    pub fn total_paid(&self) -> Amount {
        self.total_paid
    }

    /// Assets requested but not yet paid out.
    pub fn liability(&self) -> Amount {
        self.accumulated_asset_amount - self.total_paid
    }

    pub fn state(&self) -> QueueState {
        QueueState {
            redeeming_cursor: self.redeeming_cursor,
            withdrawing_cursor: self.withdrawing_cursor,
            length: self.len(),
            accumulated_asset_amount: self.accumulated_asset_amount,
            total_paid: self.total_paid,
        }
    }

    /// Number of `requester`'s requests with id at or above the withdrawing cursor.
    pub fn pending_count_of(&self, requester: &Address) -> usize {
        let w = self.withdrawing_cursor;
        self.unpaid
            .get(requester)
            .map_or(0, |ids| ids.len() - ids.partition_point(|&id| id < w))
    }

    /// Append a request, enforcing the per-requester pending cap.
    /// Returns the assigned id.
    pub fn append(
        &mut self,
        owner: Address,
        requester: Address,
        share_amount: Amount,
        asset_amount: Amount,
        max_pending: usize,
    ) -> Result<u64, QueueError> {
        let pending = self.pending_count_of(&requester);
        if pending >= max_pending {
            return Err(QueueError::TooManyPendingRequests { requester, pending, max: max_pending });
        }
        let accumulated = self
            .accumulated_asset_amount
            .checked_add(asset_amount)
            .ok_or(QueueError::ArithmeticOverflow)?;
        let id = self.len();
        self.requests.push(RedemptionRequest {
            id,
            requester,
            owner,
            share_amount,
            asset_amount,
            prefix_sum_before: self.accumulated_asset_amount,
            partially_redeemed: 0,
            commit_timestamp: None,
            paid: false,
        });
        self.accumulated_asset_amount = accumulated;
        self.unpaid.entry(requester).or_default().push_back(id);
        self.record(Undo::Appended);
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Result<&RedemptionRequest, QueueError> {
        self.requests
            .get(id as usize)
            .ok_or(QueueError::UnknownRequestId { id, length: self.len() })
    }

    /// Prefix sum up to which requests are committed.
    pub fn committed_point(&self) -> Amount {
        match self.requests.get(self.redeeming_cursor as usize) {
            Some(r) => r.prefix_sum_before + r.partially_redeemed,
            None => self.accumulated_asset_amount,
        }
    }

    /// Assets requested but not yet committed.
    pub fn outstanding(&self) -> Amount {
        self.accumulated_asset_amount - self.committed_point()
    }

    /// First id at or after the redeeming cursor whose prefix end exceeds
    /// `target`, or `length` when every request fits.
    pub fn commit_boundary(&self, target: Amount) -> u64 {
        let start = self.redeeming_cursor as usize;
        let offset = self.requests[start..].partition_point(|r| r.prefix_end() <= target);
        (start + offset) as u64
    }

    /// Advance the commitment to `target` (a prefix sum), stamping every
    /// touched request with `now`.
    pub fn commit_to(&mut self, target: Amount, now: Timestamp) -> Result<CommitOutcome, QueueError> {
        let committed = self.committed_point();
        let before = self.redeeming_cursor;
        if target < committed || target > self.accumulated_asset_amount {
            return Err(QueueError::InvalidCommitTarget {
                target,
                committed,
                accumulated: self.accumulated_asset_amount,
            });
        }
        if target == committed {
            let residue = self.requests.get(before as usize).map_or(0, |r| r.partially_redeemed);
            return Ok(CommitOutcome { redeeming_before: before, redeeming_after: before, residue });
        }

        let after = self.commit_boundary(target);
        for r in &mut self.requests[before as usize..after as usize] {
            if let Some(journal) = self.journal.as_mut() {
                journal.push(Undo::committed(r));
            }
            r.partially_redeemed = r.asset_amount;
            r.commit_timestamp = Some(now);
        }
        let mut residue = 0;
        if let Some(r) = self.requests.get_mut(after as usize) {
            if target > r.prefix_sum_before {
                if let Some(journal) = self.journal.as_mut() {
                    journal.push(Undo::committed(r));
                }
                r.partially_redeemed = target - r.prefix_sum_before;
                r.commit_timestamp = Some(now);
                residue = r.partially_redeemed;
            }
        }
        self.redeeming_cursor = after;
        Ok(CommitOutcome { redeeming_before: before, redeeming_after: after, residue })
    }

    /// Whether the committed range has waited strictly longer than `delay`
    /// since its oldest request was last committed.
    pub fn is_mature(&self, now: Timestamp, delay: u64) -> bool {
        if self.redeeming_cursor <= self.withdrawing_cursor {
            return false;
        }
        match self.requests[self.withdrawing_cursor as usize].commit_timestamp {
            Some(ts) => now.saturating_sub(ts) > delay,
            None => false,
        }
    }

    /// Make everything below the redeeming cursor withdrawable.
    /// Returns the `(before, after)` withdrawing cursor.
    pub fn mature(&mut self) -> (u64, u64) {
        let before = self.withdrawing_cursor;
        self.withdrawing_cursor = self.redeeming_cursor;
        (before, self.withdrawing_cursor)
    }

    /// `(assets, shares)` of `requester`'s unpaid matured requests.
    pub fn withdrawable_of(&self, requester: &Address) -> (Amount, Amount) {
        self.sum_unpaid(requester, |id| id < self.withdrawing_cursor)
    }

    /// `(assets, shares)` of `requester`'s requests not yet matured.
    pub fn not_withdrawable_of(&self, requester: &Address) -> (Amount, Amount) {
        self.sum_unpaid(requester, |id| id >= self.withdrawing_cursor)
    }

    /// Mark all of `requester`'s matured requests as paid.
    /// Returns `None` when there is nothing to withdraw.
    pub fn take_withdrawable(&mut self, requester: &Address) -> Option<Withdrawal> {
        let w = self.withdrawing_cursor;
        let ids = self.unpaid.get_mut(requester)?;
        let count = ids.partition_point(|&id| id < w);
        if count == 0 {
            return None;
        }
        let taken: Vec<u64> = ids.drain(..count).collect();
        if ids.is_empty() {
            self.unpaid.remove(requester);
        }

        let (mut assets, mut shares) = (0, 0);
        for &id in &taken {
            let r = &mut self.requests[id as usize];
            r.paid = true;
            assets += r.asset_amount;
            shares += r.share_amount;
        }
        self.total_paid += assets;
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Undo::Paid { requester: *requester, ids: taken.clone() });
        }
        Some(Withdrawal { ids: taken, assets, shares })
    }

    /// Ids of `requester`'s unpaid requests, ascending.
    pub fn unpaid_ids_of(&self, requester: &Address) -> Vec<u64> {
        self.unpaid.get(requester).map_or_else(Vec::new, |ids| ids.iter().copied().collect())
    }

    // ------------------------------------------------------------------
    // Rollback
    // ------------------------------------------------------------------

    /// Start journaling writes so they can be undone with
    /// [`RedemptionQueue::rollback`]. Replaces any open checkpoint.
    pub fn checkpoint(&mut self) -> QueueCheckpoint {
        self.journal = Some(Vec::new());
        QueueCheckpoint {
            redeeming_cursor: self.redeeming_cursor,
            withdrawing_cursor: self.withdrawing_cursor,
            accumulated_asset_amount: self.accumulated_asset_amount,
            total_paid: self.total_paid,
        }
    }

    /// Close the open checkpoint, keeping every write made since.
    pub fn release(&mut self) {
        self.journal = None;
    }

    /// Undo every write made since `checkpoint` and close it. Costs the
    /// number of requests touched, not the queue length.
    pub fn rollback(&mut self, checkpoint: QueueCheckpoint) {
        for undo in self.journal.take().unwrap_or_default().into_iter().rev() {
            match undo {
                Undo::Appended => {
                    let Some(r) = self.requests.pop() else { continue };
                    if let Some(ids) = self.unpaid.get_mut(&r.requester) {
                        ids.pop_back();
                        if ids.is_empty() {
                            self.unpaid.remove(&r.requester);
                        }
                    }
                }
                Undo::Committed { id, partially_redeemed, commit_timestamp } => {
                    let r = &mut self.requests[id as usize];
                    r.partially_redeemed = partially_redeemed;
                    r.commit_timestamp = commit_timestamp;
                }
                Undo::Paid { requester, ids } => {
                    let unpaid = self.unpaid.entry(requester).or_default();
                    for &id in ids.iter().rev() {
                        self.requests[id as usize].paid = false;
                        unpaid.push_front(id);
                    }
                }
            }
        }
        self.redeeming_cursor = checkpoint.redeeming_cursor;
        self.withdrawing_cursor = checkpoint.withdrawing_cursor;
        self.accumulated_asset_amount = checkpoint.accumulated_asset_amount;
        self.total_paid = checkpoint.total_paid;
    }

    fn record(&mut self, undo: Undo) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(undo);
        }
    }

    fn sum_unpaid(&self, requester: &Address, keep: impl Fn(u64) -> bool) -> (Amount, Amount) {
        let Some(ids) = self.unpaid.get(requester) else {
            return (0, 0);
        };
        ids.iter()
            .copied()
            .filter(|&id| keep(id))
            .map(|id| &self.requests[id as usize])
            .fold((0, 0), |(a, s), r| (a + r.asset_amount, s + r.share_amount))
    }
}
