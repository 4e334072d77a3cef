//! Observability events emitted by vault operations.
//!
//! Settlement events carry the cursor values before and after the change so an
//! external indexer can rebuild queue state without replaying every request.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, Timestamp};

/// Cursor movement recorded by a settlement event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorChange {
    pub redeeming_before: u64,
    pub redeeming_after: u64,
    pub withdrawing_before: u64,
    pub withdrawing_after: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultEvent {
    Deposited {
        sender: Address,
        receiver: Address,
        assets: Amount,
        shares: Amount,
    },
    RequestAppended {
        owner: Address,
        requester: Address,
        id: u64,
        shares: Amount,
        assets: Amount,
        /// Queue length after the append.
        length: u64,
        /// Running prefix sum after the append.
        accumulated: Amount,
    },
    /// Requests in `[withdrawing_before, withdrawing_after)` became withdrawable.
    Matured {
        cursors: CursorChange,
        released_unbonding: Amount,
        timestamp: Timestamp,
    },
    SettledFromBuffer {
        cursors: CursorChange,
        amount: Amount,
        /// Committed portion of the request at `redeeming_after`, if any.
        residue: Amount,
        timestamp: Timestamp,
    },
    SettledFromBufferAndStaking {
        cursors: CursorChange,
        amount: Amount,
        from_buffer: Amount,
        from_staking: Amount,
        residue: Amount,
        timestamp: Timestamp,
    },
    Withdrawn {
        caller: Address,
        receiver: Address,
        owner: Address,
        assets: Amount,
        shares: Amount,
        withdrawing_cursor: u64,
    },
    Compounded {
        total_reward: Amount,
        fee: Amount,
        staked: Amount,
        validator: Option<Address>,
        to_buffer: Amount,
    },
    ValidatorAdded {
        validator: Address,
        weight: u64,
        sum_of_weight: u64,
    },
    ValidatorWeightUpdated {
        validator: Address,
        old_weight: u64,
        new_weight: u64,
        sum_of_weight: u64,
    },
    ValidatorDisabled {
        validator: Address,
        sum_of_weight: u64,
    },
    ProtocolFeeUpdated {
        old_bps: u64,
        new_bps: u64,
    },
    ProtocolFeeClaimed {
        admin: Address,
        amount: Amount,
        remaining: Amount,
    },
    DepositsPaused {
        paused: bool,
    },
}

impl VaultEvent {
    /// Short snake_case name of the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposited { .. } => "deposited",
            Self::RequestAppended { .. } => "request_appended",
            Self::Matured { .. } => "matured",
            Self::SettledFromBuffer { .. } => "settled_from_buffer",
            Self::SettledFromBufferAndStaking { .. } => "settled_from_buffer_and_staking",
            Self::Withdrawn { .. } => "withdrawn",
            Self::Compounded { .. } => "compounded",
            Self::ValidatorAdded { .. } => "validator_added",
            Self::ValidatorWeightUpdated { .. } => "validator_weight_updated",
            Self::ValidatorDisabled { .. } => "validator_disabled",
            Self::ProtocolFeeUpdated { .. } => "protocol_fee_updated",
            Self::ProtocolFeeClaimed { .. } => "protocol_fee_claimed",
            Self::DepositsPaused { .. } => "deposits_paused",
        }
    }
}
