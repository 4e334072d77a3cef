//! Trait interfaces for the Ebb vault.
//!
//! - [`ValidatorNetwork`]: the external staking network the vault delegates
//!   to (an in-memory implementation lives in `ebb-engine`).

use serde::{Deserialize, Serialize};

use crate::error::NetworkError;
use crate::types::{Address, Amount};

/// Outcome of an unstake call.
///
/// The network may hand part of the amount back immediately and release the
/// remainder only after its own unbonding period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnstakeReceipt {
    /// Amount delivered to the vault during the call.
    pub immediate: Amount,
    /// Amount that will be delivered after the unbonding period.
    pub scheduled: Amount,
}

impl UnstakeReceipt {
    /// Total amount the receipt accounts for.
    pub fn total(&self) -> Amount {
        self.immediate + self.scheduled
    }
}

/// Staking operations exposed by the external validator network.
///
/// All calls are synchronous. An `Err` aborts the calling vault operation,
/// which restores its state (and the network handle) to the pre-call snapshot.
pub trait ValidatorNetwork: Send + Sync {
    /// Reward accrued for the vault on `validator` and not yet claimed.
    fn pending_reward(&self, validator: &Address) -> Result<Amount, NetworkError>;

    /// Claim the pending reward on `validator`, returning the claimed amount.
    fn claim_pending_reward(&mut self, validator: &Address) -> Result<Amount, NetworkError>;

    /// Stake `amount` with `validator`.
    fn stake(&mut self, validator: &Address, amount: Amount) -> Result<(), NetworkError>;

    /// Start unstaking `amount` from `validator`.
    fn unstake(&mut self, validator: &Address, amount: Amount) -> Result<UnstakeReceipt, NetworkError>;
}
