//! Error types for the Ebb vault.
use thiserror::Error;

use crate::types::{Address, Amount, Timestamp};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid length: expected 40 hex digits, got {0}")] InvalidLength(usize),
    #[error("invalid hex: {0}")] InvalidHex(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid weight: {weight} not in [0, {max})")] InvalidWeight { weight: u64, max: u64 },
    #[error("cannot disable the last active validator {0}")] LastActiveValidator(Address),
    #[error("unknown validator: {0}")] UnknownValidator(Address),
    #[error("validator already registered: {0}")] DuplicateValidator(Address),
    #[error("validator is not active: {0}")] InactiveValidator(Address),
    #[error("stake underflow on {validator}: have {have}, need {need}")] StakeUnderflow { validator: Address, have: Amount, need: Amount },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("too many pending redemption requests for {requester}: {pending} >= {max}")] TooManyPendingRequests { requester: Address, pending: usize, max: usize },
    #[error("unknown request id {id} (length {length})")] UnknownRequestId { id: u64, length: u64 },
    #[error("commit target {target} outside [{committed}, {accumulated}]")] InvalidCommitTarget { target: Amount, committed: Amount, accumulated: Amount },
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("unstake rate limited: last at {last_unstake_at}, retry at {retry_at}")] RateLimited { last_unstake_at: Timestamp, retry_at: Timestamp },
    #[error("nothing withdrawable for {owner}")] InsufficientWithdrawable { owner: Address },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreasuryError {
    #[error("insufficient fee balance: requested {requested}, available {available}")] InsufficientFeeBalance { requested: Amount, available: Amount },
    #[error("protocol fee too high: {bps} > {max}")] FeeTooHigh { bps: u64, max: u64 },
    #[error("insufficient {account} balance: have {have}, need {need}")] InsufficientBalance { account: &'static str, have: Amount, need: Amount },
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error("zero amount")] ZeroAmount,
    #[error("insufficient shares for {owner}: have {have}, need {need}")] InsufficientShares { owner: Address, have: Amount, need: Amount },
    #[error("insufficient allowance from {owner} to {spender}: have {have}, need {need}")] InsufficientAllowance { owner: Address, spender: Address, have: Amount, need: Amount },
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("validator network unavailable: {0}")] Unavailable(String),
    #[error("validator unknown to network: {0}")] UnknownValidator(Address),
    #[error("insufficient stake on {validator}: have {have}, need {need}")] InsufficientStake { validator: Address, have: Amount, need: Amount },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error(transparent)] Registry(#[from] RegistryError),
    #[error(transparent)] Queue(#[from] QueueError),
    #[error(transparent)] Settlement(#[from] SettlementError),
    #[error(transparent)] Treasury(#[from] TreasuryError),
    #[error(transparent)] Share(#[from] ShareError),
    #[error(transparent)] Network(#[from] NetworkError),
    #[error("unauthorized caller: {0}")] Unauthorized(Address),
    #[error("deposits are paused")] DepositsPaused,
}
