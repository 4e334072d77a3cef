//! Protocol constants. All monetary values in base units (1 asset = 10^18 units).

use crate::types::Amount;

/// One whole asset in base units.
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Basis-point denominator used for the protocol fee.
pub const BPS_PRECISION: u64 = 10_000;

/// Validator weights must be strictly below this bound.
pub const MAX_VALIDATOR_WEIGHT: u64 = 100;

/// Default protocol fee taken from claimed rewards (10%).
pub const DEFAULT_PROTOCOL_FEE_BPS: u64 = 1_000;

/// Upper bound accepted by `set_protocol_fee` (30%).
pub const MAX_PROTOCOL_FEE_BPS: u64 = 3_000;

/// Default minimum amount worth staking with a validator.
pub const DEFAULT_MIN_STAKE_UNIT: u64 = 1_000_000_000_000_000_000;

/// Default cap on unsettled redemption requests per requester.
pub const DEFAULT_MAX_PENDING_REQUESTS_PER_USER: usize = 200;

/// Seconds in one day.
pub const DAY_SECS: u64 = 24 * 60 * 60;

/// Default delay between committing a request and it becoming withdrawable.
///
/// Mirrors the unbonding period of the external validator network.
pub const DEFAULT_MATURITY_DELAY_SECS: u64 = 3 * DAY_SECS;

/// Default minimum interval between two settlement passes that unstake.
pub const DEFAULT_UNSTAKE_INTERVAL_SECS: u64 = DAY_SECS;
