//! # ebb-core
//! Foundation types, bookkeeping components and traits for the Ebb vault.
//!
//! Everything here is pure state manipulation with integer arithmetic:
//! - [`registry`]: weighted validator set and per-validator stake
//! - [`allocator`]: weighted-least-allocation placement and unstake planning
//! - [`treasury`]: idle buffer, protocol fee and liquidity accounting
//! - [`queue`]: prefix-summed FIFO of redemption requests with two cursors
//! - [`math`]: 256-bit intermediate `mul_div` for share conversions
//!
//! The stateful engine that wires these together lives in `ebb-engine`.

pub mod allocator;
pub mod constants;
pub mod error;
pub mod events;
pub mod math;
pub mod queue;
pub mod registry;
pub mod traits;
pub mod treasury;
pub mod types;
