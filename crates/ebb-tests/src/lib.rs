//! Scenario and property tests for the Ebb vault.
//!
//! The integration tests under `tests/` drive a full [`ebb_engine::Vault`]
//! over the in-memory validator network through deposit, redemption,
//! settlement, compounding and withdrawal, and check the accounting
//! invariants that must hold across any sequence of operations.

pub mod helpers;
