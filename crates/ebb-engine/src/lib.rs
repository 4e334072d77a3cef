//! # ebb-engine
//! Stateful vault engine.
//!
//! Wires the `ebb-core` components into an operating vault:
//! - [`vault::Vault`]: owned [`vault::VaultState`] plus a validator network,
//!   deposits, redemption requests, administration and views
//! - [`settlement`]: `process_redemption_requests` and `withdraw`
//! - [`compound`]: reward claiming and reinvestment
//! - [`shares::ShareLedger`]: vault share balances and allowances
//! - [`network::InMemoryNetwork`]: simulated validator network
//! - [`config::VaultConfig`]: vault configuration

pub mod compound;
pub mod config;
pub mod network;
pub mod settlement;
pub mod shares;
pub mod vault;

pub use compound::CompoundReport;
pub use config::{ConfigError, GenesisValidator, VaultConfig};
pub use network::InMemoryNetwork;
pub use settlement::{SettlementReport, SettlementSource};
pub use shares::ShareLedger;
pub use vault::{Vault, VaultState};
