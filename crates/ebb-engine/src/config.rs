//! Vault configuration.
//!
//! [`VaultConfig`] carries the admin identity, fee and stake-unit parameters,
//! the settlement timing knobs and the validators registered at genesis.
//! It can be built programmatically or loaded with [`VaultConfig::load`],
//! which layers an optional TOML file under `EBB_`-prefixed environment
//! variables (nested keys separated by `__`, e.g. `EBB_PROTOCOL_FEE_BPS`).

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ebb_core::constants::{
    DEFAULT_MATURITY_DELAY_SECS, DEFAULT_MAX_PENDING_REQUESTS_PER_USER, DEFAULT_MIN_STAKE_UNIT,
    DEFAULT_PROTOCOL_FEE_BPS, DEFAULT_UNSTAKE_INTERVAL_SECS, MAX_PROTOCOL_FEE_BPS,
    MAX_VALIDATOR_WEIGHT,
};
use ebb_core::types::{Address, Amount};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")] Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")] Invalid(String),
}

/// A validator registered when the vault is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub address: Address,
    pub weight: u64,
}

/// Configuration for a vault instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Account allowed to run administrative operations.
    pub admin: Address,
    /// Share of claimed rewards kept as protocol fee, in basis points.
    pub protocol_fee_bps: u64,
    /// Smallest amount placed with a validator, in base units.
    pub min_stake_unit: u64,
    /// Cap on unsettled redemption requests per requester.
    pub max_pending_requests_per_user: usize,
    /// Seconds a commitment must age before it becomes withdrawable.
    pub maturity_delay_secs: u64,
    /// Minimum seconds between two settlement passes that unstake.
    pub unstake_interval_secs: u64,
    pub genesis_validators: Vec<GenesisValidator>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            admin: Address::ZERO,
            protocol_fee_bps: DEFAULT_PROTOCOL_FEE_BPS,
            min_stake_unit: DEFAULT_MIN_STAKE_UNIT,
            max_pending_requests_per_user: DEFAULT_MAX_PENDING_REQUESTS_PER_USER,
            maturity_delay_secs: DEFAULT_MATURITY_DELAY_SECS,
            unstake_interval_secs: DEFAULT_UNSTAKE_INTERVAL_SECS,
            genesis_validators: Vec::new(),
        }
    }
}

impl VaultConfig {
    /// Load from an optional TOML file, then `EBB_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("EBB")
                .separator("__")
                .try_parsing(true),
        );
        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject parameter combinations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol_fee_bps > MAX_PROTOCOL_FEE_BPS {
            return Err(ConfigError::Invalid(format!(
                "protocol_fee_bps {} exceeds {MAX_PROTOCOL_FEE_BPS}",
                self.protocol_fee_bps
            )));
        }
        if self.min_stake_unit == 0 {
            return Err(ConfigError::Invalid("min_stake_unit must be positive".into()));
        }
        if self.max_pending_requests_per_user == 0 {
            return Err(ConfigError::Invalid("max_pending_requests_per_user must be positive".into()));
        }
        let mut seen = BTreeSet::new();
        for v in &self.genesis_validators {
            if v.weight >= MAX_VALIDATOR_WEIGHT {
                return Err(ConfigError::Invalid(format!(
                    "genesis validator {} weight {} not below {MAX_VALIDATOR_WEIGHT}",
                    v.address, v.weight
                )));
            }
            if !seen.insert(v.address) {
                return Err(ConfigError::Invalid(format!("duplicate genesis validator {}", v.address)));
            }
        }
        Ok(())
    }

    pub fn min_stake_unit(&self) -> Amount {
        self.min_stake_unit as Amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_matches_constants() {
        let cfg = VaultConfig::default();
        assert_eq!(cfg.protocol_fee_bps, 1_000);
        assert_eq!(cfg.min_stake_unit(), ebb_core::constants::UNIT);
        assert_eq!(cfg.max_pending_requests_per_user, 200);
        assert_eq!(cfg.maturity_delay_secs, 3 * 86_400);
        assert_eq!(cfg.unstake_interval_secs, 86_400);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_high_fee() {
        let cfg = VaultConfig { protocol_fee_bps: 3_001, ..VaultConfig::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("3001")));
    }

    #[test]
    fn validate_rejects_zero_unit_and_cap() {
        let cfg = VaultConfig { min_stake_unit: 0, ..VaultConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = VaultConfig { max_pending_requests_per_user: 0, ..VaultConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_genesis() {
        let v = Address::repeat_byte(1);
        let cfg = VaultConfig {
            genesis_validators: vec![
                GenesisValidator { address: v, weight: 1 },
                GenesisValidator { address: v, weight: 2 },
            ],
            ..VaultConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("duplicate")));
        let cfg = VaultConfig {
            genesis_validators: vec![GenesisValidator { address: v, weight: 100 }],
            ..VaultConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
admin = "0x{admin}"
protocol_fee_bps = 500
unstake_interval_secs = 60

[[genesis_validators]]
address = "0x{v1}"
weight = 1

[[genesis_validators]]
address = "0x{v2}"
weight = 3
"#,
            admin = "aa".repeat(20),
            v1 = "01".repeat(20),
            v2 = "02".repeat(20),
        )
        .unwrap();

        let cfg = VaultConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.admin, Address::repeat_byte(0xaa));
        assert_eq!(cfg.protocol_fee_bps, 500);
        assert_eq!(cfg.unstake_interval_secs, 60);
        assert_eq!(cfg.maturity_delay_secs, DEFAULT_MATURITY_DELAY_SECS);
        assert_eq!(cfg.genesis_validators.len(), 2);
        assert_eq!(cfg.genesis_validators[1].weight, 3);
    }

    #[test]
    fn load_rejects_invalid_file_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "protocol_fee_bps = 9000").unwrap();
        assert!(matches!(VaultConfig::load(Some(file.path())), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = VaultConfig {
            admin: Address::repeat_byte(9),
            genesis_validators: vec![GenesisValidator { address: Address::repeat_byte(1), weight: 5 }],
            ..VaultConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: VaultConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
