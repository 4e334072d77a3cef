//! On-disk vault snapshot: engine state, simulated network and clock.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ebb_core::types::Timestamp;
use ebb_engine::{InMemoryNetwork, Vault, VaultConfig, VaultState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: VaultState,
    pub network: InMemoryNetwork,
    /// Simulated wall clock, in unix seconds.
    pub clock: Timestamp,
}

impl Snapshot {
    pub fn new(config: VaultConfig, clock: Timestamp) -> Result<Self> {
        let state = VaultState::new(config).context("Failed to build genesis vault state")?;
        Ok(Self { state, network: InMemoryNetwork::new(), clock })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read vault snapshot: {} (run `ebb-cli init`)", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Corrupt vault snapshot: {}", path.display()))
    }

    /// Write the snapshot, creating parent directories as needed. The file is
    /// replaced via rename so a crash never leaves half a snapshot behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize vault snapshot")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    pub fn into_vault(self) -> (Vault<InMemoryNetwork>, Timestamp) {
        (Vault::from_parts(self.state, self.network), self.clock)
    }

    pub fn from_vault(vault: Vault<InMemoryNetwork>, clock: Timestamp) -> Self {
        let (state, network) = vault.into_parts();
        Self { state, network, clock }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_core::constants::UNIT;
    use ebb_core::types::Address;
    use ebb_engine::GenesisValidator;

    const ADMIN: Address = Address::repeat_byte(0xad);
    const ALICE: Address = Address::repeat_byte(0xa1);

    fn snapshot() -> Snapshot {
        let config = VaultConfig {
            admin: ADMIN,
            genesis_validators: vec![
                GenesisValidator { address: Address::repeat_byte(1), weight: 1 },
                GenesisValidator { address: Address::repeat_byte(2), weight: 3 },
            ],
            ..VaultConfig::default()
        };
        Snapshot::new(config, 1_700_000_000).unwrap()
    }

    #[test]
    fn save_then_load_restores_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vault.json");

        let (mut vault, clock) = snapshot().into_vault();
        vault.deposit(ALICE, ALICE, 250_000 * UNIT + 7).unwrap();
        vault.request_redemption(ALICE, ALICE, 1_000 * UNIT, clock).unwrap();
        vault.network_mut().add_reward(&Address::repeat_byte(2), UNIT / 3);
        let snap = Snapshot::from_vault(vault, clock + 60);
        snap.save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap();
        assert_eq!(loaded, snap);
        assert_eq!(loaded.clock, 1_700_000_060);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        let mut snap = snapshot();
        snap.save(&path).unwrap();
        snap.clock += 86_400;
        snap.save(&path).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap().clock, 1_700_086_400);
    }

    #[test]
    fn load_reports_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let err = Snapshot::load(&missing).unwrap_err();
        assert!(err.to_string().contains("ebb-cli init"));

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        let err = Snapshot::load(&corrupt).unwrap_err();
        assert!(err.to_string().contains("Corrupt vault snapshot"));
    }
}
