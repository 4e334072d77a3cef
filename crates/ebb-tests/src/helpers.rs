//! Shared fixtures for the scenario and property tests.

use ebb_core::constants::UNIT;
use ebb_core::types::{Address, Amount};
use ebb_engine::{GenesisValidator, InMemoryNetwork, Vault, VaultConfig};

pub type TestVault = Vault<InMemoryNetwork>;

pub const ADMIN: Address = Address::repeat_byte(0xad);

/// Test account `n` (never collides with validators or the admin).
pub fn user(n: u8) -> Address {
    let mut bytes = [0xee; 20];
    bytes[19] = n;
    Address(bytes)
}

/// Validator `n`, counting from 1 in registration order.
pub fn validator(n: u8) -> Address {
    let mut bytes = [0x7a; 20];
    bytes[19] = n;
    Address(bytes)
}

/// Parse a decimal asset amount such as `"0.05"` into base units.
pub fn units(s: &str) -> Amount {
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    assert!(frac.len() <= 18, "too many decimals in {s}");
    let whole: Amount = whole.parse().expect("whole part");
    let frac_value: Amount = if frac.is_empty() {
        0
    } else {
        frac.parse::<Amount>().expect("fractional part") * 10u128.pow(18 - frac.len() as u32)
    };
    whole * UNIT + frac_value
}

/// Config with `weights.len()` genesis validators and `ADMIN` as admin.
pub fn config(weights: &[u64]) -> VaultConfig {
    VaultConfig {
        admin: ADMIN,
        genesis_validators: weights
            .iter()
            .enumerate()
            .map(|(i, w)| GenesisValidator { address: validator(i as u8 + 1), weight: *w })
            .collect(),
        ..VaultConfig::default()
    }
}

pub fn vault(weights: &[u64]) -> TestVault {
    Vault::new(config(weights), InMemoryNetwork::new()).expect("valid genesis")
}

pub fn vault_with(config: VaultConfig) -> TestVault {
    Vault::new(config, InMemoryNetwork::new()).expect("valid genesis")
}

/// `accumulated == from_buffer + from_staking + outstanding`.
pub fn assert_conservation(v: &TestVault) {
    let s = v.state();
    assert_eq!(
        s.queue.accumulated(),
        s.settled_from_buffer + s.settled_from_staking + s.queue.outstanding(),
        "committed amounts do not add up"
    );
}

/// Stake the registry records matches what the network holds.
pub fn assert_stake_mirrors_network(v: &TestVault) {
    for val in v.state().registry.all() {
        assert_eq!(
            val.staked,
            v.network().position(&val.address).staked,
            "stake mismatch on {}",
            val.address
        );
    }
}
