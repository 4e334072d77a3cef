//! Weighted validator registry.
//!
//! Validators are kept in registration order, which is also the tie-break
//! order used by the allocator. Disabled validators are never removed: their
//! historical stake stays on record until it is drained by settlement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_VALIDATOR_WEIGHT;
use crate::error::RegistryError;
use crate::types::{Address, Amount};

/// A validator the vault delegates to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    /// Relative allocation priority in `[0, MAX_VALIDATOR_WEIGHT)`.
    pub weight: u64,
    /// Amount currently staked with this validator by the vault.
    pub staked: Amount,
    pub active: bool,
}

/// The vault's validator set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRegistry {
    validators: Vec<Validator>,
    index: BTreeMap<Address, usize>,
    sum_of_weight: u64,
}

fn check_weight(weight: u64) -> Result<(), RegistryError> {
    if weight >= MAX_VALIDATOR_WEIGHT {
        return Err(RegistryError::InvalidWeight { weight, max: MAX_VALIDATOR_WEIGHT });
    }
    Ok(())
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new active validator with zero stake.
    pub fn add(&mut self, address: Address, weight: u64) -> Result<(), RegistryError> {
        check_weight(weight)?;
        if self.index.contains_key(&address) {
            return Err(RegistryError::DuplicateValidator(address));
        }
        self.index.insert(address, self.validators.len());
        self.validators.push(Validator { address, weight, staked: 0, active: true });
        self.sum_of_weight += weight;
        Ok(())
    }

    /// Change the weight of an active validator. Returns the previous weight.
    pub fn update_weight(&mut self, address: &Address, new_weight: u64) -> Result<u64, RegistryError> {
        check_weight(new_weight)?;
        let v = self.get_mut(address)?;
        if !v.active {
            return Err(RegistryError::InactiveValidator(*address));
        }
        let old = v.weight;
        v.weight = new_weight;
        self.sum_of_weight = self.sum_of_weight - old + new_weight;
        Ok(old)
    }

    /// Deactivate a validator. At least one other active validator must remain.
    pub fn disable(&mut self, address: &Address) -> Result<(), RegistryError> {
        let i = self.position(address)?;
        if !self.validators[i].active {
            return Err(RegistryError::InactiveValidator(*address));
        }
        if self.active_count() <= 1 {
            return Err(RegistryError::LastActiveValidator(*address));
        }
        let v = &mut self.validators[i];
        v.active = false;
        self.sum_of_weight -= v.weight;
        Ok(())
    }

    pub fn sum_of_weight(&self) -> u64 {
        self.sum_of_weight
    }

    /// Look up a validator by address.
    pub fn info(&self, address: &Address) -> Option<&Validator> {
        self.index.get(address).map(|&i| &self.validators[i])
    }

    pub fn is_active(&self, address: &Address) -> bool {
        self.info(address).is_some_and(|v| v.active)
    }

    /// Active validators in registration order.
    pub fn active(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter().filter(|v| v.active)
    }

    /// Owned snapshot of the active validators.
    pub fn list_active(&self) -> Vec<Validator> {
        self.active().cloned().collect()
    }

    /// Every validator ever registered, in registration order.
    pub fn all(&self) -> &[Validator] {
        &self.validators
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Total stake across all validators, including disabled ones.
    pub fn total_staked(&self) -> Amount {
        self.validators.iter().map(|v| v.staked).sum()
    }

    /// Record stake placed with `address`.
    pub fn credit_stake(&mut self, address: &Address, amount: Amount) -> Result<(), RegistryError> {
        let v = self.get_mut(address)?;
        v.staked += amount;
        Ok(())
    }

    /// Record stake withdrawn from `address`.
    pub fn debit_stake(&mut self, address: &Address, amount: Amount) -> Result<(), RegistryError> {
        let v = self.get_mut(address)?;
        if v.staked < amount {
            return Err(RegistryError::StakeUnderflow { validator: *address, have: v.staked, need: amount });
        }
        v.staked -= amount;
        Ok(())
    }

    fn position(&self, address: &Address) -> Result<usize, RegistryError> {
        self.index
            .get(address)
            .copied()
            .ok_or(RegistryError::UnknownValidator(*address))
    }

    fn get_mut(&mut self, address: &Address) -> Result<&mut Validator, RegistryError> {
        let i = self.position(address)?;
        Ok(&mut self.validators[i])
    }
}
