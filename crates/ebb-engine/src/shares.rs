//! Vault share ledger: balances, allowances and total supply.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ebb_core::error::ShareError;
use ebb_core::types::{Address, Amount};

/// Supply when [`ShareLedger::checkpoint`] was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareCheckpoint {
    total_supply: Amount,
}

/// Prior value of one map entry; `None` means the entry was absent.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Undo {
    Balance { owner: Address, prev: Option<Amount> },
    Allowance { owner: Address, spender: Address, prev: Option<Amount> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLedger {
    balances: BTreeMap<Address, Amount>,
    /// owner -> spender -> remaining allowance.
    allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
    total_supply: Amount,
    #[serde(skip)]
    journal: Option<Vec<Undo>>,
}

impl ShareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, owner: &Address) -> Amount {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Holders with a non-zero balance.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    pub fn mint(&mut self, to: &Address, amount: Amount) -> Result<(), ShareError> {
        let supply = self.total_supply.checked_add(amount).ok_or(ShareError::ArithmeticOverflow)?;
        let balance = self.balance_of(to).checked_add(amount).ok_or(ShareError::ArithmeticOverflow)?;
        self.total_supply = supply;
        self.write_balance(to, balance);
        Ok(())
    }

    pub fn burn(&mut self, from: &Address, amount: Amount) -> Result<(), ShareError> {
        let have = self.balance_of(from);
        if have < amount {
            return Err(ShareError::InsufficientShares { owner: *from, have, need: amount });
        }
        self.write_balance(from, have - amount);
        self.total_supply -= amount;
        Ok(())
    }

    /// Set `spender`'s allowance over `owner`'s shares to `amount`.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) {
        let prev = write_entry(&mut self.allowances, owner, spender, amount);
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Undo::Allowance { owner: *owner, spender: *spender, prev });
        }
    }

    /// Consume `amount` of `spender`'s allowance. `Amount::MAX` is unlimited.
    pub fn spend_allowance(&mut self, owner: &Address, spender: &Address, amount: Amount) -> Result<(), ShareError> {
        let have = self.allowance(owner, spender);
        if have == Amount::MAX {
            return Ok(());
        }
        if have < amount {
            return Err(ShareError::InsufficientAllowance { owner: *owner, spender: *spender, have, need: amount });
        }
        self.approve(owner, spender, have - amount);
        Ok(())
    }

    /// Start journaling writes for [`ShareLedger::rollback`].
    pub fn checkpoint(&mut self) -> ShareCheckpoint {
        self.journal = Some(Vec::new());
        ShareCheckpoint { total_supply: self.total_supply }
    }

    /// Close the open checkpoint, keeping every write made since.
    pub fn release(&mut self) {
        self.journal = None;
    }

    /// Restore every entry written since `checkpoint`, newest first.
    pub fn rollback(&mut self, checkpoint: ShareCheckpoint) {
        for undo in self.journal.take().unwrap_or_default().into_iter().rev() {
            match undo {
                Undo::Balance { owner, prev } => {
                    match prev {
                        Some(balance) => self.balances.insert(owner, balance),
                        None => self.balances.remove(&owner),
                    };
                }
                Undo::Allowance { owner, spender, prev } => {
                    write_entry(&mut self.allowances, &owner, &spender, prev.unwrap_or(0));
                }
            }
        }
        self.total_supply = checkpoint.total_supply;
    }

    /// Zero balances are removed rather than stored.
    fn write_balance(&mut self, owner: &Address, balance: Amount) {
        let prev = if balance == 0 {
            self.balances.remove(owner)
        } else {
            self.balances.insert(*owner, balance)
        };
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Undo::Balance { owner: *owner, prev });
        }
    }
}

/// Set one allowance, dropping zero entries and empty owners. Returns the
/// previous value.
fn write_entry(
    allowances: &mut BTreeMap<Address, BTreeMap<Address, Amount>>,
    owner: &Address,
    spender: &Address,
    amount: Amount,
) -> Option<Amount> {
    let entry = allowances.entry(*owner).or_default();
    let prev = if amount == 0 {
        entry.remove(spender)
    } else {
        entry.insert(*spender, amount)
    };
    if entry.is_empty() {
        allowances.remove(owner);
    }
    prev
}
