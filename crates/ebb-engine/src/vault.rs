//! The vault: owned state plus the validator network it delegates to.
//!
//! [`VaultState`] holds every piece of bookkeeping and is serde-serialisable
//! so a host can persist it between calls. [`Vault`] pairs it with a
//! [`ValidatorNetwork`] and runs every mutating operation through
//! [`Vault::atomically`], which restores both halves if the operation fails.
//! The queue and share ledger journal their own writes, so a rollback costs
//! what the failed operation touched rather than their size.
//!
//! Compounding lives in [`crate::compound`] and redemption processing in
//! [`crate::settlement`]; this module covers deposits, redemption requests,
//! administration and read-only views.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ebb_core::allocator::{plan_placement, Placement};
use ebb_core::error::{ShareError, VaultError};
use ebb_core::events::VaultEvent;
use ebb_core::math::mul_div_floor;
use ebb_core::queue::{QueueCheckpoint, QueueState, RedemptionQueue, RedemptionRequest};
use ebb_core::registry::{Validator, ValidatorRegistry};
use ebb_core::traits::ValidatorNetwork;
use ebb_core::treasury::Treasury;
use ebb_core::types::{Address, Amount, Timestamp};

use crate::config::VaultConfig;
use crate::shares::{ShareCheckpoint, ShareLedger};

/// Everything the vault owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    pub config: VaultConfig,
    pub registry: ValidatorRegistry,
    pub treasury: Treasury,
    pub queue: RedemptionQueue,
    pub shares: ShareLedger,
    /// Time of the last settlement pass that unstaked.
    pub last_unstake_at: Option<Timestamp>,
    pub deposits_paused: bool,
    /// Assets committed to requests out of the buffer, all time.
    pub settled_from_buffer: Amount,
    /// Assets committed to requests by unstaking, all time.
    pub settled_from_staking: Amount,
    /// Events not yet drained by [`Vault::take_events`].
    pub events: Vec<VaultEvent>,
}

impl VaultState {
    /// Fresh state with the configured genesis validators registered.
    pub fn new(config: VaultConfig) -> Result<Self, VaultError> {
        let mut registry = ValidatorRegistry::new();
        for v in &config.genesis_validators {
            registry.add(v.address, v.weight)?;
        }
        let treasury = Treasury::new(config.protocol_fee_bps, config.min_stake_unit());
        Ok(Self {
            config,
            registry,
            treasury,
            queue: RedemptionQueue::new(),
            shares: ShareLedger::new(),
            last_unstake_at: None,
            deposits_paused: false,
            settled_from_buffer: 0,
            settled_from_staking: 0,
            events: Vec::new(),
        })
    }

    /// Assets backing outstanding shares: stake plus vault liquidity, minus
    /// everything owed to redemption requests not yet paid.
    pub fn total_assets(&self) -> Amount {
        let gross = self.registry.total_staked() + self.treasury.liquid_total();
        gross.saturating_sub(self.queue.liability())
    }

    /// Shares minted for `assets`, rounded down. Saturates at `Amount::MAX`;
    /// minting that many fails in the ledger.
    pub fn convert_to_shares(&self, assets: Amount) -> Amount {
        let supply = self.shares.total_supply();
        let total = self.total_assets();
        if supply == 0 || total == 0 {
            return assets;
        }
        mul_div_floor(assets, supply, total).unwrap_or(Amount::MAX)
    }

    /// Assets owed for `shares`, rounded down.
    pub fn convert_to_assets(&self, shares: Amount) -> Amount {
        let supply = self.shares.total_supply();
        if supply == 0 {
            return shares;
        }
        mul_div_floor(shares, self.total_assets(), supply).unwrap_or(Amount::MAX)
    }

    pub(crate) fn require_admin(&self, caller: &Address) -> Result<(), VaultError> {
        if *caller != self.config.admin {
            return Err(VaultError::Unauthorized(*caller));
        }
        Ok(())
    }

    /// Stake the whole-unit part of `amount` on the most under-allocated
    /// validator and keep the rest in the buffer.
    pub(crate) fn place<N: ValidatorNetwork>(&mut self, network: &mut N, amount: Amount) -> Result<Placement, VaultError> {
        let placement = plan_placement(&self.registry, amount, self.treasury.min_stake_unit);
        if let Some(validator) = placement.validator {
            network.stake(&validator, placement.staked)?;
            self.registry.credit_stake(&validator, placement.staked)?;
            debug!(%validator, staked = placement.staked, "allocator: placed stake");
        }
        if placement.remainder > 0 {
            self.treasury.credit_buffer(placement.remainder)?;
        }
        Ok(placement)
    }

    fn deposit<N: ValidatorNetwork>(
        &mut self,
        network: &mut N,
        sender: Address,
        receiver: Address,
        assets: Amount,
    ) -> Result<Amount, VaultError> {
        if self.deposits_paused {
            return Err(VaultError::DepositsPaused);
        }
        if assets == 0 {
            return Err(ShareError::ZeroAmount.into());
        }
        let shares = self.convert_to_shares(assets);
        if shares == 0 {
            return Err(ShareError::ZeroAmount.into());
        }
        self.shares.mint(&receiver, shares)?;
        self.treasury.record_deposit(assets)?;
        self.place(network, assets)?;
        info!(%sender, %receiver, assets, shares, "deposit accepted");
        self.events.push(VaultEvent::Deposited { sender, receiver, assets, shares });
        Ok(shares)
    }

    fn request_redemption(&mut self, caller: Address, owner: Address, shares: Amount) -> Result<u64, VaultError> {
        let have = self.shares.balance_of(&owner);
        if have < shares {
            return Err(ShareError::InsufficientShares { owner, have, need: shares }.into());
        }
        if caller != owner {
            self.shares.spend_allowance(&owner, &caller, shares)?;
        }
        let assets = self.convert_to_assets(shares);
        if shares == 0 || assets == 0 {
            return Err(ShareError::ZeroAmount.into());
        }
        let id = self.queue.append(
            owner,
            caller,
            shares,
            assets,
            self.config.max_pending_requests_per_user,
        )?;
        self.shares.burn(&owner, shares)?;
        info!(id, %owner, requester = %caller, shares, assets, "queue: redemption requested");
        self.events.push(VaultEvent::RequestAppended {
            owner,
            requester: caller,
            id,
            shares,
            assets,
            length: self.queue.len(),
            accumulated: self.queue.accumulated(),
        });
        Ok(id)
    }
}

/// Everything [`Vault::atomically`] needs to undo a failed operation.
/// Registry, treasury and network are bounded by the validator count and
/// copied outright; the queue and share ledger hold journal checkpoints.
struct Rollback<N> {
    registry: ValidatorRegistry,
    treasury: Treasury,
    queue: QueueCheckpoint,
    shares: ShareCheckpoint,
    last_unstake_at: Option<Timestamp>,
    deposits_paused: bool,
    settled_from_buffer: Amount,
    settled_from_staking: Amount,
    events: usize,
    network: N,
}

impl<N: Clone> Rollback<N> {
    fn capture(state: &mut VaultState, network: &N) -> Self {
        // Exhaustive: every field is captured, except config which no
        // operation mutates.
        let VaultState {
            config: _,
            registry,
            treasury,
            queue,
            shares,
            last_unstake_at,
            deposits_paused,
            settled_from_buffer,
            settled_from_staking,
            events,
        } = state;
        Self {
            registry: registry.clone(),
            treasury: treasury.clone(),
            queue: queue.checkpoint(),
            shares: shares.checkpoint(),
            last_unstake_at: *last_unstake_at,
            deposits_paused: *deposits_paused,
            settled_from_buffer: *settled_from_buffer,
            settled_from_staking: *settled_from_staking,
            events: events.len(),
            network: network.clone(),
        }
    }

    fn release(self, state: &mut VaultState) {
        state.queue.release();
        state.shares.release();
    }

    fn restore(self, state: &mut VaultState, network: &mut N) {
        state.registry = self.registry;
        state.treasury = self.treasury;
        state.queue.rollback(self.queue);
        state.shares.rollback(self.shares);
        state.last_unstake_at = self.last_unstake_at;
        state.deposits_paused = self.deposits_paused;
        state.settled_from_buffer = self.settled_from_buffer;
        state.settled_from_staking = self.settled_from_staking;
        state.events.truncate(self.events);
        *network = self.network;
    }
}

/// A vault bound to a validator network.
#[derive(Debug, Clone)]
pub struct Vault<N> {
    state: VaultState,
    network: N,
}

impl<N: ValidatorNetwork + Clone> Vault<N> {
    pub fn new(config: VaultConfig, network: N) -> Result<Self, VaultError> {
        Ok(Self { state: VaultState::new(config)?, network })
    }

    /// Reassemble a vault from persisted parts.
    pub fn from_parts(state: VaultState, network: N) -> Self {
        Self { state, network }
    }

    pub fn into_parts(self) -> (VaultState, N) {
        (self.state, self.network)
    }

    pub fn state(&self) -> &VaultState {
        &self.state
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Direct access to the network, for hosts that simulate it.
    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    /// Run `op` against the state and network; on error both are restored
    /// to what they were before the call.
    pub(crate) fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut VaultState, &mut N) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let rollback = Rollback::capture(&mut self.state, &self.network);
        match op(&mut self.state, &mut self.network) {
            Ok(value) => {
                rollback.release(&mut self.state);
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "vault: operation rolled back");
                rollback.restore(&mut self.state, &mut self.network);
                Err(e)
            }
        }
    }

    /// Drain the events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.state.events)
    }

    // ------------------------------------------------------------------
    // User operations
    // ------------------------------------------------------------------

    /// Deposit `assets` from `sender`, minting shares to `receiver`.
    /// Returns the minted shares.
    pub fn deposit(&mut self, sender: Address, receiver: Address, assets: Amount) -> Result<Amount, VaultError> {
        self.atomically(|s, n| s.deposit(n, sender, receiver, assets))
    }

    /// Let `spender` file redemption requests against `owner`'s shares.
    pub fn approve(&mut self, owner: Address, spender: Address, shares: Amount) {
        self.state.shares.approve(&owner, &spender, shares);
    }

    /// Burn `shares` of `owner` and queue the equivalent assets for
    /// redemption on behalf of `caller`. Returns the request id.
    ///
    /// `now` is only logged. A request is timestamped when a settlement pass
    /// commits assets to it, and maturity counts from that commit.
    pub fn request_redemption(
        &mut self,
        caller: Address,
        owner: Address,
        shares: Amount,
        now: Timestamp,
    ) -> Result<u64, VaultError> {
        let id = self.atomically(|s, _| s.request_redemption(caller, owner, shares))?;
        debug!(id, now, "queue: request appended");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub fn add_validator(&mut self, caller: Address, validator: Address, weight: u64) -> Result<(), VaultError> {
        self.atomically(|s, _| {
            s.require_admin(&caller)?;
            s.registry.add(validator, weight)?;
            let sum_of_weight = s.registry.sum_of_weight();
            info!(%validator, weight, sum_of_weight, "registry: validator added");
            s.events.push(VaultEvent::ValidatorAdded { validator, weight, sum_of_weight });
            Ok(())
        })
    }

    pub fn update_validator_weight(&mut self, caller: Address, validator: Address, new_weight: u64) -> Result<(), VaultError> {
        self.atomically(|s, _| {
            s.require_admin(&caller)?;
            let old_weight = s.registry.update_weight(&validator, new_weight)?;
            let sum_of_weight = s.registry.sum_of_weight();
            info!(%validator, old_weight, new_weight, sum_of_weight, "registry: weight updated");
            s.events.push(VaultEvent::ValidatorWeightUpdated { validator, old_weight, new_weight, sum_of_weight });
            Ok(())
        })
    }

    /// Stop allocating to `validator`. Its stake is drained first by later
    /// settlement passes.
    pub fn disable_validator(&mut self, caller: Address, validator: Address) -> Result<(), VaultError> {
        self.atomically(|s, _| {
            s.require_admin(&caller)?;
            s.registry.disable(&validator)?;
            let sum_of_weight = s.registry.sum_of_weight();
            info!(%validator, sum_of_weight, "registry: validator disabled");
            s.events.push(VaultEvent::ValidatorDisabled { validator, sum_of_weight });
            Ok(())
        })
    }

    pub fn set_protocol_fee(&mut self, caller: Address, bps: u64) -> Result<(), VaultError> {
        self.atomically(|s, _| {
            s.require_admin(&caller)?;
            let old_bps = s.treasury.set_protocol_fee(bps)?;
            info!(old_bps, new_bps = bps, "treasury: protocol fee updated");
            s.events.push(VaultEvent::ProtocolFeeUpdated { old_bps, new_bps: bps });
            Ok(())
        })
    }

    /// Pay `amount` of accrued protocol fee to the admin. Returns the amount paid.
    pub fn claim_protocol_fee(&mut self, caller: Address, amount: Amount) -> Result<Amount, VaultError> {
        self.atomically(|s, _| {
            s.require_admin(&caller)?;
            let remaining = s.treasury.claim_fee(amount)?;
            info!(amount, remaining, "treasury: protocol fee claimed");
            s.events.push(VaultEvent::ProtocolFeeClaimed { admin: caller, amount, remaining });
            Ok(amount)
        })
    }

    /// Pause or resume deposits. Redemptions are unaffected.
    pub fn set_deposits_paused(&mut self, caller: Address, paused: bool) -> Result<(), VaultError> {
        self.atomically(|s, _| {
            s.require_admin(&caller)?;
            s.deposits_paused = paused;
            info!(paused, "vault: deposits pause toggled");
            s.events.push(VaultEvent::DepositsPaused { paused });
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn total_assets(&self) -> Amount {
        self.state.total_assets()
    }

    pub fn convert_to_shares(&self, assets: Amount) -> Amount {
        self.state.convert_to_shares(assets)
    }

    pub fn convert_to_assets(&self, shares: Amount) -> Amount {
        self.state.convert_to_assets(shares)
    }

    pub fn balance_of(&self, owner: &Address) -> Amount {
        self.state.shares.balance_of(owner)
    }

    pub fn treasury(&self) -> &Treasury {
        &self.state.treasury
    }

    pub fn queue_state(&self) -> QueueState {
        self.state.queue.state()
    }

    pub fn request(&self, id: u64) -> Result<&RedemptionRequest, VaultError> {
        Ok(self.state.queue.get(id)?)
    }

    /// `(assets, shares)` that `requester` can withdraw right now.
    pub fn withdrawable_of(&self, requester: &Address) -> (Amount, Amount) {
        self.state.queue.withdrawable_of(requester)
    }

    /// `(assets, shares)` that `requester` has queued but not yet matured.
    pub fn not_withdrawable_of(&self, requester: &Address) -> (Amount, Amount) {
        self.state.queue.not_withdrawable_of(requester)
    }

    pub fn list_active_validators(&self) -> Vec<Validator> {
        self.state.registry.list_active()
    }

    pub fn validator_info(&self, validator: &Address) -> Option<&Validator> {
        self.state.registry.info(validator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenesisValidator;
    use crate::network::InMemoryNetwork;
    use ebb_core::constants::UNIT;
    use ebb_core::error::{NetworkError, QueueError, RegistryError, TreasuryError};

    const ADMIN: Address = Address::repeat_byte(0xad);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    fn validator(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn vault(weights: &[u64]) -> Vault<InMemoryNetwork> {
        let config = VaultConfig {
            admin: ADMIN,
            genesis_validators: weights
                .iter()
                .enumerate()
                .map(|(i, w)| GenesisValidator { address: validator(i as u8 + 1), weight: *w })
                .collect(),
            ..VaultConfig::default()
        };
        Vault::new(config, InMemoryNetwork::new()).unwrap()
    }

    // ------------------------------------------------------------------
    // deposit
    // ------------------------------------------------------------------

    #[test]
    fn first_deposit_mints_one_to_one() {
        let mut v = vault(&[1]);
        assert_eq!(v.deposit(ALICE, ALICE, 3 * UNIT).unwrap(), 3 * UNIT);
        assert_eq!(v.balance_of(&ALICE), 3 * UNIT);
        assert_eq!(v.total_assets(), 3 * UNIT);
        assert_eq!(v.validator_info(&validator(1)).unwrap().staked, 3 * UNIT);
        assert_eq!(v.network().position(&validator(1)).staked, 3 * UNIT);
        assert_eq!(v.treasury().total_staked_accumulator, 3 * UNIT);
    }

    #[test]
    fn deposit_tail_goes_to_buffer() {
        let mut v = vault(&[1]);
        v.deposit(ALICE, BOB, UNIT + 20_000).unwrap();
        assert_eq!(v.treasury().buffer, 20_000);
        assert_eq!(v.balance_of(&BOB), UNIT + 20_000);
        let events = v.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "deposited");
        assert!(v.take_events().is_empty());
    }

    #[test]
    fn deposit_without_validators_stays_in_buffer() {
        let mut v = vault(&[]);
        v.deposit(ALICE, ALICE, 5 * UNIT).unwrap();
        assert_eq!(v.treasury().buffer, 5 * UNIT);
    }

    #[test]
    fn zero_deposit_rejected() {
        let mut v = vault(&[1]);
        assert_eq!(v.deposit(ALICE, ALICE, 0), Err(VaultError::Share(ShareError::ZeroAmount)));
    }

    #[test]
    fn deposit_rolled_back_on_network_failure() {
        let mut v = vault(&[1]);
        v.network_mut().set_available(false);
        let before = v.state().clone();
        assert!(matches!(
            v.deposit(ALICE, ALICE, UNIT),
            Err(VaultError::Network(NetworkError::Unavailable(_)))
        ));
        assert_eq!(v.state(), &before);
    }

    #[test]
    fn deposit_after_rewards_mints_fewer_shares() {
        let mut v = vault(&[1]);
        v.deposit(ALICE, ALICE, 10 * UNIT).unwrap();
        v.network_mut().add_reward(&validator(1), 10 * UNIT);
        v.compound(1).unwrap();
        // 9 net reward lands as stake: 19 assets back 10 shares.
        assert_eq!(v.total_assets(), 19 * UNIT);
        assert_eq!(v.deposit(BOB, BOB, 19 * UNIT).unwrap(), 10 * UNIT);
    }

    // ------------------------------------------------------------------
    // request_redemption
    // ------------------------------------------------------------------

    #[test]
    fn request_burns_shares_and_appends() {
        let mut v = vault(&[1]);
        v.deposit(ALICE, ALICE, 10 * UNIT).unwrap();
        v.take_events();
        let id = v.request_redemption(ALICE, ALICE, 4 * UNIT, 5).unwrap();
        assert_eq!(id, 0);
        assert_eq!(v.balance_of(&ALICE), 6 * UNIT);
        assert_eq!(v.total_assets(), 6 * UNIT);
        assert_eq!(v.request(0).unwrap().asset_amount, 4 * UNIT);
        assert_eq!(v.not_withdrawable_of(&ALICE), (4 * UNIT, 4 * UNIT));
        assert_eq!(
            v.take_events(),
            vec![VaultEvent::RequestAppended {
                owner: ALICE,
                requester: ALICE,
                id: 0,
                shares: 4 * UNIT,
                assets: 4 * UNIT,
                length: 1,
                accumulated: 4 * UNIT,
            }]
        );
    }

    #[test]
    fn request_rejects_zero_and_excess() {
        let mut v = vault(&[1]);
        v.deposit(ALICE, ALICE, UNIT).unwrap();
        assert_eq!(v.request_redemption(ALICE, ALICE, 0, 0), Err(ShareError::ZeroAmount.into()));
        assert!(matches!(
            v.request_redemption(ALICE, ALICE, UNIT + 1, 0),
            Err(VaultError::Share(ShareError::InsufficientShares { .. }))
        ));
    }

    #[test]
    fn request_on_behalf_spends_allowance() {
        let mut v = vault(&[1]);
        v.deposit(ALICE, ALICE, 2 * UNIT).unwrap();
        assert!(matches!(
            v.request_redemption(BOB, ALICE, UNIT, 0),
            Err(VaultError::Share(ShareError::InsufficientAllowance { .. }))
        ));
        v.approve(ALICE, BOB, UNIT);
        v.request_redemption(BOB, ALICE, UNIT, 0).unwrap();
        assert_eq!(v.state().shares.allowance(&ALICE, &BOB), 0);
        assert_eq!(v.request(0).unwrap().requester, BOB);
        assert_eq!(v.not_withdrawable_of(&BOB).0, UNIT);
    }

    #[test]
    fn request_cap_leaves_state_untouched() {
        let config = VaultConfig { max_pending_requests_per_user: 1, ..VaultConfig::default() };
        let mut v = Vault::new(config, InMemoryNetwork::new()).unwrap();
        v.deposit(ALICE, ALICE, 2 * UNIT).unwrap();
        v.request_redemption(ALICE, ALICE, UNIT, 0).unwrap();
        let before = v.state().clone();
        assert!(matches!(
            v.request_redemption(ALICE, ALICE, UNIT, 0),
            Err(VaultError::Queue(QueueError::TooManyPendingRequests { pending: 1, max: 1, .. }))
        ));
        assert_eq!(v.state(), &before);
    }

    #[test]
    fn request_is_stamped_when_committed_not_when_filed() {
        let mut v = vault(&[1]);
        v.deposit(ALICE, ALICE, 4 * UNIT).unwrap();
        v.request_redemption(ALICE, ALICE, UNIT, 100).unwrap();
        assert_eq!(v.request(0).unwrap().commit_timestamp, None);
        v.process_redemption_requests(250).unwrap();
        assert_eq!(v.request(0).unwrap().commit_timestamp, Some(250));
    }

    #[test]
    fn failed_request_on_behalf_restores_allowance() {
        let config = VaultConfig { max_pending_requests_per_user: 1, ..VaultConfig::default() };
        let mut v = Vault::new(config, InMemoryNetwork::new()).unwrap();
        v.deposit(ALICE, ALICE, 3 * UNIT).unwrap();
        v.approve(ALICE, BOB, 2 * UNIT);
        v.request_redemption(BOB, ALICE, UNIT, 0).unwrap();
        v.take_events();
        let before = v.state().clone();
        assert!(matches!(
            v.request_redemption(BOB, ALICE, UNIT, 0),
            Err(VaultError::Queue(QueueError::TooManyPendingRequests { .. }))
        ));
        assert_eq!(v.state().shares.allowance(&ALICE, &BOB), UNIT);
        assert_eq!(v.state(), &before);
    }

    // ------------------------------------------------------------------
    // administration
    // ------------------------------------------------------------------

    #[test]
    fn admin_operations_require_admin() {
        let mut v = vault(&[1]);
        assert_eq!(v.add_validator(ALICE, validator(2), 1), Err(VaultError::Unauthorized(ALICE)));
        assert_eq!(v.set_protocol_fee(ALICE, 10), Err(VaultError::Unauthorized(ALICE)));
        assert_eq!(v.claim_protocol_fee(ALICE, 0), Err(VaultError::Unauthorized(ALICE)));
        assert_eq!(v.disable_validator(ALICE, validator(1)), Err(VaultError::Unauthorized(ALICE)));
        assert!(v.take_events().is_empty());
    }

    #[test]
    fn validator_lifecycle_emits_events() {
        let mut v = vault(&[1]);
        v.add_validator(ADMIN, validator(2), 10).unwrap();
        v.update_validator_weight(ADMIN, validator(2), 20).unwrap();
        v.disable_validator(ADMIN, validator(1)).unwrap();
        assert_eq!(
            v.disable_validator(ADMIN, validator(2)),
            Err(RegistryError::LastActiveValidator(validator(2)).into())
        );
        let names: Vec<&str> = v.take_events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["validator_added", "validator_weight_updated", "validator_disabled"]);
        assert_eq!(v.state().registry.sum_of_weight(), 20);
        assert_eq!(v.list_active_validators().len(), 1);
    }

    #[test]
    fn paused_vault_rejects_deposits_only() {
        let mut v = vault(&[1]);
        v.deposit(ALICE, ALICE, UNIT).unwrap();
        assert_eq!(v.set_deposits_paused(ALICE, true), Err(VaultError::Unauthorized(ALICE)));
        v.set_deposits_paused(ADMIN, true).unwrap();
        assert_eq!(v.deposit(ALICE, ALICE, UNIT), Err(VaultError::DepositsPaused));
        v.request_redemption(ALICE, ALICE, UNIT, 0).unwrap();
        v.set_deposits_paused(ADMIN, false).unwrap();
        v.deposit(ALICE, ALICE, UNIT).unwrap();
    }

    #[test]
    fn fee_admin_paths() {
        let mut v = vault(&[1]);
        assert_eq!(
            v.set_protocol_fee(ADMIN, 3_001),
            Err(TreasuryError::FeeTooHigh { bps: 3_001, max: 3_000 }.into())
        );
        v.set_protocol_fee(ADMIN, 2_000).unwrap();
        assert_eq!(
            v.claim_protocol_fee(ADMIN, 1),
            Err(TreasuryError::InsufficientFeeBalance { requested: 1, available: 0 }.into())
        );
    }

    #[test]
    fn conversions_survive_large_balances() {
        let mut v = vault(&[1]);
        v.deposit(ALICE, ALICE, 1_000_000_000 * UNIT).unwrap();
        v.network_mut().add_reward(&validator(1), 100_000_000 * UNIT);
        v.compound(0).unwrap();
        // 9e26 net reward on 1e27 assets: products reach 1e54.
        assert_eq!(v.total_assets(), 1_090_000_000 * UNIT);
        assert_eq!(v.convert_to_assets(1_000_000_000 * UNIT), 1_090_000_000 * UNIT);
        assert_eq!(v.deposit(BOB, BOB, 109_000_000 * UNIT).unwrap(), 100_000_000 * UNIT);
    }

    #[test]
    fn state_serializes_with_large_amounts() {
        let mut v = vault(&[1, 2]);
        v.deposit(ALICE, ALICE, 1_000_000 * UNIT).unwrap();
        v.request_redemption(ALICE, ALICE, 1_000 * UNIT, 0).unwrap();
        let json = serde_json::to_string(v.state()).unwrap();
        let back: VaultState = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, v.state());
    }
}
