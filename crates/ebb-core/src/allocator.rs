//! Weighted stake allocation.
//!
//! Placement is a greedy heuristic, not a global optimum: each call puts the
//! whole stakeable amount on the single active validator that sits furthest
//! below its weight-proportional share of the post-placement total. Shares
//! and stakes are measured in whole stake units, so a run of equal deposits
//! round-robins across validators in proportion to weight and keeps every
//! validator within one unit of its exact share.
//!
//! Unstaking for redemptions is the reverse direction: stake stranded on
//! disabled validators is drained first, then the remainder is split across
//! active validators by weight.

use crate::math::mul_div_floor;
use crate::registry::ValidatorRegistry;
use crate::types::{Address, Amount};

/// Round `amount` down to a whole multiple of `unit`.
///
/// A zero `unit` disables rounding.
pub fn floor_to_unit(amount: Amount, unit: Amount) -> Amount {
    if unit == 0 {
        return amount;
    }
    amount - amount % unit
}

/// Where an incoming amount should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Validator receiving `staked`, `None` when nothing is placed.
    pub validator: Option<Address>,
    /// Whole-unit part of the amount to stake.
    pub staked: Amount,
    /// Sub-unit tail (or everything, when no validator is active) left idle.
    pub remainder: Amount,
}

/// Decide how to place `amount` given the current registry state.
pub fn plan_placement(registry: &ValidatorRegistry, amount: Amount, unit: Amount) -> Placement {
    let stakeable = floor_to_unit(amount, unit);
    let validator = if stakeable > 0 {
        select_validator(registry, stakeable, unit)
    } else {
        None
    };
    match validator {
        Some(v) => Placement { validator: Some(v), staked: stakeable, remainder: amount - stakeable },
        None => Placement { validator: None, staked: 0, remainder: amount },
    }
}

/// Pick the active validator with the largest allocation deficit after
/// placing `amount`. Ties go to the earliest registered validator.
pub fn select_validator(registry: &ValidatorRegistry, amount: Amount, unit: Amount) -> Option<Address> {
    let unit = unit.max(1);
    let sum_w: u128 = registry.active().map(|v| v.weight as u128).sum();
    let total_units: u128 =
        registry.active().map(|v| v.staked / unit).sum::<u128>() + amount / unit;

    let mut best: Option<(Address, i128)> = None;
    for v in registry.active() {
        let target = if sum_w == 0 { 0 } else { total_units * v.weight as u128 / sum_w };
        let deficit = target as i128 - (v.staked / unit) as i128;
        if best.is_none_or(|(_, d)| deficit > d) {
            best = Some((v.address, deficit));
        }
    }
    best.map(|(address, _)| address)
}

/// Split `shortfall` into per-validator unstake amounts.
///
/// Order of sources: disabled validators still holding stake (registration
/// order), then active validators proportionally by weight (floor, capped at
/// each stake), then a greedy top-up of any rounding remainder. The plan
/// totals `min(shortfall, total stake)` and omits zero entries.
pub fn unstake_plan(registry: &ValidatorRegistry, shortfall: Amount) -> Vec<(Address, Amount)> {
    let validators = registry.all();
    let mut planned: Vec<Amount> = vec![0; validators.len()];
    let mut remaining = shortfall;

    for (i, v) in validators.iter().enumerate() {
        if remaining == 0 {
            break;
        }
        if !v.active && v.staked > 0 {
            let take = v.staked.min(remaining);
            planned[i] = take;
            remaining -= take;
        }
    }

    if remaining > 0 {
        let sum_w: u128 = validators
            .iter()
            .filter(|v| v.active && v.staked > 0)
            .map(|v| v.weight as u128)
            .sum();
        if sum_w > 0 {
            let pool = remaining;
            for (i, v) in validators.iter().enumerate() {
                if !v.active || v.staked == 0 {
                    continue;
                }
                let share = mul_div_floor(pool, v.weight as u128, sum_w).unwrap_or(0).min(v.staked);
                planned[i] += share;
                remaining -= share;
            }
        }
    }

    for (i, v) in validators.iter().enumerate() {
        if remaining == 0 {
            break;
        }
        if !v.active {
            continue;
        }
        let room = v.staked - planned[i];
        let take = room.min(remaining);
        planned[i] += take;
        remaining -= take;
    }

    validators
        .iter()
        .zip(planned)
        .filter(|(_, amount)| *amount > 0)
        .map(|(v, amount)| (v.address, amount))
        .collect()
}
