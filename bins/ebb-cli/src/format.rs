//! Decimal amount parsing and human-readable output.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use ebb_core::constants::UNIT;
use ebb_core::types::{Amount, Timestamp};

const DECIMALS: usize = 18;

/// Parse a decimal amount such as `"12.5"` into base units.
pub fn parse_amount(s: &str) -> Result<Amount> {
    let s = s.trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        bail!("empty amount");
    }
    if frac.len() > DECIMALS {
        bail!("at most {DECIMALS} decimal places are supported");
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        bail!("invalid amount: {s}");
    }
    let whole: Amount = if whole.is_empty() { 0 } else { whole.parse()? };
    let frac_units: Amount = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<DECIMALS$}").parse()?
    };
    whole
        .checked_mul(UNIT)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| anyhow::anyhow!("amount too large: {s}"))
}

/// clap adapter for [`parse_amount`].
pub fn amount_arg(s: &str) -> Result<Amount, String> {
    parse_amount(s).map_err(|e| e.to_string())
}

/// Render base units as a decimal with trailing zeros trimmed.
pub fn format_amount(amount: Amount) -> String {
    let whole = amount / UNIT;
    let frac = amount % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0>DECIMALS$}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

pub fn format_timestamp(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("@{ts}"))
}

pub fn now() -> Timestamp {
    Timestamp::try_from(Utc::now().timestamp()).unwrap_or(0)
}
