//! Fixed-point helpers for 18-decimal amounts.
//!
//! Products of two realistic balances (e.g. `assets * total_supply`) exceed
//! `u128`, so ratios are computed through a 256-bit intermediate.

use crate::types::Amount;

const LOW_MASK: u128 = u64::MAX as u128;

/// Full 256-bit product of `a` and `b` as `(high, low)` halves.
pub fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    let (a1, a0) = (a >> 64, a & LOW_MASK);
    let (b1, b0) = (b >> 64, b & LOW_MASK);

    let p00 = a0 * b0;
    let p01 = a0 * b1;
    let p10 = a1 * b0;
    let p11 = a1 * b1;

    let mid = (p00 >> 64) + (p01 & LOW_MASK) + (p10 & LOW_MASK);
    let low = (p00 & LOW_MASK) | (mid << 64);
    let high = p11 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);
    (high, low)
}

/// `floor(a * b / d)`.
///
/// Returns `None` when `d` is zero or the quotient does not fit in `u128`.
pub fn mul_div_floor(a: Amount, b: Amount, d: Amount) -> Option<Amount> {
    if d == 0 {
        return None;
    }
    if let Some(product) = a.checked_mul(b) {
        return Some(product / d);
    }
    let (high, low) = widening_mul(a, b);
    if high >= d {
        return None;
    }
    // Restoring long division of the low half, one bit at a time. `rem < d`
    // holds on entry to every step.
    let mut rem = high;
    let mut quotient: u128 = 0;
    for bit in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((low >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quotient |= 1;
        }
    }
    Some(quotient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::UNIT;
    use proptest::prelude::*;

    #[test]
    fn widening_mul_small_values() {
        assert_eq!(widening_mul(3, 7), (0, 21));
        assert_eq!(widening_mul(u128::MAX, 2), (1, u128::MAX - 1));
        assert_eq!(widening_mul(u128::MAX, u128::MAX), (u128::MAX - 1, 1));
    }

    #[test]
    fn mul_div_matches_native_when_no_overflow() {
        assert_eq!(mul_div_floor(10, 3, 4), Some(7));
        assert_eq!(mul_div_floor(0, 3, 4), Some(0));
        assert_eq!(mul_div_floor(5, 5, 0), None);
    }

    #[test]
    fn mul_div_handles_large_balances() {
        // A million assets against a supply of a billion shares.
        let assets = 1_000_000 * UNIT;
        let supply = 1_000_000_000 * UNIT;
        let total = 1_100_000_000 * UNIT;
        assert!(assets.checked_mul(supply).is_none());
        assert_eq!(mul_div_floor(assets, supply, total), Some(assets * 10 / 11));
        assert_eq!(mul_div_floor(u128::MAX, u128::MAX, u128::MAX), Some(u128::MAX));
    }

    #[test]
    fn mul_div_reports_quotient_overflow() {
        assert_eq!(mul_div_floor(u128::MAX, 2, 1), None);
        assert_eq!(mul_div_floor(u128::MAX, u128::MAX, u128::MAX - 1), None);
    }

    proptest! {
        #[test]
        fn mul_div_agrees_with_split_reference(a in any::<u64>(), b in any::<u128>(), d in 1u128..) {
            // (a * b) / d with a < 2^64: split b to keep the reference exact.
            let expected = {
                let (q, r) = (b / d, b % d);
                let whole = (a as u128).checked_mul(q);
                let frac = mul_div_floor(a as u128, r, d);
                whole.zip(frac).and_then(|(w, f)| w.checked_add(f))
            };
            if let Some(expected) = expected {
                prop_assert_eq!(mul_div_floor(a as u128, b, d), Some(expected));
            }
        }

        #[test]
        fn mul_div_inverts_exact_products(a in 1u128..u64::MAX as u128, b in 1u128..u64::MAX as u128, k in 1u128..1_000_000) {
            prop_assert_eq!(mul_div_floor(a * k, b, k), Some(a * b));
        }
    }
}
