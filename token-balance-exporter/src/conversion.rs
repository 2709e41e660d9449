//! Conversion of raw on-chain integer balances into metric samples

use alloy::primitives::U256;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

/// Scale a raw base-unit balance down by `10^decimals` and narrow it to an
/// `f64`.
///
/// The integer and fractional parts are split with exact big-integer
/// arithmetic before either is narrowed, so balances well beyond `2^53` keep
/// their leading digits and small remainders are not swallowed by the
/// magnitude of the integer part.
pub fn to_scaled_float(raw: U256, decimals: u32) -> f64 {
    let raw = u256_to_biguint(raw);
    if raw.is_zero() {
        return 0.0;
    }

    let divisor = BigUint::from(10u32).pow(decimals);
    let whole = &raw / &divisor;
    let remainder = &raw % &divisor;

    // Both conversions saturate to infinity rather than failing, and neither
    // operand can be negative
    let whole = whole.to_f64().unwrap_or(f64::INFINITY);
    if remainder.is_zero() {
        return whole;
    }

    let remainder = remainder.to_f64().unwrap_or(f64::INFINITY);
    let divisor = divisor.to_f64().unwrap_or(f64::INFINITY);
    whole + remainder / divisor
}

/// Convert an alloy `U256` into a `BigUint`
pub fn u256_to_biguint(value: U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}
