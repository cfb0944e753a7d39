//! Exact decimal helpers shared by the price tasks and the DEX provider.
//!
//! Everything here stays in `Decimal`; no float ever touches a price.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{Result, WatchError};

/// Largest scale `Decimal` can represent.
pub const MAX_DECIMAL_SCALE: u32 = 28;

const HUNDRED: Decimal = dec!(100);

/// Absolute percentage change from `previous` to `current`.
///
/// Returns `None` when `previous` is zero or the result does not fit a
/// `Decimal`.
pub fn pct_change(previous: Decimal, current: Decimal) -> Option<Decimal> {
    if previous.is_zero() {
        return None;
    }
    current
        .checked_sub(previous)?
        .abs()
        .checked_div(previous.abs())?
        .checked_mul(HUNDRED)
}

/// Percentage spread between two venue prices, relative to their midpoint:
/// `|a - b| / ((a + b) / 2) * 100`.
///
/// Returns `None` when the midpoint is not positive or any step overflows.
pub fn spread_pct(a: Decimal, b: Decimal) -> Option<Decimal> {
    let mid = a.checked_add(b)?.checked_div(dec!(2))?;
    if mid <= Decimal::ZERO {
        return None;
    }
    a.checked_sub(b)?.abs().checked_div(mid)?.checked_mul(HUNDRED)
}

/// Convert a raw integer token amount into whole units with `decimals` places.
pub fn from_base_units(raw: u128, decimals: u32) -> Result<Decimal> {
    if decimals > MAX_DECIMAL_SCALE {
        return Err(WatchError::inconsistent(format!(
            "token decimals {} exceed supported scale {}",
            decimals, MAX_DECIMAL_SCALE
        )));
    }
    let mantissa = i128::try_from(raw).map_err(|_| {
        WatchError::inconsistent(format!("amount {} does not fit a signed 128-bit value", raw))
    })?;
    Decimal::try_from_i128_with_scale(mantissa, decimals)
        .map(|d| d.normalize())
        .map_err(|e| {
            WatchError::inconsistent(format!(
                "amount {} with {} decimals is not representable: {}",
                raw, decimals, e
            ))
        })
}

/// Round for display in alert text.
pub fn display(value: Decimal, dp: u32) -> Decimal {
    value.round_dp(dp)
}
