//! Integer-safe arithmetic on micro-denominated currency amounts.
//!
//! Monetary values are `i64` amounts in micro-units (10⁻⁶ of the nominal
//! currency). Intermediate products widen to `i128` so multiplication never
//! overflows for balances the platform can actually hold.

use crate::error::EngineError;

/// Micro-units per whole currency unit.
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// `value * numerator / denominator`, rounded half away from zero.
pub fn mul_div_round(value: i64, numerator: i64, denominator: i64) -> Result<i64, EngineError> {
    if denominator == 0 {
        return Err(EngineError::ZeroDenominator);
    }
    let product = i128::from(value) * i128::from(numerator);
    let denominator = i128::from(denominator);
    let magnitude = (product.abs() + denominator.abs() / 2) / denominator.abs();
    let sign = product.signum() * denominator.signum();
    i64::try_from(sign * magnitude).map_err(|_| EngineError::AmountOverflow)
}

/// Floored `value * numerator / denominator`.
///
/// Used where conservation matters more than fairness: a floored share can
/// never allocate more than the quantity being split.
pub fn mul_div_floor(value: i64, numerator: i64, denominator: i64) -> Result<i64, EngineError> {
    if denominator == 0 {
        return Err(EngineError::ZeroDenominator);
    }
    let product = i128::from(value) * i128::from(numerator);
    let floored = product.div_euclid(i128::from(denominator));
    i64::try_from(floored).map_err(|_| EngineError::AmountOverflow)
}

/// Ratio of total supporter stakes to loan principal, expressed 0..=100.
///
/// A zero or negative principal yields 0.0 rather than an error; coverage is
/// advisory input to scoring and pricing, not a ledger quantity.
pub fn coverage_pct(total_stakes_micro: i64, principal_micro: i64) -> f64 {
    if principal_micro <= 0 {
        return 0.0;
    }
    total_stakes_micro as f64 / principal_micro as f64 * 100.0
}
