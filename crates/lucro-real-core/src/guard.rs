//! Numeric guard.
//!
//! Decimal arithmetic panics on overflow, so every figure that leaves the
//! engine is produced through these helpers: an overflow or a zero divisor
//! degrades to zero instead of aborting the computation or leaking an
//! invalid value into the report.

use rust_decimal::Decimal;

use crate::error::LucroRealError;
use crate::types::{Money, Rate};
use crate::LucroRealResult;

/// Multiply, degrading overflow to zero.
pub fn mul(a: Decimal, b: Decimal) -> Decimal {
    a.checked_mul(b).unwrap_or(Decimal::ZERO)
}

/// Divide, degrading a zero divisor or overflow to zero.
pub fn div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

/// Add, degrading overflow to zero.
pub fn add(a: Decimal, b: Decimal) -> Decimal {
    a.checked_add(b).unwrap_or(Decimal::ZERO)
}

/// Sum an iterator, degrading overflow to zero.
pub fn sum<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    let mut total = Decimal::ZERO;
    for v in values {
        match total.checked_add(v) {
            Some(t) => total = t,
            None => return Decimal::ZERO,
        }
    }
    total
}

/// Sum caller-supplied amounts, failing with `InvalidInput` naming `field`
/// when the total is not representable.
///
/// For inputs, where degrading to zero would silently change the result.
pub fn checked_sum<I>(values: I, field: &str) -> LucroRealResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |total, v| total.checked_add(v))
        .ok_or_else(|| LucroRealError::InvalidInput {
            field: field.to_string(),
            reason: "Total is outside the representable decimal range".into(),
        })
}

/// Floor at zero. Only applied at final aggregation.
pub fn floor_zero(v: Decimal) -> Decimal {
    v.max(Decimal::ZERO)
}

/// `amount × rate` floored at zero.
pub fn tax_on(amount: Money, rate: Rate) -> Money {
    floor_zero(mul(amount, rate))
}

/// `part / whole` as a rate, zero when the whole is not positive.
pub fn ratio(part: Money, whole: Money) -> Rate {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    div(part, whole)
}
