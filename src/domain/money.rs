//! Monetary type aliases and decimal helpers.

use rust_decimal::Decimal;

/// Price in the counter currency.
pub type Price = Decimal;

/// Quantity of the base currency.
pub type Volume = Decimal;

/// Spread or fee expressed as a fraction (0.01 = 1%).
pub type Ratio = Decimal;

/// Round `value` to a multiple of `step` above `min`.
///
/// Values already on the grid are returned unchanged. A zero step disables
/// rounding.
#[must_use]
pub fn round_to_step(value: Decimal, min: Decimal, step: Decimal, round_down: bool) -> Decimal {
    if step.is_zero() {
        return value;
    }
    let diff = value - min;
    let quotient = (diff / step).trunc();
    let remainder = diff - quotient * step;
    if remainder > Decimal::ZERO {
        let steps = if round_down {
            quotient
        } else {
            quotient + Decimal::ONE
        };
        min + steps * step
    } else {
        value
    }
}

/// Volume-weighted average price of two fills.
///
/// Returns `None` when the combined volume is zero.
#[must_use]
pub fn weighted_average(
    first: (Volume, Price),
    second: (Volume, Price),
) -> Option<Price> {
    let total = first.0 + second.0;
    if total.is_zero() {
        return None;
    }
    Some((first.0 * first.1 + second.0 * second.1) / total)
}
