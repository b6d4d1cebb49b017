//! Decimal arithmetic for document totals.
//!
//! Every operation is checked: an amount outside `Decimal`'s range is a
//! validation error, never a panic.

use rust_decimal::{Decimal, RoundingStrategy};

use stockflow_core::{DomainError, DomainResult};

/// Minor-unit scale used when none is configured (cents).
pub const DEFAULT_CURRENCY_SCALE: u32 = 2;

/// Exact line total; never rounded.
pub fn line_total(quantity: i64, unit_price: Decimal) -> DomainResult<Decimal> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or_else(|| {
            DomainError::validation(format!(
                "line total out of range: {quantity} x {unit_price}"
            ))
        })
}

/// Round to the currency's minor unit, midpoint away from zero.
pub fn round_money(amount: Decimal, scale: u32) -> Decimal {
    amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// Header total: sum of exact line totals, rounded once.
pub fn document_total<I>(line_totals: I, scale: u32) -> DomainResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    let sum = line_totals
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, t| acc.checked_add(t))
        .ok_or_else(|| DomainError::validation("document total out of range"))?;
    Ok(round_money(sum, scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_once_after_summing() {
        // Rounding each line first would give 0.01 + 0.01 = 0.02.
        let lines = [
            line_total(1, dec!(0.005)).unwrap(),
            line_total(1, dec!(0.005)).unwrap(),
        ];
        assert_eq!(document_total(lines, 2).unwrap(), dec!(0.01));
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        assert_eq!(round_money(dec!(2.345), 2), dec!(2.35));
        assert_eq!(round_money(dec!(-2.345), 2), dec!(-2.35));
    }

    #[test]
    fn oversized_line_total_is_a_validation_error() {
        let err = line_total(i64::MAX, Decimal::new(100_000_000_000, 0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn oversized_sum_is_a_validation_error() {
        let err = document_total([Decimal::MAX, Decimal::ONE], 2).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
