//! Fixed-point money helpers.
//!
//! All balances and amounts are `BigDecimal` values kept at cent precision.
//! Percentages are applied with exact decimal arithmetic and rounded once,
//! at the end, so repeated postings never drift.

use bigdecimal::BigDecimal;
use std::str::FromStr;

/// Smallest amount a transaction may carry.
pub const MIN_TRANSACTION_AMOUNT: &str = "0.01";

pub fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

pub fn min_transaction_amount() -> BigDecimal {
    BigDecimal::from_str(MIN_TRANSACTION_AMOUNT).unwrap_or_else(|_| zero())
}

/// Rounds to `scale` fractional digits, half away from zero.
pub fn round_scale(value: &BigDecimal, scale: i64) -> BigDecimal {
    // `with_scale` truncates toward zero, so bias by half a unit first.
    let half = BigDecimal::new(5.into(), scale + 1);
    if *value < zero() {
        (value.clone() - half).with_scale(scale)
    } else {
        (value.clone() + half).with_scale(scale)
    }
}

pub fn round_cents(value: &BigDecimal) -> BigDecimal {
    round_scale(value, 2)
}

/// `amount * percent / 100`, rounded to cents.
pub fn percent_of(amount: &BigDecimal, percent: &BigDecimal) -> BigDecimal {
    round_cents(&(amount * percent / BigDecimal::from(100)))
}

/// True when the value carries no more than two fractional digits.
pub fn is_cent_precise(value: &BigDecimal) -> bool {
    round_cents(value) == *value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_round_cents_half_away_from_zero() {
        assert_eq!(round_cents(&dec("1.005")), dec("1.01"));
        assert_eq!(round_cents(&dec("1.004")), dec("1.00"));
        assert_eq!(round_cents(&dec("-1.005")), dec("-1.01"));
        assert_eq!(round_cents(&dec("2")), dec("2.00"));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(&dec("200"), &dec("7")), dec("14.00"));
        assert_eq!(percent_of(&dec("200"), &dec("3")), dec("6.00"));
        assert_eq!(percent_of(&dec("33.33"), &dec("1")), dec("0.33"));
        assert_eq!(percent_of(&dec("100"), &dec("2")), dec("2.00"));
    }

    #[test]
    fn test_cent_precision() {
        assert!(is_cent_precise(&dec("10.25")));
        assert!(is_cent_precise(&dec("10")));
        assert!(!is_cent_precise(&dec("10.255")));
    }

    #[test]
    fn test_min_transaction_amount() {
        assert_eq!(min_transaction_amount(), dec("0.01"));
    }
}
