//! Type-safe price representation using decimal arithmetic.
//!
//! The storefront operates in a single currency (INR). Amounts travel over
//! the wire as JSON numbers and are held as [`Decimal`] in memory so that
//! repeated additions never drift.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places kept for currency amounts.
pub const CURRENCY_DECIMALS: u32 = 2;

/// Round an amount to currency precision.
///
/// Uses standard (half away from zero) rounding, not truncation.
#[must_use]
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// A monetary amount in the store currency.
///
/// Arithmetic on `Price` is exact; call [`Price::rounded`] at the point where
/// an amount is displayed or sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// A zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of rupees.
    #[must_use]
    pub fn from_major(amount: i64) -> Self {
        Self(Decimal::from(amount))
    }

    /// Create a price from an amount in paise (1/100 rupee).
    #[must_use]
    pub fn from_minor(paise: i64) -> Self {
        Self(Decimal::new(paise, CURRENCY_DECIMALS))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply by a line quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Apply a rate (e.g. `0.18` for 18%).
    #[must_use]
    pub fn scale(self, rate: Decimal) -> Self {
        Self(self.0 * rate)
    }

    /// Round to currency precision.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self(round_currency(self.0))
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The amount in paise, rounded to currency precision.
    ///
    /// Payment gateways expect integer minor units. Returns `None` if the
    /// amount does not fit in an `i64`.
    #[must_use]
    pub fn to_minor(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;
        (round_currency(self.0) * Decimal::ONE_HUNDRED).to_i64()
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("₹{:.2}", round_currency(self.0)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_currency_half_away_from_zero() {
        assert_eq!(round_currency(Decimal::new(1_005, 3)), Decimal::new(101, 2));
        assert_eq!(round_currency(Decimal::new(1_004, 3)), Decimal::new(100, 2));
        assert_eq!(round_currency(Decimal::new(-1_005, 3)), Decimal::new(-101, 2));
    }

    #[test]
    fn test_times_and_sum() {
        let total: Price = [Price::from_major(500).times(2), Price::from_minor(1_999)]
            .into_iter()
            .sum();
        assert_eq!(total.amount(), Decimal::new(101_999, 2));
    }

    #[test]
    fn test_from_minor() {
        assert_eq!(Price::from_minor(12_345).amount(), Decimal::new(12_345, 2));
        assert_eq!(Price::from_minor(-50).amount(), Decimal::new(-50, 2));
    }

    #[test]
    fn test_to_minor_rounds_first() {
        let price = Price::new(Decimal::new(10_005, 3));
        assert_eq!(price.to_minor(), Some(1_001));
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_major(1500).to_string(), "₹1500.00");
        assert_eq!(Price::new(Decimal::new(2_675, 3)).to_string(), "₹2.68");
    }

    #[test]
    fn test_serde_uses_json_numbers() {
        let price: Price = serde_json::from_str("499.5").unwrap();
        assert_eq!(price.amount(), Decimal::new(4_995, 1));

        let whole: Price = serde_json::from_str("500").unwrap();
        assert_eq!(whole, Price::from_major(500));

        let json = serde_json::to_string(&Price::from_minor(1_250)).unwrap();
        assert_eq!(json, "12.5");
    }
}
