//! Fixed-point monetary amounts.
//!
//! Amounts are `rust_decimal::Decimal` values held at scale 2. Inputs with more
//! than two significant decimal places are rejected rather than rounded, so a
//! total is always the exact sum of its parts.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Number of decimal places every amount is stored with.
pub const MONEY_SCALE: u32 = 2;

/// Largest representable amount (fits a `NUMERIC(12, 2)` column).
const MAX_CENTS: i64 = 999_999_999_999;

/// Non-negative amount with exactly two decimal places.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, MONEY_SCALE));

    /// Validate a decimal as a money amount.
    ///
    /// Fails for negative values, values with more than two significant
    /// decimal places, and values above the storable maximum.
    pub fn from_decimal(value: Decimal) -> DomainResult<Self> {
        if value < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "amount must be non-negative, got {value}"
            )));
        }
        if value.normalize().scale() > MONEY_SCALE {
            return Err(DomainError::validation(format!(
                "amount must have at most {MONEY_SCALE} decimal places, got {value}"
            )));
        }
        Self::bounded(value)
    }

    /// Build an amount from a count of cents.
    pub fn from_cents(cents: i64) -> DomainResult<Self> {
        Self::from_decimal(Decimal::new(cents, MONEY_SCALE))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// `self + other`, failing instead of exceeding the storable maximum.
    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        let sum = self
            .0
            .checked_add(other.0)
            .ok_or_else(|| DomainError::overflow("amount addition overflowed"))?;
        Self::bounded(sum)
    }

    /// `self × quantity`, failing instead of exceeding the storable maximum.
    pub fn checked_mul_quantity(self, quantity: u32) -> DomainResult<Money> {
        let product = self
            .0
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| DomainError::overflow("amount multiplication overflowed"))?;
        Self::bounded(product)
    }

    fn bounded(value: Decimal) -> DomainResult<Self> {
        if value > Decimal::new(MAX_CENTS, MONEY_SCALE) {
            return Err(DomainError::overflow(format!(
                "amount {value} exceeds the maximum of {}",
                Decimal::new(MAX_CENTS, MONEY_SCALE)
            )));
        }
        let mut scaled = value;
        scaled.rescale(MONEY_SCALE);
        Ok(Money(scaled))
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::ZERO
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::from_decimal(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::validation(format!("invalid amount {s:?}: {e}")))?;
        Money::from_decimal(value)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn amounts_are_kept_at_two_decimal_places() {
        assert_eq!(money("10").to_string(), "10.00");
        assert_eq!(money("5.5").to_string(), "5.50");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn trailing_zeros_beyond_scale_are_accepted() {
        assert_eq!(money("1.2300"), money("1.23"));
    }

    #[test]
    fn sub_cent_precision_is_rejected() {
        let err = "0.001".parse::<Money>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("decimal places")));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!("-0.01".parse::<Money>().is_err());
    }

    #[test]
    fn exceeding_maximum_is_an_overflow() {
        let max = money("9999999999.99");
        let err = max.checked_add(money("0.01")).unwrap_err();
        assert!(matches!(err, DomainError::Overflow(_)));
        assert!(max.checked_mul_quantity(2).is_err());
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_value(money("25")).unwrap();
        assert_eq!(json, serde_json::json!("25.00"));
    }

    #[test]
    fn deserialization_enforces_invariants() {
        assert!(serde_json::from_value::<Money>(serde_json::json!("12.345")).is_err());
        assert!(serde_json::from_value::<Money>(serde_json::json!("-1")).is_err());
        let ok: Money = serde_json::from_value(serde_json::json!("12.34")).unwrap();
        assert_eq!(ok, money("12.34"));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: multiplying by a quantity equals repeated addition.
        #[test]
        fn multiplication_matches_repeated_addition(cents in 0i64..100_000, qty in 1u32..50) {
            let price = Money::from_cents(cents).unwrap();
            let mut sum = Money::ZERO;
            for _ in 0..qty {
                sum = sum.checked_add(price).unwrap();
            }
            prop_assert_eq!(price.checked_mul_quantity(qty).unwrap(), sum);
        }
    }
}
