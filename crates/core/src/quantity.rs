//! Stock quantity value object.

use core::str::FromStr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A non-negative stock quantity with two fractional digits.
///
/// The backend transmits every quantity as a decimal with two fractional
/// digits; `Quantity` normalizes to that precision on construction and
/// refuses negatives, so downstream arithmetic never has to re-check either
/// property.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);
    /// One whole unit; the step used by cart increment/decrement.
    pub const ONE: Quantity = Quantity(Decimal::ONE);

    /// Fractional digits carried on the wire and locally.
    pub const SCALE: u32 = 2;

    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::validation(format!(
                "quantity cannot be negative: {value}"
            )));
        }
        Ok(Self(value.round_dp(Self::SCALE)))
    }

    pub fn from_int(units: u32) -> Self {
        Self(Decimal::from(units))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.0.is_zero()
    }

    /// Subtraction floored at zero.
    pub fn saturating_sub(self, other: Quantity) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }

    pub fn min(self, other: Quantity) -> Self {
        if self.0 <= other.0 { self } else { other }
    }
}

impl core::ops::Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        self.0 += rhs.0;
    }
}

impl core::iter::Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Quantity {
        iter.fold(Quantity::ZERO, |acc, q| acc + q)
    }
}

impl ValueObject for Quantity {}

impl TryFrom<Decimal> for Quantity {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut two_dp = self.0;
        two_dp.rescale(Self::SCALE);
        core::fmt::Display::fmt(&two_dp, f)
    }
}

impl FromStr for Quantity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s)
            .map_err(|e| DomainError::validation(format!("quantity: {e}")))?;
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn rejects_negative_values() {
        let err = "-1.00".parse::<Quantity>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rounds_to_two_fractional_digits() {
        assert_eq!(qty("10.005"), qty("10.00"));
        assert_eq!(qty("10.006"), qty("10.01"));
        assert_eq!(qty("10.5").to_string(), "10.50");
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        assert_eq!(qty("5").saturating_sub(qty("7")), Quantity::ZERO);
        assert_eq!(qty("7.25").saturating_sub(qty("5")), qty("2.25"));
    }

    #[test]
    fn min_picks_the_smaller_quantity() {
        assert_eq!(qty("3").min(qty("4.5")), qty("3"));
        assert_eq!(qty("4.5").min(qty("3")), qty("3"));
    }

    #[test]
    fn sum_adds_quantities() {
        let total: Quantity = [qty("1.10"), qty("2.20"), qty("3")].into_iter().sum();
        assert_eq!(total, qty("6.30"));
    }

    #[test]
    fn serde_round_trip_keeps_precision() {
        let q = qty("12.34");
        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(json, "\"12.34\"");
        let back: Quantity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn serde_rejects_negative_wire_values() {
        assert!(serde_json::from_str::<Quantity>("\"-3.00\"").is_err());
    }
}
