//! Offset quantities in kilograms.
//!
//! Uses `rust_decimal` internally so spreadsheet values like `2.5` survive
//! the trip to the API without floating-point drift.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Why a quantity cell could not be used.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuantityError {
    #[error("not a number: {0:?}")]
    NotANumber(String),

    #[error("quantity must be positive, got {0}")]
    NotPositive(Decimal),

    #[error("quantity {0} kg must come to between 1 g and {max} g", max = u64::MAX)]
    OutOfRange(Decimal),
}

/// A strictly positive mass in kilograms.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use offset_sheet::Kilograms;
///
/// let mass = Kilograms::from_str("2.50").unwrap();
/// assert_eq!(mass.to_string(), "2.5");
/// assert_eq!(mass.to_grams(), 2500);
/// ```
///
/// The mass in grams is fixed at construction, so a quantity that cannot be
/// ordered is rejected while the table is loaded rather than mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Kilograms {
    kg: Decimal,
    grams: u64,
}

impl Kilograms {
    /// Used for rows that leave the quantity cell empty.
    pub const DEFAULT: Self = Kilograms {
        kg: Decimal::TWO,
        grams: 2000,
    };

    /// Wraps a decimal, rejecting zero and negative values as well as
    /// masses that round to less than a gram or overflow `u64` grams.
    pub fn new(value: Decimal) -> std::result::Result<Self, QuantityError> {
        if value <= Decimal::ZERO {
            return Err(QuantityError::NotPositive(value));
        }
        let grams = value
            .checked_mul(Decimal::ONE_THOUSAND)
            .map(|g| g.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|g| g.to_u64())
            .filter(|&g| g >= 1)
            .ok_or(QuantityError::OutOfRange(value))?;

        Ok(Kilograms {
            kg: value.normalize(),
            grams,
        })
    }

    /// Whole grams, rounded half away from zero.
    pub fn to_grams(&self) -> u64 {
        self.grams
    }

    /// Parses an optional spreadsheet cell; blank cells yield `None`.
    pub fn parse_cell(cell: &str) -> std::result::Result<Option<Self>, QuantityError> {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Kilograms::from_str(trimmed).map(Some)
    }
}

impl Default for Kilograms {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for Kilograms {
    type Err = QuantityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = Decimal::from_str(trimmed)
            .map_err(|_| QuantityError::NotANumber(trimmed.to_string()))?;
        Kilograms::new(decimal)
    }
}

impl fmt::Display for Kilograms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_normalizes() {
        assert_eq!(Kilograms::from_str("5").unwrap().to_string(), "5");
        assert_eq!(Kilograms::from_str("2.50").unwrap().to_string(), "2.5");
        assert_eq!(Kilograms::from_str("  0.75 ").unwrap().to_string(), "0.75");
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(matches!(
            Kilograms::from_str("0"),
            Err(QuantityError::NotPositive(_))
        ));
        assert!(matches!(
            Kilograms::from_str("-1.5"),
            Err(QuantityError::NotPositive(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(
            Kilograms::from_str("lots"),
            Err(QuantityError::NotANumber("lots".to_string()))
        );
    }

    #[test]
    fn test_to_grams_rounds() {
        assert_eq!(Kilograms::from_str("5").unwrap().to_grams(), 5000);
        assert_eq!(Kilograms::from_str("0.0015").unwrap().to_grams(), 2);
        assert_eq!(Kilograms::from_str("1.2344").unwrap().to_grams(), 1234);
    }

    #[test]
    fn test_rejects_less_than_a_gram() {
        assert!(matches!(
            Kilograms::parse_cell("0.0004"),
            Err(QuantityError::OutOfRange(_))
        ));
        assert_eq!(Kilograms::from_str("0.0005").unwrap().to_grams(), 1);
    }

    #[test]
    fn test_rejects_more_grams_than_fit() {
        assert!(matches!(
            Kilograms::parse_cell("100000000000000000000000000"),
            Err(QuantityError::OutOfRange(_))
        ));
        assert!(matches!(
            Kilograms::from_str("18446744073709552"),
            Err(QuantityError::OutOfRange(_))
        ));
        assert_eq!(
            Kilograms::from_str("18446744073709551").unwrap().to_grams(),
            18_446_744_073_709_551_000
        );
    }

    #[test]
    fn test_blank_cell_is_none() {
        assert_eq!(Kilograms::parse_cell("").unwrap(), None);
        assert_eq!(Kilograms::parse_cell("   ").unwrap(), None);
        assert_eq!(
            Kilograms::parse_cell("3").unwrap(),
            Some(Kilograms::from_str("3").unwrap())
        );
    }

    #[test]
    fn test_default_is_two_kilograms() {
        assert_eq!(Kilograms::DEFAULT.to_string(), "2");
        assert_eq!(Kilograms::default().to_grams(), 2000);
    }
}
