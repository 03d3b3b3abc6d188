//! Exact decimal conversion for locale-formatted numbers.
//!
//! Source data uses either `,` or `.` as the decimal separator ("12,50", "90.5000").
//! Everything here goes through text, never through `f64` arithmetic, so money
//! keeps its cents exactly.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid decimal value: '{value}'")]
pub struct ConversionError {
    pub value: String,
}

impl ConversionError {
    fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }
}

/// Parse decimal text that uses `,` or `.` as the separator.
pub fn parse_decimal(text: &str) -> Result<Decimal, ConversionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConversionError::new(text));
    }

    let normalized = trimmed.replace(',', ".");
    Decimal::from_str(&normalized).map_err(|_| ConversionError::new(text))
}

/// Values that can be turned into an exact [`Decimal`].
pub trait ToDecimal {
    fn to_decimal(&self) -> Result<Decimal, ConversionError>;
}

impl ToDecimal for str {
    fn to_decimal(&self) -> Result<Decimal, ConversionError> {
        parse_decimal(self)
    }
}

impl ToDecimal for String {
    fn to_decimal(&self) -> Result<Decimal, ConversionError> {
        parse_decimal(self)
    }
}

impl ToDecimal for Decimal {
    fn to_decimal(&self) -> Result<Decimal, ConversionError> {
        Ok(*self)
    }
}

impl ToDecimal for i64 {
    fn to_decimal(&self) -> Result<Decimal, ConversionError> {
        Ok(Decimal::from(*self))
    }
}

/// Spreadsheet readers hand numbers over as `f64`. The shortest round-trip
/// representation is what the sheet displayed, so parse that text.
impl ToDecimal for f64 {
    fn to_decimal(&self) -> Result<Decimal, ConversionError> {
        if !self.is_finite() {
            return Err(ConversionError::new(self.to_string()));
        }
        parse_decimal(&self.to_string())
    }
}

/// `value * rate`, truncated (not rounded) to `decimal_places`.
pub fn convert_truncated(value: Decimal, rate: Decimal, decimal_places: u32) -> Decimal {
    (value * rate).round_dp_with_strategy(decimal_places, RoundingStrategy::ToZero)
}
