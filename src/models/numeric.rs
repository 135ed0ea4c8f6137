use crate::errors::ServiceError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;

/// Number as sent by clients: either a JSON number or a numeric string.
///
/// Conversion happens inside the write transaction, so a bad value aborts
/// the whole composite write. Request DTOs document these fields as plain
/// numbers through `#[schema(value_type = f64)]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(Number),
    Text(String),
}

impl LooseNumber {
    pub fn to_decimal(&self, field: &str) -> Result<Decimal, ServiceError> {
        let parsed = match self {
            LooseNumber::Number(n) => number_to_decimal(n),
            LooseNumber::Text(s) => text_to_decimal(s),
        };
        parsed.ok_or_else(|| {
            ServiceError::ValidationError(format!("{} must be a finite number", field))
        })
    }

    /// Whole number greater than zero that fits the quantity column.
    pub fn to_quantity(&self, field: &str) -> Result<i32, ServiceError> {
        let value = self.to_decimal(field)?;
        if !value.fract().is_zero() {
            return Err(ServiceError::ValidationError(format!(
                "{} must be a whole number",
                field
            )));
        }
        if value <= Decimal::ZERO || value > Decimal::from(i32::MAX) {
            return Err(ServiceError::ValidationError(format!(
                "{} must be greater than zero",
                field
            )));
        }
        value.to_i32().ok_or_else(|| out_of_range(field))
    }
}

impl From<i64> for LooseNumber {
    fn from(value: i64) -> Self {
        LooseNumber::Number(Number::from(value))
    }
}

impl From<&str> for LooseNumber {
    fn from(value: &str) -> Self {
        LooseNumber::Text(value.to_string())
    }
}

fn number_to_decimal(n: &Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(Decimal::from(u));
    }
    text_to_decimal(&n.to_string())
}

fn text_to_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .ok()
        .or_else(|| Decimal::from_scientific(trimmed).ok())
}

/// Optional money input, absent meaning zero.
pub fn money_or_zero(value: Option<&LooseNumber>, field: &str) -> Result<Decimal, ServiceError> {
    value
        .map(|v| v.to_decimal(field))
        .transpose()
        .map(|v| v.unwrap_or(Decimal::ZERO))
}

fn out_of_range(field: &str) -> ServiceError {
    ServiceError::ValidationError(format!("{} is out of range", field))
}

/// `unit_price * quantity`, rejecting results that do not fit a decimal.
pub fn line_subtotal(
    unit_price: Decimal,
    quantity: i32,
    field: &str,
) -> Result<Decimal, ServiceError> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| out_of_range(field))
}

/// Sum of money amounts, rejecting overflow.
pub fn checked_sum<I>(amounts: I, field: &str) -> Result<Decimal, ServiceError>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount).ok_or_else(|| out_of_range(field))
    })
}

/// `minuend - subtrahend`, rejecting overflow.
pub fn checked_difference(
    minuend: Decimal,
    subtrahend: Decimal,
    field: &str,
) -> Result<Decimal, ServiceError> {
    minuend
        .checked_sub(subtrahend)
        .ok_or_else(|| out_of_range(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn from_json(raw: &str) -> LooseNumber {
        serde_json::from_str(raw).unwrap()
    }

    #[rstest]
    #[case("12", "12")]
    #[case("12.5", "12.5")]
    #[case("\"3\"", "3")]
    #[case("\" 1500.25 \"", "1500.25")]
    #[case("-40", "-40")]
    #[case("\"1e3\"", "1000")]
    fn parses_numbers_and_numeric_strings(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(
            from_json(raw).to_decimal("precio").unwrap(),
            Decimal::from_str(expected).unwrap()
        );
    }

    #[rstest]
    #[case("\"abc\"")]
    #[case("\"\"")]
    #[case("\"NaN\"")]
    #[case("\"Infinity\"")]
    #[case("\"12abc\"")]
    fn rejects_non_numeric(#[case] raw: &str) {
        assert_matches!(
            from_json(raw).to_decimal("precio"),
            Err(ServiceError::ValidationError(msg)) if msg.contains("precio")
        );
    }

    #[rstest]
    #[case("2", 2)]
    #[case("\"7\"", 7)]
    #[case("3.0", 3)]
    fn quantity_accepts_positive_whole_numbers(#[case] raw: &str, #[case] expected: i32) {
        assert_eq!(from_json(raw).to_quantity("cantidad").unwrap(), expected);
    }

    #[rstest]
    #[case("0")]
    #[case("-1")]
    #[case("2.5")]
    #[case("\"dos\"")]
    #[case("99999999999")]
    fn quantity_rejects_invalid(#[case] raw: &str) {
        assert!(from_json(raw).to_quantity("cantidad").is_err());
    }

    #[test]
    fn absent_money_is_zero() {
        assert_eq!(money_or_zero(None, "abono").unwrap(), Decimal::ZERO);
        assert_eq!(
            money_or_zero(Some(&LooseNumber::from(5)), "abono").unwrap(),
            Decimal::from(5)
        );
    }

    #[test]
    fn overflowing_arithmetic_is_a_validation_error() {
        assert_matches!(
            line_subtotal(Decimal::MAX, 2, "items[0].subtotal"),
            Err(ServiceError::ValidationError(msg)) if msg.contains("items[0].subtotal")
        );
        assert_matches!(
            checked_sum([Decimal::MAX, Decimal::ONE], "total"),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            checked_difference(Decimal::MAX, Decimal::NEGATIVE_ONE, "total"),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn checked_arithmetic_matches_plain_results() {
        assert_eq!(
            line_subtotal(Decimal::new(1250, 2), 3, "subtotal").unwrap(),
            Decimal::new(3750, 2)
        );
        assert_eq!(checked_sum(Vec::new(), "total").unwrap(), Decimal::ZERO);
        assert_eq!(
            checked_difference(Decimal::from(100), Decimal::from(-20), "total").unwrap(),
            Decimal::from(120)
        );
    }
}
