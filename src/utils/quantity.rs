//! Parsing and range checks for energy and money quantities.
//!
//! JSON numbers are converted through their decimal text so `0.1` stays
//! `0.1` instead of picking up binary float noise.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{ApiError, Result};

/// Largest energy or money amount a single request may carry. Keeps every
/// stored counter far below the `Decimal` range even after years of updates.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Accepts a JSON number or a numeric string
pub fn decimal_from_json(field: &str, value: &Value) -> Result<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(field, &n.to_string()),
        Value::String(s) => parse_decimal(field, s.trim()),
        Value::Null => Err(ApiError::missing_field(field)),
        _ => Err(ApiError::validation_field(field, format!("{} must be a number", field))),
    }
}

fn parse_decimal(field: &str, text: &str) -> Result<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| ApiError::validation_field(field, format!("{} must be a finite number", field)))
}

fn ensure_within_limit(field: &str, value: Decimal) -> Result<Decimal> {
    if value > MAX_QUANTITY {
        return Err(ApiError::validation_field(
            field,
            format!("{} must not exceed {}", field, MAX_QUANTITY),
        ));
    }
    Ok(value)
}

pub fn ensure_non_negative(field: &str, value: Decimal) -> Result<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ApiError::validation_field(field, format!("{} must not be negative", field)));
    }
    ensure_within_limit(field, value)
}

pub fn ensure_positive(field: &str, value: Decimal) -> Result<Decimal> {
    if value <= Decimal::ZERO {
        return Err(ApiError::validation_field(field, format!("{} must be greater than zero", field)));
    }
    ensure_within_limit(field, value)
}

/// Sum that reports overflow on `field` instead of panicking
pub fn checked_total(field: &str, current: Decimal, delta: Decimal) -> Result<Decimal> {
    current.checked_add(delta).ok_or_else(|| {
        ApiError::validation_field(field, format!("{} would overflow the stored total", field))
    })
}
