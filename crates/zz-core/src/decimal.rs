//! Decimal helpers shared by quoting and wire encoding.
//!
//! Exchange payloads carry JavaScript numbers; everything internal uses
//! `rust_decimal` so quote arithmetic stays exact.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;

/// Significant figures kept on quoted prices.
pub const QUOTE_SIG_FIGS: u32 = 6;

/// Round `value` to `sig_figs` significant figures (half away from zero).
///
/// Trailing zeros are stripped from the result.
pub fn round_sig_figs(value: Decimal, sig_figs: u32) -> Decimal {
    if value.is_zero() || sig_figs == 0 {
        return value;
    }

    let magnitude = calculate_magnitude(value.abs());
    let scale = i64::from(sig_figs) - 1 - magnitude;

    let rounded = if scale >= 0 {
        value.round_dp_with_strategy(scale as u32, RoundingStrategy::MidpointAwayFromZero)
    } else {
        let factor = pow10(scale.unsigned_abs() as u32);
        (value / factor).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * factor
    };

    rounded.normalize()
}

/// Order of magnitude: floor(log10(|value|)).
fn calculate_magnitude(value: Decimal) -> i64 {
    let mut mantissa = value.mantissa().unsigned_abs();
    let mut digits = 0i64;
    while mantissa > 0 {
        mantissa /= 10;
        digits += 1;
    }
    digits - 1 - i64::from(value.scale())
}

fn pow10(exp: u32) -> Decimal {
    let mut result = Decimal::ONE;
    for _ in 0..exp {
        result *= Decimal::TEN;
    }
    result
}

/// Read a decimal from a JSON number or numeric string.
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

/// Encode a decimal as a JSON number (falls back to a string if not representable).
pub fn decimal_to_value(value: Decimal) -> Value {
    value
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_round_sig_figs_large_value() {
        assert_eq!(round_sig_figs(dec!(2002.2), 6), dec!(2002.2));
        assert_eq!(round_sig_figs(dec!(2002.20456), 6), dec!(2002.2));
        assert_eq!(round_sig_figs(dec!(1234567.8), 6), dec!(1234570));
    }

    #[test]
    fn test_round_sig_figs_small_value() {
        assert_eq!(round_sig_figs(dec!(0.000123456789), 6), dec!(0.000123457));
        assert_eq!(round_sig_figs(dec!(-0.5000005), 6), dec!(-0.500001));
    }

    #[test]
    fn test_round_sig_figs_zero() {
        assert_eq!(round_sig_figs(Decimal::ZERO, 6), Decimal::ZERO);
    }

    #[test]
    fn test_decimal_from_value() {
        assert_eq!(decimal_from_value(&json!(2000.5)), Some(dec!(2000.5)));
        assert_eq!(decimal_from_value(&json!("0.0011")), Some(dec!(0.0011)));
        assert_eq!(decimal_from_value(&json!(3)), Some(dec!(3)));
        assert_eq!(decimal_from_value(&json!(1e-7)), Some(dec!(0.0000001)));
        assert_eq!(decimal_from_value(&json!(null)), None);
        assert_eq!(decimal_from_value(&json!("abc")), None);
    }

    #[test]
    fn test_decimal_to_value() {
        assert_eq!(decimal_to_value(dec!(2002.2)), json!(2002.2));
        assert_eq!(decimal_to_value(dec!(10)), json!(10.0));
    }
}
