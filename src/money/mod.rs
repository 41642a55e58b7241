//! Amount normalization.
//!
//! Every amount inside the crate is an `i64` in the currency's minor unit.
//! The remote platform is not consistent about which unit a field is
//! reported in, so each field names its unit at the boundary and goes
//! through [`parse_money_cap`] exactly once.

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};

/// Currencies the ads platform reports without a fractional part.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "CLP", "COP", "CRC", "HUF", "IDR", "ISK", "JPY", "KRW", "PYG", "TWD", "VND",
];

pub const DEFAULT_CURRENCY: &str = "USD";

/// Unit a remote field is reported in.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AmountUnit {
    #[default]
    Minor,
    Major,
}

impl std::str::FromStr for AmountUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minor" | "cents" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            other => Err(format!("unknown amount unit: {other}")),
        }
    }
}

/// Minor units per major unit for `currency`.
pub fn currency_offset(currency: &str) -> i64 {
    let code = currency.trim().to_ascii_uppercase();
    if ZERO_DECIMAL_CURRENCIES.contains(&code.as_str()) {
        1
    } else {
        100
    }
}

/// The "account paused" cap: exactly one major unit, in minor units.
pub fn sentinel_cap(currency: &str) -> i64 {
    currency_offset(currency)
}

fn raw_to_decimal(raw: &serde_json::Value) -> Option<Decimal> {
    match raw {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(Decimal::from_f64)
            }
        }
        serde_json::Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            Decimal::from_str(s).ok()
        }
        _ => None,
    }
}

/// Normalize a raw cap/spend value into minor units.
///
/// Accepts numbers and numeric strings (`"1"`, `"1.0"`, `" 1.00 "` are the
/// same value). Returns `None` for null, empty, negative, unparseable or
/// out-of-range input. Fractions of a minor unit round up, so a value above
/// the sentinel never lands on it.
pub fn parse_money_cap(raw: &serde_json::Value, unit: AmountUnit, currency: &str) -> Option<i64> {
    let value = raw_to_decimal(raw)?;
    if value.is_sign_negative() && !value.is_zero() {
        return None;
    }

    let minor = match unit {
        AmountUnit::Minor => value,
        AmountUnit::Major => value.checked_mul(Decimal::from(currency_offset(currency)))?,
    };

    minor
        .round_dp_with_strategy(0, RoundingStrategy::ToPositiveInfinity)
        .to_i64()
}

/// Major-unit decimal for a minor-unit amount.
pub fn minor_to_major(amount: i64, currency: &str) -> Decimal {
    let scale = if currency_offset(currency) == 1 { 0 } else { 2 };
    Decimal::new(amount, scale)
}

/// Decimal string the platform expects on spend cap writes (major units).
pub fn major_to_wire(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Display string for a minor-unit amount.
pub fn format_minor(amount: i64, currency: &str) -> String {
    let code = if currency.trim().is_empty() {
        DEFAULT_CURRENCY.to_string()
    } else {
        currency.trim().to_ascii_uppercase()
    };

    let major = minor_to_major(amount, &code);
    let text = major.to_string();
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text.clone(), None),
    };

    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest.to_string()),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f} {code}"),
        None => format!("{sign}{grouped} {code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_numbers_and_numeric_strings_alike() {
        for raw in [json!(1), json!("1"), json!("1.0"), json!("1.00"), json!(" 1.00 ")] {
            assert_eq!(parse_money_cap(&raw, AmountUnit::Major, "USD"), Some(100), "{raw}");
            assert_eq!(parse_money_cap(&raw, AmountUnit::Minor, "USD"), Some(1), "{raw}");
        }
    }

    #[test]
    fn rejects_null_empty_and_garbage() {
        assert_eq!(parse_money_cap(&json!(null), AmountUnit::Minor, "USD"), None);
        assert_eq!(parse_money_cap(&json!(""), AmountUnit::Minor, "USD"), None);
        assert_eq!(parse_money_cap(&json!("abc"), AmountUnit::Minor, "USD"), None);
        assert_eq!(parse_money_cap(&json!(-5), AmountUnit::Minor, "USD"), None);
        assert_eq!(parse_money_cap(&json!({"v": 1}), AmountUnit::Minor, "USD"), None);
    }

    #[test]
    fn zero_is_a_value_not_a_missing_cap() {
        assert_eq!(parse_money_cap(&json!("0"), AmountUnit::Minor, "USD"), Some(0));
    }

    #[test]
    fn major_units_use_currency_offset() {
        assert_eq!(parse_money_cap(&json!("12.345"), AmountUnit::Major, "USD"), Some(1235));
        assert_eq!(parse_money_cap(&json!("500"), AmountUnit::Major, "JPY"), Some(500));
        assert_eq!(sentinel_cap("jpy"), 1);
        assert_eq!(sentinel_cap("EUR"), 100);
    }

    #[test]
    fn oversized_amounts_are_rejected_not_panicking() {
        let max = json!("79228162514264337593543950335");
        assert_eq!(parse_money_cap(&max, AmountUnit::Major, "USD"), None);
        assert_eq!(parse_money_cap(&max, AmountUnit::Minor, "USD"), None);
        assert_eq!(parse_money_cap(&max, AmountUnit::Major, "JPY"), None);
    }

    #[test]
    fn fractional_minor_units_stay_above_the_sentinel() {
        let cap = parse_money_cap(&json!("100.4"), AmountUnit::Minor, "USD");
        assert_eq!(cap, Some(101));
        assert!(cap.is_some_and(|c| c > sentinel_cap("USD")));
        assert_eq!(parse_money_cap(&json!("100.0"), AmountUnit::Minor, "USD"), Some(100));
        assert_eq!(parse_money_cap(&json!("1.004"), AmountUnit::Major, "USD"), Some(101));
    }

    #[test]
    fn wire_format_drops_trailing_zeros() {
        assert_eq!(major_to_wire(Decimal::from_str("25.50").unwrap()), "25.5");
        assert_eq!(major_to_wire(Decimal::ONE), "1");
    }

    #[test]
    fn formats_with_grouping() {
        assert_eq!(format_minor(123456789, "usd"), "1,234,567.89 USD");
        assert_eq!(format_minor(5, "USD"), "0.05 USD");
        assert_eq!(format_minor(1500, "JPY"), "1,500 JPY");
        assert_eq!(format_minor(0, ""), "0.00 USD");
    }
}
