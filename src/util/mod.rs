use crate::money::{format_minor, sentinel_cap};
use rust_decimal::Decimal;
use std::str::FromStr;

/// First characters of a token for display; never the whole thing.
pub(crate) fn token_preview(token: &str) -> String {
    let head: String = token.trim().chars().take(10).collect();
    format!("{head}...")
}

/// Validates the cap an operator typed (major units, non-negative).
pub(crate) fn parse_cap_input(raw: &str) -> Result<Decimal, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Enter a spend cap".to_string());
    }
    let value = Decimal::from_str(raw).map_err(|_| "Spend cap must be a number".to_string())?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err("Spend cap must be a positive number".to_string());
    }
    Ok(value)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CapKind {
    None,
    Paused,
    Capped,
}

pub(crate) fn cap_kind(cap: Option<i64>, currency: &str) -> CapKind {
    match cap {
        None | Some(0) => CapKind::None,
        Some(c) if c <= sentinel_cap(currency) => CapKind::Paused,
        Some(_) => CapKind::Capped,
    }
}

pub(crate) fn cap_label(cap: Option<i64>, currency: &str) -> String {
    match cap {
        None | Some(0) => "No cap".to_string(),
        Some(c) => format_minor(c, currency),
    }
}
