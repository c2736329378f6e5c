//! Amount normalization for grouped-decimal figures such as `12,300.55`

use bigdecimal::{BigDecimal, Zero};
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::types::*;

/// Figure as it appears inside statement grammars: optional thousands
/// groups and exactly two fractional digits. Grouping is checked strictly by
/// [`parse_amount`] once a figure has been captured.
pub const AMOUNT_PATTERN: &str = r"(?:\d{1,3},)*\d{1,3}\.\d\d";

fn grouped_decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^-?(?:[1-9]\d{0,2}(?:,\d{3})+|0|[1-9]\d*)\.\d{2}$")
            .expect("invalid grouped decimal regex")
    })
}

/// Parse a grouped-decimal figure into an exact decimal.
///
/// Accepts an optional leading minus sign, either consistent thousands
/// grouping or no grouping at all, and exactly two fractional digits. A
/// signed zero is rejected since it cannot be formatted back.
pub fn parse_amount(raw: &str) -> StatementResult<BigDecimal> {
    if !grouped_decimal_re().is_match(raw) {
        return Err(StatementError::MalformedAmount(raw.to_string()));
    }

    let amount = BigDecimal::from_str(&raw.replace(',', ""))
        .map_err(|_| StatementError::MalformedAmount(raw.to_string()))?;
    if raw.starts_with('-') && amount.is_zero() {
        return Err(StatementError::MalformedAmount(raw.to_string()));
    }
    Ok(amount)
}

/// Format an amount with thousands separators and two fractional digits
pub fn format_amount(amount: &BigDecimal) -> String {
    let rounded = amount.round(2).with_scale(2);
    let negative = rounded < BigDecimal::from(0);
    let (cents, _) = rounded.abs().as_bigint_and_exponent();

    let mut digits = cents.to_string();
    while digits.len() < 3 {
        digits.insert(0, '0');
    }
    let (whole, fraction) = digits.split_at(digits.len() - 2);

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}.{}", if negative { "-" } else { "" }, grouped, fraction)
}
