// 🇧🇷 Brazilian number conventions
// Display: "R$ 1.234,56" (dot thousands, comma decimals, two places)
// Input: legacy "1.234,56" or canonical "1234.56"

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parse a decimal typed by a user or stored in a legacy ledger file.
///
/// Text containing a comma is treated as Brazilian format: dots are thousands
/// separators and the comma is the decimal mark. Anything else is parsed as a
/// plain decimal, so `"1.234"` is one point two three four.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let canonical = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };

    Decimal::from_str(&canonical)
        .or_else(|_| Decimal::from_scientific(&canonical))
        .ok()
}

/// Format a monetary value as `R$ <value>`.
pub fn format_brl(value: Decimal) -> String {
    format!("R$ {}", format_number(value))
}

/// Format with two decimal places, dot thousands separator and comma decimals.
pub fn format_number(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();

    let plain = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    if negative {
        format!("-{},{}", grouped, frac_part)
    } else {
        format!("{},{}", grouped, frac_part)
    }
}
