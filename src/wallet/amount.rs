//! Decimal amount helpers
//!
//! Amounts travel as decimal strings. The ledger's smallest unit is the
//! stroop (1e-7 of the native unit).

use crate::error::{Error, Result};

/// Stroops per whole unit
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

/// Decimal places representable on the ledger
const MAX_DECIMALS: usize = 7;

/// Split a plain decimal ("12", "0.5", ".5", "3.") into integer and fraction
/// digits. Rejects signs, exponents, whitespace and anything non-numeric.
fn split_decimal(amount: &str) -> Option<(&str, &str)> {
    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }

    Some((int_part, frac_part))
}

/// Check that `amount` is a decimal strictly greater than zero
pub fn is_positive_decimal(amount: &str) -> bool {
    match split_decimal(amount) {
        Some((int_part, frac_part)) => int_part
            .bytes()
            .chain(frac_part.bytes())
            .any(|b| b != b'0'),
        None => false,
    }
}

/// Convert a decimal amount to stroops
pub fn to_stroops(amount: &str) -> Result<i64> {
    let (int_part, frac_part) =
        split_decimal(amount).ok_or_else(|| Error::InvalidAmount(amount.to_string()))?;

    if frac_part.len() > MAX_DECIMALS {
        return Err(Error::InvalidAmount(format!(
            "{} has more than {} decimal places",
            amount, MAX_DECIMALS
        )));
    }

    let whole: i64 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| Error::InvalidAmount(amount.to_string()))?
    };

    let padded = format!("{:0<width$}", frac_part, width = MAX_DECIMALS);
    let fraction: i64 = padded
        .parse()
        .map_err(|_| Error::InvalidAmount(amount.to_string()))?;

    whole
        .checked_mul(STROOPS_PER_UNIT)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(|| Error::InvalidAmount(format!("{} is too large", amount)))
}

/// Render a ledger balance with two decimals ("9999.9999900" -> "10000.00")
///
/// Unparseable input renders as zero.
pub fn format_balance(balance: &str) -> String {
    let value: f64 = balance.trim().parse().unwrap_or(0.0);
    format!("{:.2}", value)
}
