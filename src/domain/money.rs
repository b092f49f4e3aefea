use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Monetary amounts are fixed-point decimals with two fractional digits.
/// The store persists them as integer cents so SQL aggregation stays exact;
/// these helpers convert at that boundary.
pub type Cents = i64;

/// Convert an amount to integer cents.
/// Example: 50.00 -> 5000, -12.34 -> -1234
pub fn to_cents(amount: Decimal) -> Result<Cents, MoneyError> {
    let scaled = amount * Decimal::ONE_HUNDRED;
    if !scaled.fract().is_zero() {
        return Err(MoneyError::TooManyDecimals);
    }
    scaled.to_i64().ok_or(MoneyError::OutOfRange)
}

/// Convert integer cents back to a two-decimal amount.
/// Example: 5000 -> 50.00, -1234 -> -12.34
pub fn from_cents(cents: Cents) -> Decimal {
    Decimal::new(cents, 2)
}

/// Format an amount as a human-readable currency string.
/// Example: 50 -> "50.00", -12.34 -> "-12.34"
pub fn format_amount(amount: Decimal) -> String {
    match to_cents(amount) {
        Ok(cents) => {
            let sign = if cents < 0 { "-" } else { "" };
            let abs_cents = cents.abs();
            format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
        }
        // Figures finer than a cent only appear in derived values
        // (ratios applied to odd totals); show them as-is.
        Err(_) => amount.to_string(),
    }
}

/// Parse a decimal string into an amount with at most two decimal places.
/// Example: "50.00" -> 50.00, "12.5" -> 12.50, "100" -> 100.00
pub fn parse_amount(input: &str) -> Result<Decimal, MoneyError> {
    let amount = Decimal::from_str(input.trim()).map_err(|_| MoneyError::InvalidFormat)?;
    if amount.normalize().scale() > 2 {
        return Err(MoneyError::TooManyDecimals);
    }
    Ok(amount)
}

/// True if the amount fits the ledger's two-decimal grid.
pub fn has_cent_precision(amount: Decimal) -> bool {
    amount.normalize().scale() <= 2
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    InvalidFormat,
    TooManyDecimals,
    OutOfRange,
}

impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoneyError::InvalidFormat => write!(f, "invalid money format"),
            MoneyError::TooManyDecimals => write!(f, "amounts cannot be finer than one cent"),
            MoneyError::OutOfRange => write!(f, "amount out of representable range"),
        }
    }
}

impl std::error::Error for MoneyError {}
