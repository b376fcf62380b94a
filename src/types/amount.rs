//! Money amounts
//!
//! Amounts and balances are `Decimal` values kept at two decimal places.
//! Incoming amounts are rounded half away from zero before they are
//! validated, so `0.004` is rejected as zero and `10.005` becomes `10.01`.

use super::error::LedgerError;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Decimal places kept for every amount and balance
pub const AMOUNT_SCALE: u32 = 2;

/// Round a decimal to the ledger's scale
pub fn round_amount(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(AMOUNT_SCALE);
    rounded
}

/// Parse a decimal string into a non-negative amount at ledger scale
///
/// Used for balances read from the account file, where zero is valid.
///
/// # Errors
///
/// Returns `InvalidAmount` if the string is not a decimal or is negative.
pub fn parse_balance(raw: &str) -> Result<Decimal, LedgerError> {
    let value = Decimal::from_str(raw.trim()).map_err(|_| LedgerError::invalid_amount(raw))?;
    let value = round_amount(value);
    if value < Decimal::ZERO {
        return Err(LedgerError::invalid_amount(raw));
    }
    // `-0.00` compares equal to zero but would print its sign
    Ok(value.abs())
}

/// Parse a decimal string into a strictly positive amount at ledger scale
///
/// # Errors
///
/// Returns `InvalidAmount` if the string is not a decimal or rounds to a
/// value that is zero or negative.
pub fn parse_amount(raw: &str) -> Result<Decimal, LedgerError> {
    let value = Decimal::from_str(raw.trim()).map_err(|_| LedgerError::invalid_amount(raw))?;
    let value = round_amount(value);
    if value <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(raw));
    }
    Ok(value)
}

/// Format an amount with exactly two decimals
pub fn format_amount(value: Decimal) -> String {
    format!("{:.2}", value)
}
