//! Amount and date text formats shared by payer adapters
//!
//! Amounts travel through the engine as signed integer cents. On the wire they
//! are either decimal dollars (`"10.00"`, `"-2.50"`, CSV payers) or implied-decimal
//! overpunch tokens (fixed-width payers, see [`super::overpunch`]).

use super::overpunch;
use crate::types::{AccumulationError, Cents};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Format cents as decimal dollars with exactly two places
pub fn format_decimal(cents: Cents) -> String {
    Decimal::new(cents, 2).to_string()
}

/// Parse decimal dollars back into cents
///
/// Accepts at most two fractional digits; anything finer would have to be
/// rounded, which is a silent change of the payer's number.
pub fn parse_decimal(field: &str, value: &str) -> Result<Cents, AccumulationError> {
    let invalid = || AccumulationError::invalid_amount(field, value);

    let decimal = Decimal::from_str(value.trim()).map_err(|_| invalid())?;
    let cents = decimal
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(invalid)?;
    if !cents.fract().is_zero() {
        return Err(invalid());
    }
    cents.to_i64().ok_or_else(invalid)
}

/// Format cents as an implied-decimal overpunch token
pub fn format_overpunch(cents: Cents) -> String {
    overpunch::encode(cents)
}

/// Parse an implied-decimal overpunch field, ignoring surrounding blanks
pub fn parse_overpunch(value: &str) -> Result<Cents, AccumulationError> {
    overpunch::decode(value.trim())
}

/// Dates on the wire are `YYYYMMDD`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}
