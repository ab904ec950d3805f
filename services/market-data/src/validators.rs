//! Validators for candidate rows
//!
//! Each validator sees the stored table and the rows returned by the gateway
//! and rejects the update before anything is written.

use std::fmt::Debug;

use types::dividend::DivStatus;
use types::errors::DataError;
use types::security::Security;
use types::table::{Dated, Table};

fn invalid(msg: String) -> Result<(), DataError> {
    Err(DataError::Validation(msg))
}

/// Accepts anything; used by validation-only gateways.
pub fn accept_all<R>(_table: &Table<R>, _rows: &[R]) -> Result<(), DataError> {
    Ok(())
}

/// Exactly one row.
pub fn single_row<R>(table: &Table<R>, rows: &[R]) -> Result<(), DataError> {
    if rows.len() != 1 {
        return invalid(format!("{} wrong rows count {}", table.id, rows.len()));
    }
    Ok(())
}

/// Dates strictly increasing.
pub fn increasing_dates<R: Dated>(table: &Table<R>, rows: &[R]) -> Result<(), DataError> {
    for pair in rows.windows(2) {
        let (prev, next) = (pair[0].date(), pair[1].date());
        if prev >= next {
            return invalid(format!(
                "{} not increasing dates {} and {}",
                table.id,
                prev.date_naive(),
                next.date_naive()
            ));
        }
    }
    Ok(())
}

/// Dates non-decreasing.
pub fn ordered_dates<R: Dated>(table: &Table<R>, rows: &[R]) -> Result<(), DataError> {
    for pair in rows.windows(2) {
        let (prev, next) = (pair[0].date(), pair[1].date());
        if prev > next {
            return invalid(format!(
                "{} unordered dates {} and {}",
                table.id,
                prev.date_naive(),
                next.date_naive()
            ));
        }
    }
    Ok(())
}

/// Append mode: dates strictly increasing and the first row equals the stored last row.
pub fn anchored_dates<R>(table: &Table<R>, rows: &[R]) -> Result<(), DataError>
where
    R: Dated + PartialEq + Debug,
{
    increasing_dates(table, rows)?;

    match (table.last_row(), rows.first()) {
        (Some(last), Some(first)) if last != first => invalid(format!(
            "{} old rows do not match new: {last:?} vs {first:?}",
            table.id
        )),
        _ => Ok(()),
    }
}

/// History is immutable: stored rows are a prefix of the new rows.
pub fn frozen_history<R>(table: &Table<R>, rows: &[R]) -> Result<(), DataError>
where
    R: Dated + PartialEq + Debug,
{
    increasing_dates(table, rows)?;

    if rows.len() < table.rows.len() {
        return invalid(format!(
            "{} new rows are shorter than stored: {} vs {}",
            table.id,
            rows.len(),
            table.rows.len()
        ));
    }

    for (n, (old, new)) in table.rows.iter().zip(rows).enumerate() {
        if old != new {
            return invalid(format!(
                "{} old rows do not match new at {n}: {old:?} vs {new:?}",
                table.id
            ));
        }
    }
    Ok(())
}

/// Securities: tickers strictly increasing.
pub fn increasing_tickers(table: &Table<Security>, rows: &[Security]) -> Result<(), DataError> {
    for pair in rows.windows(2) {
        if pair[0].ticker >= pair[1].ticker {
            return invalid(format!(
                "{} not increasing tickers {} and {}",
                table.id, pair[0].ticker, pair[1].ticker
            ));
        }
    }
    Ok(())
}

/// Dividend statuses: `(ticker, date)` strictly increasing.
pub fn increasing_statuses(table: &Table<DivStatus>, rows: &[DivStatus]) -> Result<(), DataError> {
    for pair in rows.windows(2) {
        let prev = (&pair[0].ticker, pair[0].date);
        let next = (&pair[1].ticker, pair[1].date);
        if prev >= next {
            return invalid(format!(
                "{} not increasing statuses {}@{} and {}@{}",
                table.id,
                prev.0,
                prev.1.date_naive(),
                next.0,
                next.1.date_naive()
            ));
        }
    }
    Ok(())
}
