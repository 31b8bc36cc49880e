//! Text <-> domain conversions shared by the row models. Everything in the
//! database is TEXT: RFC 3339 timestamps, ISO dates, stringified decimals.

use chrono::{DateTime, NaiveDate, Utc};

use ledgerly_core::errors::{DatabaseError, Error, Result};
use ledgerly_core::records::SyncStatus;

pub(crate) fn corrupt_row(column: &str, value: &str) -> Error {
    Error::Database(DatabaseError::Internal(format!(
        "Unreadable value in column {}: {}",
        column, value
    )))
}

pub(crate) fn parse_datetime(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupt_row(column, value))
}

pub(crate) fn parse_opt_datetime(
    column: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_datetime(column, v)).transpose()
}

pub(crate) fn parse_opt_date(column: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| corrupt_row(column, v)))
        .transpose()
}

pub(crate) fn format_opt_date(value: Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.format("%Y-%m-%d").to_string())
}

pub(crate) fn status_to_str(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Pending => "pending",
        SyncStatus::Synced => "synced",
        SyncStatus::Error => "error",
    }
}

pub(crate) fn status_from_str(value: &str) -> Result<SyncStatus> {
    match value {
        "pending" => Ok(SyncStatus::Pending),
        "synced" => Ok(SyncStatus::Synced),
        "error" => Ok(SyncStatus::Error),
        other => Err(corrupt_row("sync_status", other)),
    }
}
