//! Database access for ocw-tasks
//!
//! Pool-level functions for the task store; connection-level functions
//! (taking `&mut SqliteConnection`) for anything written inside an
//! ingestion transaction.

pub mod decisions;
pub mod subjects;
pub mod tasks;
pub mod transcripts;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{TaskError, TaskResult};

/// Fixed-width RFC 3339 timestamp so TEXT columns sort chronologically
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> TaskResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TaskError::Internal(format!("Failed to parse {}: {}", column, e)))
}
