use chrono::{DateTime, NaiveDate, Utc};

use rollcall_core::store::StoreError;

pub mod action_log;
pub mod attendance;
pub mod chat;
pub mod schedule;

pub use action_log::SqlActionLog;
pub use attendance::SqlAttendanceStore;
pub use chat::SqlChatDirectory;
pub use schedule::SqlScheduleStore;

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            StoreError::decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_date(column: &str, value: String) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|error| {
        StoreError::decode(format!("invalid date in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_count(column: &str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| {
        StoreError::decode(format!("invalid value for `{column}` (expected non-negative): {value}"))
    })
}

/// Builds `?, ?, …` for a dynamic `IN (…)` clause.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
