use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use thiserror::Error;

/// Default operating timezone offset: UTC+05:30.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("utc offset of {0} minutes does not describe a valid timezone")]
    OffsetOutOfRange(i32),
}

/// The calendar the bot operates in. All "today" decisions (the same-day
/// undo restriction, schedule lookups, time labels) go through this type
/// so a single configured offset governs them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperatingTz(FixedOffset);

impl OperatingTz {
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, ClockError> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self)
            .ok_or(ClockError::OffsetOutOfRange(minutes))
    }

    /// The calendar date `instant` falls on in the operating timezone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.0).date_naive()
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_date(now)
    }

    pub fn tomorrow(&self, now: DateTime<Utc>) -> NaiveDate {
        // adding one day to a NaiveDate cannot fail this side of year 262143
        self.local_date(now).checked_add_days(Days::new(1)).unwrap_or_else(|| self.local_date(now))
    }

    /// `HH:MM` wall-clock label for keyboards and schedule listings.
    pub fn clock_label(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.0).format("%H:%M").to_string()
    }
}

impl Default for OperatingTz {
    fn default() -> Self {
        Self::from_offset_minutes(DEFAULT_UTC_OFFSET_MINUTES).expect("default offset is valid")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};

    use super::{ClockError, OperatingTz};

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }

    #[test]
    fn local_date_crosses_midnight_ahead_of_utc() {
        let tz = OperatingTz::default();
        // 19:00 UTC is 00:30 the next day at +05:30
        let date = tz.local_date(ts("2026-08-06T19:00:00Z"));
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 8, 7).expect("valid date"));
    }

    #[test]
    fn today_and_tomorrow_are_consecutive() {
        let tz = OperatingTz::default();
        let now = ts("2026-08-07T06:00:00Z");
        assert_eq!(tz.today(now), NaiveDate::from_ymd_opt(2026, 8, 7).expect("valid date"));
        assert_eq!(tz.tomorrow(now), NaiveDate::from_ymd_opt(2026, 8, 8).expect("valid date"));
    }

    #[test]
    fn clock_label_renders_operating_wall_time() {
        let tz = OperatingTz::default();
        assert_eq!(tz.clock_label(ts("2026-08-07T03:30:00Z")), "09:00");
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        assert_eq!(
            OperatingTz::from_offset_minutes(5000).expect_err("must reject"),
            ClockError::OffsetOutOfRange(5000),
        );
        assert!(OperatingTz::from_offset_minutes(-300).is_ok());
    }
}
