use crate::error::{google_calendar_error, GcalResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Parse a calendar date. Accepts `YYYY-MM-DD` or an ISO date-time, in which
/// case only the date part is kept.
pub fn parse_day(date: &str) -> GcalResult<NaiveDate> {
    let trimmed = date.trim();
    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(day);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt.date());
        }
    }
    Err(google_calendar_error(&format!(
        "Invalid date '{}', expected YYYY-MM-DD",
        date
    )))
}

/// UTC bounds of a calendar day: `[00:00:00Z, next day 00:00:00Z)`
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// RFC 3339 with a `Z` suffix, the form the Calendar API expects. Fractional
/// seconds are kept when present.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
