use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serializer;

use crate::BrevetError;

const MICROS_PER_MINUTE: f64 = 60_000_000.0;

// Offset given but seconds left out.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M%:z"];

// Zone-less start times are read as UTC.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// The time `hours` after `start`, in `start`'s zone.
///
/// Whole hours are added first, then the fractional part as minutes at
/// microsecond resolution.
pub fn add_hours(hours: f64, start: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let whole_hours = hours.floor();
    let minutes = (hours - whole_hours) * 60.0;
    start
        + Duration::hours(whole_hours as i64)
        + Duration::microseconds((minutes * MICROS_PER_MINUTE).round() as i64)
}

pub fn parse_start_time(input: &str) -> Result<DateTime<FixedOffset>, BrevetError> {
    let trimmed = input.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed);
    }
    if let Some(parsed) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(trimmed, format).ok())
    {
        return Ok(parsed);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
        .ok_or_else(|| BrevetError::InvalidStartTime(input.to_string()))
}

/// ISO-8601 text with a `+HH:MM` offset and only the fractional digits needed.
pub fn to_iso(time: &DateTime<FixedOffset>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

pub fn to_utc(time: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    time.with_timezone(&Utc).fixed_offset()
}

pub(crate) fn serialize_iso<S: Serializer>(
    time: &DateTime<FixedOffset>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_iso(time))
}
