//! Fixed-offset time normalization
//!
//! Chat exports carry local wall-clock times in Korea Standard Time, which is
//! a fixed UTC+9 with no daylight saving. Everything here works from that
//! constant offset and never consults the host timezone, so bucketing is the
//! same on every machine.
//!
//! Instants are stored as `DateTime<Utc>`; the accessors below re-derive the
//! local calendar day, hour and weekday on demand.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};

use crate::error::{Error, Result};

/// Offset of local time from UTC, in hours.
pub const LOCAL_OFFSET_HOURS: i64 = 9;

fn local_naive(ts: &DateTime<Utc>) -> NaiveDateTime {
    ts.naive_utc() + Duration::hours(LOCAL_OFFSET_HOURS)
}

/// Convert a local (UTC+9) wall-clock point into an absolute instant.
///
/// Fails with [`Error::InvalidDate`] when the point does not exist, e.g.
/// February 30th or hour 24.
pub fn to_instant(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Result<DateTime<Utc>> {
    let local = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| {
            Error::InvalidDate(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}",
                year, month, day, hour, minute
            ))
        })?;

    Ok((local - Duration::hours(LOCAL_OFFSET_HOURS)).and_utc())
}

/// Local calendar day as `YYYY-MM-DD`.
pub fn date_key(ts: &DateTime<Utc>) -> String {
    local_naive(ts).format("%Y-%m-%d").to_string()
}

/// Local hour of day (0-23).
pub fn hour_of_day(ts: &DateTime<Utc>) -> u8 {
    local_naive(ts).hour() as u8
}

/// Local weekday index, 0 = Sunday .. 6 = Saturday.
pub fn weekday_index(ts: &DateTime<Utc>) -> u8 {
    local_naive(ts).weekday().num_days_from_sunday() as u8
}

/// Parse an ISO-8601 / RFC 3339 timestamp. Returns `None` when malformed.
pub fn parse_iso(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// [`date_key`] for a serialized timestamp; `None` if it does not parse.
pub fn date_key_str(ts: &str) -> Option<String> {
    parse_iso(ts).map(|dt| date_key(&dt))
}

/// [`hour_of_day`] for a serialized timestamp; `None` if it does not parse.
pub fn hour_of_day_str(ts: &str) -> Option<u8> {
    parse_iso(ts).map(|dt| hour_of_day(&dt))
}

/// [`weekday_index`] for a serialized timestamp; `None` if it does not parse.
pub fn weekday_index_str(ts: &str) -> Option<u8> {
    parse_iso(ts).map(|dt| weekday_index(&dt))
}

/// Boundary form of an instant: `2024-03-15T06:45:00.000Z`.
pub fn to_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde adapter writing instants in [`to_iso`] form.
pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_iso(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_iso(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

/// Same as [`iso_millis`] for optional instants (`null` when unknown).
pub mod iso_millis_opt {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&super::to_iso(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_iso(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_instant_subtracts_offset() {
        let ts = to_instant(2024, 3, 15, 15, 45).unwrap();
        assert_eq!(to_iso(&ts), "2024-03-15T06:45:00.000Z");
    }

    #[test]
    fn test_to_instant_crosses_utc_midnight() {
        // 08:30 local is still the previous day in UTC
        let ts = to_instant(2024, 1, 1, 8, 30).unwrap();
        assert_eq!(to_iso(&ts), "2023-12-31T23:30:00.000Z");
        assert_eq!(date_key(&ts), "2024-01-01");
        assert_eq!(hour_of_day(&ts), 8);
    }

    #[test]
    fn test_to_instant_rejects_nonexistent_dates() {
        assert!(matches!(to_instant(2023, 2, 29, 0, 0), Err(Error::InvalidDate(_))));
        assert!(to_instant(2024, 2, 29, 0, 0).is_ok());
        assert!(to_instant(2024, 13, 1, 0, 0).is_err());
        assert!(to_instant(2024, 4, 31, 0, 0).is_err());
        assert!(to_instant(2024, 4, 1, 24, 0).is_err());
        assert!(to_instant(2024, 4, 1, 0, 60).is_err());
    }

    #[test]
    fn test_weekday_index_sunday_is_zero() {
        // 2024-03-17 is a Sunday
        let sunday = to_instant(2024, 3, 17, 0, 30).unwrap();
        assert_eq!(weekday_index(&sunday), 0);
        let saturday = to_instant(2024, 3, 16, 23, 59).unwrap();
        assert_eq!(weekday_index(&saturday), 6);
    }

    #[test]
    fn test_string_accessors() {
        assert_eq!(hour_of_day_str("2024-03-15T06:45:00.000Z"), Some(15));
        assert_eq!(weekday_index_str("2024-03-15T06:45:00Z"), Some(5));
        assert_eq!(
            date_key_str("2024-03-15T20:00:00+00:00").as_deref(),
            Some("2024-03-16")
        );
    }

    #[test]
    fn test_string_accessors_absent_on_garbage() {
        assert_eq!(hour_of_day_str("not a timestamp"), None);
        assert_eq!(weekday_index_str(""), None);
        assert_eq!(date_key_str("2024-13-45T99:00:00Z"), None);
    }
}
