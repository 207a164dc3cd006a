//! SQLite type conversions
//!
//! SQLite has no native datetime or boolean type: timestamps are stored as
//! RFC 3339 text and flags as 0/1 integers.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};

#[inline]
pub fn datetime_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Parse RFC 3339, falling back to SQLite's `datetime()` format
pub fn str_to_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
                .map_err(|e| anyhow!("Invalid datetime '{}': {}", s, e))
        })
}

#[inline]
pub fn str_to_datetime_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match s {
        Some(s) if !s.is_empty() => Ok(Some(str_to_datetime(s)?)),
        _ => Ok(None),
    }
}

#[inline]
pub fn int_to_bool(i: i64) -> bool {
    i != 0
}

/// Map a conversion failure into a row decode error
pub fn decode_err(e: anyhow::Error) -> sqlx::Error {
    sqlx::Error::Decode(e.into())
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;

    use super::*;

    #[test]
    fn test_datetime_roundtrip() {
        let dt = Utc::now();
        let parsed = str_to_datetime(&datetime_to_str(dt)).unwrap();
        assert_eq!(dt.timestamp(), parsed.timestamp());
    }

    #[test]
    fn test_sqlite_datetime_format() {
        let parsed = str_to_datetime("2024-01-15 10:30:45").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 1, 15));
    }

    #[test]
    fn test_empty_optional_datetime() {
        assert_eq!(str_to_datetime_opt(Some("")).unwrap(), None);
        assert_eq!(str_to_datetime_opt(None).unwrap(), None);
        assert!(str_to_datetime_opt(Some("yesterday")).is_err());
    }
}
