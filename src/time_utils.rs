// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and calendar arithmetic.

use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Midnight UTC at the start of the given date.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// First day of the month following (year, month).
pub fn next_month(year: i32, month: u32) -> Option<NaiveDate> {
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
}

/// Monday of the ISO week containing `date`.
pub fn iso_week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Parse a "YYYY-MM" month key.
pub fn parse_month_key(key: &str) -> Option<(i32, u32)> {
    let (year, month) = key.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    if year.to_string().len() != 4 || month.to_string().len() > 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, 1).map(|_| (year, month))
}

/// Format a (year, month) pair as "YYYY-MM".
pub fn month_key(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_month_wraps_year() {
        assert_eq!(next_month(2024, 12), NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(next_month(2024, 2), NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_iso_week_start() {
        // 2024-01-17 is a Wednesday
        let wed = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
        assert_eq!(iso_week_start(wed), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());

        let mon = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(iso_week_start(mon), mon);
    }

    #[test]
    fn test_parse_month_key() {
        assert_eq!(parse_month_key("2024-03"), Some((2024, 3)));
        assert_eq!(parse_month_key("2024-13"), None);
        assert_eq!(parse_month_key("24-03"), None);
        assert_eq!(parse_month_key("garbage"), None);
    }

    #[test]
    fn test_format_utc_rfc3339() {
        let date = DateTime::from_timestamp(1_704_103_200, 0).unwrap();
        assert_eq!(format_utc_rfc3339(date), "2024-01-01T10:00:00Z");
    }
}
