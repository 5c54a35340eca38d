//! Date parsing for the export formats.
//!
//! Exports use `M/D/YYYY`, `YYYYMMDD`, occasionally ISO dates, and the
//! `00000000` sentinel for "no date". Timestamps are normalised to midnight
//! UTC. Anything unusable falls back to the current time.

use crate::constants::ZERO_DATE_SENTINEL;
use crate::validation::leading_int;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse an export date, falling back to now
pub fn parse_date(value: &str) -> DateTime<Utc> {
    parse_date_opt(value).unwrap_or_else(Utc::now)
}

/// Parse an export date; `None` for empty, sentinel or unparseable input
pub fn parse_date_opt(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() || value == ZERO_DATE_SENTINEL {
        return None;
    }

    if value.contains('/') {
        return parse_slash_date(value);
    }

    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        return parse_yyyymmdd(value);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(midnight_utc)
}

/// `M/D/YYYY`
pub fn parse_slash_date(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() || value == ZERO_DATE_SENTINEL {
        return None;
    }
    let parts: Vec<&str> = value.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let month = leading_int(parts[0])?;
    let day = leading_int(parts[1])?;
    let year = leading_int(parts[2])?;
    ymd(year, month, day)
}

/// `YYYYMMDD`
pub fn parse_yyyymmdd(value: &str) -> Option<DateTime<Utc>> {
    if value == ZERO_DATE_SENTINEL || value.len() != 8 {
        return None;
    }
    let year = value.get(0..4)?.parse::<i64>().ok()?;
    let month = value.get(4..6)?.parse::<i64>().ok()?;
    let day = value.get(6..8)?.parse::<i64>().ok()?;
    ymd(year, month, day)
}

/// `YYYY-MM-DD`
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `YYYY-MM-DD HH:MM:SS`
pub fn format_date_time(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn ymd(year: i64, month: i64, day: i64) -> Option<DateTime<Utc>> {
    let year = i32::try_from(year).ok()?;
    let month = u32::try_from(month).ok()?;
    let day = u32::try_from(day).ok()?;
    NaiveDate::from_ymd_opt(year, month, day).map(midnight_utc)
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}
