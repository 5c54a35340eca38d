//! Field-level validators for source records.
//!
//! All functions are pure predicates or converters. Callers decide whether a
//! failed check drops the record or only produces a warning.

use crate::constants::{CATEGORY_LEVEL_WIDTH, MAX_CATEGORY_CODE_LEN, ZERO_DATE_SENTINEL};
use crate::error::{MigratorError, Result};
use regex::Regex;
use std::sync::LazyLock;

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("digit pattern is valid"));

/// True when the value has at least one non-whitespace character
pub fn is_non_empty(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Category codes are all digits, even length, between 2 and 8 characters
pub fn is_valid_category_code(code: &str) -> bool {
    if !is_non_empty(code) {
        return false;
    }
    DIGITS.is_match(code)
        && code.len() % CATEGORY_LEVEL_WIDTH == 0
        && code.len() >= CATEGORY_LEVEL_WIDTH
        && code.len() <= MAX_CATEGORY_CODE_LEN
}

/// Accepts "yes" / "no" in any case, surrounding whitespace ignored
pub fn is_valid_boolean_string(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    normalized == "yes" || normalized == "no"
}

/// "yes" maps to true, anything else to false
pub fn boolean_from_string(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("yes")
}

/// Checks `M/D/YYYY` and `YYYYMMDD` shapes with loose range checks.
///
/// Day is only checked against 1..=31, so `2/31/2020` passes here and is
/// left to the date parser to resolve.
pub fn is_valid_date_string(value: &str) -> bool {
    if value.contains('/') {
        let parts: Vec<&str> = value.split('/').collect();
        if parts.len() != 3 {
            return false;
        }
        let (Some(month), Some(day), Some(year)) = (
            leading_int(parts[0]),
            leading_int(parts[1]),
            leading_int(parts[2]),
        ) else {
            return false;
        };
        return in_ranges(year, month, day);
    }

    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        let year = value[0..4].parse::<i64>().ok();
        let month = value[4..6].parse::<i64>().ok();
        let day = value[6..8].parse::<i64>().ok();
        return match (year, month, day) {
            (Some(y), Some(m), Some(d)) => in_ranges(y, m, d),
            _ => false,
        };
    }

    false
}

/// Date column check. Empty values and the all-zero sentinel pass, since
/// both mean "no date"; anything else must have a recognised shape.
pub fn check_date(field: &str, value: &str) -> Result<()> {
    let value = value.trim();
    if value.is_empty() || value == ZERO_DATE_SENTINEL || is_valid_date_string(value) {
        return Ok(());
    }
    Err(MigratorError::validation(
        field,
        value,
        "expected M/D/YYYY or YYYYMMDD",
    ))
}

/// Every listed field is present and not the empty string
pub fn validate_required_fields<'a, F>(lookup: F, required: &[&str]) -> bool
where
    F: Fn(&str) -> Option<&'a str>,
{
    required
        .iter()
        .all(|field| matches!(lookup(field), Some(value) if !value.is_empty()))
}

fn in_ranges(year: i64, month: i64, day: i64) -> bool {
    (1..=12).contains(&month) && (1..=31).contains(&day) && (1900..=2100).contains(&year)
}

/// Integer prefix of a field, tolerating leading whitespace and trailing junk
/// ("12abc" reads as 12). Returns `None` when there are no leading digits.
pub(crate) fn leading_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok().map(|n| sign * n)
}
