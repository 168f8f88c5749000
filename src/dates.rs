//! Date normalization for spreadsheet date cells.
//!
//! Canonical form is `YYYY/M/D` without zero-padding. Cells that do not look
//! like dates are kept verbatim (trimmed); free text such as "光緒年間" is
//! valid data.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Fallback formats tried after `/` has been rewritten to `-`.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m-%d-%Y",
    "%B %d %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Minimum length a string must have before the general parse is trusted.
const MIN_GENERAL_PARSE_LEN: usize = 8;

/// Normalize a raw date cell.
///
/// Returns `None` for absent or blank input. Otherwise returns the canonical
/// `Y/M/D` form when the input is date-like, or the trimmed input unchanged.
pub fn normalize_date(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(canonical) = split_ymd(trimmed) {
        return Some(canonical);
    }

    if trimmed.chars().count() >= MIN_GENERAL_PARSE_LEN {
        if let Some(date) = parse_general(&trimmed.replace('/', "-")) {
            return Some(format_ymd(date));
        }
    }

    Some(trimmed.to_string())
}

fn split_ymd(s: &str) -> Option<String> {
    let parts: Vec<&str> = s.split(['-', '/', '.']).collect();
    if parts.len() != 3 {
        return None;
    }
    let y = leading_int(parts[0])?;
    let m = leading_int(parts[1])?;
    let d = leading_int(parts[2])?;
    if y > 1000 && y < 3000 && (1..=12).contains(&m) && (1..=31).contains(&d) {
        Some(format!("{}/{}/{}", y, m, d))
    } else {
        None
    }
}

fn parse_general(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        })
}

fn format_ymd(date: NaiveDate) -> String {
    use chrono::Datelike;
    format!("{}/{}/{}", date.year(), date.month(), date.day())
}

/// Parse the leading integer of a string, ignoring leading whitespace and
/// any trailing garbage (`"05abc"` → 5). Returns `None` when no digits lead.
pub(crate) fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> Option<String> {
        normalize_date(Some(s))
    }

    #[test]
    fn test_normalize_separators() {
        assert_eq!(norm("1990-05-03").as_deref(), Some("1990/5/3"));
        assert_eq!(norm("1990/05/03").as_deref(), Some("1990/5/3"));
        assert_eq!(norm("1990.5.3").as_deref(), Some("1990/5/3"));
        assert_eq!(norm("  2001-12-31 ").as_deref(), Some("2001/12/31"));
    }

    #[test]
    fn test_normalize_does_not_validate_calendar() {
        // Plausibility only: day 30 in February still passes the split check.
        assert_eq!(norm("2020/02/30").as_deref(), Some("2020/2/30"));
    }

    #[test]
    fn test_normalize_non_dates_unchanged() {
        assert_eq!(norm("abc").as_deref(), Some("abc"));
        assert_eq!(norm("光緒年間").as_deref(), Some("光緒年間"));
        assert_eq!(norm("1990-13-01").as_deref(), Some("1990-13-01"));
        assert_eq!(norm("90-5-3").as_deref(), Some("90-5-3"));
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_date(None), None);
        assert_eq!(norm(""), None);
        assert_eq!(norm("   "), None);
    }

    #[test]
    fn test_normalize_general_fallback() {
        assert_eq!(norm("1990-05-03T10:00:00").as_deref(), Some("1990/5/3"));
        assert_eq!(norm("May 3, 1990").as_deref(), Some("1990/5/3"));
        assert_eq!(norm("05/03/1990").as_deref(), Some("1990/5/3"));
    }

    #[test]
    fn test_general_fallback_requires_length() {
        // Short strings are never handed to the general parser.
        assert_eq!(norm("1-2-345").as_deref(), Some("1-2-345"));
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("05"), Some(5));
        assert_eq!(leading_int(" 12th"), Some(12));
        assert_eq!(leading_int("-3"), Some(-3));
        assert_eq!(leading_int("abc"), None);
        assert_eq!(leading_int(""), None);
    }
}
