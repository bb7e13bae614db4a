//! Tolerant date parsing.
//!
//! Observation dates arrive in several encodings. Parsing order matters for
//! ambiguous inputs and must stay fixed:
//!
//! 1. ISO-like `YYYY-MM-DD` prefix (any time part is ignored)
//! 2. `DD/MM/YYYY` prefix (day first)
//! 3. generic timestamps (RFC 3339, RFC 2822, a few compact forms)
//! 4. the epoch-zero sentinel, so unparseable dates sort as the earliest

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// ISO calendar date format, also used for display.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y%m%d %H%M",
    "%d-%m-%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y/%m/%d", "%Y%m%d", "%d-%m-%Y"];

/// Outcome of [`parse_lenient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParsedDate {
    Parsed(NaiveDateTime),
    /// Nothing matched; orders as 1970-01-01T00:00:00.
    Sentinel,
}

impl ParsedDate {
    pub fn value(&self) -> NaiveDateTime {
        match self {
            ParsedDate::Parsed(value) => *value,
            ParsedDate::Sentinel => epoch_sentinel(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, ParsedDate::Sentinel)
    }
}

/// 1970-01-01T00:00:00, the value unparseable dates sort as.
pub fn epoch_sentinel() -> NaiveDateTime {
    NaiveDateTime::default()
}

/// Parse a date in any of the supported encodings, never failing.
pub fn parse_lenient(text: &str) -> ParsedDate {
    let text = text.trim();
    parse_iso_prefix(text)
        .or_else(|| parse_day_month_year(text))
        .or_else(|| parse_timestamp(text))
        .map(ParsedDate::Parsed)
        .unwrap_or(ParsedDate::Sentinel)
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `YYYY-MM-DD` followed by anything.
fn parse_iso_prefix(text: &str) -> Option<NaiveDateTime> {
    let prefix = text.get(..10)?;
    let bytes = prefix.as_bytes();
    if bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    if !all_digits(&prefix[..4]) || !all_digits(&prefix[5..7]) || !all_digits(&prefix[8..]) {
        return None;
    }
    NaiveDate::parse_from_str(prefix, ISO_DATE_FORMAT)
        .ok()
        .map(midnight)
}

/// `D/M/YYYY` or `DD/MM/YYYY` followed by anything.
fn parse_day_month_year(text: &str) -> Option<NaiveDateTime> {
    let mut parts = text.splitn(3, '/');
    let day = parts.next()?;
    let month = parts.next()?;
    let rest = parts.next()?;
    if day.len() > 2 || month.len() > 2 || !all_digits(day) || !all_digits(month) {
        return None;
    }
    let year = rest.get(..4)?;
    if !all_digits(year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
        .map(midnight)
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(midnight)
        })
}
