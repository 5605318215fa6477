//! Datetime parsing, validation and normalization.
//!
//! Simulated services accept timestamps in many shapes; everything is
//! normalized to UTC before being stored.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Output formats understood by [`normalize`] and [`matches_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateTimeFormat {
    #[default]
    #[serde(rename = "ISO_8601_UTC_Z")]
    Iso8601UtcZ,
    #[serde(rename = "ISO_8601_UTC_OFFSET")]
    Iso8601UtcOffset,
    #[serde(rename = "ISO_8601_WITH_TIMEZONE")]
    Iso8601WithTimezone,
    #[serde(rename = "ISO_8601_NAIVE_UTC")]
    Iso8601NaiveUtc,
    #[serde(rename = "ISO_8601_MILLISECONDS_Z")]
    Iso8601MillisecondsZ,
    #[serde(rename = "DATE_ISO")]
    DateIso,
    #[serde(rename = "DATE_US")]
    DateUs,
    #[serde(rename = "DATE_EU")]
    DateEu,
    #[serde(rename = "DATE_COMPACT")]
    DateCompact,
    #[serde(rename = "TIME_24H")]
    Time24h,
    #[serde(rename = "TIME_24H_NO_SECONDS")]
    Time24hNoSeconds,
    #[serde(rename = "TIME_12H_AMPM")]
    Time12hAmPm,
}

impl DateTimeFormat {
    pub const ALL: [DateTimeFormat; 12] = [
        DateTimeFormat::Iso8601UtcZ,
        DateTimeFormat::Iso8601UtcOffset,
        DateTimeFormat::Iso8601WithTimezone,
        DateTimeFormat::Iso8601NaiveUtc,
        DateTimeFormat::Iso8601MillisecondsZ,
        DateTimeFormat::DateIso,
        DateTimeFormat::DateUs,
        DateTimeFormat::DateEu,
        DateTimeFormat::DateCompact,
        DateTimeFormat::Time24h,
        DateTimeFormat::Time24hNoSeconds,
        DateTimeFormat::Time12hAmPm,
    ];

    fn strftime(self) -> &'static str {
        match self {
            DateTimeFormat::Iso8601UtcZ => "%Y-%m-%dT%H:%M:%SZ",
            DateTimeFormat::Iso8601UtcOffset | DateTimeFormat::Iso8601WithTimezone => {
                "%Y-%m-%dT%H:%M:%S+00:00"
            }
            DateTimeFormat::Iso8601NaiveUtc => "%Y-%m-%dT%H:%M:%S",
            DateTimeFormat::Iso8601MillisecondsZ => "%Y-%m-%dT%H:%M:%S%.3fZ",
            DateTimeFormat::DateIso => "%Y-%m-%d",
            DateTimeFormat::DateUs => "%m/%d/%Y",
            DateTimeFormat::DateEu => "%d/%m/%Y",
            DateTimeFormat::DateCompact => "%Y%m%d",
            DateTimeFormat::Time24h => "%H:%M:%S",
            DateTimeFormat::Time24hNoSeconds => "%H:%M",
            DateTimeFormat::Time12hAmPm => "%I:%M:%S %p",
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            DateTimeFormat::Iso8601UtcZ => r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$",
            DateTimeFormat::Iso8601UtcOffset => r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\+00:00$",
            DateTimeFormat::Iso8601WithTimezone => {
                r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[+-]\d{2}:\d{2}$"
            }
            DateTimeFormat::Iso8601NaiveUtc => r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}$",
            DateTimeFormat::Iso8601MillisecondsZ => {
                r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$"
            }
            DateTimeFormat::DateIso => r"^\d{4}-\d{2}-\d{2}$",
            DateTimeFormat::DateUs | DateTimeFormat::DateEu => r"^\d{2}/\d{2}/\d{4}$",
            DateTimeFormat::DateCompact => r"^\d{8}$",
            DateTimeFormat::Time24h => r"^([01]?\d|2[0-3]):[0-5]\d:[0-5]\d$",
            DateTimeFormat::Time24hNoSeconds => r"^([01]?\d|2[0-3]):[0-5]\d$",
            DateTimeFormat::Time12hAmPm => r"^(0?[1-9]|1[0-2]):[0-5]\d:[0-5]\d\s?(AM|PM)$",
        }
    }

    fn regex(self) -> &'static Regex {
        static PATTERNS: OnceLock<Vec<(DateTimeFormat, Regex)>> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            DateTimeFormat::ALL
                .iter()
                .map(|f| {
                    let re = Regex::new(f.pattern()).expect("static datetime pattern");
                    (*f, re)
                })
                .collect()
        });
        patterns
            .iter()
            .find(|(f, _)| *f == self)
            .map(|(_, re)| re)
            .expect("every format has a pattern")
    }
}

impl fmt::Display for DateTimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DateTimeFormat::Iso8601UtcZ => "ISO_8601_UTC_Z",
            DateTimeFormat::Iso8601UtcOffset => "ISO_8601_UTC_OFFSET",
            DateTimeFormat::Iso8601WithTimezone => "ISO_8601_WITH_TIMEZONE",
            DateTimeFormat::Iso8601NaiveUtc => "ISO_8601_NAIVE_UTC",
            DateTimeFormat::Iso8601MillisecondsZ => "ISO_8601_MILLISECONDS_Z",
            DateTimeFormat::DateIso => "DATE_ISO",
            DateTimeFormat::DateUs => "DATE_US",
            DateTimeFormat::DateEu => "DATE_EU",
            DateTimeFormat::DateCompact => "DATE_COMPACT",
            DateTimeFormat::Time24h => "TIME_24H",
            DateTimeFormat::Time24hNoSeconds => "TIME_24H_NO_SECONDS",
            DateTimeFormat::Time12hAmPm => "TIME_12H_AMPM",
        };
        f.write_str(name)
    }
}

const DATETIME_FALLBACKS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%d/%m/%Y %I:%M:%S %p",
];

const DATE_FALLBACKS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y%m%d"];

const TIME_FALLBACKS: [&str; 4] = ["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// Parses a timestamp in any commonly used shape into UTC.
///
/// ISO 8601 / RFC 3339 is tried first (naive values are taken as UTC), then
/// a fixed list of date-time, date-only and time-only patterns. Time-only
/// values land on 1900-01-01.
pub fn parse_flexible(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    let tail = s.char_indices().rev().nth(5).map_or(s, |(i, _)| &s[i..]);
    if s.contains('T') || s.contains('Z') || tail.contains('+') || tail.contains('-') {
        if let Some(dt) = parse_iso(s) {
            return Some(dt);
        }
    }

    for fmt in DATETIME_FALLBACKS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in DATE_FALLBACKS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)?;
    for fmt in TIME_FALLBACKS {
        if let Ok(time) = NaiveTime::parse_from_str(s, fmt) {
            return Some(epoch.and_time(time).and_utc());
        }
    }
    None
}

fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Formats a UTC timestamp in the given format.
pub fn format(dt: &DateTime<Utc>, format: DateTimeFormat) -> String {
    dt.format(format.strftime()).to_string()
}

/// Parses `input` flexibly and renders it in `format`; `None` when unparseable.
pub fn normalize(input: &str, format: DateTimeFormat) -> Option<String> {
    parse_flexible(input).map(|dt| self::format(&dt, format))
}

/// True when `input` can be parsed at all.
pub fn is_valid(input: &str) -> bool {
    parse_flexible(input).is_some()
}

/// Pattern check only: does `input` already look like `format`?
pub fn matches_format(input: &str, format: DateTimeFormat) -> bool {
    format.regex().is_match(input)
}

/// Does a parseable `input` belong to the family of `format`?
///
/// ISO 8601 formats accept any ISO date-time (offsets and fractions
/// included); date and time formats must match their pattern exactly.
pub fn conforms_to(input: &str, format: DateTimeFormat) -> bool {
    let s = input.trim();
    match format {
        DateTimeFormat::Iso8601UtcZ
        | DateTimeFormat::Iso8601UtcOffset
        | DateTimeFormat::Iso8601WithTimezone
        | DateTimeFormat::Iso8601NaiveUtc
        | DateTimeFormat::Iso8601MillisecondsZ => s.contains('T') && parse_iso(s).is_some(),
        _ => matches_format(s, format) && is_valid(s),
    }
}

/// Normalizes a field value or fails with [`SimError::InvalidFormat`].
pub fn validate_datetime_field(
    value: &str,
    field_name: &str,
    format: DateTimeFormat,
) -> Result<String, SimError> {
    normalize(value, format).ok_or_else(|| {
        SimError::invalid_format(
            field_name,
            format!("'{}' is not a valid datetime (expected {})", value, format),
        )
    })
}

/// Checks a UTC offset such as `+03:00` or `-11:30`.
pub fn is_offset_valid(offset: &str) -> bool {
    static OFFSET: OnceLock<Regex> = OnceLock::new();
    OFFSET
        .get_or_init(|| Regex::new(r"^[+-](?:[01]\d|2[0-3]):[0-5]\d$").expect("static pattern"))
        .is_match(offset)
}

/// Field names that conventionally hold timestamps.
pub fn is_datetime_field_name(field_name: &str) -> bool {
    const INDICATORS: [&str; 16] = [
        "date",
        "time",
        "datetime",
        "timestamp",
        "created",
        "updated",
        "modified",
        "start",
        "end",
        "expires",
        "scheduled",
        "due",
        "last_seen",
        "last_active",
        "published",
        "posted",
    ];
    let lower = field_name.to_lowercase();
    INDICATORS.iter().any(|i| lower.contains(i))
}
