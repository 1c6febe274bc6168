//! Scalar coercion for loosely formatted export cells.
//!
//! None of these functions fail: numeric coercion returns a caller-supplied
//! fallback, timestamp coercion returns `None`.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::models::RawValue;
use crate::time_utils::TimezoneHandler;

/// Epoch values above this are milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;
/// Epoch values above this (and below the millis threshold) are seconds.
const EPOCH_SECONDS_THRESHOLD: f64 = 1e9;

// ── Numbers ───────────────────────────────────────────────────────────────────

/// Parse locale-tolerant numeric text.
///
/// Every character other than digits, `.`, `-` and `,` is dropped, commas
/// become dots, and only the first dot survives.
///
/// ```
/// use charge_core::coercion::parse_number;
///
/// assert_eq!(parse_number("12,5 kWh"), Some(12.5));
/// assert_eq!(parse_number("1.234.56"), Some(1.23456));
/// assert_eq!(parse_number("n/a"), None);
/// ```
pub fn parse_number(text: &str) -> Option<f64> {
    let mut cleaned = String::with_capacity(text.len());
    let mut seen_dot = false;
    for c in text.chars() {
        match c {
            '0'..='9' | '-' => cleaned.push(c),
            '.' | ',' => {
                if !seen_dot {
                    cleaned.push('.');
                    seen_dot = true;
                }
            }
            _ => {}
        }
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Coerce a cell to a finite number, returning `fallback` on failure.
pub fn coerce_number(value: Option<&RawValue>, fallback: f64) -> f64 {
    match value {
        Some(RawValue::Number(n)) if n.is_finite() => *n,
        Some(RawValue::Text(s)) => parse_number(s).unwrap_or(fallback),
        _ => fallback,
    }
}

// ── Durations ─────────────────────────────────────────────────────────────────

fn clock_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+):(\d{1,2})(?::(\d{1,2}(?:\.\d+)?))?$").expect("regex is valid"))
}

fn unit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:(\d+(?:[.,]\d+)?)\s*h(?:ours?|rs?)?)?\s*(?:(\d+(?:[.,]\d+)?)\s*m(?:in(?:ute)?s?)?)?\s*(?:(\d+(?:[.,]\d+)?)\s*s(?:ec(?:ond)?s?)?)?$",
        )
        .expect("regex is valid")
    })
}

fn capture_f64(caps: &regex::Captures<'_>, idx: usize) -> f64 {
    caps.get(idx)
        .and_then(|m| parse_number(m.as_str()))
        .unwrap_or(0.0)
}

/// Parse textual durations into minutes.
///
/// Recognises clock notation (`1:30` → 90, `01:30:00` → 90) and unit
/// notation (`1h 30m`, `2h`, `90 min`, `45s`). Returns `None` for anything
/// else so callers can fall back to plain numeric coercion.
pub fn parse_duration_minutes(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = clock_pattern().captures(text) {
        let first = capture_f64(&caps, 1);
        let second = capture_f64(&caps, 2);
        return Some(match caps.get(3) {
            Some(_) => first * 60.0 + second + capture_f64(&caps, 3) / 60.0,
            None => first * 60.0 + second,
        });
    }

    let caps = unit_pattern().captures(text)?;
    if caps.get(1).is_none() && caps.get(2).is_none() && caps.get(3).is_none() {
        return None;
    }
    Some(capture_f64(&caps, 1) * 60.0 + capture_f64(&caps, 2) + capture_f64(&caps, 3) / 60.0)
}

/// Coerce a duration cell to minutes.
///
/// Text is tried as a duration string first, then as a plain number.
pub fn coerce_duration(value: Option<&RawValue>, fallback: f64) -> f64 {
    match value {
        Some(RawValue::Text(s)) => {
            parse_duration_minutes(s).unwrap_or_else(|| coerce_number(value, fallback))
        }
        other => coerce_number(other, fallback),
    }
}

// ── Timestamps ────────────────────────────────────────────────────────────────

/// Naive date-time layouts, tried in order after the offset-aware ones.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%Y%m%d"];

/// Offset-aware layouts beyond RFC 3339 / RFC 2822.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
];

fn from_epoch(n: f64) -> Option<DateTime<Utc>> {
    if n > EPOCH_MILLIS_THRESHOLD {
        DateTime::<Utc>::from_timestamp_millis(n as i64)
    } else if n > EPOCH_SECONDS_THRESHOLD {
        DateTime::<Utc>::from_timestamp(n.trunc() as i64, 0)
    } else {
        None
    }
}

fn is_plain_number(text: &str) -> bool {
    !text.is_empty()
        && text.chars().all(|c| c.is_ascii_digit() || c == '.')
        && text.chars().any(|c| c.is_ascii_digit())
}

/// Parse calendar text. Naive values are read as wall-clock time in `tz`.
pub fn parse_calendar(text: &str, tz: &TimezoneHandler) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let rfc3339 = match text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
        Some(stripped) => format!("{}+00:00", stripped),
        None => text.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&rfc3339) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return tz.localize(&naive);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return tz.localize(&date.and_hms_opt(0, 0, 0)?);
        }
    }
    None
}

/// Coerce a cell to an instant.
///
/// Purely numeric values are read as Unix epochs (milliseconds above 1e12,
/// seconds above 1e9). Numeric text too small to be an epoch, and all other
/// text, goes through calendar parsing.
pub fn coerce_timestamp(value: Option<&RawValue>, tz: &TimezoneHandler) -> Option<DateTime<Utc>> {
    match value? {
        RawValue::Number(n) if n.is_finite() => from_epoch(*n),
        RawValue::Number(_) | RawValue::Empty => None,
        RawValue::Text(s) => {
            let text = s.trim();
            let epoch = if is_plain_number(text) {
                parse_number(text).and_then(from_epoch)
            } else {
                None
            };
            epoch.or_else(|| parse_calendar(text, tz))
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
