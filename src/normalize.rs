//! Canonicalization of CSV headers and heterogeneous date inputs.
//!
//! Uploaded files arrive with accented, mixed-case headers and dates in
//! half a dozen regional formats. Both normalizers are total: any input
//! string is accepted, and a date that matches no known format passes
//! through unchanged rather than failing the row.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Canonicalizes a raw CSV header: diacritics stripped via NFD
/// decomposition, lower-cased, trimmed, internal spaces to underscores.
/// Idempotent, so already-canonical keys survive a second pass.
pub fn normalize_header(header: &str) -> String {
    header
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

/// Explicit fallback patterns, tried in order after the ISO pass.
/// Day-first forms precede month-first forms on purpose: ambiguous
/// two-digit values like `03/04/2025` resolve as day 3, month 4.
/// Historical data was loaded under this precedence, so it stays.
const DATE_PATTERNS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%d/%m/%Y", "%d-%m-%Y", "%m/%d/%Y", "%m-%d-%Y",
];

/// Normalizes a date-ish string to `YYYY-MM-DD`.
///
/// Returns the empty string for blank input, and the trimmed original
/// when no supported format matches.
pub fn normalize_date(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let candidates = date_candidates(trimmed);
    for candidate in &candidates {
        if let Some(date) = parse_iso_datetime(candidate) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    for candidate in &candidates {
        for pattern in DATE_PATTERNS {
            if let Ok(parsed) = NaiveDate::parse_from_str(candidate, pattern) {
                return parsed.format("%Y-%m-%d").to_string();
            }
        }
    }

    trimmed.to_string()
}

/// Builds the ordered, de-duplicated candidate list for one raw value:
/// the value itself, the prefix before a time separator (space or `T`),
/// and the first ten characters when they look like a date with trailing
/// junk (5th character one of `-`, `/`, `.`).
fn date_candidates(value: &str) -> Vec<String> {
    let mut candidates = vec![value.to_string()];
    for separator in [' ', 'T'] {
        if let Some((head, _)) = value.split_once(separator) {
            let head = head.trim();
            if !head.is_empty() {
                candidates.push(head.to_string());
            }
        }
    }

    for candidate in candidates.clone() {
        if candidate.chars().count() >= 10 {
            let slice: String = candidate.chars().take(10).collect();
            let fifth = slice.chars().nth(4);
            if matches!(fifth, Some('-' | '/' | '.')) && !candidates.contains(&slice) {
                candidates.push(slice);
            }
        }
    }

    let mut unique: Vec<String> = Vec::new();
    for candidate in candidates {
        let candidate = candidate.trim().to_string();
        if !candidate.is_empty() && !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

/// ISO-8601 date or date-time, with or without timezone offset.
fn parse_iso_datetime(value: &str) -> Option<NaiveDate> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.date_naive());
    }
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(parsed.date());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn iso_date_pattern() -> &'static Regex {
    static ISO_DATE: OnceLock<Regex> = OnceLock::new();
    ISO_DATE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static ISO date pattern"))
}

/// Strict variant for filter-range bounds: normalizes, then keeps the
/// result only when it matches `YYYY-MM-DD` exactly. A pass-through
/// non-date must not leak into a range comparison, so it becomes `""`.
pub fn coerce_iso_date(value: &str) -> String {
    if value.trim().is_empty() {
        return String::new();
    }
    let normalized = normalize_date(value);
    if iso_date_pattern().is_match(&normalized) {
        normalized
    } else {
        String::new()
    }
}
