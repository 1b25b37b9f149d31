//! Publish-date normalization for feed items.
//!
//! Feeds in the wild disagree about timestamp formats. Each layout in
//! [`LAYOUTS`] is tried in order and the first that parses wins; when nothing
//! matches the caller's "now" is used so the item is still stored.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

#[derive(Debug, Clone, Copy)]
enum Layout {
    /// `Mon, 02 Jan 2006 15:04:05 -0700`, also `GMT`, `EST`, `MST` ...
    Rfc2822,
    /// `2006-01-02T15:04:05Z` and `2006-01-02T15:04:05-07:00`
    Rfc3339,
    /// A chrono format carrying a numeric offset; a trailing zone name is ignored.
    WithOffset(&'static str),
    /// A chrono format followed by a zone abbreviation. Unknown names are UTC.
    NamedZone(&'static str),
    /// A chrono format without any offset, read as UTC.
    Naive(&'static str),
}

const LAYOUTS: &[Layout] = &[
    Layout::Rfc2822,
    Layout::NamedZone("%a, %d %b %Y %H:%M:%S"),
    Layout::NamedZone("%d %b %Y %H:%M:%S"),
    Layout::Rfc3339,
    Layout::WithOffset("%Y-%m-%d %H:%M:%S%z"),
    Layout::WithOffset("%d %b %Y %H:%M:%S %z"),
    Layout::Naive("%Y-%m-%dT%H:%M:%S"),
    Layout::Naive("%Y-%m-%d %H:%M:%S"),
];

impl Layout {
    fn parse(self, value: &str) -> Option<DateTime<Utc>> {
        match self {
            Layout::Rfc2822 => DateTime::parse_from_rfc2822(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::WithOffset(fmt) => DateTime::parse_from_str(value, fmt)
                .or_else(|_| DateTime::parse_from_str(strip_zone_name(value), fmt))
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::NamedZone(fmt) => {
                let (head, zone) = split_zone_name(value)?;
                let naive = NaiveDateTime::parse_from_str(head, fmt).ok()?;
                FixedOffset::east_opt(zone_offset_secs(zone))?
                    .from_local_datetime(&naive)
                    .single()
                    .map(|dt| dt.with_timezone(&Utc))
            }
            Layout::Naive(fmt) => NaiveDateTime::parse_from_str(value, fmt)
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive)),
        }
    }
}

/// Splits a trailing alphabetic zone abbreviation such as ` MST` off `value`.
fn split_zone_name(value: &str) -> Option<(&str, &str)> {
    match value.rsplit_once(' ') {
        Some((head, tail))
            if (1..=5).contains(&tail.len()) && tail.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            Some((head.trim_end(), tail))
        }
        _ => None,
    }
}

/// Drops a trailing zone abbreviation, if there is one.
fn strip_zone_name(value: &str) -> &str {
    split_zone_name(value).map_or(value, |(head, _)| head)
}

/// Offset east of UTC in seconds for common zone abbreviations; 0 otherwise.
fn zone_offset_secs(zone: &str) -> i32 {
    let hours = match zone.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" | "WET" => 0,
        "BST" | "CET" | "WEST" => 1,
        "CEST" | "EET" => 2,
        "EEST" | "MSK" => 3,
        "JST" | "KST" => 9,
        "AEST" => 10,
        "AEDT" => 11,
        "NZST" => 12,
        "NZDT" => 13,
        "AST" | "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        "AKST" => -9,
        "HST" => -10,
        _ => 0,
    };
    hours * 3600
}

/// Parses `value` with the first layout that accepts it.
pub fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    LAYOUTS.iter().find_map(|layout| layout.parse(value))
}

/// Like [`parse_pub_date`], falling back to `now` for unparseable input.
pub fn normalize_pub_date(value: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    parse_pub_date(value).unwrap_or(now)
}
