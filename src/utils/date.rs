//! Front matter date parsing and feed date formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Formats accepted without a timezone, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a front matter date.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM:SS`
/// and RFC 3339 (any offset, normalized to UTC).
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// `YYYY-MM-DD`, used for sitemap `lastmod` and page display.
pub fn ymd(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// RFC 2822 timestamp for RSS `pubDate` / `lastBuildDate`.
pub fn rfc2822(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}
