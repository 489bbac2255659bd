//! Entry framing shared by both log files
//!
//! Each log file is a sequence of free-text entries separated by a line of
//! dashes. Every entry carries a `YYYY-MM-DD HH:MM:SS` timestamp somewhere in
//! its first line.
//!
//! An access log entry looks like:
//!
//! ```text
//! 2024-01-01 10:00:00 INFO: HTTP request
//! Method: GET
//! URL: /api/words?page=2
//! Status: 200
//! Response Time: 12.5 ms
//! Client IP: 127.0.0.1
//! User-Agent: Mozilla/5.0
//! Content-Length: 512
//! Request Data: {"word":"hola"}
//! --------------------------------------------------
//! ```
//!
//! and an error log entry like:
//!
//! ```text
//! 2024-01-01 10:00:01 ERROR:
//! TypeError: Cannot read property 'x' of undefined
//!     at foo (/app/src/words.js:10:5)
//! --------------------------------------------------
//! ```
//!
//! The formatting functions here produce exactly what the parsers read.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

/// Line separating consecutive entries
pub const ENTRY_DELIMITER: &str = "--------------------------------------------------";

/// Timestamp layout used in entry headers
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Marker preceding the stack block of an error entry
pub const ERROR_MARKER: &str = "ERROR:";

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}").expect("timestamp pattern is valid")
});

/// Split a raw log blob into trimmed, non-empty entries
///
/// Only a line consisting of the delimiter (ignoring surrounding whitespace)
/// separates entries; dashes elsewhere in an entry are left alone.
pub fn split_entries(raw: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in raw.split_inclusive('\n') {
        if line.trim() == ENTRY_DELIMITER {
            entries.push(&raw[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    entries.push(&raw[start..]);

    entries
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// First `YYYY-MM-DD HH:MM:SS` timestamp in `text`
pub fn find_timestamp(text: &str) -> Option<NaiveDateTime> {
    let found = TIMESTAMP_RE.find(text)?;
    NaiveDateTime::parse_from_str(found.as_str(), TIMESTAMP_FORMAT).ok()
}

/// Fields of one HTTP request, as written to the access log
#[derive(Debug, Clone)]
pub struct AccessEntry<'a> {
    pub timestamp: NaiveDateTime,
    pub method: &'a str,
    pub url: &'a str,
    pub status: u16,
    pub response_time_ms: f64,
    pub client_ip: &'a str,
    pub user_agent: &'a str,
    pub content_length: Option<u64>,
    pub request_data: Option<&'a str>,
}

/// Render an access log entry, including its trailing delimiter line
pub fn format_access_entry(entry: &AccessEntry<'_>) -> String {
    let level = if entry.status >= 400 { "ERROR" } else { "INFO" };
    let mut out = format!(
        "{} {}: HTTP request\nMethod: {}\nURL: {}\nStatus: {}\nResponse Time: {} ms\nClient IP: {}\nUser-Agent: {}\n",
        entry.timestamp.format(TIMESTAMP_FORMAT),
        level,
        entry.method,
        entry.url,
        entry.status,
        entry.response_time_ms,
        entry.client_ip,
        entry.user_agent,
    );
    if let Some(length) = entry.content_length {
        out.push_str(&format!("Content-Length: {}\n", length));
    }
    if let Some(data) = entry.request_data {
        out.push_str(&format!("Request Data: {}\n", data));
    }
    out.push_str(ENTRY_DELIMITER);
    out.push('\n');
    out
}

/// Render an error log entry, including its trailing delimiter line
pub fn format_error_entry(timestamp: NaiveDateTime, stack: &str) -> String {
    format!(
        "{} {}\n{}\n{}\n",
        timestamp.format(TIMESTAMP_FORMAT),
        ERROR_MARKER,
        stack.trim_end(),
        ENTRY_DELIMITER
    )
}
