//! Log parsers
//!
//! This module provides the two entry parsers: one for the application access
//! log and one for the error log. Both are tolerant: a malformed entry never
//! fails the parse. Access entries that lack a required field degrade to a
//! [`RawRecord`]; error entries get sentinel values for whatever is missing.
//!
//! Each field is matched by its own pattern, so one absent field cannot break
//! extraction of the others.
//!
//! # Examples
//!
//! ```rust
//! use logdeck::logs::log_parsers::{ErrorLogParser, LogParser};
//! use logdeck::logs::Severity;
//!
//! let raw = "2024-01-01 10:00:00 ERROR:\nTypeError: boom\n    at foo (file.js:10:5)";
//! let records = ErrorLogParser::new().parse(raw);
//! assert_eq!(records[0].error_type, "TypeError");
//! assert_eq!(records[0].severity, Severity::Critical);
//! ```

use crate::logs::entry_format::{find_timestamp, split_entries, ERROR_MARKER};
use crate::logs::{AccessRecord, AppRecord, ErrorRecord, LogType, RawRecord, Severity, Timestamp};
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const UNKNOWN_LEVEL: &str = "UNKNOWN";
const NO_STACK: &str = "No stack available";
const NO_MESSAGE: &str = "No message available";
const UNKNOWN_ERROR_TYPE: &str = "UnknownError";

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("log field pattern is valid")
}

static METHOD_RE: Lazy<Regex> = Lazy::new(|| pattern(r"Method:[ \t]*([A-Za-z]+)"));
static URL_RE: Lazy<Regex> = Lazy::new(|| pattern(r"URL:[ \t]*(\S+)"));
static CLIENT_IP_RE: Lazy<Regex> = Lazy::new(|| pattern(r"Client IP:[ \t]*(\S+)"));
static USER_AGENT_RE: Lazy<Regex> = Lazy::new(|| pattern(r"User-Agent:[ \t]*([^\r\n]+)"));
static RESPONSE_TIME_RE: Lazy<Regex> =
    Lazy::new(|| pattern(r"Response Time:[ \t]*(\d+(?:\.\d+)?)[ \t]*ms"));
static STATUS_RE: Lazy<Regex> = Lazy::new(|| pattern(r"Status:[ \t]*(\d{3})\b"));
static CONTENT_LENGTH_RE: Lazy<Regex> = Lazy::new(|| pattern(r"Content-Length:[ \t]*(\d+)"));
static REQUEST_DATA_RE: Lazy<Regex> = Lazy::new(|| pattern(r"Request Data:[ \t]*([\s\S]*)$"));

static STACK_RE: Lazy<Regex> = Lazy::new(|| pattern(r"ERROR:[ \t]*\r?\n([\s\S]*)$"));
static ERROR_TYPE_RE: Lazy<Regex> = Lazy::new(|| pattern(r"^(\w*Error):"));
static STACK_FRAME_RE: Lazy<Regex> =
    Lazy::new(|| pattern(r"at[ \t]+([^(\r\n]+?)[ \t]*\(([^()\r\n]+):(\d+):(\d+)\)"));

/// Trait for log parsers
pub trait LogParser: Send + Sync {
    /// Record type produced for each entry
    type Record;

    /// Parse a single delimiter-bounded entry; never fails
    fn parse_entry(&self, entry: &str) -> Self::Record;

    /// Get the channel this parser reads
    fn log_type(&self) -> LogType;

    /// Parse a whole log blob, one record per non-empty entry
    fn parse(&self, raw: &str) -> Vec<Self::Record> {
        split_entries(raw)
            .into_iter()
            .map(|entry| self.parse_entry(entry))
            .collect()
    }
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Access log parser
#[derive(Debug, Default, Clone, Copy)]
pub struct AppLogParser;

impl AppLogParser {
    /// Create a new access log parser
    pub fn new() -> Self {
        Self
    }
}

impl LogParser for AppLogParser {
    type Record = AppRecord;

    fn parse_entry(&self, entry: &str) -> AppRecord {
        let timestamp = find_timestamp(entry);
        let method = capture(&METHOD_RE, entry);
        let url = capture(&URL_RE, entry);
        let client_ip = capture(&CLIENT_IP_RE, entry);
        let user_agent = capture(&USER_AGENT_RE, entry);
        let response_time = capture(&RESPONSE_TIME_RE, entry).and_then(|s| s.parse::<f64>().ok());
        let status = capture(&STATUS_RE, entry).and_then(|s| s.parse::<u16>().ok());

        let (
            Some(timestamp),
            Some(method),
            Some(url),
            Some(client_ip),
            Some(user_agent),
            Some(response_time_ms),
            Some(status),
        ) = (timestamp, method, url, client_ip, user_agent, response_time, status)
        else {
            return AppRecord::Raw(RawRecord {
                raw: entry.to_string(),
                timestamp: Timestamp::At(Local::now().naive_local()),
                level: UNKNOWN_LEVEL.to_string(),
            });
        };

        let content_length = capture(&CONTENT_LENGTH_RE, entry)
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        let request_data = capture(&REQUEST_DATA_RE, entry).map(|payload| {
            serde_json::from_str::<Value>(payload)
                .unwrap_or_else(|_| Value::String(payload.to_string()))
        });
        let (pathname, query) = split_url(url);
        let timestamp = Timestamp::At(timestamp);
        let is_error = status >= 400;

        AppRecord::Access(AccessRecord {
            timestamp,
            level: if is_error { "ERROR" } else { "INFO" }.to_string(),
            method: method.to_string(),
            url: url.to_string(),
            pathname,
            query,
            client_ip: client_ip.to_string(),
            user_agent: user_agent.to_string(),
            status,
            response_time_ms,
            content_length,
            request_data,
            is_error,
            is_success: (200..300).contains(&status),
            hour: timestamp.hour(),
            day_of_week: timestamp.day_of_week(),
        })
    }

    fn log_type(&self) -> LogType {
        LogType::App
    }

    /// Most recent entry first
    fn parse(&self, raw: &str) -> Vec<AppRecord> {
        let mut records: Vec<AppRecord> = split_entries(raw)
            .into_iter()
            .map(|entry| self.parse_entry(entry))
            .collect();
        records.reverse();
        records
    }
}

/// Split a request URL into its path and query string
///
/// Relative URLs are resolved against a placeholder origin, so `words?page=2`
/// yields `/words`. Absolute URLs lose their scheme and authority.
fn split_url(url: &str) -> (String, Option<String>) {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let target = match without_fragment.find("://") {
        Some(idx) => {
            let rest = &without_fragment[idx + 3..];
            rest.find(|c: char| c == '/' || c == '?')
                .map_or("", |start| &rest[start..])
        }
        None => without_fragment,
    };

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };
    let pathname = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    (
        pathname,
        query.filter(|q| !q.is_empty()).map(str::to_string),
    )
}

/// Error log parser
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorLogParser;

impl ErrorLogParser {
    /// Create a new error log parser
    pub fn new() -> Self {
        Self
    }
}

impl LogParser for ErrorLogParser {
    type Record = ErrorRecord;

    fn parse_entry(&self, entry: &str) -> ErrorRecord {
        let header = entry
            .find(ERROR_MARKER)
            .map_or(entry, |idx| &entry[..idx]);
        let timestamp = Timestamp::from(find_timestamp(header));

        let stack = STACK_RE
            .captures(entry)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty());
        let message = stack
            .and_then(|s| s.lines().next())
            .map(str::trim)
            .unwrap_or(NO_MESSAGE)
            .to_string();
        let stack = stack.unwrap_or(NO_STACK).to_string();

        let error_type = capture(&ERROR_TYPE_RE, &stack)
            .unwrap_or(UNKNOWN_ERROR_TYPE)
            .to_string();

        let frame = STACK_FRAME_RE.captures(&stack);
        let function_name = frame
            .as_ref()
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string());
        let file = frame
            .as_ref()
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str().to_string());
        let line = frame
            .as_ref()
            .and_then(|caps| caps.get(3))
            .and_then(|m| m.as_str().parse::<u32>().ok());
        let column = frame
            .as_ref()
            .and_then(|caps| caps.get(4))
            .and_then(|m| m.as_str().parse::<u32>().ok());

        let severity = classify_severity(&error_type, &message);

        ErrorRecord {
            timestamp,
            level: "ERROR".to_string(),
            message,
            stack,
            error_type,
            file,
            line,
            column,
            function_name,
            severity,
            hour: timestamp.hour(),
            day_of_week: timestamp.day_of_week(),
        }
    }

    fn log_type(&self) -> LogType {
        LogType::Error
    }
}

/// Assign a severity by error type first, then by keywords in the message
pub fn classify_severity(error_type: &str, message: &str) -> Severity {
    match error_type {
        "SyntaxError" | "ReferenceError" | "TypeError" | "RangeError" => {
            return Severity::Critical
        }
        "ValidationError" | "DatabaseError" | "ConnectionError" => return Severity::High,
        "NotFoundError" | "UnauthorizedError" | "ForbiddenError" => return Severity::Medium,
        _ => {}
    }

    let message = message.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| message.contains(w));

    if mentions(&["critical", "fatal"]) {
        Severity::Critical
    } else if mentions(&["error", "failed"]) {
        Severity::High
    } else if mentions(&["warning", "invalid"]) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::entry_format::ENTRY_DELIMITER;
    use serde_json::json;

    fn access_entry(ts: &str, method: &str, url: &str, status: u16) -> String {
        format!(
            "{} INFO: HTTP request\nMethod: {}\nURL: {}\nStatus: {}\nResponse Time: 12.5 ms\nClient IP: 127.0.0.1\nUser-Agent: Mozilla/5.0 (X11; Linux x86_64)\n",
            ts, method, url, status
        )
    }

    fn join(entries: &[String]) -> String {
        entries
            .iter()
            .map(|e| format!("{}\n{}\n", e, ENTRY_DELIMITER))
            .collect()
    }

    fn unwrap_access(record: &AppRecord) -> &AccessRecord {
        match record {
            AppRecord::Access(access) => access,
            AppRecord::Raw(raw) => panic!("expected access record, got raw: {}", raw.raw),
        }
    }

    #[test]
    fn test_app_parser_structured_entry() {
        let entry = access_entry("2024-01-01 10:00:00", "GET", "/api/words?page=2&q=x", 200);
        let record = AppLogParser::new().parse_entry(&entry);
        let access = unwrap_access(&record);

        assert_eq!(access.method, "GET");
        assert_eq!(access.url, "/api/words?page=2&q=x");
        assert_eq!(access.pathname, "/api/words");
        assert_eq!(access.query.as_deref(), Some("page=2&q=x"));
        assert_eq!(access.client_ip, "127.0.0.1");
        assert_eq!(access.user_agent, "Mozilla/5.0 (X11; Linux x86_64)");
        assert_eq!(access.status, 200);
        assert_eq!(access.response_time_ms, 12.5);
        assert_eq!(access.content_length, 0);
        assert_eq!(access.request_data, None);
        assert_eq!(access.level, "INFO");
        assert!(access.is_success);
        assert!(!access.is_error);
        assert_eq!(access.hour, Some(10));
        // 2024-01-01 was a Monday
        assert_eq!(access.day_of_week, Some(1));
    }

    #[test]
    fn test_app_parser_error_status_sets_level() {
        let entry = access_entry("2024-01-01 10:00:00", "DELETE", "/api/words/1", 404);
        let record = AppLogParser::new().parse_entry(&entry);
        let access = unwrap_access(&record);

        assert_eq!(access.level, "ERROR");
        assert!(access.is_error);
        assert!(!access.is_success);
        assert_eq!(access.query, None);
    }

    #[test]
    fn test_app_parser_redirect_is_neither_success_nor_error() {
        let entry = access_entry("2024-01-01 10:00:00", "GET", "/", 304);
        let record = AppLogParser::new().parse_entry(&entry);
        let access = unwrap_access(&record);
        assert!(!access.is_success);
        assert!(!access.is_error);
        assert_eq!(access.level, "INFO");
    }

    #[test]
    fn test_app_parser_request_data() {
        let mut entry = access_entry("2024-01-01 10:00:00", "POST", "/api/words", 201);
        entry.push_str("Content-Length: 27\nRequest Data: {\"word\":\"hola\",\"level\":2}\n");
        let record = AppLogParser::new().parse_entry(&entry);
        let access = unwrap_access(&record);

        assert_eq!(access.content_length, 27);
        assert_eq!(access.request_data, Some(json!({"word": "hola", "level": 2})));
    }

    #[test]
    fn test_app_parser_request_data_falls_back_to_text() {
        let mut entry = access_entry("2024-01-01 10:00:00", "POST", "/api/words", 201);
        entry.push_str("Request Data: word=hola&level=2\n");
        let record = AppLogParser::new().parse_entry(&entry);
        let access = unwrap_access(&record);

        assert_eq!(
            access.request_data,
            Some(Value::String("word=hola&level=2".to_string()))
        );
    }

    #[test]
    fn test_app_parser_missing_field_degrades_to_raw() {
        let entry = "2024-01-01 10:00:00 INFO: HTTP request\nURL: /api/words\nStatus: 200\nResponse Time: 3 ms\nClient IP: ::1\nUser-Agent: curl/8.0";
        let record = AppLogParser::new().parse_entry(entry);

        match record {
            AppRecord::Raw(raw) => {
                assert_eq!(raw.raw, entry);
                assert_eq!(raw.level, "UNKNOWN");
                assert!(matches!(raw.timestamp, Timestamp::At(_)));
            }
            AppRecord::Access(_) => panic!("entry without Method must degrade"),
        }
    }

    #[test]
    fn test_app_parser_first_response_time_wins() {
        let mut entry = access_entry("2024-01-01 10:00:00", "GET", "/api/words", 200);
        entry.push_str("Response Time: 99 ms\n");
        let record = AppLogParser::new().parse_entry(&entry);
        assert_eq!(unwrap_access(&record).response_time_ms, 12.5);
    }

    #[test]
    fn test_app_parser_reverses_entry_order() {
        let raw = join(&[
            access_entry("2024-01-01 10:00:00", "GET", "/first", 200),
            access_entry("2024-01-01 10:00:01", "GET", "/second", 200),
            access_entry("2024-01-01 10:00:02", "GET", "/third", 200),
        ]);
        let records = AppLogParser::new().parse(&raw);
        let urls: Vec<&str> = records.iter().map(|r| unwrap_access(r).url.as_str()).collect();
        assert_eq!(urls, vec!["/third", "/second", "/first"]);
    }

    #[test]
    fn test_app_parser_valid_and_malformed_pair() {
        let malformed = "2024-01-01 10:00:01 INFO: something else entirely".to_string();
        let raw = join(&[
            access_entry("2024-01-01 10:00:00", "GET", "/api/words", 200),
            malformed.clone(),
        ]);
        let records = AppLogParser::new().parse(&raw);

        assert_eq!(records.len(), 2);
        match &records[0] {
            AppRecord::Raw(raw) => assert_eq!(raw.raw, malformed),
            AppRecord::Access(_) => panic!("malformed entry is last in source, first in output"),
        }
        let access = unwrap_access(&records[1]);
        assert_eq!(access.status, 200);
        assert!(access.is_success);
    }

    #[test]
    fn test_app_parser_empty_blob() {
        assert!(AppLogParser::new().parse("").is_empty());
        assert!(AppLogParser::new().parse("\n   \n").is_empty());
    }

    #[test]
    fn test_app_parser_never_drops_entries() {
        let raw = join(&[
            "total garbage".to_string(),
            "Method: GET".to_string(),
            access_entry("2024-01-01 10:00:00", "GET", "/ok", 200),
            "   ".to_string(),
            "ERROR:\nnot even an access entry".to_string(),
        ]);
        assert_eq!(AppLogParser::new().parse(&raw).len(), 4);
    }

    #[test]
    fn test_split_url() {
        assert_eq!(split_url("/a/b?x=1"), ("/a/b".to_string(), Some("x=1".to_string())));
        assert_eq!(split_url("/a/b?"), ("/a/b".to_string(), None));
        assert_eq!(split_url("words"), ("/words".to_string(), None));
        assert_eq!(split_url("/a#frag"), ("/a".to_string(), None));
        assert_eq!(
            split_url("https://example.com/api?x=1"),
            ("/api".to_string(), Some("x=1".to_string()))
        );
        assert_eq!(split_url("https://example.com"), ("/".to_string(), None));
    }

    #[test]
    fn test_error_parser_type_error_frame() {
        let raw = "2024-01-01 10:00:00 ERROR:\nTypeError: Cannot read property 'x'\n    at foo (file.js:10:5)";
        let records = ErrorLogParser::new().parse(raw);
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.error_type, "TypeError");
        assert_eq!(record.severity, Severity::Critical);
        assert_eq!(record.file.as_deref(), Some("file.js"));
        assert_eq!(record.line, Some(10));
        assert_eq!(record.column, Some(5));
        assert_eq!(record.function_name.as_deref(), Some("foo"));
        assert_eq!(record.message, "TypeError: Cannot read property 'x'");
        assert_eq!(record.level, "ERROR");
        assert_eq!(record.hour, Some(10));
    }

    #[test]
    fn test_error_parser_nested_function_and_absolute_path() {
        let raw = "2024-01-01 10:00:00 ERROR:\nValidationError: word is required\n    at Object.<anonymous> (/srv/app/controllers/words.js:42:17)\n    at next (/srv/app/node_modules/router/index.js:1:1)";
        let record = ErrorLogParser::new().parse_entry(raw);

        assert_eq!(record.error_type, "ValidationError");
        assert_eq!(record.severity, Severity::High);
        assert_eq!(record.function_name.as_deref(), Some("Object.<anonymous>"));
        assert_eq!(record.file.as_deref(), Some("/srv/app/controllers/words.js"));
        assert_eq!(record.line, Some(42));
        assert_eq!(record.column, Some(17));
    }

    #[test]
    fn test_error_parser_sentinels() {
        let record = ErrorLogParser::new().parse_entry("something went sideways");

        assert_eq!(record.timestamp, Timestamp::Unknown);
        assert_eq!(record.stack, "No stack available");
        assert_eq!(record.message, "No message available");
        assert_eq!(record.error_type, "UnknownError");
        assert_eq!(record.file, None);
        assert_eq!(record.line, None);
        assert_eq!(record.column, None);
        assert_eq!(record.function_name, None);
        assert_eq!(record.hour, None);
        assert_eq!(record.day_of_week, None);
        assert_eq!(record.severity, Severity::Low);
    }

    #[test]
    fn test_error_parser_keeps_append_order() {
        let raw = format!(
            "2024-01-01 10:00:00 ERROR:\nError: first\n{d}\n2024-01-01 10:00:01 ERROR:\nError: second\n{d}\n",
            d = ENTRY_DELIMITER
        );
        let records = ErrorLogParser::new().parse(&raw);
        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["Error: first", "Error: second"]);
        assert_eq!(records[0].error_type, "Error");
    }

    #[test]
    fn test_error_parser_mixed_blob_keeps_every_non_empty_entry() {
        let entries = [
            "2024-01-01 10:00:00 ERROR:\nMongoServerError: connection refused",
            "2024-01-01 10:00:01 worker crashed before logging a marker",
            "   \n\t",
            "2024-01-01 10:00:02 ERROR:\nTypeError: x is undefined\n    at foo (a.js:1:2)",
        ];
        let raw = format!("\n{}", join(&entries.map(String::from)));
        let non_empty = entries.iter().filter(|e| !e.trim().is_empty()).count();

        let records = ErrorLogParser::new().parse(&raw);
        assert_eq!(records.len(), non_empty);

        assert_eq!(records[0].error_type, "MongoServerError");
        assert_eq!(records[0].file, None);
        assert_eq!(records[0].function_name, None);

        assert_eq!(records[1].stack, "No stack available");
        assert_eq!(records[1].message, "No message available");
        assert_eq!(records[1].error_type, "UnknownError");
        assert!(matches!(records[1].timestamp, Timestamp::At(_)));

        assert_eq!(records[2].error_type, "TypeError");
        assert_eq!(records[2].file.as_deref(), Some("a.js"));
    }

    #[test]
    fn test_error_parser_stack_without_frames() {
        let record = ErrorLogParser::new()
            .parse_entry("2024-01-01 10:00:00 ERROR:\nMongoServerError: connection refused");
        assert_eq!(record.error_type, "MongoServerError");
        assert_eq!(record.file, None);
        // Falls through to message keywords
        assert_eq!(record.severity, Severity::High);
    }

    #[test]
    fn test_classify_severity_cascade() {
        assert_eq!(classify_severity("TypeError", "all good"), Severity::Critical);
        assert_eq!(classify_severity("RangeError", ""), Severity::Critical);
        assert_eq!(classify_severity("DatabaseError", "fatal"), Severity::High);
        assert_eq!(classify_severity("ForbiddenError", "fatal"), Severity::Medium);
        assert_eq!(classify_severity("Error", "FATAL: disk full"), Severity::Critical);
        assert_eq!(classify_severity("Error", "request failed"), Severity::High);
        assert_eq!(classify_severity("UnknownError", "Invalid token"), Severity::Medium);
        assert_eq!(classify_severity("UnknownError", "Warning: deprecated"), Severity::Medium);
        assert_eq!(classify_severity("UnknownError", "something odd"), Severity::Low);
    }

    #[test]
    fn test_type_error_always_critical() {
        for message in ["", "warning", "low priority", "invalid", "failed"] {
            let raw = format!("2024-01-01 10:00:00 ERROR:\nTypeError: {}", message);
            let record = ErrorLogParser::new().parse_entry(&raw);
            assert_eq!(record.severity, Severity::Critical, "message: {}", message);
        }
    }

    #[test]
    fn test_parser_log_types() {
        assert_eq!(AppLogParser::new().log_type(), LogType::App);
        assert_eq!(ErrorLogParser::new().log_type(), LogType::Error);
    }
}
