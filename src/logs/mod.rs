//! Log analytics pipeline
//!
//! Two append-only text logs (the application access log and the error log)
//! are re-read and re-parsed on every request:
//!
//! ```text
//! raw text -> parsers -> merged records -> filtered | aggregated | exported
//! ```
//!
//! Nothing is cached between requests. Records are built fresh from the
//! current file contents and dropped once the response is produced.

pub mod entry_format;
pub mod file_log_source;
pub mod log_export;
pub mod log_filters;
pub mod log_listing;
pub mod log_parsers;
pub mod log_statistics;

pub use file_log_source::{FileLogStore, LogRepository, LogStore, MemoryLogStore};
pub use log_export::{export, ExportFormat, ExportedLogs};
pub use log_filters::{filter_records, paginate, FilterCriteria, Page, Pagination};
pub use log_listing::{build_listing, AvailableFilters, LogListing};
pub use log_parsers::{AppLogParser, ErrorLogParser, LogParser};
pub use log_statistics::{summarize, Statistics};

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Log channel a record was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    /// Application access log
    App,
    /// Error log
    Error,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::App => "app",
            LogType::Error => "error",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse urgency of an error record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Point in time taken from an entry, or `Unknown` when the entry had none
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    At(NaiveDateTime),
    Unknown,
}

impl Timestamp {
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Timestamp::At(dt) => Some(*dt),
            Timestamp::Unknown => None,
        }
    }

    /// Hour of day, 0-23
    pub fn hour(&self) -> Option<u32> {
        self.datetime().map(|dt| dt.hour())
    }

    /// Day of week, 0 = Sunday
    pub fn day_of_week(&self) -> Option<u32> {
        self.datetime()
            .map(|dt| dt.weekday().num_days_from_sunday())
    }
}

impl From<Option<NaiveDateTime>> for Timestamp {
    fn from(value: Option<NaiveDateTime>) -> Self {
        value.map_or(Timestamp::Unknown, Timestamp::At)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::At(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Timestamp::Unknown => f.write_str("Unknown"),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Structured access log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecord {
    pub timestamp: Timestamp,
    pub level: String,
    pub method: String,
    pub url: String,
    pub pathname: String,
    pub query: Option<String>,
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    pub user_agent: String,
    pub status: u16,
    pub response_time_ms: f64,
    pub content_length: u64,
    pub request_data: Option<Value>,
    pub is_error: bool,
    pub is_success: bool,
    pub hour: Option<u32>,
    pub day_of_week: Option<u32>,
}

/// Access log entry that could not be structured; keeps the original text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    pub raw: String,
    pub timestamp: Timestamp,
    pub level: String,
}

/// Structured error log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub timestamp: Timestamp,
    pub level: String,
    pub message: String,
    pub stack: String,
    pub error_type: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub function_name: Option<String>,
    pub severity: Severity,
    pub hour: Option<u32>,
    pub day_of_week: Option<u32>,
}

/// Output of the access log parser
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AppRecord {
    Access(AccessRecord),
    Raw(RawRecord),
}

/// Any parsed record, before tagging
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogEntry {
    Access(AccessRecord),
    Raw(RawRecord),
    Error(ErrorRecord),
}

/// A record in the merged stream, tagged with the channel it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    #[serde(rename = "type")]
    pub log_type: LogType,
    #[serde(flatten)]
    pub entry: LogEntry,
}

impl From<AppRecord> for LogEntry {
    fn from(record: AppRecord) -> Self {
        match record {
            AppRecord::Access(access) => LogEntry::Access(access),
            AppRecord::Raw(raw) => LogEntry::Raw(raw),
        }
    }
}

impl From<ErrorRecord> for LogEntry {
    fn from(record: ErrorRecord) -> Self {
        LogEntry::Error(record)
    }
}

impl LogRecord {
    pub fn new(log_type: LogType, entry: impl Into<LogEntry>) -> Self {
        Self {
            log_type,
            entry: entry.into(),
        }
    }

    pub fn app(record: AppRecord) -> Self {
        Self::new(LogType::App, record)
    }

    pub fn error(record: ErrorRecord) -> Self {
        Self::new(LogType::Error, record)
    }

    pub fn level(&self) -> &str {
        match &self.entry {
            LogEntry::Access(r) => &r.level,
            LogEntry::Raw(r) => &r.level,
            LogEntry::Error(r) => &r.level,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match &self.entry {
            LogEntry::Access(r) => r.timestamp,
            LogEntry::Raw(r) => r.timestamp,
            LogEntry::Error(r) => r.timestamp,
        }
    }

    pub fn access(&self) -> Option<&AccessRecord> {
        match &self.entry {
            LogEntry::Access(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorRecord> {
        match &self.entry {
            LogEntry::Error(r) => Some(r),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        self.access().map(|r| r.method.as_str())
    }

    pub fn status(&self) -> Option<u16> {
        self.access().map(|r| r.status)
    }

    pub fn url(&self) -> Option<&str> {
        self.access().map(|r| r.url.as_str())
    }

    pub fn response_time_ms(&self) -> Option<f64> {
        self.access().map(|r| r.response_time_ms)
    }

    pub fn stack(&self) -> Option<&str> {
        self.as_error().map(|r| r.stack.as_str())
    }

    /// Space-joined text the free-text search runs against
    pub fn search_text(&self) -> String {
        match &self.entry {
            LogEntry::Access(r) => [
                r.url.as_str(),
                r.client_ip.as_str(),
                r.user_agent.as_str(),
                r.method.as_str(),
            ]
            .join(" "),
            LogEntry::Raw(r) => r.raw.clone(),
            LogEntry::Error(r) => r.stack.clone(),
        }
    }
}

/// Where the two log channels live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Path of the application access log
    #[serde(default = "default_app_log")]
    pub app_log: PathBuf,
    /// Path of the error log
    #[serde(default = "default_error_log")]
    pub error_log: PathBuf,
    /// How to handle a log file that does not exist yet
    #[serde(default)]
    pub missing_file_handling: MissingFileHandling,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            app_log: default_app_log(),
            error_log: default_error_log(),
            missing_file_handling: MissingFileHandling::default(),
        }
    }
}

/// How to handle missing files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingFileHandling {
    /// Treat as empty
    Skip,
    /// Warn and treat as empty
    Warn,
    /// Fail the request
    #[default]
    Error,
}

fn default_app_log() -> PathBuf {
    PathBuf::from("logs/app.log")
}

fn default_error_log() -> PathBuf {
    PathBuf::from("logs/error.log")
}
