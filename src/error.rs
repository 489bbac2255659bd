//! Error types for the log analytics pipeline
//!
//! Malformed log entries are never errors: they degrade to raw or sentinel
//! records inside the parsers. Only source reads, export serialization and
//! invalid query input surface here.

use std::path::PathBuf;
use thiserror::Error;

use crate::logs::LogType;

/// Errors surfaced by the log pipeline
#[derive(Debug, Error)]
pub enum LogError {
    /// A log source could not be read (or truncated)
    #[error("failed to access {channel} log at {}: {source}", path.display())]
    Io {
        channel: LogType,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Records could not be serialized for export
    #[error("failed to export logs as {format}: {message}")]
    Export { format: String, message: String },

    /// A query parameter could not be interpreted
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl LogError {
    /// Whether the error was caused by the caller rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, LogError::InvalidQuery(_))
    }
}

pub type Result<T> = std::result::Result<T, LogError>;
