//! Log sources and the repository that merges them
//!
//! A [`LogStore`] hands out the full current text of each log channel. The
//! [`LogRepository`] reads both channels and runs the parsers on every call;
//! there is no cache and no incremental state, so concurrent readers each do
//! their own full read.
//!
//! Clearing truncates both files without any locking. A read racing a clear
//! may observe a partially truncated log; that race is accepted.
//!
//! # Examples
//!
//! ```yaml
//! sources:
//!   app_log: /var/log/lexicon/app.log
//!   error_log: /var/log/lexicon/error.log
//!   missing_file_handling: warn
//! ```

use crate::error::{LogError, Result};
use crate::logs::log_parsers::{AppLogParser, ErrorLogParser, LogParser};
use crate::logs::{LogRecord, LogType, MissingFileHandling, SourcesConfig};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Storage of the raw text for each log channel
pub trait LogStore: Send + Sync {
    /// Full current content of a channel
    fn read(&self, channel: LogType) -> Result<String>;

    /// Append already formatted text to a channel
    fn append(&self, channel: LogType, text: &str) -> Result<()>;

    /// Discard all content of a channel
    fn truncate(&self, channel: LogType) -> Result<()>;
}

/// Log files on the local filesystem
#[derive(Debug, Clone)]
pub struct FileLogStore {
    app_log: PathBuf,
    error_log: PathBuf,
    missing_file_handling: MissingFileHandling,
}

impl FileLogStore {
    /// Create a new file store
    pub fn new(app_log: PathBuf, error_log: PathBuf) -> Self {
        Self {
            app_log,
            error_log,
            missing_file_handling: MissingFileHandling::default(),
        }
    }

    /// Create from SourcesConfig
    pub fn from_config(config: &SourcesConfig) -> Self {
        Self::new(config.app_log.clone(), config.error_log.clone())
            .with_missing_file_handling(config.missing_file_handling)
    }

    pub fn with_missing_file_handling(mut self, handling: MissingFileHandling) -> Self {
        self.missing_file_handling = handling;
        self
    }

    /// Path backing a channel
    pub fn path(&self, channel: LogType) -> &Path {
        match channel {
            LogType::App => &self.app_log,
            LogType::Error => &self.error_log,
        }
    }

    fn io_error(&self, channel: LogType, source: std::io::Error) -> LogError {
        LogError::Io {
            channel,
            path: self.path(channel).to_path_buf(),
            source,
        }
    }
}

impl LogStore for FileLogStore {
    fn read(&self, channel: LogType) -> Result<String> {
        let path = self.path(channel);
        match fs::read_to_string(path) {
            Ok(content) => {
                debug!("Read {} bytes from {} log {}", content.len(), channel, path.display());
                Ok(content)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => match self.missing_file_handling {
                MissingFileHandling::Skip => Ok(String::new()),
                MissingFileHandling::Warn => {
                    warn!("{} log {} does not exist, treating as empty", channel, path.display());
                    Ok(String::new())
                }
                MissingFileHandling::Error => Err(self.io_error(channel, e)),
            },
            Err(e) => Err(self.io_error(channel, e)),
        }
    }

    fn append(&self, channel: LogType, text: &str) -> Result<()> {
        let path = self.path(channel);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(channel, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| self.io_error(channel, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| self.io_error(channel, e))
    }

    fn truncate(&self, channel: LogType) -> Result<()> {
        let path = self.path(channel);
        match OpenOptions::new().write(true).truncate(true).open(path) {
            Ok(_) => Ok(()),
            // Nothing to clear
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(channel, e)),
        }
    }
}

/// In-memory log store
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    app: Mutex<String>,
    error: Mutex<String>,
}

impl MemoryLogStore {
    pub fn new(app: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            app: Mutex::new(app.into()),
            error: Mutex::new(error.into()),
        }
    }

    fn channel(&self, channel: LogType) -> &Mutex<String> {
        match channel {
            LogType::App => &self.app,
            LogType::Error => &self.error,
        }
    }
}

impl LogStore for MemoryLogStore {
    fn read(&self, channel: LogType) -> Result<String> {
        let content = self
            .channel(channel)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(content.clone())
    }

    fn append(&self, channel: LogType, text: &str) -> Result<()> {
        self.channel(channel)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
        Ok(())
    }

    fn truncate(&self, channel: LogType) -> Result<()> {
        self.channel(channel)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// Reads both channels and produces the merged, tagged record stream
#[derive(Clone)]
pub struct LogRepository {
    store: Arc<dyn LogStore>,
    app_parser: AppLogParser,
    error_parser: ErrorLogParser,
}

impl LogRepository {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self {
            store,
            app_parser: AppLogParser::new(),
            error_parser: ErrorLogParser::new(),
        }
    }

    /// App records (newest first) followed by error records (append order)
    ///
    /// Both sources are read before anything is parsed, so an unreadable
    /// source fails the call without a partial result.
    pub fn load_merged(&self) -> Result<Vec<LogRecord>> {
        let app_raw = self.store.read(LogType::App)?;
        let error_raw = self.store.read(LogType::Error)?;

        let app_records = self.app_parser.parse(&app_raw);
        let error_records = self.error_parser.parse(&error_raw);
        debug!(
            "Parsed {} app records and {} error records",
            app_records.len(),
            error_records.len()
        );

        let app_type = self.app_parser.log_type();
        let error_type = self.error_parser.log_type();
        let mut merged = Vec::with_capacity(app_records.len() + error_records.len());
        merged.extend(app_records.into_iter().map(|r| LogRecord::new(app_type, r)));
        merged.extend(error_records.into_iter().map(|r| LogRecord::new(error_type, r)));
        Ok(merged)
    }

    /// Truncate both channels
    pub fn clear(&self) -> Result<()> {
        self.store.truncate(LogType::App)?;
        self.store.truncate(LogType::Error)?;
        Ok(())
    }
}
