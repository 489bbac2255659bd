//! Full-dump export of the merged record stream
//!
//! JSON exports the records as a pretty-printed array. CSV flattens each
//! record into one row. Access, raw and error records carry different field
//! sets, so the header is the union of every key seen across the batch in
//! first-seen order; a record lacking a column leaves that cell empty.

use crate::error::{LogError, Result};
use crate::logs::LogRecord;
use chrono::{Local, NaiveDate};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(LogError::InvalidQuery(format!(
                "unsupported export format '{}', expected json or csv",
                other
            ))),
        }
    }
}

/// Serialized export ready to be written to a file or an HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedLogs {
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Export `records` stamped with today's local date
pub fn export(records: &[LogRecord], format: ExportFormat) -> Result<ExportedLogs> {
    export_on(records, format, Local::now().date_naive())
}

pub fn export_on(
    records: &[LogRecord],
    format: ExportFormat,
    date: NaiveDate,
) -> Result<ExportedLogs> {
    let body = match format {
        ExportFormat::Json => {
            serde_json::to_vec_pretty(records).map_err(|e| export_error(format, e))?
        }
        ExportFormat::Csv => to_csv(records)?,
    };
    debug!("Exported {} records as {} ({} bytes)", records.len(), format, body.len());

    Ok(ExportedLogs {
        body,
        content_type: format.content_type(),
        filename: format!("logs-{}.{}", date.format("%Y-%m-%d"), format.extension()),
    })
}

fn export_error(format: ExportFormat, err: impl fmt::Display) -> LogError {
    LogError::Export {
        format: format.to_string(),
        message: err.to_string(),
    }
}

fn to_csv(records: &[LogRecord]) -> Result<Vec<u8>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let rows = records
        .iter()
        .map(|record| match serde_json::to_value(record) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(export_error(
                ExportFormat::Csv,
                format!("record serialized to a non-object value: {}", other),
            )),
            Err(e) => Err(export_error(ExportFormat::Csv, e)),
        })
        .collect::<Result<Vec<Map<String, Value>>>>()?;

    let mut header: Vec<&str> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !header.contains(&key.as_str()) {
                header.push(key);
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&header)
        .map_err(|e| export_error(ExportFormat::Csv, e))?;
    for row in &rows {
        let cells = header.iter().map(|key| cell(row.get(*key)));
        writer
            .write_record(cells)
            .map_err(|e| export_error(ExportFormat::Csv, e))?;
    }

    writer
        .into_inner()
        .map_err(|e| export_error(ExportFormat::Csv, e))
}

/// Render one CSV cell; missing and falsy values are empty
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
        Some(Value::Bool(true)) => "true".to_string(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 0.0 || f.is_nan() => String::new(),
            _ => n.to_string(),
        },
        Some(Value::String(s)) => s.clone(),
        Some(nested) => nested.to_string(),
    }
}
