//! Log filters
//!
//! This module provides the query side of the pipeline: per-field record
//! filters that are AND-combined, and page slicing of the filtered result.
//!
//! Empty criteria strings are treated as absent, so `?level=&method=GET`
//! filters by method only.

use crate::error::{LogError, Result};
use crate::logs::LogRecord;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Page used when none is requested
pub const DEFAULT_PAGE: usize = 1;

/// Page size used when none is requested
pub const DEFAULT_LIMIT: usize = 50;

/// Listing filters; every supplied criterion must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub level: Option<String>,
    pub method: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub search: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Trait for record filters
pub trait RecordFilter: Send + Sync {
    /// Returns true if the record should be kept
    fn matches(&self, record: &LogRecord) -> bool;
}

/// Level filter - exact match on the record level
pub struct LevelFilter {
    level: String,
}

impl LevelFilter {
    pub fn new(level: impl Into<String>) -> Self {
        Self { level: level.into() }
    }
}

impl RecordFilter for LevelFilter {
    fn matches(&self, record: &LogRecord) -> bool {
        record.level() == self.level
    }
}

/// Method filter - exact match; records without a method never match
pub struct MethodFilter {
    method: String,
}

impl MethodFilter {
    pub fn new(method: impl Into<String>) -> Self {
        Self { method: method.into() }
    }
}

impl RecordFilter for MethodFilter {
    fn matches(&self, record: &LogRecord) -> bool {
        record.method() == Some(self.method.as_str())
    }
}

/// Status filter - compares the stringified status code
pub struct StatusFilter {
    status: String,
}

impl StatusFilter {
    pub fn new(status: impl Into<String>) -> Self {
        Self { status: status.into() }
    }
}

impl RecordFilter for StatusFilter {
    fn matches(&self, record: &LogRecord) -> bool {
        record
            .status()
            .is_some_and(|status| status.to_string() == self.status)
    }
}

/// DateRange filter - inclusive bounds on the record timestamp
///
/// Records with an `Unknown` timestamp never satisfy a bound.
pub struct DateRangeFilter {
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
}

impl DateRangeFilter {
    pub fn new(from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Self {
        Self { from, to }
    }
}

impl RecordFilter for DateRangeFilter {
    fn matches(&self, record: &LogRecord) -> bool {
        let Some(timestamp) = record.timestamp().datetime() else {
            return self.from.is_none() && self.to.is_none();
        };
        self.from.map_or(true, |from| timestamp >= from)
            && self.to.map_or(true, |to| timestamp <= to)
    }
}

/// Search filter - case-insensitive substring of the record's searchable text
pub struct SearchFilter {
    needle: String,
}

impl SearchFilter {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_lowercase(),
        }
    }
}

impl RecordFilter for SearchFilter {
    fn matches(&self, record: &LogRecord) -> bool {
        record.search_text().to_lowercase().contains(&self.needle)
    }
}

/// Parse a date bound: `YYYY-MM-DD` (midnight), `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS[.fff]` or RFC 3339 (converted to local time)
pub fn parse_date_bound(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Local).naive_local());
    }
    Err(LogError::InvalidQuery(format!("unrecognized date: {}", value)))
}

/// Create the filter set for the given criteria
pub fn create_filters(criteria: &FilterCriteria) -> Result<Vec<Box<dyn RecordFilter>>> {
    let mut filters: Vec<Box<dyn RecordFilter>> = Vec::new();

    if let Some(level) = present(&criteria.level) {
        filters.push(Box::new(LevelFilter::new(level)));
    }
    if let Some(method) = present(&criteria.method) {
        filters.push(Box::new(MethodFilter::new(method)));
    }
    if let Some(status) = present(&criteria.status) {
        filters.push(Box::new(StatusFilter::new(status)));
    }

    let from = present(&criteria.date_from).map(parse_date_bound).transpose()?;
    let to = present(&criteria.date_to).map(parse_date_bound).transpose()?;
    if from.is_some() || to.is_some() {
        filters.push(Box::new(DateRangeFilter::new(from, to)));
    }

    if let Some(search) = present(&criteria.search) {
        filters.push(Box::new(SearchFilter::new(search)));
    }

    Ok(filters)
}

/// Returns true if the record passes all filters
pub fn apply_filters(record: &LogRecord, filters: &[Box<dyn RecordFilter>]) -> bool {
    filters.iter().all(|filter| filter.matches(record))
}

/// Records satisfying every supplied criterion, in their original order
pub fn filter_records(records: &[LogRecord], criteria: &FilterCriteria) -> Result<Vec<LogRecord>> {
    let filters = create_filters(criteria)?;
    Ok(records
        .iter()
        .filter(|record| apply_filters(record, &filters))
        .cloned()
        .collect())
}

/// Pagination metadata for a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// One page of results
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Slice `[(page-1)*limit, (page-1)*limit + limit)` out of `items`
///
/// `page` is 1-based; a page or limit of 0 is treated as 1. Pages past the
/// end are empty but still report the full total.
pub fn paginate<T: Clone>(items: &[T], page: usize, limit: usize) -> Page<T> {
    let page = page.max(1);
    let limit = limit.max(1);
    let total = items.len();

    let start = (page - 1).saturating_mul(limit).min(total);
    let end = start.saturating_add(limit).min(total);

    Page {
        items: items[start..end].to_vec(),
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        },
    }
}
