//! Listing response: one filtered page plus whole-log statistics

use crate::error::Result;
use crate::logs::log_filters::{filter_records, paginate, FilterCriteria, Pagination};
use crate::logs::log_statistics::{summarize, Statistics};
use crate::logs::LogRecord;
use serde::Serialize;
use std::collections::HashSet;

/// Distinct values available for the filter dropdowns, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableFilters {
    pub available_levels: Vec<String>,
    pub available_methods: Vec<String>,
    pub available_statuses: Vec<u16>,
}

impl AvailableFilters {
    pub fn from_records(records: &[LogRecord]) -> Self {
        let mut filters = Self::default();
        let mut seen_levels = HashSet::new();
        let mut seen_methods = HashSet::new();
        let mut seen_statuses = HashSet::new();

        for record in records {
            let level = record.level();
            if !level.is_empty() && seen_levels.insert(level) {
                filters.available_levels.push(level.to_string());
            }
            if let Some(method) = record.method().filter(|m| !m.is_empty()) {
                if seen_methods.insert(method) {
                    filters.available_methods.push(method.to_string());
                }
            }
            if let Some(status) = record.status() {
                if seen_statuses.insert(status) {
                    filters.available_statuses.push(status);
                }
            }
        }

        filters
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogListing {
    pub logs: Vec<LogRecord>,
    pub pagination: Pagination,
    pub statistics: Statistics,
    pub filters: AvailableFilters,
}

/// Filter and page `records`; statistics and filter options use all of them
pub fn build_listing(
    records: &[LogRecord],
    criteria: &FilterCriteria,
    page: usize,
    limit: usize,
) -> Result<LogListing> {
    let filtered = filter_records(records, criteria)?;
    let page = paginate(&filtered, page, limit);

    Ok(LogListing {
        logs: page.items,
        pagination: page.pagination,
        statistics: summarize(records),
        filters: AvailableFilters::from_records(records),
    })
}
