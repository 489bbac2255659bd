//! Aggregate statistics over the merged record stream
//!
//! Statistics always describe the full, unfiltered log. Listing filters never
//! feed into them.

use crate::logs::{LogRecord, LogType};
use chrono::{Duration, Local, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Number of entries kept in each top-N ranking
pub const TOP_N: usize = 10;

const UNKNOWN_SOURCE: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeCounts {
    pub app: usize,
    pub error: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeRangeCounts {
    pub last24h: usize,
    pub last7d: usize,
    pub last30d: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointCount {
    pub url: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSourceCount {
    pub source: String,
    pub count: usize,
}

/// Summary of the whole log
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: usize,
    pub by_type: TypeCounts,
    pub by_level: BTreeMap<String, usize>,
    pub by_method: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub by_time_range: TimeRangeCounts,
    pub average_response_time: f64,
    pub top_endpoints: Vec<EndpointCount>,
    pub top_error_sources: Vec<ErrorSourceCount>,
}

/// Frequency counter that remembers first-seen order for tie breaking
#[derive(Default)]
struct Tally {
    index: HashMap<String, usize>,
    counts: Vec<(String, usize)>,
}

impl Tally {
    fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.counts.len());
                self.counts.push((key.to_string(), 1));
            }
        }
    }

    /// Highest counts first; equal counts keep first-seen order
    fn top(mut self, n: usize) -> Vec<(String, usize)> {
        self.counts.sort_by(|a, b| b.1.cmp(&a.1));
        self.counts.truncate(n);
        self.counts
    }
}

/// Summarize relative to the current local time
pub fn summarize(records: &[LogRecord]) -> Statistics {
    summarize_at(records, Local::now().naive_local())
}

/// Summarize relative to `now`
pub fn summarize_at(records: &[LogRecord], now: NaiveDateTime) -> Statistics {
    let mut stats = Statistics {
        total: records.len(),
        ..Statistics::default()
    };

    let day_ago = now - Duration::hours(24);
    let week_ago = now - Duration::days(7);
    let month_ago = now - Duration::days(30);

    let mut response_time_sum = 0.0;
    let mut response_time_count = 0usize;
    let mut endpoints = Tally::default();
    let mut error_sources = Tally::default();

    for record in records {
        match record.log_type {
            LogType::App => stats.by_type.app += 1,
            LogType::Error => stats.by_type.error += 1,
        }

        *stats.by_level.entry(record.level().to_string()).or_default() += 1;
        if let Some(method) = record.method() {
            *stats.by_method.entry(method.to_string()).or_default() += 1;
        }
        if let Some(status) = record.status() {
            *stats.by_status.entry(status.to_string()).or_default() += 1;
        }

        if let Some(timestamp) = record.timestamp().datetime() {
            if timestamp > day_ago {
                stats.by_time_range.last24h += 1;
            }
            if timestamp > week_ago {
                stats.by_time_range.last7d += 1;
            }
            if timestamp > month_ago {
                stats.by_time_range.last30d += 1;
            }
        }

        if let Some(response_time) = record.response_time_ms() {
            response_time_sum += response_time;
            response_time_count += 1;
        }

        if let Some(url) = record.url() {
            endpoints.add(url);
        }

        if let Some(stack) = record.stack() {
            let source = stack
                .lines()
                .nth(1)
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .unwrap_or(UNKNOWN_SOURCE);
            error_sources.add(source);
        }
    }

    if response_time_count > 0 {
        stats.average_response_time = response_time_sum / response_time_count as f64;
    }

    stats.top_endpoints = endpoints
        .top(TOP_N)
        .into_iter()
        .map(|(url, count)| EndpointCount { url, count })
        .collect();
    stats.top_error_sources = error_sources
        .top(TOP_N)
        .into_iter()
        .map(|(source, count)| ErrorSourceCount { source, count })
        .collect();

    stats
}
