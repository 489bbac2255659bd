//! logdeck - access and error log analytics
//!
//! This crate turns two unstructured, append-only text logs into structured
//! records that can be filtered, paginated, summarized and exported, either
//! through the HTTP API or from the command line.

pub mod config;
pub mod error;
pub mod logs;
pub mod server;
