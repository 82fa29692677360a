#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/finlake/etl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Persistence layer for the fundamentals ETL pipeline.
//!
//! Three boundaries live here:
//!
//! - [`RawStore`](raw::RawStore) - one JSON artifact per
//!   (namespace, symbol, kind\[, timestamp\]) on the filesystem
//! - [`SqliteStore`](sqlite::SqliteStore) - the relational
//!   [`TableStore`](etl_core::TableStore) plus indicator materialization
//! - [`ProcessedExporter`](export::ProcessedExporter) - CSV exports of
//!   processed tables

/// CSV export of processed tables.
pub mod export;
/// Filesystem store for raw JSON artifacts.
pub mod raw;
/// SQLite-backed table store.
pub mod sqlite;

pub use export::ProcessedExporter;
pub use raw::RawStore;
pub use sqlite::{SqliteStore, create_indicators};
