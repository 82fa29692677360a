#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/finlake/etl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types and transformations for the fundamentals ETL pipeline.
//!
//! This crate provides the foundational pieces shared by the pipeline crates:
//!
//! - [`Symbol`](types::Symbol), [`Namespace`](types::Namespace),
//!   [`DocumentKind`](types::DocumentKind) - identifiers
//! - [`RawBatch`](types::RawBatch), [`DocumentTables`](types::DocumentTables) -
//!   raw and normalized containers
//! - [`parse_to_tables`](normalize::parse_to_tables) - JSON to per-kind tables
//! - [`wide_format`](reshape::wide_format), [`long_format`](reshape::long_format) -
//!   shape transformations
//! - [`IndicatorFamily`](indicators::IndicatorFamily) - derived-ratio catalog
//! - [`TableStore`](store::TableStore) - persistence abstraction

/// Error types for pipeline operations.
pub mod error;
/// Derived-indicator catalog and SQL generation.
pub mod indicators;
/// Raw JSON to normalized per-kind tables.
pub mod normalize;
/// Reporting period definitions.
pub mod period;
/// Wide and long/tidy shape transformations.
pub mod reshape;
/// Persistent table store abstraction.
pub mod store;
/// Core identifiers and data containers.
pub mod types;

// Re-export commonly used items at crate root
pub use error::{EtlError, Result};
pub use indicators::IndicatorFamily;
pub use normalize::parse_to_tables;
pub use period::PeriodType;
pub use reshape::{long_format, melt_frames, wide_format};
pub use store::{TableStore, WriteMode};
pub use types::{DocumentKind, DocumentTables, Namespace, QueryParams, RawBatch, RawDocument, Symbol};
