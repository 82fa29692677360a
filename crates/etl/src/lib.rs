#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/finlake/etl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Sequential extract-transform-load pipeline for financial statement data.
//!
//! The pipeline fetches stock quotes and financial statements from the FMP
//! API, persists the raw JSON, reshapes it into wide and tidy tables, loads
//! them into SQLite, and materializes three families of derived ratios.
//!
//! # Example
//!
//! ```rust,ignore
//! use etl::{Pipeline, RunConfig, fetch_api_key};
//!
//! #[tokio::main]
//! async fn main() -> etl_core::Result<()> {
//!     let config = RunConfig::from_manifest("runs/tech.yaml")?;
//!     let api_key = fetch_api_key()?;
//!
//!     let pipeline = Pipeline::new(&config)?;
//!     pipeline.run(&config, &api_key).await
//! }
//! ```

/// Run configuration: manifest, request expansion, credentials.
pub mod config;
/// The sequential extract, transform and load phases.
pub mod pipeline;

pub use config::{Manifest, RunConfig, fetch_api_key};
pub use pipeline::Pipeline;
