//! Persistent table store abstraction.
//!
//! This module defines the [`TableStore`] trait, the capability the pipeline
//! needs from a relational store: bulk-load a table of rows under a name,
//! materialize a named table from a statement, read a named table back, and
//! drop tables it no longer wants.

use async_trait::async_trait;
use polars::prelude::DataFrame;

use crate::error::Result;

/// Replace-or-append policy for bulk loads.
///
/// Timestamped runs append; everything else replaces. Appends perform no
/// deduplication of overlapping periods - re-loading the same period
/// duplicates its rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop any existing table of the same name before loading.
    #[default]
    Replace,
    /// Append rows to the existing table, creating it if absent.
    Append,
}

/// Capability trait for the relational store.
///
/// Implementations can back this with any engine that can execute SQL; the
/// pipeline only ever hands it validated identifiers and generated
/// statements.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Bulk-loads a table of rows under `name`.
    async fn load_table(&self, name: &str, table: &DataFrame, mode: WriteMode) -> Result<()>;

    /// Executes a statement that materializes or mutates a named table.
    async fn execute(&self, statement: &str) -> Result<()>;

    /// Reads a named table back as rows.
    async fn read_table(&self, name: &str) -> Result<DataFrame>;

    /// Returns true if a table with this name exists.
    async fn table_exists(&self, name: &str) -> Result<bool>;

    /// Drops a table if it exists.
    async fn drop_table(&self, name: &str) -> Result<()>;
}
