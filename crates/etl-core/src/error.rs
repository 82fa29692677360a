//! Error types for pipeline operations.
//!
//! This module defines [`EtlError`] which covers all error cases that can occur
//! while building requests, normalizing documents, reshaping tables, or
//! persisting results.

use thiserror::Error;

/// Errors that can occur during pipeline operations.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Configuration problem (unknown document kind, missing template or
    /// credential). Fatal: aborts the run.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single (symbol, kind) request failed or returned nothing. The cell is
    /// recorded as absent and the run continues.
    #[error("Fetch failed for {symbol} {kind}: {message}")]
    Fetch {
        /// Symbol the request was for.
        symbol: String,
        /// Document kind the request was for.
        kind: String,
        /// Underlying failure.
        message: String,
    },

    /// A raw document did not have the shape expected for its kind.
    #[error("Malformed {kind} document for {symbol}: {message}")]
    Malformed {
        /// Symbol the document belongs to.
        symbol: String,
        /// Document kind the payload claimed to be.
        kind: String,
        /// What was wrong with the payload.
        message: String,
    },

    /// A shape operation required a document kind that is absent or empty.
    ///
    /// The wide join raises this rather than returning a silently-empty
    /// table, since strict inner-join semantics would otherwise mask the
    /// missing input.
    #[error("Cannot build {operation}: missing or empty {kind} table")]
    MissingKind {
        /// Operation that could not proceed.
        operation: String,
        /// The absent document kind.
        kind: String,
    },

    /// DataFrame construction or transformation failed.
    #[error("Frame error: {0}")]
    Frame(String),

    /// Raw artifact store failure (filesystem read/write).
    #[error("Store error: {0}")]
    Store(String),

    /// Relational store failure (load, materialize, read-back).
    #[error("SQL error: {0}")]
    Sql(String),

    /// A namespace or table name contained characters outside the identifier
    /// allow-list.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Result type alias using [`EtlError`].
pub type Result<T> = std::result::Result<T, EtlError>;
