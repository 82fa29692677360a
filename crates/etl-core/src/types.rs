//! Core identifiers and data containers.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Symbol`] - Trading symbol/ticker
//! - [`Namespace`] - Validated destination prefix for one run's output set
//! - [`DocumentKind`] - The four fetchable document kinds
//! - [`QueryParams`] - Optional request query parameters
//! - [`RawDocument`] / [`RawBatch`] - Fetched JSON payloads
//! - [`DocumentTables`] - One normalized table per document kind

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{EtlError, Result};
use crate::period::PeriodType;

/// A trading symbol/ticker.
///
/// Symbols are automatically uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().to_uppercase())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Destination prefix identifying one pipeline run's output set.
///
/// The namespace names the raw-data folder and prefixes every table the run
/// creates (`<namespace>_stocks`, `<namespace>_statements`, ...). Because it
/// is spliced into SQL statements, construction validates it against an
/// identifier allow-list: ASCII letters, digits and underscores, not starting
/// with a digit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Creates a namespace, validating it as a SQL identifier.
    ///
    /// # Errors
    /// Returns [`EtlError::InvalidIdentifier`] if the string is empty, starts
    /// with a digit, or contains characters outside `[A-Za-z0-9_]`.
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        validate_identifier(&s)?;
        Ok(Self(s))
    }

    /// Returns the namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the full table name for a logical table in this namespace.
    #[must_use]
    pub fn table(&self, logical: &str) -> String {
        format!("{}_{logical}", self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Namespace {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Namespace {
    type Error = EtlError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

/// Validates a string as a SQL identifier.
///
/// # Errors
/// Returns [`EtlError::InvalidIdentifier`] if the string is empty, starts
/// with a digit, or contains characters outside `[A-Za-z0-9_]`.
pub fn validate_identifier(s: &str) -> Result<()> {
    let mut chars = s.chars();
    let valid_first = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_first && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(EtlError::InvalidIdentifier(format!(
            "'{s}' is not a valid identifier (letters, digits and underscores only, \
             must not start with a digit)"
        )))
    }
}

/// One of the four fetchable document kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Historical daily stock quotes.
    Stock,
    /// Income statement periods.
    IncomeStatement,
    /// Balance sheet periods.
    BalanceSheet,
    /// Cash flow statement periods.
    Cashflow,
}

impl DocumentKind {
    /// All document kinds, in canonical order.
    pub const ALL: [Self; 4] = [
        Self::Stock,
        Self::IncomeStatement,
        Self::BalanceSheet,
        Self::Cashflow,
    ];

    /// The three financial statement kinds, in join order.
    pub const STATEMENTS: [Self; 3] = [Self::IncomeStatement, Self::BalanceSheet, Self::Cashflow];

    /// Returns the snake_case name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::IncomeStatement => "income_statement",
            Self::BalanceSheet => "balance_sheet",
            Self::Cashflow => "cashflow",
        }
    }

    /// Returns true for the three statement kinds.
    #[must_use]
    pub const fn is_statement(&self) -> bool {
        !matches!(self, Self::Stock)
    }

    /// Expands a requested set of kind names into concrete kinds.
    ///
    /// The aggregates `all` and `statements` expand to their member kinds;
    /// individual kind names pass through. Duplicates are removed, first
    /// occurrence wins.
    ///
    /// # Errors
    /// Returns [`EtlError::Config`] for an unrecognized name, since it
    /// indicates a configuration problem upstream.
    pub fn expand_requests<S: AsRef<str>>(requests: &[S]) -> Result<Vec<Self>> {
        let mut kinds = Vec::new();
        for request in requests {
            match request.as_ref() {
                "all" => kinds.extend(Self::ALL),
                "statements" => kinds.extend(Self::STATEMENTS),
                name => kinds.push(name.parse()?),
            }
        }
        let mut seen = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if !seen.contains(&kind) {
                seen.push(kind);
            }
        }
        Ok(seen)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stock" => Ok(Self::Stock),
            "income_statement" => Ok(Self::IncomeStatement),
            "balance_sheet" => Ok(Self::BalanceSheet),
            "cashflow" => Ok(Self::Cashflow),
            other => Err(EtlError::Config(format!(
                "Did not recognize '{other}' request. Options: 'stock', 'income_statement', \
                 'balance_sheet', 'cashflow', 'statements' or 'all'"
            ))),
        }
    }
}

/// Optional query parameters for one run.
///
/// Constructed fresh per call; an absent field falls back to the API default.
/// `from`/`to` bound the `stock` history, `period` and `limit` apply to the
/// statement kinds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Start of the stock history range.
    #[serde(default)]
    pub from: Option<chrono::NaiveDate>,
    /// End of the stock history range.
    #[serde(default)]
    pub to: Option<chrono::NaiveDate>,
    /// Statement reporting period.
    #[serde(default)]
    pub period: Option<PeriodType>,
    /// Maximum number of statement periods to fetch.
    #[serde(default)]
    pub limit: Option<u32>,
}

impl QueryParams {
    /// Query string for the `stock` kind.
    ///
    /// Non-empty only when both bounds are supplied; otherwise the API's own
    /// defaults apply.
    #[must_use]
    pub fn stock_query(&self) -> String {
        match (self.from, self.to) {
            (Some(from), Some(to)) => format!("from={from}&to={to}&"),
            _ => String::new(),
        }
    }

    /// Query string for the statement kinds.
    ///
    /// Always present, defaulting to one annual period.
    #[must_use]
    pub fn statement_query(&self) -> String {
        let period = self.period.unwrap_or_default();
        let limit = self.limit.unwrap_or(1);
        format!("period={period}&limit={limit}&")
    }
}

/// One fetched JSON payload for a (symbol, document kind) pair.
///
/// Immutable once written by the fetch stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Symbol the payload was fetched for.
    pub symbol: Symbol,
    /// Document kind of the payload.
    pub kind: DocumentKind,
    /// The raw JSON body.
    pub payload: Value,
}

impl RawDocument {
    /// Creates a new raw document.
    #[must_use]
    pub const fn new(symbol: Symbol, kind: DocumentKind, payload: Value) -> Self {
        Self {
            symbol,
            kind,
            payload,
        }
    }
}

/// Accumulated raw documents for one run, grouped by document kind.
#[derive(Debug, Default)]
pub struct RawBatch {
    documents: HashMap<DocumentKind, Vec<RawDocument>>,
}

impl RawBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document to the batch.
    pub fn push(&mut self, document: RawDocument) {
        self.documents
            .entry(document.kind)
            .or_default()
            .push(document);
    }

    /// Returns the documents of a kind, empty if none were collected.
    #[must_use]
    pub fn documents(&self, kind: DocumentKind) -> &[RawDocument] {
        self.documents.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Returns the kinds with at least one document, in canonical order.
    #[must_use]
    pub fn kinds(&self) -> Vec<DocumentKind> {
        DocumentKind::ALL
            .into_iter()
            .filter(|kind| !self.documents(*kind).is_empty())
            .collect()
    }

    /// Returns the total number of documents in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }

    /// Returns true if the batch holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One normalized table per document kind.
///
/// Built by the normalizer through explicit accumulation; a kind with zero
/// successfully parsed documents stays `None`.
#[derive(Clone, Debug, Default)]
pub struct DocumentTables {
    stock: Option<DataFrame>,
    income_statement: Option<DataFrame>,
    balance_sheet: Option<DataFrame>,
    cashflow: Option<DataFrame>,
}

impl DocumentTables {
    /// Creates an empty set of tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table for a kind, if any documents parsed.
    #[must_use]
    pub fn get(&self, kind: DocumentKind) -> Option<&DataFrame> {
        match kind {
            DocumentKind::Stock => self.stock.as_ref(),
            DocumentKind::IncomeStatement => self.income_statement.as_ref(),
            DocumentKind::BalanceSheet => self.balance_sheet.as_ref(),
            DocumentKind::Cashflow => self.cashflow.as_ref(),
        }
    }

    /// Sets the table for a kind.
    pub fn insert(&mut self, kind: DocumentKind, table: DataFrame) {
        let slot = match kind {
            DocumentKind::Stock => &mut self.stock,
            DocumentKind::IncomeStatement => &mut self.income_statement,
            DocumentKind::BalanceSheet => &mut self.balance_sheet,
            DocumentKind::Cashflow => &mut self.cashflow,
        };
        *slot = Some(table);
    }

    /// Removes and returns the stock table.
    pub fn take_stock(&mut self) -> Option<DataFrame> {
        self.stock.take()
    }

    /// Returns the statement tables present, in join order.
    #[must_use]
    pub fn statement_tables(&self) -> Vec<(DocumentKind, &DataFrame)> {
        DocumentKind::STATEMENTS
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|df| (kind, df)))
            .collect()
    }

    /// Returns true if no kind has a table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        DocumentKind::ALL.into_iter().all(|k| self.get(k).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_uppercases() {
        assert_eq!(Symbol::new("aapl").as_str(), "AAPL");
    }

    #[test]
    fn test_namespace_validation() {
        assert!(Namespace::new("tech_2024").is_ok());
        assert!(Namespace::new("_private").is_ok());
        assert!(Namespace::new("2024_tech").is_err());
        assert!(Namespace::new("tech-2024").is_err());
        assert!(Namespace::new("tech; DROP TABLE x").is_err());
        assert!(Namespace::new("").is_err());
    }

    #[test]
    fn test_namespace_table_names() {
        let ns = Namespace::new("tech").unwrap();
        assert_eq!(ns.table("stocks"), "tech_stocks");
        assert_eq!(ns.table("profitability"), "tech_profitability");
    }

    #[test]
    fn test_expand_all() {
        let kinds = DocumentKind::expand_requests(&["all"]).unwrap();
        assert_eq!(kinds, DocumentKind::ALL.to_vec());
    }

    #[test]
    fn test_expand_statements() {
        let kinds = DocumentKind::expand_requests(&["statements"]).unwrap();
        assert_eq!(kinds, DocumentKind::STATEMENTS.to_vec());
    }

    #[test]
    fn test_expand_dedups_preserving_order() {
        let kinds = DocumentKind::expand_requests(&["cashflow", "all"]).unwrap();
        assert_eq!(kinds[0], DocumentKind::Cashflow);
        assert_eq!(kinds.len(), 4);
    }

    #[test]
    fn test_expand_rejects_unknown() {
        assert!(DocumentKind::expand_requests(&["dividends"]).is_err());
    }

    #[test]
    fn test_stock_query_requires_both_bounds() {
        let mut params = QueryParams {
            from: Some(chrono::NaiveDate::from_ymd_opt(2022, 5, 1).unwrap()),
            ..Default::default()
        };
        assert_eq!(params.stock_query(), "");

        params.to = Some(chrono::NaiveDate::from_ymd_opt(2023, 5, 1).unwrap());
        assert_eq!(params.stock_query(), "from=2022-05-01&to=2023-05-01&");
    }

    #[test]
    fn test_statement_query_defaults() {
        let params = QueryParams::default();
        assert_eq!(params.statement_query(), "period=annual&limit=1&");

        let params = QueryParams {
            period: Some(PeriodType::Quarter),
            limit: Some(4),
            ..Default::default()
        };
        assert_eq!(params.statement_query(), "period=quarter&limit=4&");
    }

    #[test]
    fn test_raw_batch_accumulation() {
        let mut batch = RawBatch::new();
        assert!(batch.is_empty());

        batch.push(RawDocument::new(
            Symbol::new("AAPL"),
            DocumentKind::Stock,
            serde_json::json!({}),
        ));
        batch.push(RawDocument::new(
            Symbol::new("MSFT"),
            DocumentKind::Stock,
            serde_json::json!({}),
        ));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.documents(DocumentKind::Stock).len(), 2);
        assert!(batch.documents(DocumentKind::Cashflow).is_empty());
        assert_eq!(batch.kinds(), vec![DocumentKind::Stock]);
    }
}
