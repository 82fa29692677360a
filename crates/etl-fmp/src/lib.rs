#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/finlake/etl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Financial Modeling Prep (FMP) boundary.
//!
//! This crate turns a requested set of (document kind, symbol) pairs into
//! fully-formed request URLs and fetches them into a
//! [`RawBatch`](etl_core::RawBatch).
//!
//! # Usage
//!
//! ```rust,ignore
//! use etl_fmp::{FmpClient, UrlTemplates, build_urls};
//! use etl_core::{DocumentKind, QueryParams, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> etl_core::Result<()> {
//!     let templates = UrlTemplates::default();
//!     let urls = build_urls(
//!         "your_api_key",
//!         &DocumentKind::ALL,
//!         &[Symbol::new("AAPL")],
//!         &QueryParams::default(),
//!         &templates,
//!     )?;
//!
//!     let client = FmpClient::new();
//!     let batch = client.fetch_batch(&urls).await;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use etl_core::{DocumentKind, EtlError, QueryParams, RawBatch, RawDocument, Result, Symbol};

/// Per-request network timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Built URLs, one per requested (document kind, symbol) pair.
pub type UrlMap = HashMap<DocumentKind, HashMap<Symbol, String>>;

/// Mapping from document kind to its endpoint URL template.
///
/// Templates contain `{symbol}` and `{query}` placeholders and end with
/// `apikey=` so the key is appended as the last query component.
#[derive(Clone, Debug)]
pub struct UrlTemplates {
    templates: HashMap<DocumentKind, String>,
}

impl Default for UrlTemplates {
    fn default() -> Self {
        let base = "https://financialmodelingprep.com/api/v3";
        let templates = HashMap::from([
            (
                DocumentKind::Stock,
                format!("{base}/historical-price-full/{{symbol}}?{{query}}apikey="),
            ),
            (
                DocumentKind::IncomeStatement,
                format!("{base}/income-statement/{{symbol}}?{{query}}apikey="),
            ),
            (
                DocumentKind::BalanceSheet,
                format!("{base}/balance-sheet-statement/{{symbol}}?{{query}}apikey="),
            ),
            (
                DocumentKind::Cashflow,
                format!("{base}/cash-flow-statement/{{symbol}}?{{query}}apikey="),
            ),
        ]);
        Self { templates }
    }
}

impl UrlTemplates {
    /// Loads a kind-to-template mapping from a JSON file.
    ///
    /// # Errors
    /// Returns [`EtlError::Config`] if the file cannot be read, is not a JSON
    /// object of strings, or names an unknown document kind.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("failed to read endpoints file {}: {e}", path.display()))
        })?;
        let mapping: HashMap<String, String> = serde_json::from_str(&text).map_err(|e| {
            EtlError::Config(format!("invalid endpoints file {}: {e}", path.display()))
        })?;

        let mut templates = HashMap::with_capacity(mapping.len());
        for (kind, template) in mapping {
            templates.insert(kind.parse::<DocumentKind>()?, template);
        }
        Ok(Self { templates })
    }

    /// Returns the template for a kind.
    ///
    /// # Errors
    /// Returns [`EtlError::Config`] for a kind with no template, since that
    /// indicates a configuration problem upstream.
    pub fn get(&self, kind: DocumentKind) -> Result<&str> {
        self.templates
            .get(&kind)
            .map(String::as_str)
            .ok_or_else(|| EtlError::Config(format!("no endpoint template for kind '{kind}'")))
    }
}

/// Builds one request URL per (document kind, symbol) pair.
///
/// The query string depends on the kind: `stock` carries `from`/`to` bounds
/// only when both are supplied, statement kinds always carry
/// `period`/`limit` with defaults. The API key is appended last.
///
/// A pair whose template cannot be formatted is logged and omitted; an
/// unknown requested kind aborts with a configuration error.
///
/// # Errors
/// Returns [`EtlError::Config`] when a requested kind has no template.
pub fn build_urls(
    api_key: &str,
    kinds: &[DocumentKind],
    symbols: &[Symbol],
    queries: &QueryParams,
    templates: &UrlTemplates,
) -> Result<UrlMap> {
    let stock_query = queries.stock_query();
    let statement_query = queries.statement_query();

    let mut urls = UrlMap::new();
    for &kind in kinds {
        let template = templates.get(kind)?;
        let query = if kind == DocumentKind::Stock {
            &stock_query
        } else {
            &statement_query
        };

        let entry = urls.entry(kind).or_default();
        for symbol in symbols {
            if !template.contains("{symbol}") || !template.contains("{query}") {
                error!(
                    kind = %kind,
                    symbol = %symbol,
                    "endpoint template is missing a placeholder, skipping"
                );
                continue;
            }
            let url = format!(
                "{}{api_key}",
                template.replace("{symbol}", symbol.as_str()).replace("{query}", query)
            );
            entry.insert(symbol.clone(), url);
        }
    }
    Ok(urls)
}

/// Asynchronous FMP fetch client.
///
/// Requests run sequentially with a per-request timeout; a failed or empty
/// cell is logged and recorded as absent, never fatal for the batch.
#[derive(Clone)]
pub struct FmpClient {
    client: Client,
}

impl fmt::Debug for FmpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FmpClient").finish()
    }
}

impl Default for FmpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FmpClient {
    /// Creates a new client with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// Creates a client around a custom HTTP client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetches one URL and parses the JSON body.
    ///
    /// # Errors
    /// Returns [`EtlError::Fetch`] on network failure, a non-success status,
    /// an FMP error body, or an empty payload.
    pub async fn fetch_json(&self, symbol: &Symbol, kind: DocumentKind, url: &str) -> Result<Value> {
        let fetch_err = |message: String| EtlError::Fetch {
            symbol: symbol.to_string(),
            kind: kind.to_string(),
            message,
        };

        debug!(kind = %kind, symbol = %symbol, "FMP request");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(fetch_err(format!("HTTP {status}: {text}")));
        }

        let text = response.text().await.map_err(|e| fetch_err(e.to_string()))?;

        // Check for FMP error responses
        if text.contains("\"Error Message\"") || text.contains("\"error\"") {
            return Err(fetch_err(text));
        }

        let payload: Value =
            serde_json::from_str(&text).map_err(|e| fetch_err(format!("invalid JSON: {e}")))?;
        if payload.is_null()
            || payload.as_array().is_some_and(Vec::is_empty)
            || payload.as_object().is_some_and(serde_json::Map::is_empty)
        {
            return Err(fetch_err("empty payload".to_string()));
        }
        Ok(payload)
    }

    /// Fetches every built URL sequentially into a raw batch.
    ///
    /// Failed cells are logged with their (kind, symbol) context and left out
    /// of the batch.
    pub async fn fetch_batch(&self, urls: &UrlMap) -> RawBatch {
        let mut batch = RawBatch::new();
        for kind in DocumentKind::ALL {
            let Some(symbols) = urls.get(&kind) else {
                continue;
            };
            for (symbol, url) in symbols {
                match self.fetch_json(symbol, kind, url).await {
                    Ok(payload) => {
                        info!(kind = %kind, symbol = %symbol, "fetched");
                        batch.push(RawDocument::new(symbol.clone(), kind, payload));
                    }
                    Err(e) => {
                        warn!(kind = %kind, symbol = %symbol, error = %e, "fetch failed, cell absent");
                    }
                }
            }
        }
        if batch.is_empty() {
            warn!("no data fetched for any requested (kind, symbol) pair");
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn symbols(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|s| Symbol::new(*s)).collect()
    }

    #[test]
    fn test_stock_url_without_bounds() {
        let urls = build_urls(
            "test_key",
            &[DocumentKind::Stock],
            &symbols(&["AAPL"]),
            &QueryParams::default(),
            &UrlTemplates::default(),
        )
        .unwrap();

        let url = &urls[&DocumentKind::Stock][&Symbol::new("AAPL")];
        assert_eq!(
            url,
            "https://financialmodelingprep.com/api/v3/historical-price-full/AAPL?apikey=test_key"
        );
    }

    #[test]
    fn test_stock_url_with_both_bounds() {
        let queries = QueryParams {
            from: NaiveDate::from_ymd_opt(2022, 5, 1),
            to: NaiveDate::from_ymd_opt(2023, 5, 1),
            ..Default::default()
        };
        let urls = build_urls(
            "test_key",
            &[DocumentKind::Stock],
            &symbols(&["AAPL"]),
            &queries,
            &UrlTemplates::default(),
        )
        .unwrap();

        let url = &urls[&DocumentKind::Stock][&Symbol::new("AAPL")];
        assert!(url.contains("?from=2022-05-01&to=2023-05-01&apikey=test_key"));
    }

    #[test]
    fn test_statement_url_defaults() {
        let urls = build_urls(
            "test_key",
            &[DocumentKind::BalanceSheet],
            &symbols(&["MSFT"]),
            &QueryParams::default(),
            &UrlTemplates::default(),
        )
        .unwrap();

        let url = &urls[&DocumentKind::BalanceSheet][&Symbol::new("MSFT")];
        assert_eq!(
            url,
            "https://financialmodelingprep.com/api/v3/balance-sheet-statement/MSFT\
             ?period=annual&limit=1&apikey=test_key"
        );
    }

    #[test]
    fn test_key_is_last_component() {
        let urls = build_urls(
            "the_key",
            &DocumentKind::ALL,
            &symbols(&["AAPL"]),
            &QueryParams::default(),
            &UrlTemplates::default(),
        )
        .unwrap();
        for per_symbol in urls.values() {
            for url in per_symbol.values() {
                assert!(url.ends_with("apikey=the_key"));
            }
        }
    }

    #[test]
    fn test_unknown_kind_is_config_error() {
        let templates = UrlTemplates {
            templates: HashMap::new(),
        };
        let err = build_urls(
            "k",
            &[DocumentKind::Stock],
            &symbols(&["AAPL"]),
            &QueryParams::default(),
            &templates,
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_bad_template_omits_entry() {
        let mut templates = UrlTemplates::default();
        templates.templates.insert(
            DocumentKind::Cashflow,
            "https://example.com/no-placeholders".to_string(),
        );
        let urls = build_urls(
            "k",
            &[DocumentKind::Cashflow],
            &symbols(&["AAPL"]),
            &QueryParams::default(),
            &templates,
        )
        .unwrap();
        assert!(urls[&DocumentKind::Cashflow].is_empty());
    }
}
