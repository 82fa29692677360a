//! Run configuration: manifest, request expansion, credentials.
//!
//! A run is described either by a YAML manifest or by manual CLI flags; both
//! resolve into a [`RunConfig`]. Credentials never live in the manifest -
//! the API key comes from the environment (a `.env` file is honored).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use etl_core::{DocumentKind, EtlError, Namespace, QueryParams, Result, Symbol};

/// Environment variable holding the FMP API key.
const API_KEY_VAR: &str = "FMP_API_KEY";
/// Environment variable overriding the data directory.
const DATA_DIR_VAR: &str = "ETL_DATA_DIR";
/// Environment variable overriding the database path.
const DB_PATH_VAR: &str = "ETL_DB_PATH";

/// One run described by a YAML manifest.
///
/// ```yaml
/// symbols: [AAPL, MSFT, GOOGL]
/// requests: [all]
/// queries:
///   from: 2022-05-01
///   to: 2023-05-01
///   period: quarter
///   limit: 4
/// save_to: tech
/// timestamp: false
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct Manifest {
    /// Ticker symbols to fetch.
    pub symbols: Vec<String>,
    /// Requested document kinds, including the `all`/`statements` aggregates.
    pub requests: Vec<String>,
    /// Optional query parameters.
    #[serde(default)]
    pub queries: Option<QueryParams>,
    /// Destination namespace; `none` skips raw persistence.
    pub save_to: String,
    /// Stamp artifacts and append instead of replacing tables.
    #[serde(default)]
    pub timestamp: bool,
}

/// Fully resolved configuration for one pipeline invocation.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Symbols to process.
    pub symbols: Vec<Symbol>,
    /// Concrete document kinds, aggregates expanded.
    pub kinds: Vec<DocumentKind>,
    /// Query parameters, constructed fresh per run.
    pub queries: QueryParams,
    /// Namespace prefixing every artifact and table of the run.
    pub namespace: Namespace,
    /// Whether raw JSON is persisted to disk.
    pub persist_raw: bool,
    /// Timestamp suffix for this run, when stamping was requested.
    pub timestamp: Option<String>,
    /// Root of the raw/processed data tree.
    pub data_dir: PathBuf,
    /// SQLite database path.
    pub db_path: PathBuf,
}

impl RunConfig {
    /// Loads and resolves a YAML manifest.
    ///
    /// # Errors
    /// Returns [`EtlError::Config`] if the file cannot be read or parsed, or
    /// if its contents fail validation.
    pub fn from_manifest(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str());
        if extension.is_none_or(|e| e != "yaml" && e != "yml") {
            warn!(path = %path.display(), "config file does not end with .yaml or .yml");
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("failed to read manifest {}: {e}", path.display()))
        })?;
        let manifest: Manifest = serde_yaml::from_str(&text).map_err(|e| {
            EtlError::Config(format!("invalid manifest {}: {e}", path.display()))
        })?;
        Self::from_parts(
            &manifest.symbols,
            &manifest.requests,
            manifest.queries.unwrap_or_default(),
            &manifest.save_to,
            manifest.timestamp,
        )
    }

    /// Resolves a configuration from its parts.
    ///
    /// # Errors
    /// Returns [`EtlError::Config`] when symbols or requests are empty or
    /// name an unknown kind, and [`EtlError::InvalidIdentifier`] for a bad
    /// namespace.
    pub fn from_parts(
        symbols: &[String],
        requests: &[String],
        queries: QueryParams,
        save_to: &str,
        timestamp: bool,
    ) -> Result<Self> {
        if symbols.is_empty() || requests.is_empty() {
            return Err(EtlError::Config(
                "symbols and requests arguments are required to fetch data".to_string(),
            ));
        }
        if queries == QueryParams::default() {
            warn!("no query arguments passed, fetching only the most recent data");
        }

        let kinds = DocumentKind::expand_requests(requests)?;
        let persist_raw = !save_to.eq_ignore_ascii_case("none");
        let namespace = Namespace::new(save_to.to_lowercase())?;

        let timestamp =
            timestamp.then(|| chrono::Local::now().format("%Y%m%d_%H%M%S").to_string());

        let data_dir = std::env::var(DATA_DIR_VAR)
            .map_or_else(|_| PathBuf::from("data"), PathBuf::from);
        let db_path = std::env::var(DB_PATH_VAR)
            .map_or_else(|_| data_dir.join("etl.sqlite3"), PathBuf::from);

        Ok(Self {
            symbols: symbols.iter().map(Symbol::new).collect(),
            kinds,
            queries,
            namespace,
            persist_raw,
            timestamp,
            data_dir,
            db_path,
        })
    }

    /// Returns true when any statement kind was requested.
    #[must_use]
    pub fn statements_requested(&self) -> bool {
        self.kinds.iter().any(DocumentKind::is_statement)
    }
}

/// Fetches the FMP API key from the environment.
///
/// # Errors
/// Returns [`EtlError::Config`] when the variable is unset; check your
/// `.env` file.
pub fn fetch_api_key() -> Result<String> {
    std::env::var(API_KEY_VAR).map_err(|_| {
        EtlError::Config(format!(
            "{API_KEY_VAR} not found in environment. Check your .env file"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_expands_and_uppercases() {
        let config = RunConfig::from_parts(
            &["aapl".to_string(), "msft".to_string()],
            &["all".to_string()],
            QueryParams::default(),
            "tech",
            false,
        )
        .unwrap();

        assert_eq!(config.symbols, vec![Symbol::new("AAPL"), Symbol::new("MSFT")]);
        assert_eq!(config.kinds, DocumentKind::ALL.to_vec());
        assert_eq!(config.namespace.as_str(), "tech");
        assert!(config.persist_raw);
        assert!(config.timestamp.is_none());
        assert!(config.statements_requested());
    }

    #[test]
    fn test_save_to_none_skips_raw_persistence() {
        let config = RunConfig::from_parts(
            &["AAPL".to_string()],
            &["stock".to_string()],
            QueryParams::default(),
            "None",
            false,
        )
        .unwrap();
        assert!(!config.persist_raw);
        assert!(!config.statements_requested());
    }

    #[test]
    fn test_empty_symbols_rejected() {
        let err = RunConfig::from_parts(
            &[],
            &["all".to_string()],
            QueryParams::default(),
            "tech",
            false,
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_manifest_parses_queries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        let manifest =
            "symbols: [AAPL]\nrequests: [statements]\nqueries:\n  period: quarter\n  limit: 4\nsave_to: tech\n";
        std::fs::write(&path, manifest).unwrap();

        let config = RunConfig::from_manifest(&path).unwrap();
        assert_eq!(config.kinds, DocumentKind::STATEMENTS.to_vec());
        assert_eq!(config.queries.limit, Some(4));
        assert_eq!(config.queries.statement_query(), "period=quarter&limit=4&");
    }
}
