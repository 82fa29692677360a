//! Filesystem store for raw JSON artifacts.
//!
//! One artifact per (namespace, symbol, document kind), optionally suffixed
//! with the run timestamp:
//! `<data_dir>/raw/<namespace>/<symbol>/<symbol>_<kind>[_<timestamp>].json`.
//! Payloads are immutable once written; re-running a non-timestamped fetch
//! overwrites them.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use etl_core::{DocumentKind, EtlError, Namespace, RawBatch, RawDocument, Result, Symbol};

/// Store for raw fetched payloads.
#[derive(Clone, Debug)]
pub struct RawStore {
    root: PathBuf,
}

impl RawStore {
    /// Creates a store rooted at the given data directory.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
        }
    }

    fn document_path(
        &self,
        namespace: &Namespace,
        symbol: &Symbol,
        kind: DocumentKind,
        timestamp: Option<&str>,
    ) -> PathBuf {
        let file = match timestamp {
            Some(ts) => format!("{symbol}_{kind}_{ts}.json"),
            None => format!("{symbol}_{kind}.json"),
        };
        self.root
            .join("raw")
            .join(namespace.as_str())
            .join(symbol.as_str())
            .join(file)
    }

    /// Persists every document of a batch, one file per (symbol, kind).
    ///
    /// Returns the number of artifacts written.
    ///
    /// # Errors
    /// Returns [`EtlError::Store`] on a filesystem failure.
    pub fn save(
        &self,
        namespace: &Namespace,
        batch: &RawBatch,
        timestamp: Option<&str>,
    ) -> Result<usize> {
        let mut written = 0;
        for kind in batch.kinds() {
            for document in batch.documents(kind) {
                let path = self.document_path(namespace, &document.symbol, kind, timestamp);
                write_json(&path, &document.payload)?;
                info!(
                    namespace = %namespace,
                    symbol = %document.symbol,
                    kind = %kind,
                    path = %path.display(),
                    "saved raw document"
                );
                written += 1;
            }
        }
        Ok(written)
    }

    /// Loads the artifacts for the requested (kind, symbol) pairs.
    ///
    /// Missing files are warned about and skipped; a kind where nothing loads
    /// is dropped from the batch with a warning.
    ///
    /// # Errors
    /// Returns [`EtlError::Store`] only when an existing file cannot be read
    /// or parsed.
    pub fn load(
        &self,
        namespace: &Namespace,
        kinds: &[DocumentKind],
        symbols: &[Symbol],
        timestamp: Option<&str>,
    ) -> Result<RawBatch> {
        let mut batch = RawBatch::new();
        for &kind in kinds {
            let mut loaded = 0;
            for symbol in symbols {
                let path = self.document_path(namespace, symbol, kind, timestamp);
                if !path.exists() {
                    warn!(path = %path.display(), "file not found");
                    continue;
                }
                let payload = read_json(&path)?;
                if payload.is_null() {
                    warn!(symbol = %symbol, kind = %kind, "empty payload, skipping");
                    continue;
                }
                batch.push(RawDocument::new(symbol.clone(), kind, payload));
                loaded += 1;
            }
            if loaded == 0 {
                warn!(kind = %kind, "no documents found for any symbol, skipping kind");
            }
        }
        Ok(batch)
    }
}

fn write_json(path: &Path, payload: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| EtlError::Store(format!("create {}: {e}", parent.display())))?;
    }
    let text = serde_json::to_string_pretty(payload)
        .map_err(|e| EtlError::Store(format!("serialize {}: {e}", path.display())))?;
    fs::write(path, text).map_err(|e| EtlError::Store(format!("write {}: {e}", path.display())))
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .map_err(|e| EtlError::Store(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| EtlError::Store(format!("parse {}: {e}", path.display())))
}
