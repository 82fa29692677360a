//! CSV export of processed tables.
//!
//! Flat-file exports live beside the raw artifacts:
//! `<data_dir>/processed/<namespace>/<name>[_<timestamp>].csv`.

use std::fs::{self, File};
use std::path::PathBuf;

use polars::prelude::*;
use tracing::info;

use etl_core::{EtlError, Namespace, Result};

/// Exporter for processed-data flat files.
#[derive(Clone, Debug)]
pub struct ProcessedExporter {
    root: PathBuf,
}

impl ProcessedExporter {
    /// Creates an exporter rooted at the given data directory.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
        }
    }

    /// Writes a table as CSV under the namespace's processed directory.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    /// Returns [`EtlError::Store`] on a filesystem or serialization failure.
    pub fn export(
        &self,
        namespace: &Namespace,
        name: &str,
        table: &DataFrame,
        timestamp: Option<&str>,
    ) -> Result<PathBuf> {
        let directory = self.root.join("processed").join(namespace.as_str());
        fs::create_dir_all(&directory)
            .map_err(|e| EtlError::Store(format!("create {}: {e}", directory.display())))?;

        let file_name = match timestamp {
            Some(ts) => format!("{name}_{ts}.csv"),
            None => format!("{name}.csv"),
        };
        let path = directory.join(file_name);

        let mut file = File::create(&path)
            .map_err(|e| EtlError::Store(format!("create {}: {e}", path.display())))?;
        CsvWriter::new(&mut file)
            .finish(&mut table.clone())
            .map_err(|e| EtlError::Store(format!("write {}: {e}", path.display())))?;

        info!(namespace = %namespace, path = %path.display(), rows = table.height(), "exported csv");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ProcessedExporter::new(dir.path());
        let ns = Namespace::new("tech").unwrap();

        let frame = DataFrame::new(vec![
            Column::new("date".into(), vec!["2023-01-03"]),
            Column::new("symbol".into(), vec!["AAPL"]),
            Column::new("close".into(), vec![125.07]),
        ])
        .unwrap();

        let path = exporter.export(&ns, "stocks", &frame, None).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("date,symbol,close"));
        assert!(text.contains("2023-01-03,AAPL,125.07"));
    }

    #[test]
    fn test_export_timestamp_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ProcessedExporter::new(dir.path());
        let ns = Namespace::new("tech").unwrap();

        let frame = DataFrame::new(vec![Column::new("close".into(), vec![1.0])]).unwrap();
        let path = exporter
            .export(&ns, "stocks", &frame, Some("20230103_120000"))
            .unwrap();
        assert!(path.ends_with("processed/tech/stocks_20230103_120000.csv"));
    }
}
