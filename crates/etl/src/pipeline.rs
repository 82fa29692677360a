//! The sequential extract, transform and load phases.
//!
//! One invocation processes one batch of symbols: build URLs, fetch, persist
//! raw JSON, normalize to per-kind tables, reshape, load into the relational
//! store, materialize indicators, and export flat files. Everything runs
//! sequentially in-process.
//!
//! There is no transaction spanning the phases: a failure partway through
//! leaves the tables loaded so far in place (the stocks table in particular
//! survives a later statements-phase failure), which is acceptable for this
//! batch-rerun model. Indicator computation aborts if its source table
//! failed to load.

use std::sync::Arc;

use polars::prelude::DataFrame;
use tracing::{info, warn};

use etl_core::indicators::IndicatorFamily;
use etl_core::{
    DocumentKind, RawBatch, Result, TableStore, WriteMode, long_format, melt_frames,
    parse_to_tables, wide_format,
};
use etl_fmp::{FmpClient, UrlTemplates, build_urls};
use etl_store::{ProcessedExporter, RawStore, SqliteStore, create_indicators};

use crate::config::RunConfig;

/// The assembled pipeline: fetch client, stores and exporter.
pub struct Pipeline {
    client: FmpClient,
    templates: UrlTemplates,
    raw: RawStore,
    store: Arc<dyn TableStore>,
    exporter: ProcessedExporter,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("client", &self.client)
            .field("raw", &self.raw)
            .finish()
    }
}

impl Pipeline {
    /// Assembles a pipeline from a run configuration, opening the SQLite
    /// store at the configured path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub fn new(config: &RunConfig) -> Result<Self> {
        let store = SqliteStore::new(&config.db_path)?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Assembles a pipeline around an existing table store.
    #[must_use]
    pub fn with_store(config: &RunConfig, store: Arc<dyn TableStore>) -> Self {
        Self {
            client: FmpClient::new(),
            templates: UrlTemplates::default(),
            raw: RawStore::new(&config.data_dir),
            store,
            exporter: ProcessedExporter::new(&config.data_dir),
        }
    }

    /// Fetches the requested (kind, symbol) pairs and persists the raw JSON.
    ///
    /// Failed cells are absent from the returned batch; raw persistence is
    /// skipped when the run's namespace is `none`.
    ///
    /// # Errors
    /// Returns [`etl_core::EtlError::Config`] for an unbuildable request set
    /// and [`etl_core::EtlError::Store`] when raw persistence fails.
    pub async fn extract(&self, config: &RunConfig, api_key: &str) -> Result<RawBatch> {
        let urls = build_urls(
            api_key,
            &config.kinds,
            &config.symbols,
            &config.queries,
            &self.templates,
        )?;
        let batch = self.client.fetch_batch(&urls).await;

        if config.persist_raw {
            let written = self
                .raw
                .save(&config.namespace, &batch, config.timestamp.as_deref())?;
            info!(namespace = %config.namespace, written, "raw documents persisted");
        }
        Ok(batch)
    }

    /// Loads a previously persisted raw batch from disk.
    ///
    /// # Errors
    /// Returns [`etl_core::EtlError::Store`] when an existing artifact cannot
    /// be read.
    pub fn load_raw(&self, config: &RunConfig) -> Result<RawBatch> {
        self.raw.load(
            &config.namespace,
            &config.kinds,
            &config.symbols,
            config.timestamp.as_deref(),
        )
    }

    /// Normalizes, reshapes and loads one raw batch.
    ///
    /// The stocks table loads first; the statements phase then loads the wide
    /// table, materializes the indicator families, reads them back into the
    /// tidy indicators table, loads the tidy statements, and finally drops
    /// the wide and per-family tables - the long format replaces the wide
    /// one in the store.
    ///
    /// # Errors
    /// Propagates normalization, reshape and store failures. A missing
    /// statement kind surfaces as [`etl_core::EtlError::MissingKind`] when
    /// statements were requested.
    pub async fn transform_load(&self, config: &RunConfig, batch: &RawBatch) -> Result<()> {
        info!("parsing raw documents to tables");
        let mut tables = parse_to_tables(batch)?;

        let namespace = &config.namespace;
        let timestamp = config.timestamp.as_deref();
        let mode = if timestamp.is_some() {
            WriteMode::Append
        } else {
            WriteMode::Replace
        };

        if let Some(stocks) = tables.take_stock() {
            if stocks.height() > 0 {
                let table = namespace.table("stocks");
                self.store.load_table(&table, &stocks, mode).await?;
                info!(table = %table, rows = stocks.height(), "stock table loaded");
                self.exporter.export(namespace, "stocks", &stocks, timestamp)?;
            }
        } else if config.kinds.contains(&DocumentKind::Stock) {
            warn!("stock data was requested but nothing parsed");
        }

        if !config.statements_requested() {
            info!("no statement kinds requested, skipping statements phase");
            return Ok(());
        }

        let wide = wide_format(&tables)?;
        let tidy = long_format(&tables)?;

        let statements_table = namespace.table("statements");
        self.store.load_table(&statements_table, &wide, mode).await?;
        info!(table = %statements_table, rows = wide.height(), "wide statements loaded");

        info!("computing statement indicators in SQL");
        create_indicators(self.store.as_ref(), namespace, timestamp.is_some()).await?;

        let mut families: Vec<(&str, DataFrame)> = Vec::with_capacity(IndicatorFamily::ALL.len());
        for family in IndicatorFamily::ALL {
            let frame = self.store.read_table(&namespace.table(family.as_str())).await?;
            families.push((family.as_str(), frame));
        }
        let named: Vec<(&str, &DataFrame)> =
            families.iter().map(|(name, frame)| (*name, frame)).collect();
        let tidy_indicators = melt_frames(&named)?;
        self.exporter
            .export(namespace, "indicators", &tidy_indicators, timestamp)?;

        let indicators_table = namespace.table("indicators");
        self.store
            .load_table(&indicators_table, &tidy_indicators, mode)
            .await?;
        info!(table = %indicators_table, rows = tidy_indicators.height(), "tidy indicators loaded");

        let tidy_table = namespace.table("tidy");
        self.store.load_table(&tidy_table, &tidy, mode).await?;
        info!(table = %tidy_table, rows = tidy.height(), "tidy statements loaded");
        self.exporter.export(namespace, "tidy", &tidy, timestamp)?;

        // Long format replaces wide format in the store
        info!("dropping wide tables");
        for family in IndicatorFamily::ALL {
            self.store
                .drop_table(&namespace.table(family.as_str()))
                .await?;
        }
        self.store.drop_table(&statements_table).await?;

        info!(namespace = %namespace, "transformations completed");
        Ok(())
    }

    /// Runs the full pipeline: extract, then transform and load.
    ///
    /// # Errors
    /// Propagates the first phase failure.
    pub async fn run(&self, config: &RunConfig, api_key: &str) -> Result<()> {
        let batch = self.extract(config, api_key).await?;
        self.transform_load(config, &batch).await
    }
}
