//! Command-line entrypoint for the fundamentals ETL pipeline.
//!
//! A run is described either by a YAML manifest (`--config run.yaml`) or by
//! manual flags (`--manual --symbols AAPL MSFT --requests all --save-to tech`).
//! The three subcommands mirror the pipeline phases: `extract` fetches and
//! persists raw JSON, `transform` reshapes and loads a persisted batch, and
//! `run` does both in sequence.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use etl::{Pipeline, RunConfig, fetch_api_key};
use etl_core::{EtlError, PeriodType, QueryParams, Result};

#[derive(Debug, Parser)]
#[command(name = "etl", about = "Fetch, reshape and load financial statement data")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch raw JSON from the API and persist it.
    Extract(RunArgs),
    /// Reshape a persisted raw batch and load it into the store.
    Transform(RunArgs),
    /// Extract, then transform and load.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Path to a YAML manifest describing the run.
    #[arg(long, conflicts_with = "manual")]
    config: Option<PathBuf>,

    /// Take the run description from the flags below instead of a manifest.
    #[arg(long)]
    manual: bool,

    /// Ticker symbols, e.g. AAPL MSFT GOOGL.
    #[arg(long, num_args = 1..)]
    symbols: Vec<String>,

    /// Document kinds: stock, income_statement, balance_sheet, cashflow,
    /// statements or all.
    #[arg(long, num_args = 1..)]
    requests: Vec<String>,

    /// Start of the stock history range (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,

    /// End of the stock history range (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Statement period: annual or quarter.
    #[arg(long)]
    period: Option<PeriodType>,

    /// Number of statement periods to fetch.
    #[arg(long)]
    limit: Option<u32>,

    /// Destination namespace (folder and SQL table prefix); `none` skips raw
    /// persistence.
    #[arg(long)]
    save_to: Option<String>,

    /// Stamp artifacts with the run time and append instead of replacing.
    #[arg(long)]
    timestamp: bool,
}

impl RunArgs {
    fn resolve(self) -> Result<RunConfig> {
        if let Some(path) = self.config {
            return RunConfig::from_manifest(path);
        }
        if !self.manual {
            return Err(EtlError::Config(
                "either --config or --manual is required".to_string(),
            ));
        }
        let save_to = self.save_to.ok_or_else(|| {
            EtlError::Config("--manual requires --symbols, --requests and --save-to".to_string())
        })?;
        let queries = QueryParams {
            from: self.from,
            to: self.to,
            period: self.period,
            limit: self.limit,
        };
        RunConfig::from_parts(&self.symbols, &self.requests, queries, &save_to, self.timestamp)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Extract(args) => {
            let config = args.resolve()?;
            let api_key = fetch_api_key()?;
            let pipeline = Pipeline::new(&config)?;
            let batch = pipeline.extract(&config, &api_key).await?;
            info!(documents = batch.len(), "data fetched successfully");
        }
        Command::Transform(args) => {
            let config = args.resolve()?;
            let pipeline = Pipeline::new(&config)?;
            let batch = pipeline.load_raw(&config)?;
            pipeline.transform_load(&config, &batch).await?;
            info!("data transformed successfully");
        }
        Command::Run(args) => {
            let config = args.resolve()?;
            let api_key = fetch_api_key()?;
            let pipeline = Pipeline::new(&config)?;
            pipeline.run(&config, &api_key).await?;
            info!("pipeline completed successfully");
        }
    }
    Ok(())
}
