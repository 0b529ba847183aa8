//! Barload CLI — daily OHLCV ingestion into SQLite.
//!
//! Commands:
//! - `ingest` — fetch a symbol's daily bars chunk by chunk and upsert them
//!   into the table (full backfill or `--incremental` top-up)
//! - `status` — report the table's row count and stored date span
//!
//! A scheduler invoking `barload ingest --incremental` on a daily cadence
//! keeps the table current; the pipeline itself holds no state between
//! runs beyond the table's maximum stored date.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use barload_core::{
    run_ingest, CsvDownloadProvider, IngestConfig, IngestJob, PriceStore, RetryPolicy,
    StdoutProgress, YahooChartProvider,
};

#[derive(Parser)]
#[command(name = "barload", about = "Barload CLI — daily OHLCV ingestion into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch daily bars for one symbol and upsert them into the table.
    Ingest {
        /// Ticker symbol to ingest (e.g. SPY).
        #[arg(long)]
        symbol: String,

        /// Start date (YYYY-MM-DD). Optional with --incremental when the
        /// table already has rows.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// SQLite database file.
        #[arg(long, default_value = "bars.db")]
        db: PathBuf,

        /// Destination table.
        #[arg(long, default_value = "daily_bars")]
        table: String,

        /// Days per fetch chunk.
        #[arg(long, default_value_t = 30)]
        chunk_days: u32,

        /// Seconds to pause between chunk fetches.
        #[arg(long, default_value_t = 1.0)]
        pause: f64,

        /// Retry attempts per retrieval path.
        #[arg(long, default_value_t = 5)]
        max_retries: u32,

        /// Derive the start date from the latest date already stored.
        #[arg(long, default_value_t = false)]
        incremental: bool,

        /// Print the run summary as JSON instead of plain text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Report the table's row count and stored date span.
    Status {
        /// SQLite database file.
        #[arg(long, default_value = "bars.db")]
        db: PathBuf,

        /// Table to inspect.
        #[arg(long, default_value = "daily_bars")]
        table: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            symbol,
            start,
            end,
            db,
            table,
            chunk_days,
            pause,
            max_retries,
            incremental,
            json,
        } => run_ingest_cmd(
            symbol,
            start,
            end,
            db,
            table,
            chunk_days,
            pause,
            max_retries,
            incremental,
            json,
        ),
        Commands::Status { db, table } => run_status_cmd(db, table),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_ingest_cmd(
    symbol: String,
    start: Option<String>,
    end: Option<String>,
    db: PathBuf,
    table: String,
    chunk_days: u32,
    pause: f64,
    max_retries: u32,
    incremental: bool,
    json: bool,
) -> Result<()> {
    let start = start
        .as_deref()
        .map(parse_date)
        .transpose()
        .context("invalid --start")?;
    let end = end
        .as_deref()
        .map(parse_date)
        .transpose()
        .context("invalid --end")?
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let job = IngestJob {
        symbol,
        start,
        end,
        incremental,
    };
    let cfg = IngestConfig {
        chunk_days,
        pause: Duration::from_secs_f64(pause.max(0.0)),
        retry: RetryPolicy {
            max_attempts: max_retries,
            ..RetryPolicy::default()
        },
    };

    let primary = YahooChartProvider::new().context("building primary provider")?;
    let fallback = CsvDownloadProvider::new().context("building fallback provider")?;
    let mut store = PriceStore::open(&db, &table)
        .with_context(|| format!("opening {}", db.display()))?;

    let summary = run_ingest(
        &job,
        &cfg,
        &primary,
        Some(&fallback),
        &mut store,
        &StdoutProgress,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn run_status_cmd(db: PathBuf, table: String) -> Result<()> {
    if !db.exists() {
        println!("Database does not exist: {}", db.display());
        return Ok(());
    }

    let store =
        PriceStore::open(&db, &table).with_context(|| format!("opening {}", db.display()))?;
    let rows = store.row_count()?;

    println!("Database: {}", db.display());
    println!("Table:    {}", store.table());
    println!("Rows:     {rows}");
    match store.date_span()? {
        Some((min, max)) => println!("Dates:    {min} to {max}"),
        None => println!("Dates:    (empty)"),
    }
    Ok(())
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("expected YYYY-MM-DD, got {text:?}"))
}
