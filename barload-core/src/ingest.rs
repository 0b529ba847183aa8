//! The ingestion pipeline: plan → fetch → normalize → upsert, one chunk
//! at a time.
//!
//! Chunks are processed sequentially with an inter-chunk pause, a
//! deliberate choice to stay inside provider rate limits. Each chunk's
//! upsert commits on its own, so a failed or killed run leaves the table
//! valid and an incremental rerun picks up the missing trailing dates.

use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::IngestError;
use crate::fetch::fetch_chunk;
use crate::normalize::normalize;
use crate::plan::{plan_chunks, DateRange};
use crate::provider::BarProvider;
use crate::retry::RetryPolicy;
use crate::store::PriceStore;

/// Tunables for one run. An explicit structure passed into the entry
/// point, not ambient state, so runs are reproducible in isolation.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Days per fetch chunk.
    pub chunk_days: u32,
    /// Pause between chunk fetches.
    pub pause: Duration,
    /// Retry policy applied to each retrieval path.
    pub retry: RetryPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_days: 30,
            pause: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}

/// What to ingest.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub symbol: String,
    /// Explicit range start. Optional in incremental mode when the table
    /// already has rows.
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
    /// Derive the start date from the table's maximum stored date.
    pub incremental: bool,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub symbol: String,
    /// Resolved start date. May lie past `end`, in which case the run was
    /// an empty-plan no-op.
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub chunks_planned: usize,
    pub chunks_fetched: usize,
    pub rows_written: usize,
}

/// Per-chunk progress callbacks.
pub trait IngestProgress {
    fn on_chunk_start(&self, symbol: &str, range: DateRange, index: usize, total: usize);
    fn on_chunk_complete(&self, symbol: &str, range: DateRange, rows_written: usize);
    fn on_run_complete(&self, summary: &IngestSummary);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl IngestProgress for StdoutProgress {
    fn on_chunk_start(&self, symbol: &str, range: DateRange, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol} {range}...", index + 1, total);
    }

    fn on_chunk_complete(&self, _symbol: &str, _range: DateRange, rows_written: usize) {
        if rows_written == 0 {
            println!("  no rows in this chunk");
        } else {
            println!("  upserted {rows_written} rows");
        }
    }

    fn on_run_complete(&self, summary: &IngestSummary) {
        println!(
            "Ingestion complete: {} rows across {}/{} chunks for {}.",
            summary.rows_written, summary.chunks_fetched, summary.chunks_planned, summary.symbol
        );
    }
}

/// No-op reporter, for embedding and tests.
pub struct SilentProgress;

impl IngestProgress for SilentProgress {
    fn on_chunk_start(&self, _: &str, _: DateRange, _: usize, _: usize) {}
    fn on_chunk_complete(&self, _: &str, _: DateRange, _: usize) {}
    fn on_run_complete(&self, _: &IngestSummary) {}
}

/// Run one ingestion job end to end.
///
/// The incremental start date is resolved before anything else, so a
/// misconfigured run fails before a single network call. A `Fetch` error
/// aborts the run; chunks already upserted stay committed.
pub fn run_ingest(
    job: &IngestJob,
    cfg: &IngestConfig,
    primary: &dyn BarProvider,
    fallback: Option<&dyn BarProvider>,
    store: &mut PriceStore,
    progress: &dyn IngestProgress,
) -> Result<IngestSummary, IngestError> {
    if job.symbol.trim().is_empty() {
        return Err(IngestError::Config("symbol must be non-empty".into()));
    }

    let start = resolve_start(job, store)?;
    let plan = plan_chunks(start, job.end, cfg.chunk_days)?;
    let total = plan.len();

    let mut summary = IngestSummary {
        symbol: job.symbol.clone(),
        start,
        end: job.end,
        chunks_planned: total,
        chunks_fetched: 0,
        rows_written: 0,
    };

    for (index, range) in plan.enumerate() {
        progress.on_chunk_start(&job.symbol, range, index, total);

        let frame = fetch_chunk(&job.symbol, range, primary, fallback, &cfg.retry)?;
        let rows = normalize(&frame)?;
        let written = store.upsert(&rows)?;

        summary.chunks_fetched += 1;
        summary.rows_written += written;
        progress.on_chunk_complete(&job.symbol, range, written);

        if !cfg.pause.is_zero() {
            thread::sleep(cfg.pause);
        }
    }

    progress.on_run_complete(&summary);
    Ok(summary)
}

/// Effective start date for the run.
///
/// Incremental mode reads the table's maximum stored date and starts the
/// next calendar day; the explicit start only applies when the table is
/// empty. A non-incremental run requires an explicit start.
fn resolve_start(job: &IngestJob, store: &PriceStore) -> Result<NaiveDate, IngestError> {
    if job.incremental {
        if let Some(max) = store.max_date()? {
            return Ok(max + chrono::Duration::days(1));
        }
    }

    job.start.ok_or_else(|| {
        if job.incremental {
            IngestError::Config(
                "incremental mode requires an explicit start date when the table is empty".into(),
            )
        } else {
            IngestError::Config("start date is required".into())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::PriceRow;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seeded_store(last: NaiveDate) -> PriceStore {
        let mut store = PriceStore::open_in_memory("daily_bars").unwrap();
        store
            .upsert(&[PriceRow {
                date: last,
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                adj_close: 1.4,
                volume: 100,
            }])
            .unwrap();
        store
    }

    #[test]
    fn incremental_start_is_day_after_max() {
        let store = seeded_store(d(2022, 3, 1));
        let job = IngestJob {
            symbol: "SPY".into(),
            start: None,
            end: d(2022, 3, 15),
            incremental: true,
        };
        assert_eq!(resolve_start(&job, &store).unwrap(), d(2022, 3, 2));
    }

    #[test]
    fn incremental_ignores_explicit_start_when_table_has_rows() {
        let store = seeded_store(d(2022, 3, 1));
        let job = IngestJob {
            symbol: "SPY".into(),
            start: Some(d(2020, 1, 1)),
            end: d(2022, 3, 15),
            incremental: true,
        };
        assert_eq!(resolve_start(&job, &store).unwrap(), d(2022, 3, 2));
    }

    #[test]
    fn incremental_empty_table_without_start_is_config_error() {
        let store = PriceStore::open_in_memory("daily_bars").unwrap();
        let job = IngestJob {
            symbol: "SPY".into(),
            start: None,
            end: d(2022, 3, 15),
            incremental: true,
        };
        assert!(matches!(
            resolve_start(&job, &store),
            Err(IngestError::Config(_))
        ));
    }

    #[test]
    fn incremental_empty_table_uses_explicit_start() {
        let store = PriceStore::open_in_memory("daily_bars").unwrap();
        let job = IngestJob {
            symbol: "SPY".into(),
            start: Some(d(2022, 1, 1)),
            end: d(2022, 3, 15),
            incremental: true,
        };
        assert_eq!(resolve_start(&job, &store).unwrap(), d(2022, 1, 1));
    }

    #[test]
    fn full_run_without_start_is_config_error() {
        let store = PriceStore::open_in_memory("daily_bars").unwrap();
        let job = IngestJob {
            symbol: "SPY".into(),
            start: None,
            end: d(2022, 3, 15),
            incremental: false,
        };
        assert!(matches!(
            resolve_start(&job, &store),
            Err(IngestError::Config(_))
        ));
    }
}
