//! Barload Core — chunked ingestion of daily OHLCV bars into SQLite.
//!
//! The pipeline has three stages, consumed leaf-first:
//! - Range planner: splits a `[start, end]` date interval into consecutive,
//!   non-overlapping chunks ([`plan`])
//! - Fetcher: retrieves one chunk from a primary provider, with a CSV
//!   fallback path, retry-with-backoff, and rate-limit pacing
//!   ([`provider`], [`yahoo`], [`csv_download`], [`retry`], [`fetch`])
//! - Normalizer & writer: maps provider column layouts onto the canonical
//!   row shape, dedupes by date, and upserts into the table
//!   ([`normalize`], [`store`])
//!
//! [`ingest::run_ingest`] wires the stages together: one fetch per chunk,
//! each chunk written before the next is requested, with an inter-chunk
//! pause to stay inside provider rate limits.

pub mod csv_download;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod normalize;
pub mod plan;
pub mod provider;
pub mod retry;
pub mod store;
pub mod yahoo;

pub use csv_download::CsvDownloadProvider;
pub use error::IngestError;
pub use ingest::{
    run_ingest, IngestConfig, IngestJob, IngestProgress, IngestSummary, SilentProgress,
    StdoutProgress,
};
pub use normalize::{normalize, PriceRow};
pub use plan::{plan_chunks, ChunkPlan, DateRange};
pub use provider::{BarProvider, FetchFailure, RawFrame};
pub use retry::RetryPolicy;
pub use store::PriceStore;
pub use yahoo::YahooChartProvider;
