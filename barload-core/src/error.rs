//! Error taxonomy for the ingestion pipeline.
//!
//! `Config` and `Schema` are fatal — the run aborts with a clear message.
//! `Fetch` aborts the run for the failing chunk but leaves rows already
//! upserted by earlier chunks committed; an incremental rerun picks up the
//! missing trailing dates.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Invalid or missing parameters (zero chunk size, empty table in
    /// incremental mode with no explicit start date, bad table name).
    #[error("config error: {0}")]
    Config(String),

    /// Both the primary and fallback retrieval paths exhausted their
    /// retries for one chunk.
    #[error("fetch failed for {symbol} {start} to {end}: {reason}")]
    Fetch {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
        reason: String,
    },

    /// Provider response columns could not be mapped onto the canonical
    /// `Date, Open, High, Low, Close, Adj Close, Volume` layout.
    #[error("unrecognized provider schema: {0}")]
    Schema(String),

    /// SQLite failure in the persistence layer.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}
