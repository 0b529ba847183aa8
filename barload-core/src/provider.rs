//! Provider abstraction and the raw row shape.
//!
//! The `BarProvider` trait abstracts over retrieval paths (Yahoo chart API,
//! direct CSV download) so the fetch layer can try them in order and tests
//! can substitute fakes. Providers make exactly one attempt per call; the
//! retry policy wraps implementations from outside.

use thiserror::Error;

use crate::plan::DateRange;

/// Rows exactly as the provider labelled them, before normalization.
///
/// Cells are kept as text: the CSV path is text on the wire, and the chart
/// API path is rendered to the same shape so both feed one normalizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Failure of a single retrieval attempt.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("provider returned no rows")]
    NoData,
}

impl FetchFailure {
    /// Whether another attempt against the same provider could succeed.
    ///
    /// A malformed or empty response won't change on retry; those go
    /// straight to the fallback path.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchFailure::Network(_) | FetchFailure::RateLimited { .. } => true,
            FetchFailure::Http { status } => *status == 429 || *status >= 500,
            FetchFailure::Malformed(_) | FetchFailure::NoData => false,
        }
    }
}

/// One retrieval path for daily OHLCV rows.
pub trait BarProvider {
    /// Human-readable name, used in warnings and fetch-error messages.
    fn name(&self) -> &str;

    /// Make one attempt to retrieve raw rows for `symbol` over `range`.
    fn fetch_raw(&self, symbol: &str, range: DateRange) -> Result<RawFrame, FetchFailure>;
}
