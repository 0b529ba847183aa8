//! Per-chunk fetch orchestration: primary path first, fallback on failure.

use crate::error::IngestError;
use crate::plan::DateRange;
use crate::provider::{BarProvider, FetchFailure, RawFrame};
use crate::retry::{fetch_with_retry, RetryPolicy};

/// Fetch one chunk, trying the primary provider and then the fallback,
/// each under the same retry policy.
///
/// `NoData` is not a retrieval failure: a provider that parsed its
/// response and found zero rows is reporting a dataless range (weekend,
/// market holiday), which resolves to an empty frame once no path can do
/// better. Exhausting both paths on real failures is a hard `Fetch` error
/// carrying the symbol and range — a chunk is never silently skipped.
pub fn fetch_chunk(
    symbol: &str,
    range: DateRange,
    primary: &dyn BarProvider,
    fallback: Option<&dyn BarProvider>,
    policy: &RetryPolicy,
) -> Result<RawFrame, IngestError> {
    let primary_err = match fetch_with_retry(primary, symbol, range, policy) {
        Ok(frame) => return Ok(frame),
        Err(e) => e,
    };

    let Some(fallback) = fallback else {
        if matches!(primary_err, FetchFailure::NoData) {
            return Ok(RawFrame::default());
        }
        return Err(IngestError::Fetch {
            symbol: symbol.to_string(),
            start: range.start,
            end: range.end,
            reason: format!("{}: {primary_err}", primary.name()),
        });
    };

    eprintln!(
        "WARNING: {} failed for {symbol} {range} ({primary_err}); falling back to {}",
        primary.name(),
        fallback.name()
    );

    match fetch_with_retry(fallback, symbol, range, policy) {
        Ok(frame) => Ok(frame),
        Err(fallback_err) => {
            // Either path saying "zero rows" is authoritative for the range.
            if matches!(primary_err, FetchFailure::NoData)
                || matches!(fallback_err, FetchFailure::NoData)
            {
                return Ok(RawFrame::default());
            }
            Err(IngestError::Fetch {
                symbol: symbol.to_string(),
                start: range.start,
                end: range.end,
                reason: format!(
                    "{}: {primary_err}; {}: {fallback_err}",
                    primary.name(),
                    fallback.name()
                ),
            })
        }
    }
}
