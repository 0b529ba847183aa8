//! Retry with exponential backoff around a single provider path.
//!
//! The delay before attempt n+1 is `base_delay * 2^(n-1)`, capped at
//! `max_delay`. When the provider reported its own rate-limit delay and it
//! is longer than the computed backoff, the provider's figure wins.

use std::thread;
use std::time::Duration;

use crate::plan::DateRange;
use crate::provider::{BarProvider, FetchFailure, RawFrame};

/// Bounded retry policy shared by the primary and fallback paths.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per path, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Ceiling on the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after `failed_attempts` consecutive failures (>= 1).
    pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        let doublings = failed_attempts.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(doublings));
        delay.min(self.max_delay)
    }
}

/// Run one provider path under the retry policy.
///
/// Transient failures are retried up to `max_attempts`; a non-transient
/// failure aborts immediately (it won't change on retry — the caller moves
/// on to the fallback path instead). On exhaustion the last failure is
/// returned.
pub fn fetch_with_retry(
    provider: &dyn BarProvider,
    symbol: &str,
    range: DateRange,
    policy: &RetryPolicy,
) -> Result<RawFrame, FetchFailure> {
    let mut last_failure: Option<FetchFailure> = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        if attempt > 1 {
            let mut delay = policy.backoff_delay(attempt - 1);
            if let Some(FetchFailure::RateLimited { retry_after_secs }) = &last_failure {
                delay = delay.max(Duration::from_secs(*retry_after_secs));
            }
            thread::sleep(delay);
        }

        match provider.fetch_raw(symbol, range) {
            Ok(frame) => return Ok(frame),
            Err(e) if e.is_transient() => last_failure = Some(e),
            Err(e) => return Err(e),
        }
    }

    Err(last_failure.unwrap_or(FetchFailure::NoData))
}
