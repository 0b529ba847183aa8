//! Chunked date-range planning.
//!
//! A full `[start, end]` interval is split into consecutive, non-overlapping
//! sub-ranges of at most `chunk_days` calendar days each, in ascending
//! order, whose union is exactly the original interval. The plan is a plain
//! iterator with no hidden state: cloning it (or calling [`plan_chunks`]
//! again with the same arguments) regenerates the same sequence.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// A closed interval of calendar dates. Invariant: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Number of calendar dates covered, inclusive of both endpoints.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Build a chunk plan over `[start, end]`.
///
/// `chunk_days == 0` is a configuration error. `start > end` yields an
/// empty plan — a successful no-op run, which is how an incremental run
/// with no new dates terminates.
pub fn plan_chunks(
    start: NaiveDate,
    end: NaiveDate,
    chunk_days: u32,
) -> Result<ChunkPlan, IngestError> {
    if chunk_days == 0 {
        return Err(IngestError::Config(
            "chunk-days must be a positive integer".into(),
        ));
    }
    Ok(ChunkPlan {
        next: start,
        end,
        chunk_days,
    })
}

/// Lazy, finite iterator over the planned sub-ranges.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    next: NaiveDate,
    end: NaiveDate,
    chunk_days: u32,
}

impl Iterator for ChunkPlan {
    type Item = DateRange;

    fn next(&mut self) -> Option<DateRange> {
        if self.next > self.end {
            return None;
        }
        let chunk_end = (self.next + Duration::days(i64::from(self.chunk_days) - 1)).min(self.end);
        let range = DateRange {
            start: self.next,
            end: chunk_end,
        };
        self.next = chunk_end + Duration::days(1);
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.next > self.end {
            return (0, Some(0));
        }
        let days = (self.end - self.next).num_days() + 1;
        let chunk = i64::from(self.chunk_days);
        let n = ((days + chunk - 1) / chunk) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for ChunkPlan {}
