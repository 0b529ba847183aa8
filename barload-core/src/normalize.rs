//! Normalization of provider rows onto the canonical shape.
//!
//! Providers label their columns differently (`Date` vs `date`,
//! `Adj Close` vs `adj_close` vs `adjclose`); the lookup folds case,
//! spaces, underscores, and dashes before matching. Rows whose date cell
//! does not parse are dropped with a warning; a missing required price
//! column is fatal. Duplicate dates — expected at overlapping chunk
//! boundaries — resolve last-wins.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::provider::RawFrame;

/// One calendar date's market data, in the persisted column order:
/// `Date, Open, High, Low, Close, Adj Close, Volume`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

/// Canonicalize a raw frame into deduplicated rows sorted by date.
///
/// An empty frame normalizes to an empty vector — an empty chunk is not an
/// error at this layer.
pub fn normalize(frame: &RawFrame) -> Result<Vec<PriceRow>, IngestError> {
    if frame.rows.is_empty() {
        return Ok(Vec::new());
    }

    let folded: Vec<String> = frame.columns.iter().map(|c| fold(c)).collect();

    // The date column falls back to the first column when no header
    // matches; the per-row date parse then decides what survives.
    let date_idx = find_column(&folded, "date", false).unwrap_or(0);
    let open_idx = require_column(&folded, &frame.columns, "open")?;
    let high_idx = require_column(&folded, &frame.columns, "high")?;
    let low_idx = require_column(&folded, &frame.columns, "low")?;
    let close_idx = require_close_column(&folded, &frame.columns)?;
    let adj_idx = find_column(&folded, "adjclose", false);
    let volume_idx = find_column(&folded, "volume", false);

    let mut by_date: BTreeMap<NaiveDate, PriceRow> = BTreeMap::new();

    for row in &frame.rows {
        let date_cell = row.get(date_idx).map(String::as_str).unwrap_or("");
        let Some(date) = parse_date(date_cell) else {
            eprintln!("WARNING: dropping row with unparseable date {date_cell:?}");
            continue;
        };

        let prices = [
            parse_price(row, open_idx),
            parse_price(row, high_idx),
            parse_price(row, low_idx),
            parse_price(row, close_idx),
        ];
        let [Some(open), Some(high), Some(low), Some(close)] = prices else {
            eprintln!("WARNING: dropping row for {date} with unparseable price cells");
            continue;
        };

        let adj_close = adj_idx.and_then(|i| parse_price(row, i)).unwrap_or(close);
        let volume = volume_idx.and_then(|i| parse_volume(row, i)).unwrap_or(0);

        // Last observation wins for a repeated date.
        by_date.insert(
            date,
            PriceRow {
                date,
                open,
                high,
                low,
                close,
                adj_close,
                volume,
            },
        );
    }

    Ok(by_date.into_values().collect())
}

/// Fold a column label for matching: lowercase, strip separators.
fn fold(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .collect()
}

/// Locate a column by folded label: exact match first, then containment.
fn find_column(folded: &[String], target: &str, skip_adjusted: bool) -> Option<usize> {
    if let Some(i) = folded.iter().position(|c| c == target) {
        return Some(i);
    }
    folded
        .iter()
        .position(|c| c.contains(target) && !(skip_adjusted && c.contains("adj")))
}

fn require_column(
    folded: &[String],
    original: &[String],
    target: &str,
) -> Result<usize, IngestError> {
    find_column(folded, target, false).ok_or_else(|| {
        IngestError::Schema(format!(
            "required column '{target}' not found in {original:?}"
        ))
    })
}

/// The `close` lookup must not capture an adjusted-close column.
fn require_close_column(folded: &[String], original: &[String]) -> Result<usize, IngestError> {
    find_column(folded, "close", true).ok_or_else(|| {
        IngestError::Schema(format!("required column 'close' not found in {original:?}"))
    })
}

/// Accept `%Y-%m-%d`, or an ISO datetime by taking the date prefix.
fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            cell.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}

fn parse_price(row: &[String], idx: usize) -> Option<f64> {
    row.get(idx)?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Volume cells arrive as integers or as float text (`"1000.0"`).
fn parse_volume(row: &[String], idx: usize) -> Option<u64> {
    let cell = row.get(idx)?.trim();
    cell.parse::<u64>()
        .ok()
        .or_else(|| cell.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn frame(columns: &[&str], rows: &[&[&str]]) -> RawFrame {
        RawFrame {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn canonical_headers_pass_through() {
        let f = frame(
            &["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"],
            &[&["2022-01-03", "477.0", "479.9", "475.5", "477.7", "465.1", "72668200"]],
        );
        let rows = normalize(&f).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, d(2022, 1, 3));
        assert_eq!(rows[0].open, 477.0);
        assert_eq!(rows[0].adj_close, 465.1);
        assert_eq!(rows[0].volume, 72_668_200);
    }

    #[test]
    fn mixed_case_headers_normalize_identically() {
        let canonical = frame(
            &["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"],
            &[&["2022-01-03", "477.0", "479.9", "475.5", "477.7", "465.1", "72668200"]],
        );
        let mixed = frame(
            &["date", "OPEN", "High", "low", "close", "adj close", "volume"],
            &[&["2022-01-03", "477.0", "479.9", "475.5", "477.7", "465.1", "72668200"]],
        );
        assert_eq!(normalize(&canonical).unwrap(), normalize(&mixed).unwrap());
    }

    #[test]
    fn adjclose_label_variants_all_resolve() {
        for label in ["Adj Close", "adj_close", "adjclose", "Adj-Close"] {
            let f = frame(
                &["Date", "Open", "High", "Low", "Close", label, "Volume"],
                &[&["2022-01-03", "1", "2", "0.5", "1.5", "1.4", "100"]],
            );
            let rows = normalize(&f).unwrap();
            assert_eq!(rows[0].adj_close, 1.4, "label {label:?}");
        }
    }

    #[test]
    fn close_lookup_skips_adjusted_close() {
        // Adjusted close listed before close must not shadow it.
        let f = frame(
            &["Date", "Open", "High", "Low", "Adj Close", "Close", "Volume"],
            &[&["2022-01-03", "1", "2", "0.5", "1.4", "1.5", "100"]],
        );
        let rows = normalize(&f).unwrap();
        assert_eq!(rows[0].close, 1.5);
        assert_eq!(rows[0].adj_close, 1.4);
    }

    #[test]
    fn missing_close_column_is_schema_error() {
        let f = frame(
            &["Date", "Open", "High", "Low", "Volume"],
            &[&["2022-01-03", "1", "2", "0.5", "100"]],
        );
        let err = normalize(&f).unwrap_err();
        assert!(matches!(err, IngestError::Schema(_)));
    }

    #[test]
    fn unparseable_date_rows_are_dropped_not_fatal() {
        let f = frame(
            &["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"],
            &[
                &["not-a-date", "1", "2", "0.5", "1.5", "1.4", "100"],
                &["2022-01-04", "1", "2", "0.5", "1.6", "1.5", "200"],
            ],
        );
        let rows = normalize(&f).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, d(2022, 1, 4));
    }

    #[test]
    fn duplicate_dates_resolve_last_wins() {
        let f = frame(
            &["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"],
            &[
                &["2022-01-03", "1", "2", "0.5", "1.5", "1.4", "100"],
                &["2022-01-03", "1", "2", "0.5", "9.9", "9.8", "900"],
            ],
        );
        let rows = normalize(&f).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, 9.9);
        assert_eq!(rows[0].volume, 900);
    }

    #[test]
    fn output_is_sorted_ascending() {
        let f = frame(
            &["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"],
            &[
                &["2022-01-05", "1", "2", "0.5", "1.5", "1.4", "100"],
                &["2022-01-03", "1", "2", "0.5", "1.5", "1.4", "100"],
                &["2022-01-04", "1", "2", "0.5", "1.5", "1.4", "100"],
            ],
        );
        let rows = normalize(&f).unwrap();
        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(2022, 1, 3), d(2022, 1, 4), d(2022, 1, 5)]);
    }

    #[test]
    fn missing_adj_close_falls_back_to_close() {
        let f = frame(
            &["Date", "Open", "High", "Low", "Close", "Volume"],
            &[&["2022-01-03", "1", "2", "0.5", "1.5", "100"]],
        );
        let rows = normalize(&f).unwrap();
        assert_eq!(rows[0].adj_close, 1.5);
    }

    #[test]
    fn float_volume_text_parses() {
        let f = frame(
            &["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"],
            &[&["2022-01-03", "1", "2", "0.5", "1.5", "1.4", "1000.0"]],
        );
        let rows = normalize(&f).unwrap();
        assert_eq!(rows[0].volume, 1000);
    }

    #[test]
    fn datetime_cells_take_date_prefix() {
        let f = frame(
            &["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"],
            &[&["2022-01-03 00:00:00", "1", "2", "0.5", "1.5", "1.4", "100"]],
        );
        let rows = normalize(&f).unwrap();
        assert_eq!(rows[0].date, d(2022, 1, 3));
    }

    #[test]
    fn empty_frame_is_empty_output() {
        let f = RawFrame::default();
        assert!(normalize(&f).unwrap().is_empty());
    }
}
