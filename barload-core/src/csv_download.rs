//! Direct CSV download provider (fallback path).
//!
//! Yahoo's v7 `finance/download` endpoint serves the same daily history as
//! the chart API, as plain CSV with `Date,Open,High,Low,Close,Adj Close,
//! Volume` headers. Used when the chart API path is exhausted.

use std::time::Duration;

use chrono::NaiveDate;

use crate::plan::DateRange;
use crate::provider::{BarProvider, FetchFailure, RawFrame};

/// Fallback provider: CSV history download over blocking HTTP.
pub struct CsvDownloadProvider {
    client: reqwest::blocking::Client,
}

impl CsvDownloadProvider {
    pub fn new() -> Result<Self, FetchFailure> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| FetchFailure::Network(e.to_string()))?;
        Ok(Self { client })
    }

    fn download_url(symbol: &str, range: DateRange) -> String {
        let start_ts = day_start_ts(range.start);
        let end_ts = day_end_ts(range.end);
        format!(
            "https://query1.finance.yahoo.com/v7/finance/download/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &events=history&includeAdjustedClose=true"
        )
    }
}

impl BarProvider for CsvDownloadProvider {
    fn name(&self) -> &str {
        "csv_download"
    }

    fn fetch_raw(&self, symbol: &str, range: DateRange) -> Result<RawFrame, FetchFailure> {
        let url = Self::download_url(symbol, range);

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| FetchFailure::Network(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(FetchFailure::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if !status.is_success() {
            return Err(FetchFailure::Http {
                status: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .map_err(|e| FetchFailure::Network(e.to_string()))?;
        frame_from_csv(&body)
    }
}

/// Parse a CSV body into the raw row shape, keeping the endpoint's own
/// header labels.
fn frame_from_csv(body: &str) -> Result<RawFrame, FetchFailure> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| FetchFailure::Malformed(format!("csv headers: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    if columns.is_empty() {
        return Err(FetchFailure::Malformed("csv body has no header row".into()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| FetchFailure::Malformed(format!("csv record: {e}")))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        return Err(FetchFailure::NoData);
    }

    Ok(RawFrame { columns, rows })
}

fn day_start_ts(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

fn day_end_ts(date: NaiveDate) -> i64 {
    date.and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}
