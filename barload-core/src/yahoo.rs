//! Yahoo Finance chart API provider (primary path).
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. Yahoo has no
//! official API and is subject to unannounced format changes; the direct
//! CSV download endpoint is the fallback when this path fails.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::plan::DateRange;
use crate::provider::{BarProvider, FetchFailure, RawFrame};

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Primary provider: Yahoo v8 chart API over blocking HTTP.
pub struct YahooChartProvider {
    client: reqwest::blocking::Client,
}

impl YahooChartProvider {
    pub fn new() -> Result<Self, FetchFailure> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| FetchFailure::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// Build the chart API URL for a symbol and date range.
    fn chart_url(symbol: &str, range: DateRange) -> String {
        let start_ts = day_start_ts(range.start);
        let end_ts = day_end_ts(range.end);
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }
}

impl BarProvider for YahooChartProvider {
    fn name(&self) -> &str {
        "yahoo_chart"
    }

    fn fetch_raw(&self, symbol: &str, range: DateRange) -> Result<RawFrame, FetchFailure> {
        let url = Self::chart_url(symbol, range);

        let resp = self.client.get(&url).send().map_err(|e| {
            FetchFailure::Network(e.to_string())
        })?;

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

        let chart: ChartResponse = resp
            .json()
            .map_err(|e| FetchFailure::Malformed(format!("chart response for {symbol}: {e}")))?;

        frame_from_chart(symbol, chart)
    }
}

/// Render the chart response into the raw row shape.
///
/// Column labels are the chart API's own naming (lowercase, `adjclose`) —
/// normalization onto the canonical layout happens downstream. Bars where
/// every field is null (holidays, non-trading days) are skipped; a bar with
/// some nulls keeps empty cells and is left to the normalizer to drop.
fn frame_from_chart(symbol: &str, resp: ChartResponse) -> Result<RawFrame, FetchFailure> {
    let result = resp.chart.result.ok_or_else(|| {
        if let Some(err) = resp.chart.error {
            FetchFailure::Malformed(format!("{symbol}: {}: {}", err.code, err.description))
        } else {
            FetchFailure::Malformed(format!("empty result for {symbol} with no error"))
        }
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| FetchFailure::Malformed(format!("result array for {symbol} is empty")))?;

    let timestamps = data
        .timestamp
        .ok_or_else(|| FetchFailure::Malformed(format!("no timestamps for {symbol}")))?;

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| FetchFailure::Malformed(format!("no quote data for {symbol}")))?;

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut frame = RawFrame {
        columns: vec![
            "date".into(),
            "open".into(),
            "high".into(),
            "low".into(),
            "close".into(),
            "adjclose".into(),
            "volume".into(),
        ],
        rows: Vec::with_capacity(timestamps.len()),
    };

    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| FetchFailure::Malformed(format!("invalid timestamp: {ts}")))?;

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();
        let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

        if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none()
        {
            continue;
        }

        frame.rows.push(vec![
            date.format("%Y-%m-%d").to_string(),
            cell(open),
            cell(high),
            cell(low),
            cell(close),
            cell(adj_close),
            volume.map(|v| v.to_string()).unwrap_or_default(),
        ]);
    }

    if frame.rows.is_empty() {
        return Err(FetchFailure::NoData);
    }

    Ok(frame)
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
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
