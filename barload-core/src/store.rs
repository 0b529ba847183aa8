//! SQLite persistence for normalized price rows.
//!
//! One table per symbol, keyed by date. The table is created on first
//! write; upserts use `INSERT OR REPLACE` inside a per-chunk transaction,
//! so rerunning the same input leaves exactly one row per date and a
//! killed run leaves the table valid. The maximum stored date is the only
//! state an incremental run needs.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection};

use crate::error::IngestError;
use crate::normalize::PriceRow;

const DATE_FMT: &str = "%Y-%m-%d";

/// The durable store: a SQLite file and a destination table.
pub struct PriceStore {
    conn: Connection,
    table: String,
}

impl PriceStore {
    /// Open (creating if absent) the database file.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, IngestError> {
        validate_table_name(table)?;
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    /// In-memory store, for embedding and tests.
    pub fn open_in_memory(table: &str) -> Result<Self, IngestError> {
        validate_table_name(table)?;
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Upsert normalized rows; returns the number written.
    ///
    /// Each call is one transaction — the per-chunk commit unit the error
    /// contract relies on.
    pub fn upsert(&mut self, rows: &[PriceRow]) -> Result<usize, IngestError> {
        self.ensure_table()?;
        if rows.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO \"{}\" \
                 (\"Date\", \"Open\", \"High\", \"Low\", \"Close\", \"Adj Close\", \"Volume\") \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                self.table
            ))?;
            for row in rows {
                stmt.execute(params![
                    row.date.format(DATE_FMT).to_string(),
                    row.open,
                    row.high,
                    row.low,
                    row.close,
                    row.adj_close,
                    row.volume as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Maximum stored date, or `None` when the table is absent or empty.
    pub fn max_date(&self) -> Result<Option<NaiveDate>, IngestError> {
        if !self.table_exists()? {
            return Ok(None);
        }
        let max: Option<String> = self.conn.query_row(
            &format!("SELECT MAX(\"Date\") FROM \"{}\"", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(max.and_then(|v| NaiveDate::parse_from_str(&v, DATE_FMT).ok()))
    }

    pub fn row_count(&self) -> Result<u64, IngestError> {
        if !self.table_exists()? {
            return Ok(0);
        }
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Minimum and maximum stored dates, or `None` when empty.
    pub fn date_span(&self) -> Result<Option<(NaiveDate, NaiveDate)>, IngestError> {
        if !self.table_exists()? {
            return Ok(None);
        }
        let (min, max): (Option<String>, Option<String>) = self.conn.query_row(
            &format!(
                "SELECT MIN(\"Date\"), MAX(\"Date\") FROM \"{}\"",
                self.table
            ),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let parse = |v: String| NaiveDate::parse_from_str(&v, DATE_FMT).ok();
        Ok(min.and_then(parse).zip(max.and_then(parse)))
    }

    /// Load stored rows in `[start, end]`, ascending by date.
    ///
    /// ISO dates compare correctly as text, so the range filter is a plain
    /// string comparison.
    pub fn load_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRow>, IngestError> {
        if !self.table_exists()? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT \"Date\", \"Open\", \"High\", \"Low\", \"Close\", \"Adj Close\", \"Volume\" \
             FROM \"{}\" WHERE \"Date\" >= ?1 AND \"Date\" <= ?2 ORDER BY \"Date\"",
            self.table
        ))?;

        let rows = stmt.query_map(
            params![
                start.format(DATE_FMT).to_string(),
                end.format(DATE_FMT).to_string()
            ],
            |row| {
                let date_text: String = row.get(0)?;
                let volume: i64 = row.get(6)?;
                Ok((
                    date_text,
                    PriceRow {
                        date: NaiveDate::MIN,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        adj_close: row.get(5)?,
                        volume: volume.max(0) as u64,
                    },
                ))
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            let (date_text, mut price_row) = row?;
            let Ok(date) = NaiveDate::parse_from_str(&date_text, DATE_FMT) else {
                eprintln!("WARNING: skipping stored row with unparseable date {date_text:?}");
                continue;
            };
            price_row.date = date;
            out.push(price_row);
        }
        Ok(out)
    }

    fn ensure_table(&self) -> Result<(), IngestError> {
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (
                    \"Date\" TEXT PRIMARY KEY,
                    \"Open\" REAL,
                    \"High\" REAL,
                    \"Low\" REAL,
                    \"Close\" REAL,
                    \"Adj Close\" REAL,
                    \"Volume\" INTEGER
                )",
                self.table
            ),
            [],
        )?;
        Ok(())
    }

    fn table_exists(&self) -> Result<bool, IngestError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![self.table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// Table names are interpolated into SQL, so they must be plain
/// identifiers: `[A-Za-z_][A-Za-z0-9_]*`.
fn validate_table_name(name: &str) -> Result<(), IngestError> {
    let mut chars = name.chars();
    let valid_first = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_first && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(IngestError::Config(format!(
            "invalid table name {name:?}: must match [A-Za-z_][A-Za-z0-9_]*"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(date: NaiveDate, close: f64) -> PriceRow {
        PriceRow {
            date,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            adj_close: close - 0.5,
            volume: 1_000,
        }
    }

    #[test]
    fn table_created_on_first_write() {
        let mut store = PriceStore::open_in_memory("daily_bars").unwrap();
        assert_eq!(store.row_count().unwrap(), 0);
        store.upsert(&[row(d(2022, 1, 3), 477.7)]).unwrap();
        assert_eq!(store.row_count().unwrap(), 1);
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut store = PriceStore::open_in_memory("daily_bars").unwrap();
        let rows = vec![row(d(2022, 1, 3), 477.7), row(d(2022, 1, 4), 479.0)];
        store.upsert(&rows).unwrap();
        store.upsert(&rows).unwrap();
        assert_eq!(store.row_count().unwrap(), 2);
    }

    #[test]
    fn upsert_replaces_existing_date() {
        let mut store = PriceStore::open_in_memory("daily_bars").unwrap();
        store.upsert(&[row(d(2022, 1, 3), 477.7)]).unwrap();
        store.upsert(&[row(d(2022, 1, 3), 480.0)]).unwrap();

        let stored = store
            .load_range(d(2022, 1, 1), d(2022, 1, 31))
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].close, 480.0);
    }

    #[test]
    fn max_date_on_missing_table_is_none() {
        let store = PriceStore::open_in_memory("daily_bars").unwrap();
        assert_eq!(store.max_date().unwrap(), None);
    }

    #[test]
    fn max_date_tracks_latest_row() {
        let mut store = PriceStore::open_in_memory("daily_bars").unwrap();
        store
            .upsert(&[row(d(2022, 1, 4), 479.0), row(d(2022, 1, 3), 477.7)])
            .unwrap();
        assert_eq!(store.max_date().unwrap(), Some(d(2022, 1, 4)));
    }

    #[test]
    fn date_span_covers_min_and_max() {
        let mut store = PriceStore::open_in_memory("daily_bars").unwrap();
        store
            .upsert(&[
                row(d(2022, 1, 3), 477.7),
                row(d(2022, 2, 1), 450.0),
                row(d(2022, 1, 10), 470.0),
            ])
            .unwrap();
        assert_eq!(
            store.date_span().unwrap(),
            Some((d(2022, 1, 3), d(2022, 2, 1)))
        );
    }

    #[test]
    fn load_range_filters_and_orders() {
        let mut store = PriceStore::open_in_memory("daily_bars").unwrap();
        store
            .upsert(&[
                row(d(2022, 1, 5), 1.0),
                row(d(2022, 1, 3), 2.0),
                row(d(2022, 2, 1), 3.0),
            ])
            .unwrap();
        let stored = store.load_range(d(2022, 1, 1), d(2022, 1, 31)).unwrap();
        let dates: Vec<_> = stored.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(2022, 1, 3), d(2022, 1, 5)]);
    }

    #[test]
    fn rejects_non_identifier_table_names() {
        for bad in ["", "1table", "prices; DROP TABLE x", "a-b", "a b"] {
            let result = PriceStore::open_in_memory(bad);
            assert!(
                matches!(result, Err(IngestError::Config(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn empty_upsert_writes_nothing_but_creates_table() {
        let mut store = PriceStore::open_in_memory("daily_bars").unwrap();
        assert_eq!(store.upsert(&[]).unwrap(), 0);
        assert_eq!(store.row_count().unwrap(), 0);
        assert_eq!(store.max_date().unwrap(), None);
    }
}
