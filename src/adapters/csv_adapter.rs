//! CSV directory candle source.
//!
//! Each instrument is a file under the data directory named after its
//! instrument key with every character outside `[A-Za-z0-9_-]` replaced by
//! `_`. A timeframe-specific file `<key>_<interval>_<unit>.csv` (for example
//! `NSE_INDEX_Nifty_50_5_minutes.csv`) takes precedence over `<key>.csv`.
//!
//! Files carry a header and the columns
//! `timestamp,open,high,low,close[,volume]`. Rows are handed to the
//! normalizer as a JSON array, so timestamps may be ISO-8601, epoch seconds
//! or epoch milliseconds.

use crate::domain::error::SignalwatchError;
use crate::domain::market_clock::exchange_local_time;
use crate::domain::normalize::parse_timestamp;
use crate::ports::candle_source::{CandleRequest, CandleSource, Credential};
use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct CsvCandleSource {
    base_path: PathBuf,
}

impl CsvCandleSource {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn candidates(&self, request: &CandleRequest) -> [PathBuf; 2] {
        let stem = file_stem(&request.instrument_key);
        [
            self.base_path.join(format!(
                "{}_{}_{}.csv",
                stem, request.timeframe.interval, request.timeframe.unit
            )),
            self.base_path.join(format!("{}.csv", stem)),
        ]
    }
}

impl CandleSource for CsvCandleSource {
    async fn fetch(
        &self,
        _credential: &Credential,
        request: &CandleRequest,
    ) -> Result<Value, SignalwatchError> {
        let instrument = request.instrument_key.clone();
        let fetch_error = |reason: String| SignalwatchError::Fetch {
            instrument: instrument.clone(),
            reason,
        };

        let path = self
            .candidates(request)
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| {
                fetch_error(format!(
                    "no candle file for {} in {}",
                    request.instrument_key,
                    self.base_path.display()
                ))
            })?;
        debug!(instrument = %request.instrument_key, path = %path.display(), "reading candles");

        let (from, to) = (request.from, request.to);
        tokio::task::spawn_blocking(move || read_rows(&path, Some((from, to))))
            .await
            .map_err(|e| fetch_error(format!("reader task failed: {}", e)))?
            .map_err(|e| fetch_error(e.to_string()))
    }
}

/// Reads a candle CSV into a JSON array of rows.
///
/// With `range`, rows whose timestamp falls outside the inclusive date range
/// (in exchange local time) are skipped. Rows with unreadable timestamps are
/// passed through for the normalizer to drop.
pub fn read_rows(path: &Path, range: Option<(NaiveDate, NaiveDate)>) -> Result<Value, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let fields: Vec<Value> = record
            .iter()
            .map(|field| Value::String(field.to_string()))
            .collect();

        if let (Some((from, to)), Some(ts)) = (range, fields.first().and_then(parse_timestamp)) {
            let Some(utc) = DateTime::from_timestamp(ts, 0) else {
                continue;
            };
            let date = exchange_local_time(utc).date_naive();
            if date < from || date > to {
                continue;
            }
        }
        rows.push(Value::Array(fields));
    }
    Ok(Value::Array(rows))
}

fn file_stem(instrument_key: &str) -> String {
    instrument_key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::{CandleUnit, Timeframe};
    use crate::domain::normalize::normalize;
    use std::fs;
    use tempfile::TempDir;

    const CSV: &str = "timestamp,open,high,low,close,volume\n\
        2024-01-15T09:15:00+05:30,100.0,110.0,90.0,105.0,50000\n\
        2024-01-16T09:15:00+05:30,105.0,115.0,100.0,110.0,60000\n\
        2024-01-17T09:15:00+05:30,110.0,120.0,105.0,115.0,55000\n";

    fn setup() -> (TempDir, CsvCandleSource) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("NSE_INDEX_Nifty_50.csv"), CSV).unwrap();
        fs::write(
            dir.path().join("NSE_INDEX_Nifty_50_1_hours.csv"),
            "timestamp,open,high,low,close\n1705290300,1,2,0.5,1.5\n",
        )
        .unwrap();
        let source = CsvCandleSource::new(dir.path().to_path_buf());
        (dir, source)
    }

    fn request(timeframe: Timeframe, from: (i32, u32, u32), to: (i32, u32, u32)) -> CandleRequest {
        CandleRequest {
            instrument_key: "NSE_INDEX|Nifty 50".to_string(),
            timeframe,
            from: NaiveDate::from_ymd_opt(from.0, from.1, from.2).unwrap(),
            to: NaiveDate::from_ymd_opt(to.0, to.1, to.2).unwrap(),
        }
    }

    fn credential() -> Credential {
        Credential::new("unused").unwrap()
    }

    #[test]
    fn file_stem_replaces_separators() {
        assert_eq!(file_stem("NSE_INDEX|Nifty 50"), "NSE_INDEX_Nifty_50");
        assert_eq!(file_stem("MCX_FO|451666"), "MCX_FO_451666");
    }

    #[tokio::test]
    async fn fetch_filters_by_date() {
        let (_dir, source) = setup();
        let payload = source
            .fetch(
                &credential(),
                &request(Timeframe::DEFAULT, (2024, 1, 16), (2024, 1, 17)),
            )
            .await
            .unwrap();
        let candles = normalize(&payload);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 110.0);
        assert_eq!(candles[1].volume, 55000.0);
    }

    #[tokio::test]
    async fn timeframe_specific_file_wins() {
        let (_dir, source) = setup();
        let tf = Timeframe::new(CandleUnit::Hours, 1).unwrap();
        let payload = source
            .fetch(&credential(), &request(tf, (2024, 1, 1), (2024, 1, 31)))
            .await
            .unwrap();
        let candles = normalize(&payload);
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, 1.5);
    }

    #[tokio::test]
    async fn missing_file_is_fetch_error() {
        let (_dir, source) = setup();
        let mut req = request(Timeframe::DEFAULT, (2024, 1, 1), (2024, 1, 31));
        req.instrument_key = "NSE_EQ|MISSING".to_string();
        let err = source.fetch(&credential(), &req).await.unwrap_err();
        assert!(matches!(err, SignalwatchError::Fetch { .. }));
    }

    #[test]
    fn read_rows_without_range_keeps_everything() {
        let (dir, _source) = setup();
        let payload = read_rows(&dir.path().join("NSE_INDEX_Nifty_50.csv"), None).unwrap();
        assert_eq!(payload.as_array().map(Vec::len), Some(3));
    }
}
