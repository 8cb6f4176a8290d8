//! Raw candle payload normalization.
//!
//! Upstream rows look like `[timestamp, open, high, low, close, volume, oi]`.
//! The timestamp may be an ISO-8601 string, Unix seconds or Unix
//! milliseconds; numbers above [`MILLIS_THRESHOLD`] are milliseconds.
//!
//! Normalization never fails. Rows that cannot be read are dropped, and a
//! payload with no readable rows yields an empty series, which downstream
//! stages treat as "no data".

use crate::domain::candle::Candle;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::BTreeMap;

pub const MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// Normalize a payload into candles sorted by strictly increasing timestamp.
///
/// Accepts either a bare array of rows or an upstream response object that
/// carries the rows at `data.candles`. When two rows share a timestamp the
/// later row wins.
pub fn normalize(payload: &Value) -> Vec<Candle> {
    let Some(rows) = candle_rows(payload) else {
        return Vec::new();
    };

    let mut by_time: BTreeMap<i64, Candle> = BTreeMap::new();
    for candle in rows.iter().filter_map(parse_row) {
        by_time.insert(candle.timestamp, candle);
    }
    by_time.into_values().collect()
}

fn candle_rows(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(rows) => Some(rows),
        Value::Object(_) => payload
            .pointer("/data/candles")
            .or_else(|| payload.get("candles"))
            .and_then(Value::as_array),
        _ => None,
    }
}

fn parse_row(row: &Value) -> Option<Candle> {
    let fields = row.as_array()?;
    if fields.len() < 5 {
        return None;
    }

    let timestamp = parse_timestamp(&fields[0])?;
    let open = parse_number(&fields[1])?;
    let high = parse_number(&fields[2])?;
    let low = parse_number(&fields[3])?;
    let close = parse_number(&fields[4])?;
    let volume = fields
        .get(5)
        .and_then(parse_number)
        .filter(|v| *v >= 0.0)
        .unwrap_or(0.0);

    Some(Candle {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
    })
}

fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Epoch seconds from any supported timestamp encoding.
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            let raw = match n.as_i64() {
                Some(i) => i,
                None => {
                    let f = n.as_f64()?;
                    if !f.is_finite() {
                        return None;
                    }
                    f.floor() as i64
                }
            };
            Some(epoch_seconds(raw))
        }
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn epoch_seconds(raw: i64) -> i64 {
    if raw > MILLIS_THRESHOLD {
        raw.div_euclid(1000)
    } else {
        raw
    }
}

fn parse_timestamp_str(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    if let Ok(raw) = s.parse::<i64>() {
        return Some(epoch_seconds(raw));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp())
}
