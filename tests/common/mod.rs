#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use signalwatch::domain::error::SignalwatchError;
use signalwatch::domain::market_clock::FixedClock;
use signalwatch::ports::candle_source::{CandleRequest, CandleSource, Credential};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// First candle of every generated series: 2024-06-10 06:13:20 UTC.
pub const START_TS: i64 = 1_718_000_000;
pub const STEP_SECS: i64 = 300;

/// Clones share the call counter, so a test can keep one handle while the
/// scheduler owns another.
#[derive(Clone, Default)]
pub struct MockCandleSource {
    pub payloads: HashMap<String, Value>,
    pub errors: HashMap<String, String>,
    pub delay: Option<Duration>,
    pub calls: Arc<AtomicUsize>,
}

impl MockCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(mut self, key: &str, payload: Value) -> Self {
        self.payloads.insert(key.to_string(), payload);
        self
    }

    pub fn with_error(mut self, key: &str, reason: &str) -> Self {
        self.errors.insert(key.to_string(), reason.to_string());
        self
    }

    /// Every fetch sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CandleSource for MockCandleSource {
    async fn fetch(
        &self,
        _credential: &Credential,
        request: &CandleRequest,
    ) -> Result<Value, SignalwatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let key = &request.instrument_key;
        if let Some(reason) = self.errors.get(key) {
            return Err(SignalwatchError::Fetch {
                instrument: key.clone(),
                reason: reason.clone(),
            });
        }
        Ok(self.payloads.get(key).cloned().unwrap_or(Value::Null))
    }
}

pub fn credential() -> Credential {
    Credential::new("test-token").unwrap()
}

/// Tuesday 2024-06-11 20:00 IST: MCX trading, NSE closed.
pub fn mcx_session() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2024, 6, 11, 14, 30, 0).unwrap())
}

/// Tuesday 2024-06-11 11:00 IST: both exchanges trading.
pub fn nse_session() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2024, 6, 11, 5, 30, 0).unwrap())
}

pub fn timestamp(i: usize) -> i64 {
    START_TS + STEP_SECS * i as i64
}

/// Upstream-shaped row: `[iso8601, open, high, low, close, volume, oi]`.
pub fn row(i: usize, close: f64) -> Value {
    let time = DateTime::from_timestamp(timestamp(i), 0)
        .unwrap()
        .to_rfc3339();
    json!([time, close - 1.0, close + 2.0, close - 2.0, close, 1000, 0])
}

pub fn response(rows: Vec<Value>) -> Value {
    json!({ "status": "success", "data": { "candles": rows } })
}

/// `n` candles with closes rising by one from `base`.
pub fn rising(n: usize, base: f64) -> Value {
    response((0..n).map(|i| row(i, base + i as f64)).collect())
}

/// `n` candles oscillating around `base`.
pub fn choppy(n: usize, base: f64) -> Value {
    response(
        (0..n)
            .map(|i| {
                let swing = if i % 2 == 0 { 3.0 } else { -3.0 };
                row(i, base + swing)
            })
            .collect(),
    )
}

/// CSV file body with epoch-second timestamps and rising closes.
pub fn rising_csv(n: usize, base: f64) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for i in 0..n {
        let close = base + i as f64;
        out.push_str(&format!(
            "{},{},{},{},{},1000\n",
            timestamp(i),
            close - 1.0,
            close + 2.0,
            close - 2.0,
            close
        ));
    }
    out
}
