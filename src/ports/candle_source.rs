//! Candle source port.

use crate::domain::error::SignalwatchError;
use crate::domain::instrument::Timeframe;
use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;
use std::future::Future;

/// Opaque token authorizing candle fetches.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// `None` for a blank token.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleRequest {
    pub instrument_key: String,
    pub timeframe: Timeframe,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Fetches raw candle payloads. The payload is handed to
/// [`crate::domain::normalize::normalize`] unchanged.
pub trait CandleSource: Send + Sync + 'static {
    fn fetch(
        &self,
        credential: &Credential,
        request: &CandleRequest,
    ) -> impl Future<Output = Result<Value, SignalwatchError>> + Send;
}
