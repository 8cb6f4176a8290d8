//! Instrument identity, exchange classification and analysis timeframes.

use crate::domain::error::TimeframeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Nse,
    Mcx,
    Other(String),
}

impl Exchange {
    /// Classify an exchange from an instrument key such as `MCX_FO|451666`.
    pub fn from_instrument_key(key: &str) -> Self {
        let upper = key.to_uppercase();
        if upper.contains("MCX") {
            Exchange::Mcx
        } else {
            Exchange::Nse
        }
    }
}

impl FromStr for Exchange {
    type Err = std::convert::Infallible;

    /// Segment names (`NSE_EQ`, `NSE_FO`, `MCX_FO`) classify by prefix.
    /// Blank input defaults to NSE.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Ok(if upper.is_empty() || upper.starts_with("NSE") {
            Exchange::Nse
        } else if upper.contains("MCX") {
            Exchange::Mcx
        } else {
            Exchange::Other(upper)
        })
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Nse => write!(f, "NSE"),
            Exchange::Mcx => write!(f, "MCX"),
            Exchange::Other(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
}

impl CandleUnit {
    /// Inclusive interval bounds the upstream candle API accepts for this unit.
    pub fn interval_bounds(self) -> (u32, u32) {
        match self {
            CandleUnit::Minutes => (1, 300),
            CandleUnit::Hours => (1, 5),
            CandleUnit::Days | CandleUnit::Weeks | CandleUnit::Months => (1, 1),
        }
    }
}

impl FromStr for CandleUnit {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minutes" => Ok(CandleUnit::Minutes),
            "hours" => Ok(CandleUnit::Hours),
            "days" => Ok(CandleUnit::Days),
            "weeks" => Ok(CandleUnit::Weeks),
            "months" => Ok(CandleUnit::Months),
            other => Err(TimeframeError::UnknownUnit(other.to_string())),
        }
    }
}

impl fmt::Display for CandleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CandleUnit::Minutes => "minutes",
            CandleUnit::Hours => "hours",
            CandleUnit::Days => "days",
            CandleUnit::Weeks => "weeks",
            CandleUnit::Months => "months",
        };
        write!(f, "{}", name)
    }
}

/// A candle granularity, e.g. 5 minutes or 1 day.
///
/// Construct through [`Timeframe::new`] to get a pair the candle source will
/// accept. The fields stay public so a watch-list owner can hold whatever it
/// was given; [`Timeframe::validate`] is re-run before every fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timeframe {
    pub unit: CandleUnit,
    pub interval: u32,
}

impl Timeframe {
    pub const DEFAULT: Timeframe = Timeframe {
        unit: CandleUnit::Minutes,
        interval: 5,
    };

    pub fn new(unit: CandleUnit, interval: u32) -> Result<Self, TimeframeError> {
        let tf = Timeframe { unit, interval };
        tf.validate()?;
        Ok(tf)
    }

    pub fn validate(&self) -> Result<(), TimeframeError> {
        let (min, max) = self.unit.interval_bounds();
        if self.interval < min || self.interval > max {
            return Err(TimeframeError::OutOfRange {
                unit: self.unit,
                interval: self.interval,
                min,
                max,
            });
        }
        Ok(())
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.interval, self.unit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentProfile {
    /// Upstream key, e.g. `NSE_INDEX|Nifty 50`. Unique within a watch list.
    pub instrument_key: String,
    /// Trading symbol used to look up calibration, e.g. `NIFTY`.
    pub symbol: String,
    pub exchange: Exchange,
    pub timeframe: Timeframe,
}

impl InstrumentProfile {
    /// New profile with the default 5-minute analysis timeframe.
    pub fn new(instrument_key: impl Into<String>, symbol: impl Into<String>, exchange: Exchange) -> Self {
        Self {
            instrument_key: instrument_key.into(),
            symbol: symbol.into(),
            exchange,
            timeframe: Timeframe::DEFAULT,
        }
    }
}
