//! Technical indicator implementations.
//!
//! Every indicator returns an [`AlignedReading`]: only the values it could
//! produce after its warm-up, anchored to the end of the candle series.
//! Reading index `i` corresponds to candle index `i + offset()`, so
//! indicators with different warm-ups are compared at the same candle by
//! going through [`AlignedReading::at_candle`], never by array position.

pub mod adx;
pub mod atr;
pub mod ema;
pub mod rsi;
pub mod stochastic;

use crate::domain::candle::Candle;
use serde::Serialize;
use std::fmt;

/// A value that may be unusable (NaN from an empty or flat window).
pub trait Reading: Copy {
    fn is_available(&self) -> bool;
}

impl Reading for f64 {
    fn is_available(&self) -> bool {
        self.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StochasticValue {
    pub k: f64,
    pub d: f64,
}

impl Reading for StochasticValue {
    fn is_available(&self) -> bool {
        self.k.is_finite() && self.d.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdxValue {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

impl Reading for AdxValue {
    fn is_available(&self) -> bool {
        self.adx.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Adx(usize),
    Stochastic { k_period: usize, d_period: usize },
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Ema(period) => write!(f, "EMA({})", period),
            IndicatorKind::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorKind::Atr(period) => write!(f, "ATR({})", period),
            IndicatorKind::Adx(period) => write!(f, "ADX({})", period),
            IndicatorKind::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlignedReading<T> {
    pub kind: IndicatorKind,
    values: Vec<T>,
    series_len: usize,
}

impl<T: Reading> AlignedReading<T> {
    pub fn new(kind: IndicatorKind, values: Vec<T>, series_len: usize) -> Self {
        debug_assert!(values.len() <= series_len);
        Self {
            kind,
            values,
            series_len,
        }
    }

    pub fn empty(kind: IndicatorKind, series_len: usize) -> Self {
        Self::new(kind, Vec::new(), series_len)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Length of the candle series this reading was computed from.
    pub fn series_len(&self) -> usize {
        self.series_len
    }

    /// Number of leading candles with no reading.
    pub fn offset(&self) -> usize {
        self.series_len - self.values.len()
    }

    /// Candle index that reading index `i` belongs to.
    pub fn candle_index(&self, i: usize) -> usize {
        i + self.offset()
    }

    /// Reading at a candle index, `None` inside the warm-up or when the
    /// value is unavailable.
    pub fn at_candle(&self, candle_index: usize) -> Option<T> {
        candle_index
            .checked_sub(self.offset())
            .and_then(|i| self.values.get(i))
            .copied()
            .filter(Reading::is_available)
    }

    /// Reading at the last candle.
    pub fn current(&self) -> Option<T> {
        self.series_len.checked_sub(1).and_then(|i| self.at_candle(i))
    }

    /// Reading at the second-to-last candle.
    pub fn previous(&self) -> Option<T> {
        self.series_len.checked_sub(2).and_then(|i| self.at_candle(i))
    }
}

/// Periods for the fixed indicator battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSettings {
    pub ema_fast: usize,
    /// 26 for rule evaluation; charts commonly use 21.
    pub ema_slow: usize,
    pub trend_ema: usize,
    pub rsi: usize,
    pub stoch_k: usize,
    pub stoch_d: usize,
    pub adx: usize,
    pub atr: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ema_fast: 9,
            ema_slow: 26,
            trend_ema: 9,
            rsi: 14,
            stoch_k: 14,
            stoch_d: 3,
            adx: 14,
            atr: 14,
        }
    }
}

/// All indicators for one candle series.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub ema_fast: AlignedReading<f64>,
    pub ema_slow: AlignedReading<f64>,
    pub ema_trend: AlignedReading<f64>,
    pub rsi: AlignedReading<f64>,
    pub stochastic: AlignedReading<StochasticValue>,
    pub adx: AlignedReading<AdxValue>,
    pub atr: AlignedReading<f64>,
}

/// Candle fields and indicator readings at one candle index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub timestamp: i64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub atr: Option<f64>,
    pub rsi: Option<f64>,
    pub stochastic: Option<StochasticValue>,
    pub adx: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
}

impl IndicatorSet {
    pub fn compute(candles: &[Candle], settings: &IndicatorSettings) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let ema_fast = ema::calculate_ema(&closes, settings.ema_fast);
        let ema_trend = if settings.trend_ema == settings.ema_fast {
            ema_fast.clone()
        } else {
            ema::calculate_ema(&closes, settings.trend_ema)
        };

        Self {
            ema_fast,
            ema_slow: ema::calculate_ema(&closes, settings.ema_slow),
            ema_trend,
            rsi: rsi::calculate_rsi(&closes, settings.rsi),
            stochastic: stochastic::calculate_stochastic(candles, settings.stoch_k, settings.stoch_d),
            adx: adx::calculate_adx(candles, settings.adx),
            atr: atr::calculate_atr(candles, settings.atr),
        }
    }

    /// Readings at `candle_index`, `None` when the index is out of range.
    pub fn row(&self, candles: &[Candle], candle_index: usize) -> Option<IndicatorRow> {
        let candle = candles.get(candle_index)?;
        Some(IndicatorRow {
            timestamp: candle.timestamp,
            close: candle.close,
            high: candle.high,
            low: candle.low,
            atr: self.atr.at_candle(candle_index),
            rsi: self.rsi.at_candle(candle_index),
            stochastic: self.stochastic.at_candle(candle_index),
            adx: self.adx.at_candle(candle_index).map(|v| v.adx),
            ema_fast: self.ema_fast.at_candle(candle_index),
            ema_slow: self.ema_slow.at_candle(candle_index),
        })
    }

    /// The last `n` rows, oldest first.
    pub fn recent(&self, candles: &[Candle], n: usize) -> Vec<IndicatorRow> {
        let start = candles.len().saturating_sub(n);
        (start..candles.len())
            .filter_map(|i| self.row(candles, i))
            .collect()
    }
}
