//! Average True Range.
//!
//! TR[0] = high - low, TR[i] = true range against the previous close.
//! Seed: mean of the first n true ranges, then Wilder smoothing
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n.
//! Output length: len - n + 1.

use crate::domain::candle::Candle;
use crate::domain::indicator::{AlignedReading, IndicatorKind};

pub fn calculate_atr(candles: &[Candle], period: usize) -> AlignedReading<f64> {
    let kind = IndicatorKind::Atr(period);
    if period == 0 || candles.len() < period {
        return AlignedReading::empty(kind, candles.len());
    }

    let tr_values: Vec<f64> = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            if i == 0 {
                candle.range()
            } else {
                candle.true_range(candles[i - 1].close)
            }
        })
        .collect();

    let mut atr = tr_values[..period].iter().sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(candles.len() - period + 1);
    out.push(atr);

    for &tr in &tr_values[period..] {
        atr = (atr * (period - 1) as f64 + tr) / period as f64;
        out.push(atr);
    }

    AlignedReading::new(kind, out, candles.len())
}
