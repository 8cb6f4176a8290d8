//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with the SMA of the first n values, then
//! EMA[i] = V[i]*k + EMA[i-1]*(1-k).
//! Output length: len - n + 1.

use crate::domain::indicator::{AlignedReading, IndicatorKind};

pub fn calculate_ema(values: &[f64], period: usize) -> AlignedReading<f64> {
    let kind = IndicatorKind::Ema(period);
    if period == 0 || values.len() < period {
        return AlignedReading::empty(kind, values.len());
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut ema = values[..period].iter().sum::<f64>() / period as f64;
    out.push(ema);

    for &value in &values[period..] {
        ema = value * k + ema * (1.0 - k);
        out.push(ema);
    }

    AlignedReading::new(kind, out, values.len())
}
