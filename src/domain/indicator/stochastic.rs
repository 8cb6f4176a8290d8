//! Stochastic oscillator.
//!
//! %K[i] = 100 * (C[i] - LL) / (HH - LL) over the last k_period highs/lows.
//! %D = simple average of the last d_period %K values; NaN until enough %K
//! values exist. A flat window (HH == LL) yields NaN for %K.
//! Output length: len - k_period + 1.

use crate::domain::candle::Candle;
use crate::domain::indicator::{AlignedReading, IndicatorKind, StochasticValue};

pub fn calculate_stochastic(
    candles: &[Candle],
    k_period: usize,
    d_period: usize,
) -> AlignedReading<StochasticValue> {
    let kind = IndicatorKind::Stochastic { k_period, d_period };
    if k_period == 0 || d_period == 0 || candles.len() < k_period {
        return AlignedReading::empty(kind, candles.len());
    }

    let k_values: Vec<f64> = candles
        .windows(k_period)
        .map(|window| {
            let highest = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
            let lowest = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
            let close = window[k_period - 1].close;
            let range = highest - lowest;
            if range == 0.0 {
                f64::NAN
            } else {
                100.0 * (close - lowest) / range
            }
        })
        .collect();

    let values = k_values
        .iter()
        .enumerate()
        .map(|(i, &k)| {
            let d = if i + 1 >= d_period {
                k_values[i + 1 - d_period..=i].iter().sum::<f64>() / d_period as f64
            } else {
                f64::NAN
            };
            StochasticValue { k, d }
        })
        .collect();

    AlignedReading::new(kind, values, candles.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_candle(i: i64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: 1_700_000_000 + i * 60,
            open: close,
            high,
            low,
            close,
            volume: 0.0,
        }
    }

    #[test]
    fn k_is_position_within_range() {
        let candles = vec![
            make_candle(0, 12.0, 8.0, 10.0),
            make_candle(1, 14.0, 9.0, 13.0),
            make_candle(2, 15.0, 10.0, 14.0),
        ];
        let series = calculate_stochastic(&candles, 3, 1);
        assert_eq!(series.len(), 1);
        // HH = 15, LL = 8 → (14 - 8) / 7
        let value = series.current().unwrap();
        assert_relative_eq!(value.k, 600.0 / 7.0, epsilon = 1e-9);
        assert_relative_eq!(value.d, value.k);
    }

    #[test]
    fn d_is_sma_of_k() {
        let candles: Vec<Candle> = (0..6)
            .map(|i| {
                let base = 10.0 + i as f64;
                make_candle(i, base + 2.0, base - 2.0, base + (i % 2) as f64)
            })
            .collect();
        let series = calculate_stochastic(&candles, 3, 3);
        assert_eq!(series.len(), 4);

        let ks: Vec<f64> = series.values().iter().map(|v| v.k).collect();
        assert!(series.values()[0].d.is_nan());
        assert!(series.values()[1].d.is_nan());
        assert_relative_eq!(series.values()[2].d, (ks[0] + ks[1] + ks[2]) / 3.0, epsilon = 1e-9);
        assert_relative_eq!(series.values()[3].d, (ks[1] + ks[2] + ks[3]) / 3.0, epsilon = 1e-9);

        // First two rows lack %D and are unavailable.
        assert_eq!(series.at_candle(2), None);
        assert!(series.at_candle(4).is_some());
    }

    #[test]
    fn flat_window_is_unavailable() {
        let candles: Vec<Candle> = (0..5).map(|i| make_candle(i, 10.0, 10.0, 10.0)).collect();
        let series = calculate_stochastic(&candles, 3, 1);
        assert_eq!(series.len(), 3);
        assert_eq!(series.current(), None);
    }

    #[test]
    fn insufficient_candles() {
        let candles: Vec<Candle> = (0..3).map(|i| make_candle(i, 11.0, 9.0, 10.0)).collect();
        assert!(calculate_stochastic(&candles, 14, 3).is_empty());
    }
}
