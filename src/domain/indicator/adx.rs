//! Average Directional Index.
//!
//! +DM/-DM and true range start at the second candle. Each is Wilder-summed:
//! the first sum covers n values, then S[i] = S[i-1] - S[i-1]/n + X[i].
//! +DI = 100 * S(+DM) / S(TR), DX = 100 * |+DI - -DI| / (+DI + -DI).
//! ADX seeds with the mean of the first n DX values and is then
//! Wilder-averaged.
//! Output length: len - 2n + 1.

use crate::domain::candle::Candle;
use crate::domain::indicator::{AdxValue, AlignedReading, IndicatorKind};

pub fn calculate_adx(candles: &[Candle], period: usize) -> AlignedReading<AdxValue> {
    let kind = IndicatorKind::Adx(period);
    if period == 0 || candles.len() < 2 * period {
        return AlignedReading::empty(kind, candles.len());
    }

    let mut plus_dm = Vec::with_capacity(candles.len() - 1);
    let mut minus_dm = Vec::with_capacity(candles.len() - 1);
    let mut tr = Vec::with_capacity(candles.len() - 1);
    for pair in candles.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        plus_dm.push(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm.push(if down > up && down > 0.0 { down } else { 0.0 });
        tr.push(cur.true_range(prev.close));
    }

    let p = period as f64;
    let mut s_plus: f64 = plus_dm[..period].iter().sum();
    let mut s_minus: f64 = minus_dm[..period].iter().sum();
    let mut s_tr: f64 = tr[..period].iter().sum();

    // One (+DI, -DI, DX) triple per candle from index `period` onwards.
    let mut directional = Vec::with_capacity(tr.len() - period + 1);
    directional.push(directional_index(s_plus, s_minus, s_tr));
    for i in period..tr.len() {
        s_plus = s_plus - s_plus / p + plus_dm[i];
        s_minus = s_minus - s_minus / p + minus_dm[i];
        s_tr = s_tr - s_tr / p + tr[i];
        directional.push(directional_index(s_plus, s_minus, s_tr));
    }

    let mut adx = directional[..period].iter().map(|d| d.2).sum::<f64>() / p;
    let mut out = Vec::with_capacity(directional.len() - period + 1);
    let (plus_di, minus_di, _) = directional[period - 1];
    out.push(AdxValue {
        adx,
        plus_di,
        minus_di,
    });
    for &(plus_di, minus_di, dx) in &directional[period..] {
        adx = (adx * (p - 1.0) + dx) / p;
        out.push(AdxValue {
            adx,
            plus_di,
            minus_di,
        });
    }

    AlignedReading::new(kind, out, candles.len())
}

/// (+DI, -DI, DX). A zero denominator reads as no directional movement
/// so a flat stretch does not poison every later smoothed value.
fn directional_index(s_plus: f64, s_minus: f64, s_tr: f64) -> (f64, f64, f64) {
    if s_tr == 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let plus_di = 100.0 * s_plus / s_tr;
    let minus_di = 100.0 * s_minus / s_tr;
    let di_sum = plus_di + minus_di;
    let dx = if di_sum == 0.0 {
        0.0
    } else {
        100.0 * (plus_di - minus_di).abs() / di_sum
    };
    (plus_di, minus_di, dx)
}
