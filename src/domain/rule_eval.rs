//! Rule evaluation engine.
//!
//! Turns a candle series into a [`Signal`] by reading the current and
//! previous indicator rows and checking the rules in a fixed order; the
//! first rule that holds wins.
//!
//! # Evaluation order
//!
//! 1. Fewer than `min_candles` candles: NONE, "insufficient history".
//! 2. Trend: bullish when the trend EMA is above the slow EMA at each of the
//!    last `trend_window` candles, bearish when below at each of them.
//! 3. Bullish trend: trend-following BUY, else reversal SELL.
//!    Bearish trend: trend-following SELL, else reversal BUY.
//! 4. EMA(fast)/EMA(slow) cross inside a candle narrower than ATR.
//! 5. NONE, "no signal".
//!
//! A rule only runs when the symbol's calibration entry for it is active.
//! Unavailable readings make every comparison that uses them false.

use crate::domain::calibration::{Calibration, RuleTable, SlTarget, Thresholds};
use crate::domain::candle::Candle;
use crate::domain::error::EvaluationError;
use crate::domain::indicator::{IndicatorKind, IndicatorRow, IndicatorSet, IndicatorSettings};
use crate::domain::instrument::InstrumentProfile;
use crate::domain::risk::apply_risk;
use crate::domain::signal::{Action, ReasonCode, Signal};
use std::sync::Arc;

/// RSI level for the reversal rules, independent of calibration.
pub const RSI_EXTREME_OVERBOUGHT: f64 = 70.0;
pub const RSI_EXTREME_OVERSOLD: f64 = 30.0;

const STOCH_BULLISH_FLOOR: f64 = 20.0;
const STOCH_BEARISH_CEILING: f64 = 60.0;
const STOCH_MIN_SEPARATION: f64 = 2.0;
const STOCH_MAX_SEPARATION: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSettings {
    pub indicators: IndicatorSettings,
    pub min_candles: usize,
    pub trend_window: usize,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            indicators: IndicatorSettings::default(),
            min_candles: 50,
            trend_window: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone)]
pub struct RuleEngine {
    calibration: Arc<Calibration>,
    settings: RuleSettings,
}

impl RuleEngine {
    pub fn new(calibration: Arc<Calibration>, settings: RuleSettings) -> Self {
        Self {
            calibration,
            settings,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn settings(&self) -> &RuleSettings {
        &self.settings
    }

    /// Evaluates the latest candle of `candles` for `profile`.
    ///
    /// Never fails: short input gives a NONE signal and internal failures an
    /// ERROR signal carrying the failure message.
    pub fn evaluate(&self, candles: &[Candle], profile: &InstrumentProfile) -> Signal {
        let generated_at = candles.last().map(|c| c.timestamp);
        if candles.len() < self.settings.min_candles.max(2) {
            return Signal::none(&profile.symbol, ReasonCode::InsufficientHistory, generated_at);
        }

        match self.try_evaluate(candles, &profile.symbol) {
            Ok(signal) => signal,
            Err(e) => Signal::error(&profile.symbol, e.to_string(), generated_at),
        }
    }

    fn try_evaluate(&self, candles: &[Candle], symbol: &str) -> Result<Signal, EvaluationError> {
        self.validate_settings()?;
        if let Some(index) = candles.iter().position(|c| {
            !(c.close.is_finite() && c.high.is_finite() && c.low.is_finite())
        }) {
            return Err(EvaluationError::NonFinitePrice { index });
        }

        let set = IndicatorSet::compute(candles, &self.settings.indicators);
        let last = candles.len() - 1;
        let cur = set
            .row(candles, last)
            .ok_or(EvaluationError::MissingRow { index: last })?;
        let prev = set
            .row(candles, last - 1)
            .ok_or(EvaluationError::MissingRow { index: last - 1 })?;
        let trend = classify_trend(&set, candles.len(), self.settings.trend_window);

        Ok(self.decide(symbol, &cur, &prev, trend))
    }

    fn validate_settings(&self) -> Result<(), EvaluationError> {
        let s = &self.settings.indicators;
        let periods = [
            (s.ema_fast, IndicatorKind::Ema(s.ema_fast)),
            (s.ema_slow, IndicatorKind::Ema(s.ema_slow)),
            (s.trend_ema, IndicatorKind::Ema(s.trend_ema)),
            (s.rsi, IndicatorKind::Rsi(s.rsi)),
            (s.adx, IndicatorKind::Adx(s.adx)),
            (s.atr, IndicatorKind::Atr(s.atr)),
            (
                s.stoch_k.min(s.stoch_d),
                IndicatorKind::Stochastic {
                    k_period: s.stoch_k,
                    d_period: s.stoch_d,
                },
            ),
        ];
        if let Some((_, kind)) = periods.iter().find(|(period, _)| *period == 0) {
            return Err(EvaluationError::InvalidPeriod(*kind));
        }
        if self.settings.trend_window == 0 {
            return Err(EvaluationError::EmptyTrendWindow);
        }
        Ok(())
    }

    /// Applies the rule order to already-computed rows.
    pub fn decide(
        &self,
        symbol: &str,
        cur: &IndicatorRow,
        prev: &IndicatorRow,
        trend: Trend,
    ) -> Signal {
        let thresholds = self.calibration.thresholds(symbol);
        let active = |table: RuleTable| self.calibration.active_sl_target(symbol, table);

        let fired = match trend {
            Trend::Bullish => active(RuleTable::TrendFollowing)
                .filter(|_| {
                    rsi_rising_above(cur, prev, thresholds.overbought_rsi)
                        && stochastic_bullish(cur)
                        && adx_trending(cur, prev, &thresholds)
                })
                .map(|m| (Action::Buy, ReasonCode::TrendFollowingOverbought, m))
                .or_else(|| {
                    active(RuleTable::Reversal)
                        .filter(|_| {
                            cur.rsi.is_some_and(|r| r > RSI_EXTREME_OVERBOUGHT)
                                && stochastic_bearish(cur)
                        })
                        .map(|m| (Action::Sell, ReasonCode::BearishReversal, m))
                }),
            Trend::Bearish => active(RuleTable::TrendFollowing)
                .filter(|_| {
                    rsi_falling_below(cur, prev, thresholds.oversold_rsi)
                        && stochastic_bearish(cur)
                        && adx_trending(cur, prev, &thresholds)
                })
                .map(|m| (Action::Sell, ReasonCode::TrendFollowingOversold, m))
                .or_else(|| {
                    active(RuleTable::Reversal)
                        .filter(|_| {
                            cur.rsi.is_some_and(|r| r < RSI_EXTREME_OVERSOLD)
                                && stochastic_bullish(cur)
                        })
                        .map(|m| (Action::Buy, ReasonCode::BullishReversal, m))
                }),
            Trend::Neutral => None,
        };

        let fired = fired.or_else(|| {
            let m = active(RuleTable::EmaCross)?;
            let atr = cur.atr?;
            if (cur.high - cur.low).abs() >= atr {
                return None;
            }
            match ema_cross(cur, prev)? {
                Action::Buy => Some((Action::Buy, ReasonCode::BullishEmaCross, m)),
                _ => Some((Action::Sell, ReasonCode::BearishEmaCross, m)),
            }
        });

        match fired {
            Some((action, code, multiples)) => priced(symbol, action, code, cur, multiples),
            None => Signal::none(symbol, ReasonCode::NoSignal, Some(cur.timestamp)),
        }
    }
}

fn priced(
    symbol: &str,
    action: Action,
    reason_code: ReasonCode,
    cur: &IndicatorRow,
    multiples: SlTarget,
) -> Signal {
    let atr = cur.atr.unwrap_or(0.0);
    let levels = apply_risk(action, reason_code.message(), cur.close, atr, Some(multiples));
    Signal {
        symbol: symbol.to_string(),
        action,
        reason_code,
        reason: levels.reason,
        price: levels.price,
        stop_loss: levels.stop_loss,
        target: levels.target,
        trailing_stop_distance: levels.trailing_stop_distance,
        generated_at: Some(cur.timestamp),
    }
}

/// Trend over the last `window` candles of a series of `len` candles.
pub fn classify_trend(set: &IndicatorSet, len: usize, window: usize) -> Trend {
    if window == 0 || len < window {
        return Trend::Neutral;
    }
    let mut bullish = true;
    let mut bearish = true;
    for i in len - window..len {
        match (set.ema_trend.at_candle(i), set.ema_slow.at_candle(i)) {
            (Some(trend), Some(slow)) => {
                bullish &= trend > slow;
                bearish &= trend < slow;
            }
            _ => return Trend::Neutral,
        }
    }
    match (bullish, bearish) {
        (true, _) => Trend::Bullish,
        (_, true) => Trend::Bearish,
        _ => Trend::Neutral,
    }
}

fn rsi_rising_above(cur: &IndicatorRow, prev: &IndicatorRow, level: f64) -> bool {
    matches!((cur.rsi, prev.rsi), (Some(c), Some(p)) if c > p && p > level)
}

fn rsi_falling_below(cur: &IndicatorRow, prev: &IndicatorRow, level: f64) -> bool {
    matches!((cur.rsi, prev.rsi), (Some(c), Some(p)) if c < p && p < level)
}

fn adx_trending(cur: &IndicatorRow, prev: &IndicatorRow, thresholds: &Thresholds) -> bool {
    matches!((cur.adx, prev.adx), (Some(c), Some(p)) if c >= p && p >= thresholds.trending_adx)
}

fn separated(k: f64, d: f64) -> bool {
    let gap = (d - k).abs();
    gap > STOCH_MIN_SEPARATION && gap < STOCH_MAX_SEPARATION
}

fn stochastic_bullish(cur: &IndicatorRow) -> bool {
    cur.stochastic.is_some_and(|s| {
        s.k > s.d && s.k > STOCH_BULLISH_FLOOR && s.d > STOCH_BULLISH_FLOOR && separated(s.k, s.d)
    })
}

fn stochastic_bearish(cur: &IndicatorRow) -> bool {
    cur.stochastic.is_some_and(|s| {
        s.k < s.d
            && s.k < STOCH_BEARISH_CEILING
            && s.d < STOCH_BEARISH_CEILING
            && separated(s.k, s.d)
    })
}

/// `Buy` for an upward cross of the fast EMA through the slow one, `Sell`
/// for a downward cross.
fn ema_cross(cur: &IndicatorRow, prev: &IndicatorRow) -> Option<Action> {
    let (cf, cs) = (cur.ema_fast?, cur.ema_slow?);
    let (pf, ps) = (prev.ema_fast?, prev.ema_slow?);
    if cf > cs && pf < ps {
        Some(Action::Buy)
    } else if cf < cs && pf > ps {
        Some(Action::Sell)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calibration::InstrumentCalibration;
    use crate::domain::indicator::StochasticValue;
    use crate::domain::instrument::Exchange;
    use proptest::prelude::*;

    fn engine(calibration: Calibration) -> RuleEngine {
        RuleEngine::new(Arc::new(calibration), RuleSettings::default())
    }

    fn profile(symbol: &str) -> InstrumentProfile {
        InstrumentProfile::new(&format!("NSE_EQ|{}", symbol), symbol, Exchange::Nse)
    }

    fn active_everywhere(symbol: &str, overbought: f64) -> Calibration {
        Calibration::empty().with_instrument(
            symbol,
            InstrumentCalibration {
                trend_following: Some(SlTarget::new(1.0, 2.0)),
                reversal: Some(SlTarget::new(0.5, 1.0)),
                ema_cross: Some(SlTarget::new(0.25, 1.0)),
                overbought_rsi: Some(overbought),
                oversold_rsi: Some(40.0),
                trending_adx: Some(25.0),
            },
        )
    }

    fn row(timestamp: i64, close: f64) -> IndicatorRow {
        IndicatorRow {
            timestamp,
            close,
            high: close + 5.0,
            low: close - 5.0,
            atr: Some(20.0),
            rsi: Some(50.0),
            stochastic: Some(StochasticValue { k: 50.0, d: 50.0 }),
            adx: Some(20.0),
            ema_fast: Some(close),
            ema_slow: Some(close - 10.0),
        }
    }

    fn rising_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 1000.0 + 3.0 * i as f64;
                Candle {
                    timestamp: 1_700_000_000 + 3600 * i as i64,
                    open: close - 1.0,
                    high: close + 2.0,
                    low: close - 2.5,
                    close,
                    volume: 100.0,
                }
            })
            .collect()
    }

    #[test]
    fn short_series_is_insufficient_history() {
        let engine = engine(Calibration::builtin());
        let candles = rising_candles(30);
        let signal = engine.evaluate(&candles, &profile("NIFTY"));
        assert_eq!(signal.action, Action::None);
        assert_eq!(signal.reason, "insufficient history");
        assert_eq!(signal.generated_at, Some(candles[29].timestamp));
    }

    #[test]
    fn empty_series_is_insufficient_history() {
        let signal = engine(Calibration::builtin()).evaluate(&[], &profile("NIFTY"));
        assert_eq!(signal.reason_code, ReasonCode::InsufficientHistory);
        assert_eq!(signal.generated_at, None);
    }

    #[test]
    fn trend_following_buy_scenario() {
        let engine = engine(active_everywhere("NIFTY", 50.0));
        let prev = IndicatorRow {
            rsi: Some(55.0),
            adx: Some(26.0),
            ..row(1, 24000.0)
        };
        let cur = IndicatorRow {
            rsi: Some(68.0),
            adx: Some(27.0),
            stochastic: Some(StochasticValue { k: 45.0, d: 42.0 }),
            ..row(2, 24050.0)
        };

        let signal = engine.decide("NIFTY", &cur, &prev, Trend::Bullish);
        assert_eq!(signal.action, Action::Buy);
        assert_eq!(signal.reason_code, ReasonCode::TrendFollowingOverbought);
        assert!(signal.reason.contains("overbought RSI"));
        assert_eq!(signal.stop_loss, 24030.0);
        assert_eq!(signal.target, 24090.0);
        assert_eq!(signal.trailing_stop_distance, 20.0);
        assert_eq!(signal.generated_at, Some(2));
    }

    #[test]
    fn adx_below_threshold_on_previous_bar_blocks_trend_following() {
        let engine = engine(active_everywhere("NIFTY", 50.0));
        let prev = IndicatorRow {
            rsi: Some(55.0),
            adx: Some(22.0),
            ..row(1, 24000.0)
        };
        let cur = IndicatorRow {
            rsi: Some(68.0),
            adx: Some(27.0),
            stochastic: Some(StochasticValue { k: 45.0, d: 42.0 }),
            ..row(2, 24050.0)
        };
        let signal = engine.decide("NIFTY", &cur, &prev, Trend::Bullish);
        assert_ne!(signal.reason_code, ReasonCode::TrendFollowingOverbought);
    }

    #[test]
    fn rsi_threshold_is_checked_on_previous_bar() {
        let engine = engine(active_everywhere("NIFTY", 60.0));
        // Current RSI is above 60 but the previous bar is not.
        let prev = IndicatorRow {
            rsi: Some(55.0),
            adx: Some(26.0),
            ..row(1, 24000.0)
        };
        let cur = IndicatorRow {
            rsi: Some(68.0),
            adx: Some(27.0),
            stochastic: Some(StochasticValue { k: 45.0, d: 42.0 }),
            ..row(2, 24050.0)
        };
        let signal = engine.decide("NIFTY", &cur, &prev, Trend::Bullish);
        assert_eq!(signal.action, Action::None);
    }

    #[test]
    fn bearish_reversal_in_bullish_trend() {
        let engine = engine(active_everywhere("INFY", 60.0));
        let prev = row(1, 1500.0);
        let cur = IndicatorRow {
            rsi: Some(75.0),
            stochastic: Some(StochasticValue { k: 52.0, d: 55.0 }),
            ..row(2, 1510.0)
        };
        let signal = engine.decide("INFY", &cur, &prev, Trend::Bullish);
        assert_eq!(signal.action, Action::Sell);
        assert_eq!(signal.reason_code, ReasonCode::BearishReversal);
        assert_eq!(signal.stop_loss, 1520.0);
        assert_eq!(signal.target, 1490.0);
    }

    #[test]
    fn bearish_trend_following_sell() {
        let engine = engine(active_everywhere("INFY", 60.0));
        let prev = IndicatorRow {
            rsi: Some(35.0),
            adx: Some(30.0),
            ..row(1, 1500.0)
        };
        let cur = IndicatorRow {
            rsi: Some(32.0),
            adx: Some(31.0),
            stochastic: Some(StochasticValue { k: 30.0, d: 33.0 }),
            ..row(2, 1490.0)
        };
        let signal = engine.decide("INFY", &cur, &prev, Trend::Bearish);
        assert_eq!(signal.action, Action::Sell);
        assert_eq!(signal.reason_code, ReasonCode::TrendFollowingOversold);
    }

    #[test]
    fn bullish_reversal_in_bearish_trend() {
        let engine = engine(active_everywhere("INFY", 60.0));
        let prev = row(1, 1500.0);
        let cur = IndicatorRow {
            rsi: Some(25.0),
            stochastic: Some(StochasticValue { k: 28.0, d: 25.0 }),
            ..row(2, 1490.0)
        };
        let signal = engine.decide("INFY", &cur, &prev, Trend::Bearish);
        assert_eq!(signal.action, Action::Buy);
        assert_eq!(signal.reason_code, ReasonCode::BullishReversal);
    }

    #[test]
    fn inactive_entry_disables_rule() {
        // NIFTY's built-in trend-following entry has a zero stop-loss multiple.
        let mut calibration = Calibration::builtin();
        let mut entry = calibration.get("NIFTY").cloned().unwrap();
        entry.overbought_rsi = Some(50.0);
        entry.ema_cross = Some(SlTarget::new(0.0, 0.0));
        entry.reversal = None;
        calibration.insert("NIFTY", entry);

        let prev = IndicatorRow {
            rsi: Some(55.0),
            adx: Some(26.0),
            ..row(1, 24000.0)
        };
        let cur = IndicatorRow {
            rsi: Some(68.0),
            adx: Some(27.0),
            stochastic: Some(StochasticValue { k: 45.0, d: 42.0 }),
            ..row(2, 24050.0)
        };
        let signal = engine(calibration).decide("NIFTY", &cur, &prev, Trend::Bullish);
        assert_eq!(signal.action, Action::None);
        assert_eq!(signal.reason, "no signal");
    }

    #[test]
    fn ema_cross_fallback() {
        let engine = engine(active_everywhere("TCS", 60.0));
        let prev = IndicatorRow {
            ema_fast: Some(3999.0),
            ema_slow: Some(4000.0),
            ..row(1, 4000.0)
        };
        let cur = IndicatorRow {
            ema_fast: Some(4002.0),
            ema_slow: Some(4000.5),
            ..row(2, 4003.0)
        };
        let signal = engine.decide("TCS", &cur, &prev, Trend::Neutral);
        assert_eq!(signal.action, Action::Buy);
        assert_eq!(signal.reason_code, ReasonCode::BullishEmaCross);
        assert!(signal.reason.starts_with("Bullish 9,26 EMA cross. Stop loss ="));

        let wide = IndicatorRow {
            high: cur.close + 15.0,
            low: cur.close - 15.0,
            ..cur
        };
        let signal = engine.decide("TCS", &wide, &prev, Trend::Neutral);
        assert_eq!(signal.action, Action::None);
    }

    #[test]
    fn bearish_ema_cross() {
        let engine = engine(active_everywhere("TCS", 60.0));
        let prev = IndicatorRow {
            ema_fast: Some(4001.0),
            ema_slow: Some(4000.0),
            ..row(1, 4000.0)
        };
        let cur = IndicatorRow {
            ema_fast: Some(3998.0),
            ema_slow: Some(3999.5),
            ..row(2, 3995.0)
        };
        let signal = engine.decide("TCS", &cur, &prev, Trend::Neutral);
        assert_eq!(signal.action, Action::Sell);
        assert_eq!(signal.reason_code, ReasonCode::BearishEmaCross);
    }

    #[test]
    fn unavailable_readings_never_fire() {
        let engine = engine(active_everywhere("NIFTY", 50.0));
        let prev = IndicatorRow {
            rsi: None,
            adx: Some(26.0),
            ..row(1, 24000.0)
        };
        let cur = IndicatorRow {
            rsi: Some(68.0),
            adx: Some(27.0),
            stochastic: None,
            atr: None,
            ..row(2, 24050.0)
        };
        let signal = engine.decide("NIFTY", &cur, &prev, Trend::Bullish);
        assert_eq!(signal.action, Action::None);
    }

    #[test]
    fn non_finite_close_becomes_error_signal() {
        let mut candles = rising_candles(60);
        candles[40].close = f64::NAN;
        let signal = engine(Calibration::builtin()).evaluate(&candles, &profile("NIFTY"));
        assert_eq!(signal.action, Action::Error);
        assert!(signal.reason.contains("candle 40"));
    }

    #[test]
    fn zero_period_becomes_error_signal() {
        let settings = RuleSettings {
            indicators: IndicatorSettings {
                rsi: 0,
                ..IndicatorSettings::default()
            },
            ..RuleSettings::default()
        };
        let engine = RuleEngine::new(Arc::new(Calibration::builtin()), settings);
        let signal = engine.evaluate(&rising_candles(60), &profile("NIFTY"));
        assert_eq!(signal.action, Action::Error);
        assert!(signal.reason.contains("RSI(0)"));
    }

    #[test]
    fn rising_series_is_bullish() {
        let candles = rising_candles(60);
        let set = IndicatorSet::compute(&candles, &IndicatorSettings::default());
        assert_eq!(classify_trend(&set, candles.len(), 5), Trend::Bullish);
    }

    #[test]
    fn evaluate_is_idempotent() {
        let engine = engine(Calibration::builtin());
        let candles = rising_candles(80);
        let p = profile("SILVERM");
        assert_eq!(engine.evaluate(&candles, &p), engine.evaluate(&candles, &p));
    }

    /// `first` one-point steps in one direction, then `second` steps back,
    /// with 0.2 wicks so every candle is narrower than ATR.
    fn turning_candles(first: usize, second: usize, base: f64, first_step: f64) -> Vec<Candle> {
        let mut close = base;
        (0..first + second)
            .map(|i| {
                close += if i < first { first_step } else { -first_step };
                Candle {
                    timestamp: 1_700_000_000 + 3600 * i as i64,
                    open: close,
                    high: close + 0.2,
                    low: close - 0.2,
                    close,
                    volume: 100.0,
                }
            })
            .collect()
    }

    /// First candle index where EMA(fast) crosses EMA(slow).
    fn first_cross(candles: &[Candle]) -> usize {
        let set = IndicatorSet::compute(candles, &IndicatorSettings::default());
        (1..candles.len())
            .find(|&i| {
                let cur = set.row(candles, i).unwrap();
                let prev = set.row(candles, i - 1).unwrap();
                ema_cross(&cur, &prev).is_some()
            })
            .expect("series never crosses")
    }

    fn assert_cross_fires(candles: &[Candle], action: Action, code: ReasonCode) {
        let cross = first_cross(candles);
        assert!(cross + 1 >= RuleSettings::default().min_candles);
        let window = &candles[..=cross];

        let engine = engine(Calibration::builtin());
        let signal = engine.evaluate(window, &profile("SILVERM"));
        assert_eq!(signal.action, action);
        assert_eq!(signal.reason_code, code);
        assert_eq!(signal.generated_at, Some(window[cross].timestamp));

        // SILVERM crosses use 0.5 ATR stop, 2 ATR target
        let set = IndicatorSet::compute(window, &IndicatorSettings::default());
        let cur = set.row(window, cross).unwrap();
        let atr = cur.atr.unwrap();
        assert!(cur.high - cur.low < atr);
        let (stop, target) = match action {
            Action::Sell => (cur.close + 0.5 * atr, cur.close - 2.0 * atr),
            _ => (cur.close - 0.5 * atr, cur.close + 2.0 * atr),
        };
        assert_eq!(signal.price, crate::domain::risk::format_price(cur.close));
        assert_eq!(signal.stop_loss, crate::domain::risk::format_price(stop));
        assert_eq!(signal.target, crate::domain::risk::format_price(target));
        assert_eq!(
            signal.reason,
            format!(
                "{}. Stop loss = {} and Target {}",
                code.message(),
                signal.stop_loss,
                signal.target
            )
        );
    }

    #[test]
    fn candles_falling_then_rising_fire_bullish_cross() {
        let candles = turning_candles(60, 25, 1060.0, -1.0);
        assert_cross_fires(&candles, Action::Buy, ReasonCode::BullishEmaCross);
    }

    #[test]
    fn candles_rising_then_falling_fire_bearish_cross() {
        let candles = turning_candles(60, 25, 940.0, 1.0);
        assert_cross_fires(&candles, Action::Sell, ReasonCode::BearishEmaCross);
    }

    #[test]
    fn bar_after_cross_is_not_a_cross() {
        let candles = turning_candles(60, 25, 1060.0, -1.0);
        let cross = first_cross(&candles);
        let signal = engine(Calibration::builtin()).evaluate(&candles[..=cross + 1], &profile("SILVERM"));
        assert_ne!(signal.reason_code, ReasonCode::BullishEmaCross);
    }

    proptest! {
        #[test]
        fn monotonic_closes_never_trend_following_sell(
            n in 50usize..120,
            steps in prop::collection::vec(0.01f64..5.0, 120),
            wicks in prop::collection::vec(0.0f64..3.0, 120),
        ) {
            let mut close = 500.0;
            let candles: Vec<Candle> = (0..n)
                .map(|i| {
                    close += steps[i];
                    Candle {
                        timestamp: 1_700_000_000 + 300 * i as i64,
                        open: close - steps[i] / 2.0,
                        high: close + wicks[i],
                        low: close - steps[i] - wicks[i],
                        close,
                        volume: 10.0,
                    }
                })
                .collect();

            let set = IndicatorSet::compute(&candles, &IndicatorSettings::default());
            prop_assert_eq!(classify_trend(&set, n, 5), Trend::Bullish);

            let engine = RuleEngine::new(
                Arc::new(active_everywhere("SILVERM", 0.0)),
                RuleSettings::default(),
            );
            let signal = engine.evaluate(&candles, &profile("SILVERM"));
            prop_assert_ne!(signal.reason_code, ReasonCode::TrendFollowingOversold);
            prop_assert_ne!(signal.action, Action::Error);
        }
    }
}
