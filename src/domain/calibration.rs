//! Per-instrument calibration tables.
//!
//! Three stop-loss/target tables (trend following, reversal, EMA cross) give
//! ATR multiples per trading symbol; three threshold tables give the
//! overbought RSI, oversold RSI and trending ADX levels. A table entry is
//! *active* when its stop-loss multiple is positive; inactive or missing
//! entries switch the corresponding rule off for that symbol.
//!
//! A [`Calibration`] is built once and shared read-only (`Arc`) by every
//! evaluation.

use crate::domain::error::SignalwatchError;
use crate::ports::config_port::ConfigPort;
use std::collections::HashMap;

pub const SECTION_PREFIX: &str = "calibration.";

pub const DEFAULT_OVERBOUGHT_RSI: f64 = 60.0;
pub const DEFAULT_OVERSOLD_RSI: f64 = 40.0;
pub const DEFAULT_TRENDING_ADX: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlTarget {
    pub stop_loss_atr: f64,
    pub target_atr: f64,
}

impl SlTarget {
    pub const fn new(stop_loss_atr: f64, target_atr: f64) -> Self {
        Self {
            stop_loss_atr,
            target_atr,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stop_loss_atr > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleTable {
    TrendFollowing,
    Reversal,
    EmaCross,
}

impl RuleTable {
    pub fn config_key(self) -> &'static str {
        match self {
            RuleTable::TrendFollowing => "trend_following",
            RuleTable::Reversal => "reversal",
            RuleTable::EmaCross => "ema_cross",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub overbought_rsi: f64,
    pub oversold_rsi: f64,
    pub trending_adx: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            overbought_rsi: DEFAULT_OVERBOUGHT_RSI,
            oversold_rsi: DEFAULT_OVERSOLD_RSI,
            trending_adx: DEFAULT_TRENDING_ADX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentCalibration {
    pub trend_following: Option<SlTarget>,
    pub reversal: Option<SlTarget>,
    pub ema_cross: Option<SlTarget>,
    pub overbought_rsi: Option<f64>,
    pub oversold_rsi: Option<f64>,
    pub trending_adx: Option<f64>,
}

impl InstrumentCalibration {
    pub fn table(&self, table: RuleTable) -> Option<SlTarget> {
        match table {
            RuleTable::TrendFollowing => self.trend_following,
            RuleTable::Reversal => self.reversal,
            RuleTable::EmaCross => self.ema_cross,
        }
    }

    fn table_mut(&mut self, table: RuleTable) -> &mut Option<SlTarget> {
        match table {
            RuleTable::TrendFollowing => &mut self.trend_following,
            RuleTable::Reversal => &mut self.reversal,
            RuleTable::EmaCross => &mut self.ema_cross,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calibration {
    instruments: HashMap<String, InstrumentCalibration>,
}

impl Calibration {
    /// A calibration with no entries: every rule is inactive.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Tables tuned for the NSE indices, stocks and MCX commodities the
    /// watch list was built around.
    pub fn builtin() -> Self {
        // symbol, trend following, reversal, ema cross, overbought, oversold, trending adx
        const TABLE: &[(&str, (f64, f64), (f64, f64), (f64, f64), f64, f64, f64)] = &[
            ("SILVERM", (1.0, 2.0), (0.25, 1.0), (0.5, 2.0), 70.0, 30.0, 25.0),
            ("GOLDM", (0.25, 1.0), (0.25, 1.0), (0.5, 1.0), 60.0, 40.0, 20.0),
            ("NATURALGAS", (0.0, 0.0), (0.25, 1.0), (0.25, 1.0), 70.0, 30.0, 25.0),
            ("ALUMINI", (0.5, 2.0), (0.25, 1.0), (0.25, 1.0), 60.0, 40.0, 25.0),
            ("NIFTY", (0.0, 0.0), (1.0, 2.0), (0.25, 1.0), 60.0, 40.0, 25.0),
            ("BANKNIFTY", (0.0, 0.0), (0.25, 1.0), (0.5, 1.0), 60.0, 40.0, 20.0),
            ("MIDCPNIFTY", (0.0, 0.0), (0.5, 2.0), (0.5, 2.0), 60.0, 40.0, 25.0),
            ("INFY", (0.5, 2.0), (1.0, 2.0), (1.0, 2.0), 60.0, 40.0, 25.0),
            ("BSE", (0.0, 0.0), (0.25, 2.0), (0.25, 1.0), 60.0, 40.0, 25.0),
            ("TCS", (0.0, 0.0), (0.25, 2.0), (0.25, 1.0), 60.0, 40.0, 25.0),
            ("NIFTYNXT50", (0.25, 1.0), (0.25, 1.0), (0.25, 1.0), 60.0, 40.0, 25.0),
            ("FINNIFTY", (0.25, 1.0), (1.0, 2.0), (1.0, 2.0), 60.0, 40.0, 25.0),
        ];

        let mut calibration = Self::empty();
        for &(symbol, tf, rev, ema, ob, os, adx) in TABLE {
            calibration.insert(
                symbol,
                InstrumentCalibration {
                    trend_following: Some(SlTarget::new(tf.0, tf.1)),
                    reversal: Some(SlTarget::new(rev.0, rev.1)),
                    ema_cross: Some(SlTarget::new(ema.0, ema.1)),
                    overbought_rsi: Some(ob),
                    oversold_rsi: Some(os),
                    trending_adx: Some(adx),
                },
            );
        }
        calibration
    }

    /// The built-in tables overlaid with `[calibration.<SYMBOL>]` sections.
    ///
    /// Keys set in a section replace the built-in value for that symbol;
    /// keys left out keep it.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SignalwatchError> {
        let mut calibration = Self::builtin();
        for section in config.sections() {
            let Some(symbol) = section.strip_prefix(SECTION_PREFIX) else {
                continue;
            };
            let mut entry = calibration.get(symbol).cloned().unwrap_or_default();

            for table in [RuleTable::TrendFollowing, RuleTable::Reversal, RuleTable::EmaCross] {
                if let Some(raw) = config.get_string(&section, table.config_key()) {
                    *entry.table_mut(table) = Some(parse_sl_target(&section, table.config_key(), &raw)?);
                }
            }
            if let Some(v) = parse_threshold(config, &section, "overbought_rsi")? {
                entry.overbought_rsi = Some(v);
            }
            if let Some(v) = parse_threshold(config, &section, "oversold_rsi")? {
                entry.oversold_rsi = Some(v);
            }
            if let Some(v) = parse_threshold(config, &section, "trending_adx")? {
                entry.trending_adx = Some(v);
            }

            calibration.insert(symbol, entry);
        }
        Ok(calibration)
    }

    pub fn insert(&mut self, symbol: &str, entry: InstrumentCalibration) {
        self.instruments.insert(symbol.to_uppercase(), entry);
    }

    pub fn with_instrument(mut self, symbol: &str, entry: InstrumentCalibration) -> Self {
        self.insert(symbol, entry);
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&InstrumentCalibration> {
        self.instruments.get(&symbol.to_uppercase())
    }

    pub fn sl_target(&self, symbol: &str, table: RuleTable) -> Option<SlTarget> {
        self.get(symbol).and_then(|entry| entry.table(table))
    }

    /// The entry for `table`, only when it is present and active.
    pub fn active_sl_target(&self, symbol: &str, table: RuleTable) -> Option<SlTarget> {
        self.sl_target(symbol, table).filter(SlTarget::is_active)
    }

    /// Thresholds for `symbol`, falling back to 60/40/25 per missing value.
    pub fn thresholds(&self, symbol: &str) -> Thresholds {
        let defaults = Thresholds::default();
        match self.get(symbol) {
            Some(entry) => Thresholds {
                overbought_rsi: entry.overbought_rsi.unwrap_or(defaults.overbought_rsi),
                oversold_rsi: entry.oversold_rsi.unwrap_or(defaults.oversold_rsi),
                trending_adx: entry.trending_adx.unwrap_or(defaults.trending_adx),
            },
            None => defaults,
        }
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.instruments.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

fn parse_sl_target(section: &str, key: &str, raw: &str) -> Result<SlTarget, SignalwatchError> {
    let invalid = |reason: &str| SignalwatchError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(invalid("expected '<stop_loss_atr>, <target_atr>'"));
    }
    let stop_loss_atr: f64 = parts[0]
        .parse()
        .map_err(|_| invalid("stop-loss multiple is not a number"))?;
    let target_atr: f64 = parts[1]
        .parse()
        .map_err(|_| invalid("target multiple is not a number"))?;
    if !(stop_loss_atr >= 0.0 && target_atr >= 0.0) {
        return Err(invalid("ATR multiples must be non-negative"));
    }
    Ok(SlTarget::new(stop_loss_atr, target_atr))
}

fn parse_threshold(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, SignalwatchError> {
    if config.get_string(section, key).is_none() {
        return Ok(None);
    }
    // NaN marks a value that is present but not a number.
    let value = config.get_double(section, key, f64::NAN);
    if (0.0..=100.0).contains(&value) {
        Ok(Some(value))
    } else {
        Err(SignalwatchError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: "must be a number between 0 and 100".to_string(),
        })
    }
}
