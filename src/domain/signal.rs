//! Trade recommendation produced by one rule evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    None,
    Error,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::None => "NONE",
            Action::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Which rule (or short-circuit) produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    InsufficientHistory,
    TrendFollowingOverbought,
    TrendFollowingOversold,
    BearishReversal,
    BullishReversal,
    BullishEmaCross,
    BearishEmaCross,
    NoSignal,
    EvaluationFailed,
}

impl ReasonCode {
    /// Human-readable reason attached to the signal before risk levels are
    /// appended.
    pub fn message(self) -> &'static str {
        match self {
            ReasonCode::InsufficientHistory => "insufficient history",
            ReasonCode::TrendFollowingOverbought => "Bullish trend following overbought RSI",
            ReasonCode::TrendFollowingOversold => "Bearish trend following oversold RSI",
            ReasonCode::BearishReversal => "Bearish trend reversal",
            ReasonCode::BullishReversal => "Bullish reversal",
            ReasonCode::BullishEmaCross => "Bullish 9,26 EMA cross",
            ReasonCode::BearishEmaCross => "Bearish 9,26 EMA cross",
            ReasonCode::NoSignal => "no signal",
            ReasonCode::EvaluationFailed => "evaluation failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub action: Action,
    pub reason_code: ReasonCode,
    pub reason: String,
    pub price: f64,
    pub stop_loss: f64,
    pub target: f64,
    pub trailing_stop_distance: f64,
    /// Epoch seconds of the last candle the signal was computed from.
    pub generated_at: Option<i64>,
}

impl Signal {
    /// A NONE signal carrying only a reason.
    pub fn none(symbol: &str, reason_code: ReasonCode, generated_at: Option<i64>) -> Self {
        Self {
            symbol: symbol.to_string(),
            action: Action::None,
            reason_code,
            reason: reason_code.message().to_string(),
            price: 0.0,
            stop_loss: 0.0,
            target: 0.0,
            trailing_stop_distance: 0.0,
            generated_at,
        }
    }

    pub fn error(symbol: &str, message: impl Into<String>, generated_at: Option<i64>) -> Self {
        Self {
            action: Action::Error,
            reason: message.into(),
            ..Self::none(symbol, ReasonCode::EvaluationFailed, generated_at)
        }
    }

    pub fn is_actionable(&self) -> bool {
        matches!(self.action, Action::Buy | Action::Sell)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.symbol, self.action, self.reason)
    }
}
