//! Core domain types and logic.

pub mod candle;
pub mod normalize;
pub mod indicator;
pub mod instrument;
pub mod calibration;
pub mod signal;
pub mod risk;
pub mod rule_eval;
pub mod market_clock;
pub mod watchlist;
pub mod scheduler;
pub mod config_validation;
pub mod error;
