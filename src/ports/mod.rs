//! Port traits the domain depends on.

pub mod candle_source;
pub mod config_port;
pub mod signal_sink;
