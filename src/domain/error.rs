//! Domain error types.

use crate::domain::indicator::IndicatorKind;
use crate::domain::instrument::CandleUnit;

/// An invalid `(unit, interval)` pair for a candle request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeframeError {
    #[error("invalid unit: {0} (expected minutes, hours, days, weeks or months)")]
    UnknownUnit(String),

    #[error("invalid interval for {unit}: {interval} (must be between {min} and {max})")]
    OutOfRange {
        unit: CandleUnit,
        interval: u32,
        min: u32,
        max: u32,
    },
}

/// Unexpected failure inside rule evaluation. Never leaves the engine: it
/// is turned into an ERROR signal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("non-finite price at candle {index}")]
    NonFinitePrice { index: usize },

    #[error("invalid indicator period for {0}")]
    InvalidPeriod(IndicatorKind),

    #[error("trend window must be at least 1")]
    EmptyTrendWindow,

    #[error("no indicator row at candle {index}")]
    MissingRow { index: usize },
}

/// Top-level error type for signalwatch.
#[derive(Debug, thiserror::Error)]
pub enum SignalwatchError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Timeframe(#[from] TimeframeError),

    #[error("candle fetch failed for {instrument}: {reason}")]
    Fetch { instrument: String, reason: String },

    #[error("no data for {instrument}")]
    NoData { instrument: String },

    #[error("candle source credential is missing; refusing to start")]
    MissingCredential,

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SignalwatchError> for std::process::ExitCode {
    fn from(err: &SignalwatchError) -> Self {
        let code: u8 = match err {
            SignalwatchError::Io(_) => 1,
            SignalwatchError::ConfigParse { .. }
            | SignalwatchError::ConfigMissing { .. }
            | SignalwatchError::ConfigInvalid { .. }
            | SignalwatchError::Timeframe(_) => 2,
            SignalwatchError::Fetch { .. } => 3,
            SignalwatchError::MissingCredential | SignalwatchError::AlreadyRunning => 4,
            SignalwatchError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
