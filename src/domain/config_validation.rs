//! Configuration validation and loading.
//!
//! Validates every section before anything is built, then assembles the
//! pieces a watch run needs.

use crate::domain::calibration::Calibration;
use crate::domain::error::SignalwatchError;
use crate::domain::indicator::IndicatorSettings;
use crate::domain::rule_eval::RuleSettings;
use crate::domain::scheduler::{DEFAULT_LOOKBACK_DAYS, DEFAULT_POLL_INTERVAL, SchedulerConfig};
use crate::domain::watchlist::WatchList;
use crate::ports::candle_source::Credential;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted when `[source] token` is not set.
pub const TOKEN_ENV: &str = "SIGNALWATCH_TOKEN";

const MAX_LOOKBACK_DAYS: i64 = 366;
const MAX_TREND_EMA_PERIOD: i64 = 200;

pub struct WatchConfig {
    pub scheduler: SchedulerConfig,
    pub rules: RuleSettings,
    pub calibration: Calibration,
    pub watchlist: WatchList,
    pub data_dir: PathBuf,
    pub credential: Option<Credential>,
}

/// Checks everything `load_watch_config` would read.
pub fn validate_watch_config(config: &dyn ConfigPort) -> Result<(), SignalwatchError> {
    validate_scheduler_config(config)?;
    validate_source_config(config)?;
    let watchlist = WatchList::from_config(config)?;
    if watchlist.is_empty() {
        return Err(SignalwatchError::ConfigMissing {
            section: "instrument.<name>".to_string(),
            key: "key".to_string(),
        });
    }
    Calibration::from_config(config)?;
    Ok(())
}

pub fn validate_scheduler_config(config: &dyn ConfigPort) -> Result<(), SignalwatchError> {
    validate_positive_int(config, "scheduler", "poll_interval_secs", i64::MAX)?;
    validate_positive_int(config, "scheduler", "lookback_days", MAX_LOOKBACK_DAYS)?;
    validate_positive_int(config, "scheduler", "trend_ema_period", MAX_TREND_EMA_PERIOD)?;
    Ok(())
}

pub fn validate_source_config(config: &dyn ConfigPort) -> Result<(), SignalwatchError> {
    match config.get_string("source", "data_dir") {
        Some(_) => Ok(()),
        None => Err(SignalwatchError::ConfigMissing {
            section: "source".to_string(),
            key: "data_dir".to_string(),
        }),
    }
}

/// Absent keys are fine; present ones must be integers in `1..=max`.
pub(crate) fn validate_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    max: i64,
) -> Result<(), SignalwatchError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(());
    };
    match raw.parse::<i64>() {
        Ok(v) if (1..=max).contains(&v) => Ok(()),
        _ => Err(SignalwatchError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: if max == i64::MAX {
                format!("{} must be a positive integer", key)
            } else {
                format!("{} must be an integer between 1 and {}", key, max)
            },
        }),
    }
}

pub fn load_scheduler_config(config: &dyn ConfigPort) -> Result<SchedulerConfig, SignalwatchError> {
    validate_scheduler_config(config)?;
    let poll_secs = config.get_int(
        "scheduler",
        "poll_interval_secs",
        DEFAULT_POLL_INTERVAL.as_secs() as i64,
    );
    let lookback = config.get_int("scheduler", "lookback_days", DEFAULT_LOOKBACK_DAYS as i64);
    Ok(SchedulerConfig {
        poll_interval: Duration::from_secs(poll_secs as u64),
        lookback_days: lookback as u32,
    })
}

pub fn load_rule_settings(config: &dyn ConfigPort) -> Result<RuleSettings, SignalwatchError> {
    validate_scheduler_config(config)?;
    let defaults = IndicatorSettings::default();
    let trend_ema = config.get_int("scheduler", "trend_ema_period", defaults.trend_ema as i64);
    Ok(RuleSettings {
        indicators: IndicatorSettings {
            trend_ema: trend_ema as usize,
            ..defaults
        },
        ..RuleSettings::default()
    })
}

/// Validates and assembles a watch run. `env_token` is the value of
/// [`TOKEN_ENV`], used when the file carries no token.
pub fn load_watch_config(
    config: &dyn ConfigPort,
    env_token: Option<String>,
) -> Result<WatchConfig, SignalwatchError> {
    validate_watch_config(config)?;

    let data_dir = config
        .get_string("source", "data_dir")
        .map(PathBuf::from)
        .ok_or_else(|| SignalwatchError::ConfigMissing {
            section: "source".to_string(),
            key: "data_dir".to_string(),
        })?;
    let credential = config
        .get_string("source", "token")
        .or(env_token)
        .and_then(Credential::new);

    Ok(WatchConfig {
        scheduler: load_scheduler_config(config)?,
        rules: load_rule_settings(config)?,
        calibration: Calibration::from_config(config)?,
        watchlist: WatchList::from_config(config)?,
        data_dir,
        credential,
    })
}
