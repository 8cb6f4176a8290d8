//! The set of instruments under watch.
//!
//! A [`WatchList`] is a cheap-to-clone handle over a shared, ordered list.
//! Mutations are serialized by its lock; the scheduler takes a
//! [`WatchList::snapshot`] at the start of every pass, so edits apply from
//! the next pass on.

use crate::domain::config_validation::validate_positive_int;
use crate::domain::error::{SignalwatchError, TimeframeError};
use crate::domain::instrument::{CandleUnit, Exchange, InstrumentProfile, Timeframe};
use crate::ports::config_port::ConfigPort;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const SECTION_PREFIX: &str = "instrument.";

#[derive(Debug, Clone, Default)]
pub struct WatchList {
    inner: Arc<RwLock<Vec<InstrumentProfile>>>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = InstrumentProfile>) -> Self {
        let list = Self::new();
        for profile in profiles {
            list.add(profile);
        }
        list
    }

    /// Builds a list from `[instrument.<name>]` sections, ordered by section
    /// name.
    ///
    /// `key` is required. `symbol` defaults to the upper-cased section name,
    /// `exchange` to the classification of the key, and the timeframe to
    /// 5 minutes.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SignalwatchError> {
        let mut sections: Vec<String> = config
            .sections()
            .into_iter()
            .filter(|s| s.starts_with(SECTION_PREFIX))
            .collect();
        sections.sort();

        let list = Self::new();
        for section in sections {
            let profile = profile_from_section(config, &section)?;
            if !list.add(profile) {
                return Err(SignalwatchError::ConfigInvalid {
                    section: section.clone(),
                    key: "key".to_string(),
                    reason: "instrument key is already watched".to_string(),
                });
            }
        }
        Ok(list)
    }

    /// Appends `profile`, or replaces the entry with the same instrument key
    /// in place. Returns `true` when the key was not watched before.
    pub fn add(&self, profile: InstrumentProfile) -> bool {
        let mut list = self.write();
        match list.iter_mut().find(|p| p.instrument_key == profile.instrument_key) {
            Some(existing) => {
                *existing = profile;
                false
            }
            None => {
                list.push(profile);
                true
            }
        }
    }

    pub fn remove(&self, instrument_key: &str) -> bool {
        let mut list = self.write();
        let before = list.len();
        list.retain(|p| p.instrument_key != instrument_key);
        list.len() != before
    }

    /// Sets the analysis timeframe of a watched instrument.
    ///
    /// Invalid `(unit, interval)` pairs are rejected before anything changes.
    /// Returns `Ok(false)` when the key is not watched.
    pub fn update_timeframe(
        &self,
        instrument_key: &str,
        unit: CandleUnit,
        interval: u32,
    ) -> Result<bool, TimeframeError> {
        let timeframe = Timeframe::new(unit, interval)?;
        let mut list = self.write();
        match list.iter_mut().find(|p| p.instrument_key == instrument_key) {
            Some(profile) => {
                profile.timeframe = timeframe;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn get(&self, instrument_key: &str) -> Option<InstrumentProfile> {
        self.read()
            .iter()
            .find(|p| p.instrument_key == instrument_key)
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<InstrumentProfile> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave the Vec half-updated, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Vec<InstrumentProfile>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<InstrumentProfile>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn profile_from_section(
    config: &dyn ConfigPort,
    section: &str,
) -> Result<InstrumentProfile, SignalwatchError> {
    let name = &section[SECTION_PREFIX.len()..];
    let key = config
        .get_string(section, "key")
        .ok_or_else(|| SignalwatchError::ConfigMissing {
            section: section.to_string(),
            key: "key".to_string(),
        })?;
    let symbol = config
        .get_string(section, "symbol")
        .unwrap_or_else(|| name.to_string())
        .to_uppercase();
    let exchange = match config.get_string(section, "exchange") {
        Some(raw) => raw.parse::<Exchange>().unwrap_or(Exchange::Nse),
        None => Exchange::from_instrument_key(&key),
    };

    let unit = match config.get_string(section, "unit") {
        Some(raw) => raw.parse::<CandleUnit>()?,
        None => Timeframe::DEFAULT.unit,
    };
    validate_positive_int(config, section, "interval", i64::from(u32::MAX))?;
    let raw_interval = config.get_int(section, "interval", i64::from(Timeframe::DEFAULT.interval));
    let interval = u32::try_from(raw_interval).map_err(|_| SignalwatchError::ConfigInvalid {
        section: section.to_string(),
        key: "interval".to_string(),
        reason: "interval must be a positive integer".to_string(),
    })?;

    Ok(InstrumentProfile {
        instrument_key: key,
        symbol,
        exchange,
        timeframe: Timeframe::new(unit, interval)?,
    })
}
