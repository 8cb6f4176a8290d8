//! Periodic, concurrent re-evaluation of the watch list.
//!
//! The scheduler is an explicit Idle/Running state machine. Starting it
//! spawns one coordinating task that runs a pass immediately and then once
//! per poll interval until the cancellation token fires. Each pass fans out
//! one task per watched instrument, waits for all of them, and publishes the
//! merged [`WatchSnapshot`] with a single atomic replace.
//!
//! Per-instrument failures (fetch errors, invalid timeframes, panics) become
//! [`InstrumentStatus::Error`] entries and never abort the pass. A payload
//! with no usable candles is not a failure: it yields a NONE signal.

use crate::domain::error::SignalwatchError;
use crate::domain::instrument::InstrumentProfile;
use crate::domain::market_clock::{self, Clock};
use crate::domain::normalize::normalize;
use crate::domain::rule_eval::RuleEngine;
use crate::domain::signal::Signal;
use crate::domain::watchlist::WatchList;
use crate::ports::candle_source::{CandleRequest, CandleSource, Credential};
use crate::ports::signal_sink::SignalSink;
use chrono::{DateTime, Days, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_LOOKBACK_DAYS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// Calendar days of candles requested per fetch, ending today.
    pub lookback_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

/// Latest known state of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InstrumentStatus {
    Active(Signal),
    Closed { message: String },
    Error { message: String },
}

/// Result of one pass, keyed by instrument key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WatchSnapshot {
    /// Pass number, starting at 1. Zero before the first pass.
    pub pass: u64,
    pub generated_at: Option<DateTime<Utc>>,
    pub entries: BTreeMap<String, InstrumentStatus>,
}

impl WatchSnapshot {
    pub fn get(&self, instrument_key: &str) -> Option<&InstrumentStatus> {
        self.entries.get(instrument_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum State {
    Idle,
    Running {
        token: CancellationToken,
        handle: JoinHandle<()>,
    },
}

struct Shared<S, C> {
    source: S,
    clock: C,
    engine: RuleEngine,
    watchlist: WatchList,
    config: SchedulerConfig,
    sinks: Vec<Arc<dyn SignalSink>>,
    snapshot_tx: watch::Sender<Arc<WatchSnapshot>>,
    passes: AtomicU64,
}

pub struct WatchScheduler<S, C> {
    shared: Arc<Shared<S, C>>,
    state: Mutex<State>,
}

impl<S: CandleSource, C: Clock + 'static> WatchScheduler<S, C> {
    pub fn new(
        source: S,
        clock: C,
        engine: RuleEngine,
        watchlist: WatchList,
        config: SchedulerConfig,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(WatchSnapshot::default()));
        Self {
            shared: Arc::new(Shared {
                source,
                clock,
                engine,
                watchlist,
                config,
                sinks: Vec::new(),
                snapshot_tx,
                passes: AtomicU64::new(0),
            }),
            state: Mutex::new(State::Idle),
        }
    }

    /// Adds a sink that receives every published snapshot.
    ///
    /// Must be called before [`start`](Self::start); ignored otherwise.
    pub fn with_sink(mut self, sink: Arc<dyn SignalSink>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.sinks.push(sink),
            None => warn!("sink added to a scheduler that has already started; ignoring"),
        }
        self
    }

    /// Idle → Running. Runs one pass right away, then one per poll interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, credential: Option<Credential>) -> Result<(), SignalwatchError> {
        let credential = credential.ok_or(SignalwatchError::MissingCredential)?;
        let mut state = self.state();
        if let State::Running { handle, .. } = &*state
            && !handle.is_finished()
        {
            return Err(SignalwatchError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            credential,
            token.clone(),
        ));
        info!(
            instruments = self.shared.watchlist.len(),
            poll_interval_secs = self.shared.config.poll_interval.as_secs(),
            "watch scheduler started"
        );
        *state = State::Running { token, handle };
        Ok(())
    }

    /// Running → Idle. No pass starts after this returns; results of a pass
    /// already in flight are discarded. Returns `false` when already idle.
    pub fn stop(&self) -> bool {
        match std::mem::replace(&mut *self.state(), State::Idle) {
            State::Running { token, .. } => {
                token.cancel();
                info!("watch scheduler stopping");
                true
            }
            State::Idle => false,
        }
    }

    /// [`stop`](Self::stop), then wait for the coordinating task to exit.
    pub async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state(), State::Idle);
        if let State::Running { token, handle } = previous {
            token.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "watch loop ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.state(), State::Running { handle, .. } if !handle.is_finished())
    }

    /// Runs and publishes a single pass without arming the timer.
    pub async fn run_once(&self, credential: &Credential) -> Arc<WatchSnapshot> {
        let snapshot = Arc::clone(&self.shared).pass(credential).await;
        self.shared.publish(snapshot)
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<WatchSnapshot> {
        self.shared.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<WatchSnapshot>> {
        self.shared.snapshot_tx.subscribe()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<S, C> Drop for WatchScheduler<S, C> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if let State::Running { token, .. } = state {
            token.cancel();
        }
    }
}

async fn run_loop<S: CandleSource, C: Clock + 'static>(
    shared: Arc<Shared<S, C>>,
    credential: Credential,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(shared.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // The first tick completes immediately.
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let snapshot = tokio::select! {
            _ = token.cancelled() => break,
            snapshot = Arc::clone(&shared).pass(&credential) => snapshot,
        };
        if token.is_cancelled() {
            break;
        }
        shared.publish(snapshot);
    }
    info!("watch scheduler stopped");
}

impl<S: CandleSource, C: Clock + 'static> Shared<S, C> {
    async fn pass(self: Arc<Self>, credential: &Credential) -> WatchSnapshot {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.clock.now();
        let profiles = self.watchlist.snapshot();
        debug!(pass, instruments = profiles.len(), "watch pass started");

        let (keys, handles): (Vec<String>, Vec<JoinHandle<InstrumentStatus>>) = profiles
            .into_iter()
            .map(|profile| {
                let shared = Arc::clone(&self);
                let credential = credential.clone();
                let key = profile.instrument_key.clone();
                let handle = tokio::spawn(async move {
                    shared.evaluate_instrument(&credential, &profile, now).await
                });
                (key, handle)
            })
            .unzip();

        let entries = keys
            .into_iter()
            .zip(join_all(handles).await)
            .map(|(key, joined)| {
                let status = joined.unwrap_or_else(|e| {
                    warn!(instrument = %key, error = %e, "instrument task failed");
                    InstrumentStatus::Error {
                        message: format!("evaluation task failed: {}", e),
                    }
                });
                (key, status)
            })
            .collect();

        WatchSnapshot {
            pass,
            generated_at: Some(now),
            entries,
        }
    }

    async fn evaluate_instrument(
        &self,
        credential: &Credential,
        profile: &InstrumentProfile,
        now: DateTime<Utc>,
    ) -> InstrumentStatus {
        let market = market_clock::is_open(&profile.exchange, now);
        if !market.open {
            debug!(instrument = %profile.instrument_key, message = %market.message, "market closed");
            return InstrumentStatus::Closed {
                message: market.message,
            };
        }

        match self.fetch_and_evaluate(credential, profile, now).await {
            Ok(signal) => {
                debug!(
                    instrument = %profile.instrument_key,
                    action = %signal.action,
                    reason = %signal.reason,
                    "instrument evaluated"
                );
                InstrumentStatus::Active(signal)
            }
            Err(e) => {
                warn!(instrument = %profile.instrument_key, error = %e, "fetch/analysis failed");
                InstrumentStatus::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn fetch_and_evaluate(
        &self,
        credential: &Credential,
        profile: &InstrumentProfile,
        now: DateTime<Utc>,
    ) -> Result<Signal, SignalwatchError> {
        profile.timeframe.validate()?;

        let to = market_clock::exchange_local_time(now).date_naive();
        let from = to
            .checked_sub_days(Days::new(u64::from(self.config.lookback_days)))
            .unwrap_or(to);
        let request = CandleRequest {
            instrument_key: profile.instrument_key.clone(),
            timeframe: profile.timeframe,
            from,
            to,
        };

        let payload = self.source.fetch(credential, &request).await?;
        // An empty series degrades to a NONE signal in the engine.
        let candles = normalize(&payload);
        if candles.is_empty() {
            debug!(instrument = %profile.instrument_key, "no candles in payload");
        }
        Ok(self.engine.evaluate(&candles, profile))
    }

    fn publish(&self, snapshot: WatchSnapshot) -> Arc<WatchSnapshot> {
        let snapshot = Arc::new(snapshot);
        for sink in &self.sinks {
            sink.publish(&snapshot);
        }
        self.snapshot_tx.send_replace(Arc::clone(&snapshot));
        info!(pass = snapshot.pass, instruments = snapshot.len(), "watch snapshot published");
        snapshot
    }
}
