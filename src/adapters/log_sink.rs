//! Signal sink that reports snapshots through `tracing`.

use crate::domain::scheduler::{InstrumentStatus, WatchSnapshot};
use crate::domain::signal::Action;
use crate::ports::signal_sink::SignalSink;
use tracing::{info, warn};

/// Logs one event per instrument: actionable signals at INFO, failures at
/// WARN, everything else at INFO with its status.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SignalSink for LogSink {
    fn publish(&self, snapshot: &WatchSnapshot) {
        for (key, status) in &snapshot.entries {
            match status {
                InstrumentStatus::Active(signal) if signal.action == Action::Error => {
                    warn!(pass = snapshot.pass, instrument = %key, reason = %signal.reason, "evaluation error");
                }
                InstrumentStatus::Active(signal) if signal.is_actionable() => {
                    info!(
                        pass = snapshot.pass,
                        instrument = %key,
                        symbol = %signal.symbol,
                        action = %signal.action,
                        price = signal.price,
                        stop_loss = signal.stop_loss,
                        target = signal.target,
                        reason = %signal.reason,
                        "signal"
                    );
                }
                InstrumentStatus::Active(signal) => {
                    info!(pass = snapshot.pass, instrument = %key, reason = %signal.reason, "no trade");
                }
                InstrumentStatus::Closed { message } => {
                    info!(pass = snapshot.pass, instrument = %key, message = %message, "market closed");
                }
                InstrumentStatus::Error { message } => {
                    warn!(pass = snapshot.pass, instrument = %key, error = %message, "instrument failed");
                }
            }
        }
    }
}
