//! Signal sink writing each snapshot as one JSON line.

use crate::domain::scheduler::WatchSnapshot;
use crate::ports::signal_sink::SignalSink;
use std::io::Write;
use std::sync::Mutex;
use tracing::warn;

pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> SignalSink for JsonLinesSink<W> {
    fn publish(&self, snapshot: &WatchSnapshot) {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let result = serde_json::to_writer(&mut *writer, snapshot)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(writer))
            .and_then(|_| writer.flush());
        if let Err(e) = result {
            warn!(pass = snapshot.pass, error = %e, "failed to write snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scheduler::InstrumentStatus;
    use crate::domain::signal::{ReasonCode, Signal};

    #[test]
    fn writes_one_line_per_snapshot() {
        let sink = JsonLinesSink::new(Vec::new());
        let mut snapshot = WatchSnapshot {
            pass: 3,
            ..WatchSnapshot::default()
        };
        snapshot.entries.insert(
            "NSE_EQ|INFY".into(),
            InstrumentStatus::Active(Signal::none("INFY", ReasonCode::NoSignal, Some(1))),
        );
        sink.publish(&snapshot);
        sink.publish(&snapshot);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["pass"], 3);
        assert_eq!(value["entries"]["NSE_EQ|INFY"]["status"], "active");
        assert_eq!(value["entries"]["NSE_EQ|INFY"]["action"], "NONE");
    }
}
