//! Signal sink port: receives every published watch snapshot.

use crate::domain::scheduler::WatchSnapshot;

pub trait SignalSink: Send + Sync {
    fn publish(&self, snapshot: &WatchSnapshot);
}
