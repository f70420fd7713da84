//! Snapshot diffing for watch mode.
//!
//! A watcher re-runs discovery on a fixed interval, builds a new
//! [`Snapshot`] from the completed scan, diffs it against the previous one,
//! then replaces the previous snapshot wholesale.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::ProcessRecord;

/// A change between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "record", rename_all = "lowercase")]
pub enum WatchEvent {
    /// A (PID, port) binding appeared.
    Added(ProcessRecord),
    /// A (PID, port) binding disappeared.
    Removed(ProcessRecord),
}

impl WatchEvent {
    pub fn record(&self) -> &ProcessRecord {
        match self {
            WatchEvent::Added(r) | WatchEvent::Removed(r) => r,
        }
    }

    fn order_key(&self) -> (u16, u32, bool) {
        let r = self.record();
        (r.port, r.pid, matches!(self, WatchEvent::Added(_)))
    }
}

/// Records of one completed scan, keyed by `(pid, port)`.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: HashMap<(u32, u16), ProcessRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<ProcessRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.key(), r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, pid: u32, port: u16) -> bool {
        self.records.contains_key(&(pid, port))
    }

    /// Events turning `previous` into `self`, ordered by port then PID.
    pub fn diff(&self, previous: &Snapshot) -> Vec<WatchEvent> {
        let mut events: Vec<WatchEvent> = self
            .records
            .iter()
            .filter(|(key, _)| !previous.records.contains_key(key))
            .map(|(_, r)| WatchEvent::Added(r.clone()))
            .chain(
                previous
                    .records
                    .iter()
                    .filter(|(key, _)| !self.records.contains_key(key))
                    .map(|(_, r)| WatchEvent::Removed(r.clone())),
            )
            .collect();

        events.sort_by_key(|e| e.order_key());
        events
    }
}

/// Tracks the latest snapshot across ticks.
#[derive(Debug, Default)]
pub struct Watcher {
    current: Option<Snapshot>,
}

impl Watcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in the result of a completed scan and return the changes.
    ///
    /// The first scan only establishes the baseline and yields no events.
    pub fn update(&mut self, records: Vec<ProcessRecord>) -> Vec<WatchEvent> {
        let next = Snapshot::new(records);
        let events = match self.current {
            Some(ref previous) => next.diff(previous),
            None => Vec::new(),
        };
        self.current = Some(next);
        events
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Protocol;

    fn record(pid: u32, port: u16) -> ProcessRecord {
        ProcessRecord::basic(pid, port, "proc", Protocol::Tcp, "LISTEN", "*", "")
    }

    #[test]
    fn test_diff_added_and_removed() {
        let before = Snapshot::new(vec![record(1, 3000), record(2, 8080)]);
        let after = Snapshot::new(vec![record(1, 3000), record(3, 5000)]);

        let events = after.diff(&before);
        assert_eq!(
            events,
            vec![
                WatchEvent::Added(record(3, 5000)),
                WatchEvent::Removed(record(2, 8080)),
            ]
        );
    }

    #[test]
    fn test_pid_change_on_same_port() {
        let before = Snapshot::new(vec![record(1, 3000)]);
        let after = Snapshot::new(vec![record(2, 3000)]);

        let events = after.diff(&before);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], WatchEvent::Removed(ref r) if r.pid == 1));
        assert!(matches!(events[1], WatchEvent::Added(ref r) if r.pid == 2));
    }

    #[test]
    fn test_watcher_baseline_is_silent() {
        let mut watcher = Watcher::new();
        assert!(watcher.update(vec![record(1, 3000)]).is_empty());
        assert!(watcher.update(vec![record(1, 3000)]).is_empty());

        let events = watcher.update(vec![]);
        assert_eq!(events, vec![WatchEvent::Removed(record(1, 3000))]);
        assert!(watcher.current().unwrap().is_empty());
    }

    #[test]
    fn test_event_json() {
        let json = serde_json::to_value(WatchEvent::Added(record(7, 3000))).unwrap();
        assert_eq!(json["event"], "added");
        assert_eq!(json["record"]["pid"], 7);
    }
}
