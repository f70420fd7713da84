//! Metrics enrichment of basic records.

use tracing::trace;

use crate::domain::{is_valid_pid, ProcessRecord};
use crate::ports::{MetricsProbe, ProcessMetrics};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Fills CPU, memory, user, start time and full command into basic records.
///
/// Every field is best-effort. A PID the probe cannot see leaves the record
/// exactly as discovery produced it.
pub struct Enricher<M: MetricsProbe> {
    probe: M,
}

impl<M: MetricsProbe> Enricher<M> {
    pub fn new(probe: M) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &M {
        &self.probe
    }

    /// Enrich `records` in place.
    pub async fn enrich(&self, records: &mut [ProcessRecord]) {
        let mut pids: Vec<u32> = records
            .iter()
            .map(|r| r.pid)
            .filter(|&pid| is_valid_pid(pid))
            .collect();
        pids.sort_unstable();
        pids.dedup();

        if pids.is_empty() {
            return;
        }

        let metrics = self.probe.process_metrics(&pids).await;
        trace!(requested = pids.len(), found = metrics.len(), "Enrichment lookup done");

        for record in records.iter_mut() {
            if !is_valid_pid(record.pid) {
                continue;
            }
            if let Some(m) = metrics.get(&record.pid) {
                apply(record, m);
            }
        }
    }
}

fn apply(record: &mut ProcessRecord, metrics: &ProcessMetrics) {
    if let Some(cpu) = metrics.cpu_percent {
        record.cpu_percent = cpu.max(0.0);
    }
    if let Some(bytes) = metrics.memory_bytes {
        record.memory_mb = bytes as f64 / BYTES_PER_MB;
    }
    if let Some(ref user) = metrics.user {
        record.user = Some(user.clone());
    }
    if let Some(started) = metrics.start_time {
        record.start_time = Some(started);
    }
    if let Some(ref cmd) = metrics.full_command {
        record.full_command = Some(cmd.clone());
    }
    record.reclassify();
}
