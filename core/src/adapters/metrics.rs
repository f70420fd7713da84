//! Process and host metrics from the OS process table, via sysinfo.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sysinfo::{
    CpuRefreshKind, MemoryRefreshKind, Pid, Process, ProcessRefreshKind, ProcessesToUpdate,
    RefreshKind, System, UpdateKind, Users,
};
use tracing::debug;

use crate::domain::HostMetrics;
use crate::error::Result;
use crate::ports::{MetricsProbe, ProcessMetrics};

/// Metrics probe backed by `sysinfo`.
///
/// A fresh [`System`] is built per call; nothing is cached between queries.
#[derive(Debug, Clone)]
pub struct SysinfoProbe {
    /// Gap between the two process refreshes CPU usage is computed from.
    cpu_window: Duration,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            cpu_window: sysinfo::MINIMUM_CPU_UPDATE_INTERVAL,
        }
    }

    /// Use a custom gap between the two CPU refreshes. Zero skips the
    /// second refresh, leaving CPU at whatever the first read reports.
    pub fn with_cpu_window(cpu_window: Duration) -> Self {
        Self { cpu_window }
    }

    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing()
            .with_cpu()
            .with_memory()
            .with_user(UpdateKind::OnlyIfNotSet)
            .with_cmd(UpdateKind::OnlyIfNotSet)
    }

    fn metrics_for(process: &Process, users: &Users) -> ProcessMetrics {
        let user = process
            .user_id()
            .and_then(|uid| users.get_user_by_id(uid))
            .map(|u| u.name().to_string());

        let start_time = match process.start_time() {
            0 => None,
            secs => i64::try_from(secs)
                .ok()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        };

        let cmd = process
            .cmd()
            .iter()
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        let full_command = if cmd.is_empty() { None } else { Some(cmd) };

        ProcessMetrics {
            cpu_percent: Some(f64::from(process.cpu_usage())),
            memory_bytes: Some(process.memory()),
            user,
            start_time,
            full_command,
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProbe for SysinfoProbe {
    async fn process_metrics(&self, pids: &[u32]) -> HashMap<u32, ProcessMetrics> {
        if pids.is_empty() {
            return HashMap::new();
        }

        let targets: Vec<Pid> = pids.iter().map(|&pid| Pid::from_u32(pid)).collect();
        let mut system = System::new();
        let kind = Self::refresh_kind();

        system.refresh_processes_specifics(ProcessesToUpdate::Some(&targets), true, kind);
        if !self.cpu_window.is_zero() {
            tokio::time::sleep(self.cpu_window).await;
            system.refresh_processes_specifics(ProcessesToUpdate::Some(&targets), true, kind);
        }

        let users = Users::new_with_refreshed_list();
        let mut metrics = HashMap::with_capacity(pids.len());
        for &pid in pids {
            match system.process(Pid::from_u32(pid)) {
                Some(process) => {
                    metrics.insert(pid, Self::metrics_for(process, &users));
                }
                None => debug!(pid = pid, "Process vanished before enrichment"),
            }
        }
        metrics
    }

    async fn host_metrics(&self, window: Duration) -> Result<HostMetrics> {
        let mut system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );

        system.refresh_cpu_usage();
        tokio::time::sleep(window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)).await;
        system.refresh_cpu_usage();
        system.refresh_memory();

        Ok(HostMetrics {
            cpu_percent: f64::from(system.global_cpu_usage()),
            used_memory_bytes: system.used_memory(),
            available_memory_bytes: system.available_memory(),
        })
    }
}
