//! Metrics probe port (interface).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::HostMetrics;
use crate::error::Result;

/// Live metrics for a single process.
///
/// Each field is looked up independently; `None` means that lookup failed
/// (process exited, permission denied) and must not be treated as an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessMetrics {
    pub cpu_percent: Option<f64>,
    pub memory_bytes: Option<u64>,
    pub user: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub full_command: Option<String>,
}

/// Port for querying the OS process table.
pub trait MetricsProbe: Send + Sync {
    /// Look up metrics for the given PIDs.
    ///
    /// PIDs the OS no longer knows about are simply absent from the map.
    fn process_metrics(
        &self,
        pids: &[u32],
    ) -> impl std::future::Future<Output = HashMap<u32, ProcessMetrics>> + Send;

    /// Sample host CPU over `window` and read current memory usage.
    fn host_metrics(
        &self,
        window: Duration,
    ) -> impl std::future::Future<Output = Result<HostMetrics>> + Send;
}
