//! Host-level statistics.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{sort_records, ProcessRecord, SortField};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Raw host metrics sampled from the OS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMetrics {
    /// Global CPU utilization over the sample window.
    pub cpu_percent: f64,
    /// Used physical memory in bytes.
    pub used_memory_bytes: u64,
    /// Available physical memory in bytes.
    pub available_memory_bytes: u64,
}

/// Point-in-time aggregate over all discovered records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_processes: usize,
    pub listening_ports: usize,
    pub cpu_percent: f64,
    pub memory_used_gb: f64,
    pub memory_available_gb: f64,
    pub memory_percent: f64,
    /// Top records by memory, descending.
    pub top_processes: Vec<ProcessRecord>,
}

impl SystemStats {
    /// Aggregate records and host metrics, keeping the `top_n` biggest
    /// memory users.
    pub fn from_parts(records: &[ProcessRecord], host: HostMetrics, top_n: usize) -> Self {
        let listening_ports = records.iter().map(|r| r.port).collect::<HashSet<_>>().len();

        let mut top = records.to_vec();
        sort_records(&mut top, SortField::Memory);
        top.truncate(top_n);

        let memory_used_gb = host.used_memory_bytes as f64 / BYTES_PER_GB;
        let memory_available_gb = host.available_memory_bytes as f64 / BYTES_PER_GB;

        Self {
            total_processes: records.len(),
            listening_ports,
            cpu_percent: host.cpu_percent,
            memory_used_gb,
            memory_available_gb,
            memory_percent: memory_percent(memory_used_gb, memory_available_gb),
            top_processes: top,
        }
    }
}

/// Used share of memory in percent; 0 when nothing is reported.
pub fn memory_percent(used: f64, available: f64) -> f64 {
    let total = used + available;
    if total > 0.0 {
        used / total * 100.0
    } else {
        0.0
    }
}
