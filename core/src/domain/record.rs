//! Process record domain model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::service;

// ============================================================================
// Protocol
// ============================================================================

/// Transport protocol of a socket binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    /// Lowercase wire name (`tcp` / `udp`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `pid` can name a real process: positive and within the signed
/// 32-bit range every supported OS uses for process ids.
pub fn is_valid_pid(pid: u32) -> bool {
    pid > 0 && i32::try_from(pid).is_ok()
}

// ============================================================================
// ProcessRecord
// ============================================================================

/// One observed (PID, local port) binding.
///
/// Records are built fresh by every discovery call. The enrichment fields
/// (`user`, `start_time`, `cpu_percent`, `memory_mb`, `full_command`) are
/// best-effort and stay at their zero value when the OS lookup fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Process ID (always > 0).
    pub pid: u32,

    /// Local port number (always in 1..=65535).
    pub port: u16,

    /// Short command name as reported by the discovery tool.
    pub command: String,

    /// Transport protocol.
    pub protocol: Protocol,

    /// Connection state (`LISTEN`, `ESTABLISHED`, ...).
    pub state: String,

    /// Owning user name.
    #[serde(default)]
    pub user: Option<String>,

    /// Process start time.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    /// Instantaneous CPU utilization percent.
    #[serde(default)]
    pub cpu_percent: f64,

    /// Resident memory in megabytes.
    #[serde(default)]
    pub memory_mb: f64,

    /// Derived service label. Never empty.
    pub service_type: String,

    /// Full command line.
    #[serde(default)]
    pub full_command: Option<String>,

    /// Local socket address, may use `*` as a wildcard host.
    pub local_addr: String,

    /// Remote socket address, empty when not connected.
    #[serde(default)]
    pub remote_addr: String,
}

impl ProcessRecord {
    /// Create a basic (not yet enriched) record.
    ///
    /// The service type is classified right away so that the label is
    /// populated even when enrichment is disabled.
    pub fn basic(
        pid: u32,
        port: u16,
        command: impl Into<String>,
        protocol: Protocol,
        state: impl Into<String>,
        local_addr: impl Into<String>,
        remote_addr: impl Into<String>,
    ) -> Self {
        let command = command.into();
        let service_type = service::classify(port, &command).to_string();
        Self {
            pid,
            port,
            command,
            protocol,
            state: state.into(),
            user: None,
            start_time: None,
            cpu_percent: 0.0,
            memory_mb: 0.0,
            service_type,
            full_command: None,
            local_addr: local_addr.into(),
            remote_addr: remote_addr.into(),
        }
    }

    /// Composite identity used by watch mode.
    pub fn key(&self) -> (u32, u16) {
        (self.pid, self.port)
    }

    /// Elapsed time since the process started, if known and not in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        let started = self.start_time?;
        (now - started).to_std().ok()
    }

    /// Re-derive the service label from the current port and command.
    pub fn reclassify(&mut self) {
        self.service_type = service::classify(self.port, &self.command).to_string();
    }
}
