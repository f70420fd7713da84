//! CLI subcommands.

pub mod available;
pub mod config;
pub mod kill;
pub mod list;
pub mod mcp;
pub mod quick;
pub mod scan;
pub mod stats;
pub mod watch;

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use chrono::Utc;
use portctl_core::ports::ConfigRepository;
use portctl_core::{
    Config, ConfigStore, Error as CoreError, ManagerConfig, NativeProcessManager, ProcessManager,
    ProcessRecord,
};
use serde::Serialize;
use tracing::warn;

/// Process manager for the running OS.
pub fn manager() -> NativeProcessManager {
    ProcessManager::native(ManagerConfig::default())
}

/// Load the user configuration, falling back to defaults on any failure.
pub async fn load_config() -> Config {
    match ConfigStore::new() {
        Ok(store) => load_or_default(&store).await,
        Err(e) => {
            warn!(error = %e, "No config location, using defaults");
            Config::default()
        }
    }
}

async fn load_or_default<R: ConfigRepository>(repo: &R) -> Config {
    match repo.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable config");
            Config::default()
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Ask a yes/no question on stdin. Anything but `y`/`yes` is a no.
pub fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

/// Compact uptime such as `3d4h`, `2h15m`, `45s`.
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (days, hours, minutes, seconds) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60, secs % 60);
    if days > 0 {
        format!("{}d{}h", days, hours)
    } else if hours > 0 {
        format!("{}h{}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

pub fn uptime(record: &ProcessRecord) -> Option<String> {
    record.age(Utc::now()).map(format_uptime)
}

pub fn print_table(records: &[ProcessRecord]) {
    println!(
        "{:>8} {:>6} {:<5} {:<14} {:<20} {:>6} {:>9} USER",
        "PID", "PORT", "PROTO", "SERVICE", "COMMAND", "CPU%", "MEM(MB)"
    );
    println!("{}", "-".repeat(86));

    for r in records {
        println!(
            "{:>8} {:>6} {:<5} {:<14} {:<20} {:>6.1} {:>9.1} {}",
            r.pid,
            r.port,
            r.protocol,
            truncate(&r.service_type, 14),
            truncate(&r.command, 20),
            r.cpu_percent,
            r.memory_mb,
            r.user.as_deref().unwrap_or("-"),
        );
    }

    println!("\nFound {} process(es)", records.len());
}

pub fn print_details(records: &[ProcessRecord]) {
    for (i, r) in records.iter().enumerate() {
        if i > 0 {
            println!("{}", "─".repeat(50));
        }
        println!("Process #{}", i + 1);
        println!("  PID:           {}", r.pid);
        println!("  Port:          {} ({})", r.port, r.protocol);
        println!("  Command:       {}", r.command);
        println!("  Full Command:  {}", r.full_command.as_deref().unwrap_or("-"));
        println!("  Service Type:  {}", r.service_type);
        println!("  User:          {}", r.user.as_deref().unwrap_or("-"));
        println!("  State:         {}", r.state);
        println!("  Local Addr:    {}", r.local_addr);
        println!("  Remote Addr:   {}", if r.remote_addr.is_empty() { "-" } else { &r.remote_addr });
        println!("  CPU Usage:     {:.1}%", r.cpu_percent);
        println!("  Memory:        {:.1} MB", r.memory_mb);
        if let Some(started) = r.start_time {
            println!("  Started:       {}", started.format("%Y-%m-%d %H:%M:%S"));
        }
        if let Some(up) = uptime(r) {
            println!("  Uptime:        {}", up);
        }
    }
}

/// Records grouped by service type, groups in name order.
pub fn print_tree(records: &[ProcessRecord]) {
    let mut groups: BTreeMap<&str, Vec<&ProcessRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.service_type.as_str()).or_default().push(r);
    }

    println!("Process tree by service type\n");
    for (service, members) in groups {
        println!("├─ {} ({} processes)", service, members.len());
        for (i, r) in members.iter().enumerate() {
            let branch = if i + 1 == members.len() { "└─" } else { "├─" };
            let up = uptime(r).map(|u| format!(" [{}]", u)).unwrap_or_default();
            println!(
                "   {} PID {}: {} (Port {}) - {:.1}MB{}",
                branch, r.pid, r.command, r.port, r.memory_mb, up
            );
        }
        println!();
    }
}

/// Outcome of a batch kill, for printing and exit codes.
#[derive(Debug, Default, Serialize)]
pub struct KillReport {
    pub killed: Vec<u32>,
    pub failed: BTreeMap<u32, String>,
    #[serde(skip)]
    pub permission_denied: bool,
}

impl KillReport {
    pub fn from_results(results: BTreeMap<u32, portctl_core::Result<()>>) -> Self {
        let mut report = KillReport::default();
        for (pid, outcome) in results {
            match outcome {
                Ok(()) => report.killed.push(pid),
                Err(e) => {
                    report.permission_denied |= e.is_permission_denied();
                    report.failed.insert(pid, e.to_string());
                }
            }
        }
        report
    }

    pub fn print(&self) {
        for (pid, reason) in &self.failed {
            println!("  Failed to kill PID {}: {}", pid, reason);
        }
        if !self.killed.is_empty() {
            println!("Killed {} process(es): {:?}", self.killed.len(), self.killed);
        }
        if !self.failed.is_empty() {
            println!("Failed to kill {} process(es)", self.failed.len());
            println!("Tip: try --force or run with elevated privileges");
        }
    }

    /// Error to return from the command when anything failed.
    pub fn into_result(self) -> anyhow::Result<()> {
        if self.failed.is_empty() {
            return Ok(());
        }
        let summary = format!("{} process(es) could not be killed", self.failed.len());
        if self.permission_denied {
            Err(CoreError::PermissionDenied(summary).into())
        } else {
            Err(anyhow::anyhow!(summary))
        }
    }
}
