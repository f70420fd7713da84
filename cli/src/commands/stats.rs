//! Stats command - system overview and port usage.

use anyhow::{Context, Result};
use portctl_core::{ProcessRecord, SystemStats};
use serde::Serialize;

use super::{manager, print_json, truncate};

/// Development ports whose status is always reported.
const DEV_PORTS: [u16; 8] = [3000, 3001, 4000, 5000, 8000, 8080, 8081, 9000];

const BAR_WIDTH: usize = 30;

#[derive(Debug, Serialize)]
struct DevPortStatus {
    port: u16,
    in_use: bool,
    pid: Option<u32>,
    command: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatsReport {
    #[serde(flatten)]
    stats: SystemStats,
    dev_ports: Vec<DevPortStatus>,
}

fn dev_port_status(records: &[ProcessRecord]) -> Vec<DevPortStatus> {
    DEV_PORTS
        .iter()
        .map(|&port| {
            let owner = records.iter().find(|r| r.port == port);
            DevPortStatus {
                port,
                in_use: owner.is_some(),
                pid: owner.map(|r| r.pid),
                command: owner.map(|r| r.command.clone()),
            }
        })
        .collect()
}

fn usage_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

pub async fn run(json: bool) -> Result<()> {
    let pm = manager();
    let (stats, records) = pm
        .stats_with_records()
        .await
        .context("Failed to collect system statistics")?;

    let report = StatsReport {
        dev_ports: dev_port_status(&records),
        stats,
    };

    if json {
        return print_json(&report);
    }

    let s = &report.stats;
    println!("System Overview");
    println!("  Processes with open ports: {}", s.total_processes);
    println!("  Listening ports:           {}", s.listening_ports);
    println!("  CPU usage:                 {:.1}%", s.cpu_percent);
    println!(
        "  Memory:                    {:.1} GB used / {:.1} GB available",
        s.memory_used_gb, s.memory_available_gb
    );
    println!("  {} {:.1}%", usage_bar(s.memory_percent), s.memory_percent);

    if !s.top_processes.is_empty() {
        println!("\nTop memory users");
        for (i, r) in s.top_processes.iter().enumerate() {
            println!(
                "  {}. {:<20} PID {:>7}  port {:>5}  {:>8.1} MB",
                i + 1,
                truncate(&r.command, 20),
                r.pid,
                r.port,
                r.memory_mb
            );
        }
    }

    println!("\nDevelopment ports");
    for d in &report.dev_ports {
        match (d.pid, d.command.as_deref()) {
            (Some(pid), Some(command)) => println!("  {:>5}  in use by {} (PID {})", d.port, command, pid),
            _ => println!("  {:>5}  free", d.port),
        }
    }
    Ok(())
}
