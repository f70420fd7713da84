//! Quick command - shortcuts for common developer chores.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use portctl_core::{FilterCriteria, NativeProcessManager, ProcessRecord};
use serde_json::json;

use super::{load_config, manager, print_json, KillReport};

/// Ports checked by `quick dev-ports`.
const DEV_PORTS: [u16; 9] = [3000, 3001, 3002, 4000, 5000, 8000, 8080, 8081, 9000];

/// Processes running longer than this count as stale.
const STALE_AFTER: Duration = Duration::from_secs(3600);

fn select_dev(records: &[ProcessRecord], (start, end): (u16, u16)) -> Vec<ProcessRecord> {
    let criteria = FilterCriteria {
        port_range: Some((start, end)),
        ..Default::default()
    };
    portctl_core::domain::filter_records(records, &criteria)
}

fn select_node(records: &[ProcessRecord]) -> Vec<ProcessRecord> {
    let criteria = FilterCriteria {
        service: Some("node".to_string()),
        ..Default::default()
    };
    portctl_core::domain::filter_records(records, &criteria)
}

fn select_stale(records: &[ProcessRecord], now: DateTime<Utc>) -> Vec<ProcessRecord> {
    let criteria = FilterCriteria {
        older_than: Some(STALE_AFTER),
        ..Default::default()
    };
    portctl_core::domain::filter_records_at(records, &criteria, now)
}

async fn kill_selected(
    pm: &NativeProcessManager,
    label: &str,
    targets: Vec<ProcessRecord>,
    force: bool,
    json: bool,
) -> Result<KillReport> {
    if targets.is_empty() {
        if !json {
            println!("No {} processes found", label);
        }
        return Ok(KillReport::default());
    }

    if !json {
        println!("Found {} {} process(es):", targets.len(), label);
        for r in &targets {
            println!("  • PID {}: {} on port {}", r.pid, r.command, r.port);
        }
    }

    let pids: Vec<u32> = targets.iter().map(|r| r.pid).collect();
    let report = KillReport::from_results(pm.kill_many(&pids, force).await);
    if !json {
        report.print();
    }
    Ok(report)
}

async fn run_kill(label: &str, force: bool, json: bool, select: impl Fn(&[ProcessRecord]) -> Vec<ProcessRecord>) -> Result<()> {
    let pm = manager();
    let records = pm.list_all().await.context("Failed to list processes")?;
    let report = kill_selected(&pm, label, select(&records), force, json).await?;
    if json {
        print_json(&report)?;
    }
    report.into_result()
}

pub async fn kill_dev(force: bool, json: bool) -> Result<()> {
    let range = load_config().await.dev.ports;
    run_kill("development", force, json, |records| select_dev(records, range)).await
}

pub async fn kill_node(force: bool, json: bool) -> Result<()> {
    run_kill("Node.js", force, json, select_node).await
}

pub async fn kill_stale(force: bool, json: bool) -> Result<()> {
    run_kill("stale", force, json, |records| select_stale(records, Utc::now())).await
}

/// Kill development then stale processes and report what is left.
pub async fn cleanup(force: bool, json: bool) -> Result<()> {
    let range = load_config().await.dev.ports;
    let pm = manager();

    if !json {
        println!("Step 1: cleaning up development processes...");
    }
    let records = pm.list_all().await.context("Failed to list processes")?;
    let dev = kill_selected(&pm, "development", select_dev(&records, range), force, json).await?;

    if !json {
        println!("\nStep 2: cleaning up stale processes...");
    }
    let records = pm.list_all().await.context("Failed to list processes")?;
    let stale = kill_selected(&pm, "stale", select_stale(&records, Utc::now()), force, json).await?;

    let remaining = pm.list_all().await.context("Failed to count remaining processes")?.len();
    if json {
        print_json(&json!({ "development": dev, "stale": stale, "remaining": remaining }))?;
    } else {
        println!("\nCleanup complete! {} process(es) remain with open ports", remaining);
    }

    let denied = dev.permission_denied || stale.permission_denied;
    let mut combined = dev;
    combined.killed.extend(stale.killed);
    combined.failed.extend(stale.failed);
    combined.permission_denied = denied;
    combined.into_result()
}

pub async fn dev_ports(json: bool) -> Result<()> {
    let range = load_config().await.dev.ports;
    let pm = manager();
    let records = pm.list_all().await.context("Failed to list processes")?;
    let next = pm
        .find_available_ports(range.0, range.1, 3)
        .await
        .context("Failed to find available ports")?;

    let status: Vec<_> = DEV_PORTS
        .iter()
        .map(|&port| (port, records.iter().find(|r| r.port == port)))
        .collect();

    if json {
        let ports: Vec<_> = status
            .iter()
            .map(|(port, owner)| {
                json!({
                    "port": port,
                    "in_use": owner.is_some(),
                    "pid": owner.map(|r| r.pid),
                    "command": owner.map(|r| r.command.as_str()),
                })
            })
            .collect();
        return print_json(&json!({ "ports": ports, "next_available": next }));
    }

    println!("Common development ports:");
    for (port, owner) in &status {
        match owner {
            Some(r) => println!("  Port {}: IN USE ({} - PID {})", port, r.command, r.pid),
            None => println!("  Port {}: AVAILABLE", port),
        }
    }

    if !next.is_empty() {
        println!("\nNext available ports: {:?}", next);
        println!("\nQuick export commands:");
        for (i, port) in next.iter().enumerate() {
            println!("  export PORT{}={}", i + 1, port);
        }
    }
    Ok(())
}

/// Shell line exporting `port` as `PORT`.
fn export_line(port: u16) -> String {
    format!("export PORT={}", port)
}

pub async fn next_port(export: bool, json: bool) -> Result<()> {
    let (start, end) = load_config().await.dev.ports;
    let available = manager()
        .find_available_ports(start, end, 1)
        .await
        .context("Failed to find available ports")?;

    let Some(&port) = available.first() else {
        if json {
            return print_json(&json!({ "port": null }));
        }
        let msg = format!("No available ports found in range {}-{}", start, end);
        if export {
            eprintln!("{}", msg);
        } else {
            println!("{}", msg);
        }
        return Ok(());
    };

    if json {
        return print_json(&json!({ "port": port }));
    }

    // Bare output so `eval "$(portctl quick next-port --export)"` works
    if export {
        println!("{}", export_line(port));
        return Ok(());
    }

    println!("Next available port: {}", port);
    println!("\nExport commands:");
    println!("  {}", export_line(port));
    println!("  echo 'PORT={}' >> .env", port);
    println!("\nUsage examples:");
    println!("  npm start -- --port {}", port);
    println!("  python -m http.server {}", port);
    Ok(())
}
