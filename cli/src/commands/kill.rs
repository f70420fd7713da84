//! Kill command - terminate processes by port, PID or filter.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use portctl_core::config::{parse_duration, parse_port_range};
use portctl_core::{FilterCriteria, NativeProcessManager, ProcessRecord};

use super::{confirm, load_config, manager, print_json, uptime, KillReport};

#[derive(Debug, Default)]
pub struct KillArgs {
    pub ports: Vec<u16>,
    pub pid: Option<u32>,
    pub range: Option<String>,
    pub service: Option<String>,
    pub user: Option<String>,
    pub older: Option<String>,
    pub force: bool,
    pub yes: bool,
}

impl KillArgs {
    fn has_filters(&self) -> bool {
        self.service.is_some() || self.user.is_some() || self.older.is_some()
    }

    fn criteria(&self) -> Result<FilterCriteria> {
        let older_than = match self.older {
            Some(ref raw) => Some(parse_duration(raw).with_context(|| format!("Invalid --older value '{}'", raw))?),
            None => None,
        };
        Ok(FilterCriteria {
            service: self.service.clone(),
            user: self.user.clone(),
            older_than,
            ..Default::default()
        })
    }
}

pub async fn run(args: KillArgs, json: bool) -> Result<()> {
    if args.pid.is_none() && args.range.is_none() && !args.has_filters() && args.ports.is_empty() {
        bail!("Specify at least one port, --pid, --range or a filter option");
    }

    let config = load_config().await;
    let needs_confirm = config.kill.confirm && !args.yes;
    if json && needs_confirm {
        bail!("--json cannot prompt; pass --yes or set kill.confirm=false");
    }

    let pm = manager();

    if let Some(pid) = args.pid {
        if needs_confirm && !confirm(&kill_prompt(&format!("process with PID {}", pid), args.force)) {
            println!("Operation cancelled");
            return Ok(());
        }
        return finish(&pm, &[pid], args.force, json).await;
    }

    let targets = collect_targets(&pm, &args).await?;
    if targets.is_empty() {
        if json {
            return print_json(&KillReport::default());
        }
        println!("No matching processes found");
        return Ok(());
    }

    if !json {
        println!("Found {} process(es) to kill:", targets.len());
        for (i, r) in targets.iter().enumerate() {
            let up = uptime(r).map(|u| format!(" (uptime: {})", u)).unwrap_or_default();
            println!(
                "  {}. PID {}: {} on port {} [{}]{}",
                i + 1,
                r.pid,
                r.command,
                r.port,
                r.service_type,
                up
            );
        }
        println!();
    }

    if needs_confirm && !confirm(&kill_prompt(&format!("{} process(es)", targets.len()), args.force)) {
        println!("Operation cancelled");
        return Ok(());
    }

    let pids: Vec<u32> = targets.iter().map(|r| r.pid).collect();
    finish(&pm, &pids, args.force, json).await
}

async fn finish(pm: &NativeProcessManager, pids: &[u32], force: bool, json: bool) -> Result<()> {
    let report = KillReport::from_results(pm.kill_many(pids, force).await);
    if json {
        print_json(&report)?;
    } else {
        report.print();
    }
    report.into_result()
}

fn kill_prompt(target: &str, force: bool) -> String {
    if force {
        format!("Are you sure you want to FORCE KILL {}?", target)
    } else {
        format!("Are you sure you want to kill {}?", target)
    }
}

/// Gather records from every selector the user passed, one per PID.
async fn collect_targets(pm: &NativeProcessManager, args: &KillArgs) -> Result<Vec<ProcessRecord>> {
    let mut targets = Vec::new();

    if args.has_filters() {
        let all = pm.list_all().await.context("Failed to list processes")?;
        targets.extend(pm.filter(&all, &args.criteria()?));
    }

    if let Some(ref raw) = args.range {
        let (start, end) = parse_port_range(raw).with_context(|| format!("Invalid --range value '{}'", raw))?;
        targets.extend(pm.list_in_range(start, end).await?);
    }

    let mut lookups = Vec::with_capacity(args.ports.len());
    for &port in &args.ports {
        lookups.push((port, pm.list_on_port(port).await));
    }
    targets.extend(merge_port_lookups(lookups)?);

    Ok(dedup_by_pid(targets))
}

/// Combine per-port lookups. Individual failures are reported and skipped,
/// but when every lookup failed the first error is returned.
fn merge_port_lookups(lookups: Vec<(u16, portctl_core::Result<Vec<ProcessRecord>>)>) -> Result<Vec<ProcessRecord>> {
    let attempted = lookups.len();
    let mut records = Vec::new();
    let mut first_error = None;
    let mut failed = 0;

    for (port, lookup) in lookups {
        match lookup {
            Ok(found) => records.extend(found),
            Err(e) => {
                eprintln!("Error getting processes on port {}: {}", port, e);
                failed += 1;
                first_error.get_or_insert((port, e));
            }
        }
    }

    match first_error {
        Some((port, e)) if failed == attempted => {
            Err(anyhow::Error::new(e).context(format!("Failed to get processes on port {}", port)))
        }
        _ => Ok(records),
    }
}

fn dedup_by_pid(records: Vec<ProcessRecord>) -> Vec<ProcessRecord> {
    let mut seen = HashSet::new();
    records.into_iter().filter(|r| seen.insert(r.pid)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use portctl_core::Protocol;
    use std::time::Duration;

    fn record(pid: u32, port: u16) -> ProcessRecord {
        ProcessRecord::basic(pid, port, "node", Protocol::Tcp, "LISTEN", "*", "")
    }

    #[test]
    fn test_dedup_keeps_first_record_per_pid() {
        let deduped = dedup_by_pid(vec![record(1, 3000), record(2, 3001), record(1, 3002)]);
        let keys: Vec<_> = deduped.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec![(1, 3000), (2, 3001)]);
    }

    #[test]
    fn test_criteria_parses_older() {
        let args = KillArgs {
            older: Some("1h30m".to_string()),
            ..Default::default()
        };
        assert!(args.has_filters());
        assert_eq!(args.criteria().unwrap().older_than, Some(Duration::from_secs(5400)));

        let bad = KillArgs {
            older: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(bad.criteria().is_err());
    }

    #[test]
    fn test_port_lookups_fail_only_when_all_fail() {
        let partial = merge_port_lookups(vec![
            (3000, Ok(vec![record(1, 3000)])),
            (3001, Err(portctl_core::Error::CommandFailed("lsof exited with Some(2)".into()))),
        ])
        .unwrap();
        assert_eq!(partial.len(), 1);

        let all_failed = merge_port_lookups(vec![
            (3000, Err(portctl_core::Error::CommandFailed("boom".into()))),
            (3001, Err(portctl_core::Error::PermissionDenied("lsof".into()))),
        ]);
        let err = all_failed.unwrap_err();
        assert!(err.to_string().contains("port 3000"));

        assert!(merge_port_lookups(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_kill_prompt() {
        assert!(kill_prompt("2 process(es)", true).contains("FORCE KILL"));
        assert!(!kill_prompt("2 process(es)", false).contains("FORCE"));
    }
}
