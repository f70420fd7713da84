//! Watch command - poll ports and report processes coming and going.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use portctl_core::config::{format_duration, parse_duration};
use portctl_core::ports::{MetricsProbe, Platform};
use portctl_core::{ProcessManager, ProcessRecord, WatchEvent, Watcher};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{load_config, manager, print_table};

/// Resolved settings for one watch session.
#[derive(Debug, Clone)]
struct WatchOptions {
    port: Option<u16>,
    period: Duration,
    changes_only: bool,
    count: Option<u64>,
    notify: bool,
    json: bool,
}

pub async fn run(
    port: Option<u16>,
    interval: Option<String>,
    changes_only: bool,
    count: Option<u64>,
    notify: bool,
    json: bool,
) -> Result<()> {
    let config = load_config().await;
    let period = match interval {
        Some(ref raw) => parse_duration(raw).with_context(|| format!("Invalid --interval value '{}'", raw))?,
        None => config.watch.interval,
    };
    let opts = WatchOptions {
        port,
        period: period.max(Duration::from_millis(100)),
        changes_only,
        count,
        notify: notify || config.watch.notifications,
        json,
    };

    if !json {
        match port {
            Some(p) => println!("Watching port {} every {} (Ctrl-C to stop)", p, format_duration(opts.period)),
            None => println!("Watching all ports every {} (Ctrl-C to stop)", format_duration(opts.period)),
        }
    }

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let polls = watch_loop(&manager(), &opts, interrupted).await?;

    if !json {
        println!("\nWatch stopped after {} update(s).", polls);
    }
    Ok(())
}

/// Poll until `shutdown` resolves or the poll limit is reached. Returns the
/// number of completed polls.
///
/// `shutdown` is listened to for the whole session, including while a
/// discovery is running; an interrupt drops the in-flight discovery.
async fn watch_loop<P: Platform, M: MetricsProbe>(
    pm: &ProcessManager<P, M>,
    opts: &WatchOptions,
    shutdown: impl Future<Output = ()>,
) -> Result<u64> {
    tokio::pin!(shutdown);

    let mut watcher = Watcher::new();
    let mut ticker = tokio::time::interval(opts.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut polls: u64 = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Interrupted");
                break;
            }
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            _ = &mut shutdown => {
                debug!("Interrupted during discovery");
                break;
            }
            outcome = poll(pm, opts.port) => outcome,
        };
        polls += 1;

        match outcome {
            Ok(records) => {
                let baseline = watcher.current().is_none();
                let events = watcher.update(records.clone());
                report(&records, &events, baseline, opts.changes_only, opts.json)?;
                if !events.is_empty() && opts.notify && !opts.json {
                    // Terminal bell
                    print!("\x07");
                }
            }
            Err(e) => {
                warn!(error = %e, "Discovery failed, retrying next tick");
                eprintln!("Error updating processes: {:#}", e);
            }
        }

        if opts.count.is_some_and(|limit| polls >= limit) {
            break;
        }
    }
    Ok(polls)
}

async fn poll<P: Platform, M: MetricsProbe>(
    pm: &ProcessManager<P, M>,
    port: Option<u16>,
) -> portctl_core::Result<Vec<ProcessRecord>> {
    match port {
        Some(p) => pm.list_on_port(p).await,
        None => pm.list_all().await,
    }
}

fn report(
    records: &[ProcessRecord],
    events: &[WatchEvent],
    baseline: bool,
    changes_only: bool,
    json: bool,
) -> Result<()> {
    if json {
        for event in events {
            println!("{}", serde_json::to_string(event)?);
        }
        return Ok(());
    }

    if !changes_only && (baseline || !events.is_empty()) {
        println!("\nLast update: {} | Processes: {}", Local::now().format("%H:%M:%S"), records.len());
        println!("{}", "─".repeat(80));
        if records.is_empty() {
            println!("No processes found");
        } else {
            print_table(records);
        }
    }

    for event in events {
        println!("{}", describe(event));
    }
    Ok(())
}

fn describe(event: &WatchEvent) -> String {
    match event {
        WatchEvent::Added(r) => format!("+ NEW:  {} (PID {}) on port {}", r.command, r.pid, r.port),
        WatchEvent::Removed(r) => format!("- GONE: {} (PID {}) from port {}", r.command, r.pid, r.port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use portctl_core::domain::HostMetrics;
    use portctl_core::ports::ProcessMetrics;
    use portctl_core::{ManagerConfig, Protocol};

    /// Platform whose discovery takes `delay` and returns one record.
    struct SlowPlatform {
        delay: Duration,
    }

    impl Platform for SlowPlatform {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn discover(&self, _port: u16) -> portctl_core::Result<Vec<ProcessRecord>> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![ProcessRecord::basic(7, 3000, "node", Protocol::Tcp, "LISTEN", "*", "")])
        }

        async fn kill(&self, _pid: u32, _force: bool) -> portctl_core::Result<()> {
            Ok(())
        }
    }

    struct NoProbe;

    impl MetricsProbe for NoProbe {
        async fn process_metrics(&self, _pids: &[u32]) -> HashMap<u32, ProcessMetrics> {
            HashMap::new()
        }

        async fn host_metrics(&self, _window: Duration) -> portctl_core::Result<HostMetrics> {
            Ok(HostMetrics::default())
        }
    }

    fn manager_with_delay(delay: Duration) -> ProcessManager<SlowPlatform, NoProbe> {
        let config = ManagerConfig {
            enrich: false,
            ..Default::default()
        };
        ProcessManager::new(SlowPlatform { delay }, NoProbe, config)
    }

    fn options(count: Option<u64>) -> WatchOptions {
        WatchOptions {
            port: None,
            period: Duration::from_millis(10),
            changes_only: true,
            count,
            notify: false,
            json: true,
        }
    }

    #[tokio::test]
    async fn test_interrupt_during_discovery_stops_watch() {
        let pm = manager_with_delay(Duration::from_secs(60));
        let shutdown = tokio::time::sleep(Duration::from_millis(50));

        let polls = tokio::time::timeout(Duration::from_secs(5), watch_loop(&pm, &options(None), shutdown))
            .await
            .expect("watch did not stop on interrupt")
            .unwrap();
        assert_eq!(polls, 0);
    }

    #[tokio::test]
    async fn test_count_limits_polls() {
        let pm = manager_with_delay(Duration::ZERO);
        let polls = watch_loop(&pm, &options(Some(2)), std::future::pending::<()>())
            .await
            .unwrap();
        assert_eq!(polls, 2);
    }

    #[test]
    fn test_describe() {
        let r = ProcessRecord::basic(7, 3000, "node", Protocol::Tcp, "LISTEN", "*", "");
        assert_eq!(describe(&WatchEvent::Added(r.clone())), "+ NEW:  node (PID 7) on port 3000");
        assert_eq!(describe(&WatchEvent::Removed(r)), "- GONE: node (PID 7) from port 3000");
    }
}
