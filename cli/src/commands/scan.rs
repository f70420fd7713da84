//! Scan command - probe a host for open TCP ports.

use anyhow::{bail, Context, Result};
use portctl_core::config::parse_duration;
use portctl_core::scan::{parse_port_list, COMMON_PORTS};
use portctl_core::{ScanResult, Scanner};

use super::{load_config, print_json, truncate};

pub async fn run(
    host: String,
    ports: Option<String>,
    common: bool,
    timeout: Option<String>,
    concurrent: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = load_config().await;
    let host = if host.is_empty() { "localhost".to_string() } else { host };

    let targets = match (common, ports) {
        (true, _) => COMMON_PORTS.to_vec(),
        (false, Some(raw)) => parse_port_list(&raw).with_context(|| format!("Invalid port list '{}'", raw))?,
        (false, None) => bail!("Specify ports to scan or use --common"),
    };

    let timeout = match timeout {
        Some(ref raw) => parse_duration(raw).with_context(|| format!("Invalid --timeout value '{}'", raw))?,
        None => config.scan.timeout,
    };
    let concurrency = concurrent.unwrap_or(config.scan.concurrent);

    if !json {
        println!("Scanning {} for {} port(s)...", host, targets.len());
    }

    let results = Scanner::new(concurrency, timeout).scan(&host, &targets).await;
    let open: Vec<ScanResult> = results.into_iter().filter(|r| r.is_open()).collect();

    if json {
        return print_json(&open);
    }

    if open.is_empty() {
        println!("No open ports found on {}", host);
        return Ok(());
    }

    println!("Found {} open port(s) on {}:\n", open.len(), host);
    println!("{:>6}  {:<8} {:<14} BANNER", "PORT", "STATUS", "SERVICE");
    for r in &open {
        println!(
            "{:>6}  {:<8} {:<14} {}",
            r.port,
            "open",
            r.service.as_deref().unwrap_or("-"),
            truncate(r.banner.as_deref().unwrap_or(""), 50)
        );
    }
    Ok(())
}
