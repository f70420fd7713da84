//! Available command - find free ports.

use anyhow::{Context, Result};
use portctl_core::domain::service::suggested_use;
use serde::Serialize;

use super::{manager, print_json};

#[derive(Debug, Serialize)]
struct FreePort {
    port: u16,
    suggested_use: &'static str,
}

pub async fn run(start: u16, end: u16, count: usize, json: bool) -> Result<()> {
    let ports = manager()
        .find_available_ports(start, end, count)
        .await
        .context("Failed to find available ports")?;

    let free: Vec<FreePort> = ports
        .into_iter()
        .map(|port| FreePort {
            port,
            suggested_use: suggested_use(port),
        })
        .collect();

    if json {
        return print_json(&free);
    }

    if free.is_empty() {
        println!("No available ports found in range {}-{}", start, end);
        return Ok(());
    }

    println!("Available ports in range {}-{}:\n", start, end);
    println!("{:>6}  SUGGESTED USE", "PORT");
    for p in &free {
        println!("{:>6}  {}", p.port, p.suggested_use);
    }
    Ok(())
}
