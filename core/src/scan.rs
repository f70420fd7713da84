//! TCP connect scanning with bounded concurrency.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::domain::service;
use crate::error::{Error, Result};

/// Ports probed by `scan --common`.
pub const COMMON_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 993, 995, 1433, 1521, 3306, 3389, 5432, 5900,
    8080,
];

/// Ports that only answer after a request.
const HTTP_PORTS: &[u16] = &[80, 443, 8080];

const MAX_BANNER_CHARS: usize = 100;
const MAX_PORTS: usize = 65_535;

/// Parse a port list such as `80,443,1000-2000`.
///
/// Ports keep their input order; duplicates are kept.
pub fn parse_port_list(input: &str) -> Result<Vec<u16>> {
    let mut ports = Vec::new();

    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::ParseError(format!("empty entry in port list '{}'", input)));
        }

        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_port(start)?;
                let end = parse_port(end)?;
                if start > end {
                    return Err(Error::ParseError(format!(
                        "start port must not exceed end port in '{}'",
                        token
                    )));
                }
                ports.extend(start..=end);
            }
            None => ports.push(parse_port(token)?),
        }

        if ports.len() > MAX_PORTS {
            return Err(Error::ParseError(format!(
                "port list expands to more than {} ports",
                MAX_PORTS
            )));
        }
    }

    Ok(ports)
}

fn parse_port(token: &str) -> Result<u16> {
    match token.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::ParseError(format!("invalid port: {}", token.trim()))),
        Ok(port) => Ok(port),
    }
}

/// Connection state of a scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Open,
    Closed,
    /// No answer within the connect timeout.
    Filtered,
}

/// Outcome of probing one port.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub host: String,
    pub port: u16,
    pub status: PortStatus,
    /// Well-known service name, open ports only.
    pub service: Option<String>,
    pub banner: Option<String>,
}

impl ScanResult {
    pub fn is_open(&self) -> bool {
        self.status == PortStatus::Open
    }
}

/// TCP connect scanner.
#[derive(Debug, Clone)]
pub struct Scanner {
    concurrency: usize,
    timeout: Duration,
    banner_timeout: Duration,
}

impl Scanner {
    /// `concurrency` bounds simultaneous connection attempts; `timeout`
    /// applies to each attempt.
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            timeout,
            banner_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_banner_timeout(mut self, banner_timeout: Duration) -> Self {
        self.banner_timeout = banner_timeout;
        self
    }

    /// Probe every port on `host`. Returns once all attempts finished,
    /// sorted by port.
    pub async fn scan(&self, host: &str, ports: &[u16]) -> Vec<ScanResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for &port in ports {
            let semaphore = Arc::clone(&semaphore);
            let host = host.to_string();
            let scanner = self.clone();
            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                scanner.probe(&host, port).await
            });
        }

        let mut results = Vec::with_capacity(ports.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => debug!(error = %e, "Scan task failed"),
            }
        }

        results.sort_by_key(|r| r.port);
        results
    }

    async fn probe(&self, host: &str, port: u16) -> ScanResult {
        let mut result = ScanResult {
            host: host.to_string(),
            port,
            status: PortStatus::Closed,
            service: None,
            banner: None,
        };

        let mut stream = match tokio::time::timeout(self.timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                trace!(host = host, port = port, error = %e, "Port closed");
                return result;
            }
            Err(_) => {
                trace!(host = host, port = port, "Connect timed out");
                result.status = PortStatus::Filtered;
                return result;
            }
        };

        result.status = PortStatus::Open;
        result.service = Some(service::well_known(port).unwrap_or(service::UNKNOWN).to_string());
        result.banner = self.grab_banner(&mut stream, port).await;
        result
    }

    async fn grab_banner(&self, stream: &mut TcpStream, port: u16) -> Option<String> {
        if HTTP_PORTS.contains(&port) {
            stream.write_all(b"HEAD / HTTP/1.0\r\n\r\n").await.ok()?;
        }

        let mut buffer = [0u8; 1024];
        let n = match tokio::time::timeout(self.banner_timeout, stream.read(&mut buffer)).await {
            Ok(Ok(n)) if n > 0 => n,
            _ => return None,
        };

        let banner = String::from_utf8_lossy(&buffer[..n]).trim().to_string();
        if banner.is_empty() {
            return None;
        }
        Some(truncate_banner(&banner))
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(50, Duration::from_secs(3))
    }
}

fn truncate_banner(banner: &str) -> String {
    if banner.chars().count() > MAX_BANNER_CHARS {
        let head: String = banner.chars().take(MAX_BANNER_CHARS).collect();
        format!("{}...", head)
    } else {
        banner.to_string()
    }
}
