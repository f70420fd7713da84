//! `lsof -i -P -n` output parser.
//!
//! ```text
//! COMMAND    PID  USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
//! node     34805  code   19u  IPv6 0x3d8015e195af1f3f      0t0  TCP [::1]:3000 (LISTEN)
//! ```

use std::collections::HashSet;

use tracing::trace;

use crate::domain::{ProcessRecord, Protocol};

use super::utils::{split_address, unescape_lsof};

const MIN_FIELDS: usize = 9;
const DEFAULT_STATE: &str = "LISTEN";

/// Parse lsof output into basic records.
///
/// Lines that do not have the expected shape are dropped. When
/// `target_port` is non-zero only records on that local port are kept.
pub fn parse_lsof(output: &str, target_port: u16) -> Vec<ProcessRecord> {
    let mut records = Vec::new();
    let mut seen: HashSet<(u32, u16, Protocol)> = HashSet::new();
    let mut dropped = 0usize;

    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() || fields[0] == "COMMAND" {
            continue;
        }
        if fields.len() < MIN_FIELDS {
            dropped += 1;
            continue;
        }

        let pid: u32 = match fields[1].parse() {
            Ok(p) if p > 0 => p,
            _ => {
                dropped += 1;
                continue;
            }
        };

        let name = fields[8];
        let (local, remote) = match name.split_once("->") {
            Some((local, remote)) => (local, remote),
            None => (name, ""),
        };

        let port = match split_address(local) {
            Some((_, port)) if port > 0 => port,
            _ => {
                dropped += 1;
                continue;
            }
        };

        if target_port != 0 && port != target_port {
            continue;
        }

        let protocol = if fields[7].to_uppercase().contains("UDP") {
            Protocol::Udp
        } else {
            Protocol::Tcp
        };

        if !seen.insert((pid, port, protocol)) {
            continue;
        }

        let state = fields
            .get(9)
            .and_then(|s| s.strip_prefix('('))
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(DEFAULT_STATE);

        records.push(ProcessRecord::basic(
            pid,
            port,
            unescape_lsof(fields[0]),
            protocol,
            state,
            local,
            remote,
        ));
    }

    trace!(records = records.len(), dropped = dropped, "Parsed lsof output");
    records
}
