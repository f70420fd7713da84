//! `netstat -tulpn` output parser (Linux and other Unix fallbacks).
//!
//! ```text
//! Proto Recv-Q Send-Q Local Address     Foreign Address   State    PID/Program name
//! tcp        0      0 0.0.0.0:8080      0.0.0.0:*         LISTEN   12345/node
//! udp        0      0 0.0.0.0:68        0.0.0.0:*                  812/dhclient
//! ```

use std::collections::HashSet;

use tracing::trace;

use crate::domain::{ProcessRecord, Protocol};

use super::utils::split_address;

const MIN_FIELDS: usize = 4;
const DEFAULT_STATE: &str = "LISTEN";

/// Parse Unix netstat output into basic records.
///
/// netstat cannot filter by port, so when `target_port` is non-zero the
/// filter is applied here.
pub fn parse_netstat(output: &str, target_port: u16) -> Vec<ProcessRecord> {
    let mut records = Vec::new();
    let mut seen: HashSet<(u32, u16, Protocol)> = HashSet::new();
    let mut dropped = 0usize;

    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            continue;
        }

        let proto = fields[0].to_lowercase();
        let protocol = if proto.starts_with("tcp") {
            Protocol::Tcp
        } else if proto.starts_with("udp") {
            Protocol::Udp
        } else {
            // Headers and unix domain sockets
            continue;
        };

        let local = fields[3];
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

        // Final token is "pid/program"; "-" when the owner is hidden from us.
        let last = fields[fields.len() - 1];
        let (pid, command) = match last.split_once('/') {
            Some((pid, command)) => match pid.parse::<u32>() {
                Ok(pid) if pid > 0 => (pid, command),
                _ => {
                    dropped += 1;
                    continue;
                }
            },
            None => {
                dropped += 1;
                continue;
            }
        };

        if !seen.insert((pid, port, protocol)) {
            continue;
        }

        // Foreign address and state sit between the local address and the
        // final pid/program token when present.
        let remote = if fields.len() > 5 { fields[4] } else { "" };
        let state = if fields.len() > 6 { fields[5] } else { DEFAULT_STATE };

        records.push(ProcessRecord::basic(
            pid, port, command, protocol, state, local, remote,
        ));
    }

    trace!(records = records.len(), dropped = dropped, "Parsed netstat output");
    records
}
