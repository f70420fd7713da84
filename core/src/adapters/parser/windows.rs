//! Windows `netstat -ano` and `tasklist /FO CSV /NH` parsers.
//!
//! ```text
//!   Proto  Local Address          Foreign Address        State           PID
//!   TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1020
//!   TCP    [::1]:5432             [::]:0                 LISTENING       4410
//! ```

use std::collections::HashSet;

use tracing::trace;

use crate::domain::{ProcessRecord, Protocol};

use super::utils::{first_csv_field, split_address};

const MIN_FIELDS: usize = 5;
const DEFAULT_STATE: &str = "LISTENING";

/// Name used when tasklist cannot resolve a PID.
pub const UNKNOWN_PROCESS: &str = "unknown";

/// Parse `netstat -ano` output into basic records.
///
/// The command of every record is [`UNKNOWN_PROCESS`] until the caller
/// resolves names with tasklist. When `target_port` is non-zero the
/// filter is applied here.
pub fn parse_windows_netstat(output: &str, target_port: u16) -> Vec<ProcessRecord> {
    let mut records = Vec::new();
    let mut seen: HashSet<(u32, u16, Protocol)> = HashSet::new();
    let mut dropped = 0usize;

    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            continue;
        }

        let protocol = match fields[0].to_uppercase().as_str() {
            "TCP" => Protocol::Tcp,
            "UDP" => Protocol::Udp,
            _ => continue,
        };

        let local = fields[1];
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

        let pid: u32 = match fields[fields.len() - 1].parse() {
            Ok(p) if p > 0 => p,
            _ => {
                dropped += 1;
                continue;
            }
        };

        if !seen.insert((pid, port, protocol)) {
            continue;
        }

        let state = match protocol {
            Protocol::Tcp => fields[3],
            Protocol::Udp => DEFAULT_STATE,
        };

        records.push(ProcessRecord::basic(
            pid,
            port,
            UNKNOWN_PROCESS,
            protocol,
            state,
            local,
            fields[2],
        ));
    }

    trace!(records = records.len(), dropped = dropped, "Parsed netstat -ano output");
    records
}

/// Extract the image name from `tasklist /FI "PID eq N" /FO CSV /NH` output.
///
/// tasklist prints an `INFO:` line instead of CSV when nothing matches,
/// which yields `None`.
pub fn parse_tasklist(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    if !line.starts_with('"') {
        return None;
    }
    first_csv_field(line)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "
Active Connections

  Proto  Local Address          Foreign Address        State           PID
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1020
  TCP    0.0.0.0:445            0.0.0.0:0              LISTENING       4
  TCP    127.0.0.1:3000         127.0.0.1:52110        ESTABLISHED     8812
  TCP    [::1]:5432             [::]:0                 LISTENING       4410
  TCP    0.0.0.0:5040           0.0.0.0:0              LISTENING       0
  UDP    0.0.0.0:5353           *:*                                    2244
";

    #[test]
    fn test_parse_windows_netstat() {
        let records = parse_windows_netstat(OUTPUT, 0);
        assert_eq!(records.len(), 4);

        let rpc = &records[0];
        assert_eq!(rpc.pid, 1020);
        assert_eq!(rpc.port, 135);
        assert_eq!(rpc.protocol, Protocol::Tcp);
        assert_eq!(rpc.state, "LISTENING");
        assert_eq!(rpc.command, UNKNOWN_PROCESS);
        assert_eq!(rpc.remote_addr, "0.0.0.0:0");
    }

    #[test]
    fn test_ipv6_and_established() {
        let records = parse_windows_netstat(OUTPUT, 0);

        let pg = records.iter().find(|r| r.pid == 4410).unwrap();
        assert_eq!(pg.port, 5432);
        assert_eq!(pg.local_addr, "[::1]:5432");

        let node = records.iter().find(|r| r.pid == 8812).unwrap();
        assert_eq!(node.state, "ESTABLISHED");
        assert_eq!(node.remote_addr, "127.0.0.1:52110");
    }

    #[test]
    fn test_pid_zero_and_short_udp_lines_are_dropped() {
        let records = parse_windows_netstat(OUTPUT, 0);
        assert!(records.iter().all(|r| r.pid != 0));
        // UDP rows only have four columns
        assert!(records.iter().all(|r| r.protocol == Protocol::Tcp));
    }

    #[test]
    fn test_client_side_port_filter() {
        let records = parse_windows_netstat(OUTPUT, 3000);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pid, 8812);
    }

    #[test]
    fn test_parse_tasklist() {
        let output = "\"node.exe\",\"8812\",\"Console\",\"1\",\"45,000 K\"\r\n";
        assert_eq!(parse_tasklist(output), Some("node.exe".to_string()));

        let output = "INFO: No tasks are running which match the specified criteria.\r\n";
        assert_eq!(parse_tasklist(output), None);
        assert_eq!(parse_tasklist(""), None);
    }
}
