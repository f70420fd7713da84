//! Tool output parsers.
//!
//! Each parser turns the raw text of one discovery tool into basic
//! [`ProcessRecord`]s. Lines that do not match the expected column layout
//! are dropped silently: locale and version differences in tool output
//! must lead to fewer results, never to an error.

mod lsof;
mod netstat;
mod utils;
mod windows;

pub use lsof::parse_lsof;
pub use netstat::parse_netstat;
pub use utils::split_address;
pub use windows::{parse_tasklist, parse_windows_netstat, UNKNOWN_PROCESS};

use crate::domain::ProcessRecord;

/// Text format produced by a Unix discovery tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnixFormat {
    Lsof,
    Netstat,
}

impl UnixFormat {
    /// lsof output starts with a header containing `COMMAND`.
    pub fn detect(output: &str) -> Self {
        let is_lsof = output
            .lines()
            .find(|l| !l.trim().is_empty())
            .is_some_and(|l| l.contains("COMMAND"));
        if is_lsof {
            UnixFormat::Lsof
        } else {
            UnixFormat::Netstat
        }
    }
}

/// Parse Unix tool output, picking the strategy from the header.
pub fn parse_unix(output: &str, target_port: u16) -> Vec<ProcessRecord> {
    match UnixFormat::detect(output) {
        UnixFormat::Lsof => parse_lsof(output, target_port),
        UnixFormat::Netstat => parse_netstat(output, target_port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            UnixFormat::detect("COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME\n"),
            UnixFormat::Lsof
        );
        assert_eq!(
            UnixFormat::detect("Active Internet connections (only servers)\n"),
            UnixFormat::Netstat
        );
        assert_eq!(UnixFormat::detect(""), UnixFormat::Netstat);
    }

    #[test]
    fn test_parse_unix_dispatches() {
        let lsof = "COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME\n\
                    node 12 me 19u IPv4 0x1 0t0 TCP *:3000 (LISTEN)\n";
        assert_eq!(parse_unix(lsof, 0)[0].command, "node");

        let netstat = "tcp 0 0 0.0.0.0:8080 0.0.0.0:* LISTEN 5/nginx\n";
        assert_eq!(parse_unix(netstat, 0)[0].command, "nginx");
    }
}
