//! Filtering and sorting of process records.

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProcessRecord;

// ============================================================================
// FilterCriteria
// ============================================================================

/// Conjunctive predicate over process records.
///
/// Every populated field must match for a record to pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    /// Case-insensitive substring of the service type or the command.
    pub service: Option<String>,

    /// Substring of the owning user name.
    pub user: Option<String>,

    /// Memory must be strictly greater than this many MB.
    pub min_memory_mb: Option<f64>,

    /// CPU must be strictly greater than this percentage.
    pub min_cpu_percent: Option<f64>,

    /// The process must have been running for at least this long.
    pub older_than: Option<Duration>,

    /// Inclusive local port range.
    pub port_range: Option<(u16, u16)>,
}

impl FilterCriteria {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check if a record matches this filter at the given instant.
    pub fn matches(&self, record: &ProcessRecord, now: DateTime<Utc>) -> bool {
        if let Some(ref service) = self.service {
            let needle = service.to_lowercase();
            if !record.service_type.to_lowercase().contains(&needle)
                && !record.command.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        if let Some(ref user) = self.user {
            let needle = user.to_lowercase();
            match record.user {
                Some(ref owner) if owner.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }

        if let Some(min) = self.min_memory_mb {
            if record.memory_mb <= min {
                return false;
            }
        }

        if let Some(min) = self.min_cpu_percent {
            if record.cpu_percent <= min {
                return false;
            }
        }

        if let Some(threshold) = self.older_than {
            // Unknown start time never counts as old
            match record.age(now) {
                Some(age) if age >= threshold => {}
                _ => return false,
            }
        }

        if let Some((start, end)) = self.port_range {
            if record.port < start || record.port > end {
                return false;
            }
        }

        true
    }
}

/// Apply a filter to an already fetched list, using the current time.
pub fn filter_records(records: &[ProcessRecord], criteria: &FilterCriteria) -> Vec<ProcessRecord> {
    filter_records_at(records, criteria, Utc::now())
}

/// Apply a filter with an explicit notion of "now".
pub fn filter_records_at(
    records: &[ProcessRecord],
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> Vec<ProcessRecord> {
    records
        .iter()
        .filter(|r| criteria.matches(r, now))
        .cloned()
        .collect()
}

// ============================================================================
// SortField
// ============================================================================

/// Field to order records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Pid,
    #[default]
    Port,
    Command,
    Service,
    User,
    Cpu,
    Memory,
}

impl SortField {
    /// All sort fields, in the order the TUI cycles through them.
    pub const ALL: [SortField; 7] = [
        SortField::Port,
        SortField::Pid,
        SortField::Command,
        SortField::Service,
        SortField::User,
        SortField::Cpu,
        SortField::Memory,
    ];

    /// Parse a field name. Unknown names fall back to [`SortField::Port`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "pid" => SortField::Pid,
            "command" | "cmd" => SortField::Command,
            "service" => SortField::Service,
            "user" => SortField::User,
            "cpu" => SortField::Cpu,
            "memory" | "mem" => SortField::Memory,
            _ => SortField::Port,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Pid => "pid",
            SortField::Port => "port",
            SortField::Command => "command",
            SortField::Service => "service",
            SortField::User => "user",
            SortField::Cpu => "cpu",
            SortField::Memory => "memory",
        }
    }

    /// Next field in [`SortField::ALL`], wrapping around.
    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    fn compare(&self, a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
        match self {
            SortField::Pid => a.pid.cmp(&b.pid),
            SortField::Port => a.port.cmp(&b.port),
            SortField::Command => a.command.cmp(&b.command),
            SortField::Service => a.service_type.cmp(&b.service_type),
            SortField::User => a.user.cmp(&b.user),
            SortField::Cpu => b.cpu_percent.total_cmp(&a.cpu_percent),
            SortField::Memory => b.memory_mb.total_cmp(&a.memory_mb),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable in-place sort. `cpu` and `memory` are descending, everything
/// else ascending.
pub fn sort_records(records: &mut [ProcessRecord], field: SortField) {
    records.sort_by(|a, b| field.compare(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Protocol;
    use chrono::TimeZone;

    fn record(pid: u32, port: u16, command: &str, memory_mb: f64) -> ProcessRecord {
        let mut r = ProcessRecord::basic(pid, port, command, Protocol::Tcp, "LISTEN", "*", "");
        r.memory_mb = memory_mb;
        r
    }

    #[test]
    fn test_sort_memory_descending() {
        let mut records = vec![record(1, 1, "a", 10.0), record(2, 2, "b", 50.0), record(3, 3, "c", 30.0)];
        sort_records(&mut records, SortField::Memory);
        let mem: Vec<f64> = records.iter().map(|r| r.memory_mb).collect();
        assert_eq!(mem, vec![50.0, 30.0, 10.0]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut records = vec![
            record(3, 80, "b", 0.0),
            record(1, 80, "a", 0.0),
            record(2, 22, "c", 0.0),
        ];
        sort_records(&mut records, SortField::Port);
        let pids: Vec<u32> = records.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![2, 3, 1]);
    }

    #[test]
    fn test_sort_field_parse() {
        assert_eq!(SortField::parse("mem"), SortField::Memory);
        assert_eq!(SortField::parse("CMD"), SortField::Command);
        assert_eq!(SortField::parse(""), SortField::Port);
        assert_eq!(SortField::parse("bogus"), SortField::Port);
        assert_eq!(SortField::Memory.next(), SortField::Port);
    }

    #[test]
    fn test_filter_service_matches_command_or_label() {
        let records = vec![record(1, 5432, "postgres", 0.0), record(2, 40000, "node", 0.0)];

        let criteria = FilterCriteria {
            service: Some("POSTGRES".into()),
            ..Default::default()
        };
        let out = filter_records(&records, &criteria);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pid, 1);

        let criteria = FilterCriteria {
            service: Some("node.js".into()),
            ..Default::default()
        };
        assert_eq!(filter_records(&records, &criteria)[0].pid, 2);
    }

    #[test]
    fn test_filter_thresholds_are_strict() {
        let records = vec![record(1, 1, "a", 100.0), record(2, 2, "b", 100.1)];
        let criteria = FilterCriteria {
            min_memory_mb: Some(100.0),
            ..Default::default()
        };
        let out = filter_records(&records, &criteria);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pid, 2);
    }

    #[test]
    fn test_filter_user_requires_known_user() {
        let mut alice = record(1, 1, "a", 0.0);
        alice.user = Some("alice".into());
        let nobody = record(2, 2, "b", 0.0);

        let criteria = FilterCriteria {
            user: Some("ali".into()),
            ..Default::default()
        };
        let out = filter_records(&[alice, nobody], &criteria);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pid, 1);
    }

    #[test]
    fn test_filter_user_ignores_case() {
        let mut alice = record(1, 1, "a", 0.0);
        alice.user = Some("alice".into());
        let mut bob = record(2, 2, "b", 0.0);
        bob.user = Some("Bob".into());

        let criteria = FilterCriteria {
            user: Some("Alice".into()),
            ..Default::default()
        };
        let out = filter_records(&[alice.clone(), bob.clone()], &criteria);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pid, 1);

        let criteria = FilterCriteria {
            user: Some("bob".into()),
            ..Default::default()
        };
        assert_eq!(filter_records(&[alice, bob], &criteria)[0].pid, 2);
    }

    #[test]
    fn test_filter_older_than_uses_elapsed_time() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut old = record(1, 3000, "node", 0.0);
        old.start_time = Some(Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap());
        let mut fresh = record(2, 3001, "node", 0.0);
        fresh.start_time = Some(Utc.with_ymd_and_hms(2024, 6, 1, 11, 30, 0).unwrap());
        let unknown = record(3, 3002, "node", 0.0);

        let criteria = FilterCriteria {
            older_than: Some(Duration::from_secs(3600)),
            ..Default::default()
        };
        let out = filter_records_at(&[old, fresh, unknown], &criteria, now);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pid, 1);
    }

    #[test]
    fn test_filter_conjunctive() {
        let mut a = record(1, 3000, "node", 200.0);
        a.cpu_percent = 5.0;
        let mut b = record(2, 3001, "node", 200.0);
        b.cpu_percent = 0.5;

        let criteria = FilterCriteria {
            service: Some("node".into()),
            min_memory_mb: Some(100.0),
            min_cpu_percent: Some(1.0),
            port_range: Some((3000, 3999)),
            ..Default::default()
        };
        let out = filter_records(&[a, b], &criteria);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pid, 1);
        assert!(!criteria.is_empty());
        assert!(FilterCriteria::default().is_empty());
    }
}
