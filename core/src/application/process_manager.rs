//! Process manager application service.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::adapters::{NativePlatform, SysinfoProbe};
use crate::config::ManagerConfig;
use crate::domain::{
    filter_records, sort_records, FilterCriteria, ProcessRecord, SortField, SystemStats,
};
use crate::error::{Error, Result};
use crate::ports::{MetricsProbe, Platform};

use super::Enricher;

/// Façade over discovery, enrichment, filtering and termination.
///
/// Every call is a fresh query against live OS state; nothing is cached
/// between calls. Dropping a returned future cancels any tool it spawned.
pub struct ProcessManager<P: Platform, M: MetricsProbe> {
    platform: P,
    enricher: Enricher<M>,
    config: ManagerConfig,
}

impl ProcessManager<NativePlatform, SysinfoProbe> {
    /// Create a manager for the running OS.
    pub fn native(config: ManagerConfig) -> Self {
        Self::new(NativePlatform::detect(), SysinfoProbe::new(), config)
    }
}

impl<P: Platform, M: MetricsProbe> ProcessManager<P, M> {
    /// Create a new manager with the given platform and metrics probe.
    pub fn new(platform: P, probe: M, config: ManagerConfig) -> Self {
        Self {
            platform,
            enricher: Enricher::new(probe),
            config,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    async fn discover(&self, port: u16) -> Result<Vec<ProcessRecord>> {
        let mut records = self.platform.discover(port).await?;
        if port != 0 {
            records.retain(|r| r.port == port);
        }
        if self.config.enrich {
            self.enricher.enrich(&mut records).await;
        }
        debug!(port = port, count = records.len(), "Discovery finished");
        Ok(records)
    }

    /// Records bound to `port`.
    pub async fn list_on_port(&self, port: u16) -> Result<Vec<ProcessRecord>> {
        if port == 0 {
            return Err(Error::InvalidArgument("port must be in 1-65535".to_string()));
        }
        self.discover(port).await
    }

    /// Every record, ascending by port.
    pub async fn list_all(&self) -> Result<Vec<ProcessRecord>> {
        let mut records = self.discover(0).await?;
        sort_records(&mut records, SortField::Port);
        Ok(records)
    }

    /// Every record whose port lies in `start..=end`, ascending by port.
    pub async fn list_in_range(&self, start: u16, end: u16) -> Result<Vec<ProcessRecord>> {
        if start > end {
            return Err(Error::InvalidArgument(format!(
                "invalid port range {}-{}",
                start, end
            )));
        }
        let mut records = self.list_all().await?;
        records.retain(|r| (start..=end).contains(&r.port));
        Ok(records)
    }

    /// Aggregate statistics plus host CPU and memory.
    pub async fn stats(&self) -> Result<SystemStats> {
        self.stats_with_records().await.map(|(stats, _)| stats)
    }

    /// Statistics together with the records they were computed from,
    /// both from a single discovery pass.
    pub async fn stats_with_records(&self) -> Result<(SystemStats, Vec<ProcessRecord>)> {
        let records = self.list_all().await?;
        let host = self
            .enricher
            .probe()
            .host_metrics(self.config.cpu_sample_window)
            .await?;
        let stats = SystemStats::from_parts(&records, host, self.config.top_n);
        Ok((stats, records))
    }

    /// Records whose service type or command contains `label`.
    pub async fn list_by_service(&self, label: &str) -> Result<Vec<ProcessRecord>> {
        let records = self.list_all().await?;
        let criteria = FilterCriteria {
            service: Some(label.to_string()),
            ..Default::default()
        };
        Ok(filter_records(&records, &criteria))
    }

    /// Up to `count` ports in `start..=end` with nothing bound to them,
    /// ascending.
    pub async fn find_available_ports(&self, start: u16, end: u16, count: usize) -> Result<Vec<u16>> {
        if start == 0 || start >= end {
            return Err(Error::InvalidArgument(format!(
                "start port must be positive and below end port (got {}-{})",
                start, end
            )));
        }

        let used: HashSet<u16> = self.list_all().await?.iter().map(|r| r.port).collect();
        Ok((start..=end)
            .filter(|port| !used.contains(port))
            .take(count)
            .collect())
    }

    /// Apply `criteria` to already fetched records. Never queries the OS.
    pub fn filter(&self, records: &[ProcessRecord], criteria: &FilterCriteria) -> Vec<ProcessRecord> {
        filter_records(records, criteria)
    }

    /// Stable sort of already fetched records.
    pub fn sort(&self, records: &mut [ProcessRecord], field: SortField) {
        sort_records(records, field)
    }

    /// Terminate one process. Not retried on failure.
    pub async fn kill(&self, pid: u32, force: bool) -> Result<()> {
        match self.platform.kill(pid, force).await {
            Ok(()) => {
                info!(pid = pid, force = force, "Process terminated");
                Ok(())
            }
            Err(e) => {
                warn!(pid = pid, force = force, error = %e, "Failed to terminate process");
                Err(e)
            }
        }
    }

    /// Terminate each PID independently and report per-PID outcomes.
    ///
    /// Duplicate PIDs are signalled once.
    pub async fn kill_many(&self, pids: &[u32], force: bool) -> BTreeMap<u32, Result<()>> {
        let mut results = BTreeMap::new();
        for &pid in pids {
            if results.contains_key(&pid) {
                continue;
            }
            let outcome = self.kill(pid, force).await;
            results.insert(pid, outcome);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio_test::assert_ok;

    use super::*;
    use crate::domain::{HostMetrics, Protocol};
    use crate::ports::ProcessMetrics;

    /// Platform serving canned records and recording kill calls.
    struct MockPlatform {
        records: Vec<ProcessRecord>,
        alive: HashSet<u32>,
        kills: Mutex<Vec<(u32, bool)>>,
        discoveries: Mutex<usize>,
    }

    impl MockPlatform {
        fn new(records: Vec<ProcessRecord>) -> Self {
            let alive = records.iter().map(|r| r.pid).collect();
            Self {
                records,
                alive,
                kills: Mutex::new(Vec::new()),
                discoveries: Mutex::new(0),
            }
        }
    }

    impl Platform for MockPlatform {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn discover(&self, port: u16) -> Result<Vec<ProcessRecord>> {
            *self.discoveries.lock() += 1;
            Ok(self
                .records
                .iter()
                .filter(|r| port == 0 || r.port == port)
                .cloned()
                .collect())
        }

        async fn kill(&self, pid: u32, force: bool) -> Result<()> {
            self.kills.lock().push((pid, force));
            if self.alive.contains(&pid) {
                Ok(())
            } else {
                Err(Error::ProcessNotFound(pid))
            }
        }
    }

    /// Probe giving every PID `pid` MB of memory.
    struct MockProbe;

    impl MetricsProbe for MockProbe {
        async fn process_metrics(&self, pids: &[u32]) -> HashMap<u32, ProcessMetrics> {
            pids.iter()
                .map(|&pid| {
                    (
                        pid,
                        ProcessMetrics {
                            memory_bytes: Some(u64::from(pid) * 1024 * 1024),
                            user: Some("dev".to_string()),
                            ..Default::default()
                        },
                    )
                })
                .collect()
        }

        async fn host_metrics(&self, _window: Duration) -> Result<HostMetrics> {
            Ok(HostMetrics {
                cpu_percent: 25.0,
                used_memory_bytes: 3 * 1024 * 1024 * 1024,
                available_memory_bytes: 1024 * 1024 * 1024,
            })
        }
    }

    fn record(pid: u32, port: u16, command: &str) -> ProcessRecord {
        ProcessRecord::basic(pid, port, command, Protocol::Tcp, "LISTEN", "*", "")
    }

    fn manager(records: Vec<ProcessRecord>) -> ProcessManager<MockPlatform, MockProbe> {
        ProcessManager::new(MockPlatform::new(records), MockProbe, ManagerConfig::default())
    }

    #[tokio::test]
    async fn test_list_all_sorted_and_enriched() {
        let pm = manager(vec![
            record(30, 8080, "nginx"),
            record(10, 3000, "node"),
            record(20, 5432, "postgres"),
        ]);

        let records = assert_ok!(pm.list_all().await);
        let ports: Vec<u16> = records.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![3000, 5432, 8080]);
        assert_eq!(records[0].memory_mb, 10.0);
        assert_eq!(records[0].user.as_deref(), Some("dev"));
    }

    #[tokio::test]
    async fn test_enrichment_can_be_disabled() {
        let config = ManagerConfig {
            enrich: false,
            ..Default::default()
        };
        let pm = ProcessManager::new(MockPlatform::new(vec![record(10, 3000, "node")]), MockProbe, config);
        let records = pm.list_all().await.unwrap();
        assert!(records[0].user.is_none());
    }

    #[tokio::test]
    async fn test_list_on_port_only_returns_that_port() {
        let pm = manager(vec![record(10, 3000, "node"), record(11, 3001, "node")]);
        let records = pm.list_on_port(3001).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.iter().all(|r| r.port == 3001));
        assert!(pm.list_on_port(0).await.is_err());
    }

    #[tokio::test]
    async fn test_list_in_range() {
        let pm = manager(vec![
            record(1, 2999, "a"),
            record(2, 3000, "b"),
            record(3, 3500, "c"),
            record(4, 4000, "d"),
        ]);
        let records = pm.list_in_range(3000, 3999).await.unwrap();
        let pids: Vec<u32> = records.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![2, 3]);
        assert!(pm.list_in_range(10, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_find_available_ports() {
        let pm = manager(vec![
            record(1, 3000, "node"),
            record(2, 3002, "node"),
            record(3, 3005, "node"),
        ]);
        let free = pm.find_available_ports(3000, 3010, 5).await.unwrap();
        assert_eq!(free, vec![3001, 3003, 3004, 3006, 3007]);

        // Fewer free ports than requested
        let free = pm.find_available_ports(3000, 3002, 5).await.unwrap();
        assert_eq!(free, vec![3001]);

        assert!(matches!(
            pm.find_available_ports(3010, 3000, 1).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_list_by_service() {
        let pm = manager(vec![
            record(1, 3000, "node"),
            record(2, 5432, "postgres"),
            record(3, 6000, "my-node-worker"),
        ]);
        let records = pm.list_by_service("NODE").await.unwrap();
        let pids: Vec<u32> = records.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_stats() {
        let pm = manager(vec![
            record(5, 3000, "node"),
            record(50, 3000, "node"),
            record(30, 8080, "nginx"),
        ]);
        let stats = pm.stats().await.unwrap();
        assert_eq!(stats.total_processes, 3);
        assert_eq!(stats.listening_ports, 2);
        assert_eq!(stats.cpu_percent, 25.0);
        assert_eq!(stats.memory_percent, 75.0);
        let top: Vec<u32> = stats.top_processes.iter().map(|r| r.pid).collect();
        assert_eq!(top, vec![50, 30, 5]);
    }

    #[tokio::test]
    async fn test_stats_with_records_discovers_once() {
        let pm = manager(vec![record(5, 3000, "node"), record(30, 8080, "nginx")]);
        let (stats, records) = pm.stats_with_records().await.unwrap();

        assert_eq!(*pm.platform().discoveries.lock(), 1);
        assert_eq!(stats.total_processes, records.len());
        let ports: Vec<u16> = records.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![3000, 8080]);
    }

    #[tokio::test]
    async fn test_filter_and_sort_do_not_requery() {
        let pm = manager(vec![]);
        let mut records = vec![record(1, 1, "a"), record(2, 2, "b"), record(3, 3, "c")];
        for (r, mb) in records.iter_mut().zip([10.0, 50.0, 30.0]) {
            r.memory_mb = mb;
        }

        pm.sort(&mut records, SortField::Memory);
        let order: Vec<f64> = records.iter().map(|r| r.memory_mb).collect();
        assert_eq!(order, vec![50.0, 30.0, 10.0]);

        let criteria = FilterCriteria {
            min_memory_mb: Some(30.0),
            ..Default::default()
        };
        let kept = pm.filter(&records, &criteria);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].memory_mb, 50.0);
    }

    #[tokio::test]
    async fn test_kill_many_reports_per_pid() {
        let pm = manager(vec![record(100, 3000, "node")]);
        let results = pm.kill_many(&[100, 999, 100], true).await;

        assert_eq!(results.len(), 2);
        assert!(results[&100].is_ok());
        assert!(matches!(results[&999], Err(Error::ProcessNotFound(999))));
        assert_eq!(*pm.platform().kills.lock(), vec![(100, true), (999, true)]);
    }

    #[tokio::test]
    async fn test_list_all_is_repeatable() {
        let pm = manager(vec![record(1, 3000, "node"), record(2, 8080, "nginx")]);
        let first: Vec<_> = pm.list_all().await.unwrap().iter().map(|r| r.key()).collect();
        let second: Vec<_> = pm.list_all().await.unwrap().iter().map(|r| r.key()).collect();
        assert_eq!(first, second);
    }
}
