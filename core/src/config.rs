//! Configuration management.
//!
//! User preferences are stored as JSON at `~/.portctl/config.json` and
//! addressed from the CLI with dotted keys (`watch.interval`, `scan.timeout`).
//! Nothing here is global: callers load a [`Config`] and pass the values
//! they need down explicitly.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::SortField;
use crate::error::{Error, Result};
use crate::ports::ConfigRepository;

/// Every supported key, in display order.
pub const KEYS: [&str; 9] = [
    "watch.interval",
    "watch.notifications",
    "output.format",
    "output.colors",
    "scan.timeout",
    "scan.concurrent",
    "kill.confirm",
    "list.sort",
    "dev.ports",
];

// ============================================================================
// Config
// ============================================================================

/// User configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub watch: WatchConfig,
    pub output: OutputConfig,
    pub scan: ScanConfig,
    pub kill: KillConfig,
    pub list: ListConfig,
    pub dev: DevConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Polling interval.
    #[serde(with = "duration_str")]
    pub interval: Duration,
    /// Emit desktop-style notifications on changes.
    pub notifications: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            notifications: false,
        }
    }
}

/// Preferred rendering for list-style output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Tree,
    Details,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Tree => "tree",
            OutputFormat::Details => "details",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "tree" => Ok(OutputFormat::Tree),
            "details" => Ok(OutputFormat::Details),
            other => Err(Error::Config(format!(
                "Invalid output format '{}' (expected table, json, tree or details)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub colors: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            colors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Per-connection timeout.
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    /// Maximum simultaneous connection attempts.
    pub concurrent: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            concurrent: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KillConfig {
    /// Ask before killing.
    pub confirm: bool,
}

impl Default for KillConfig {
    fn default() -> Self {
        Self { confirm: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ListConfig {
    pub sort: SortField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// Inclusive port range treated as "development".
    #[serde(with = "port_range_str")]
    pub ports: (u16, u16),
}

impl Default for DevConfig {
    fn default() -> Self {
        Self { ports: (3000, 9999) }
    }
}

impl Config {
    /// Read a value by dotted key.
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "watch.interval" => format_duration(self.watch.interval),
            "watch.notifications" => self.watch.notifications.to_string(),
            "output.format" => self.output.format.as_str().to_string(),
            "output.colors" => self.output.colors.to_string(),
            "scan.timeout" => format_duration(self.scan.timeout),
            "scan.concurrent" => self.scan.concurrent.to_string(),
            "kill.confirm" => self.kill.confirm.to_string(),
            "list.sort" => self.list.sort.as_str().to_string(),
            "dev.ports" => format_port_range(self.dev.ports),
            other => return Err(unknown_key(other)),
        };
        Ok(value)
    }

    /// Validate and assign a value by dotted key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "watch.interval" => self.watch.interval = parse_positive_duration(value)?,
            "watch.notifications" => self.watch.notifications = parse_bool(value)?,
            "output.format" => self.output.format = OutputFormat::parse(value)?,
            "output.colors" => self.output.colors = parse_bool(value)?,
            "scan.timeout" => self.scan.timeout = parse_positive_duration(value)?,
            "scan.concurrent" => {
                let n: usize = value
                    .parse()
                    .map_err(|_| Error::Config(format!("Invalid number: {}", value)))?;
                if n == 0 {
                    return Err(Error::Config("scan.concurrent must be at least 1".to_string()));
                }
                self.scan.concurrent = n;
            }
            "kill.confirm" => self.kill.confirm = parse_bool(value)?,
            "list.sort" => {
                let name = value.to_lowercase();
                let known = SortField::ALL.iter().any(|f| f.as_str() == name)
                    || matches!(name.as_str(), "mem" | "cmd");
                if !known {
                    return Err(Error::Config(format!("Invalid sort field: {}", value)));
                }
                self.list.sort = SortField::parse(&name);
            }
            "dev.ports" => {
                let (start, end) = parse_port_range(value)?;
                if start >= end {
                    return Err(Error::Config(
                        "dev.ports start must be lower than end".to_string(),
                    ));
                }
                self.dev.ports = (start, end);
            }
            other => return Err(unknown_key(other)),
        }
        Ok(())
    }

    /// Restore a single key to its default value.
    pub fn reset(&mut self, key: &str) -> Result<()> {
        let defaults = Config::default();
        let value = defaults.get(key)?;
        self.set(key, &value)
    }

    /// Restore every key to its default value.
    pub fn reset_all(&mut self) {
        *self = Config::default();
    }

    /// All keys with their current values, in display order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        KEYS.iter()
            .filter_map(|key| self.get(key).ok().map(|v| (*key, v)))
            .collect()
    }
}

/// Settings for the process manager façade.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Run the metrics enricher on discovered records.
    pub enrich: bool,
    /// Window over which host CPU is sampled for stats.
    pub cpu_sample_window: Duration,
    /// Number of records kept in the stats top list.
    pub top_n: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            enrich: true,
            cpu_sample_window: Duration::from_secs(1),
            top_n: 5,
        }
    }
}

fn unknown_key(key: &str) -> Error {
    Error::Config(format!(
        "Unknown configuration key '{}' (valid keys: {})",
        key,
        KEYS.join(", ")
    ))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(Error::Config(format!("Invalid boolean: {}", value))),
    }
}

fn parse_positive_duration(value: &str) -> Result<Duration> {
    let duration = parse_duration(value).map_err(|e| Error::Config(e.to_string()))?;
    if duration.is_zero() {
        return Err(Error::Config("Duration must be greater than zero".to_string()));
    }
    Ok(duration)
}

// ============================================================================
// Durations and ranges
// ============================================================================

static DURATION_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+(?:ms|s|m|h|d))+$").expect("valid regex"));
static DURATION_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(ms|s|m|h|d)").expect("valid regex"));

/// Parse a human duration such as `500ms`, `3s`, `1h30m` or `2d`.
///
/// A bare integer is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    if !DURATION_FULL.is_match(input) {
        return Err(Error::ParseError(format!("Invalid duration: '{}'", input)));
    }

    let mut total = Duration::ZERO;
    for caps in DURATION_PART.captures_iter(input) {
        let amount: u64 = caps[1]
            .parse()
            .map_err(|_| Error::ParseError(format!("Invalid duration: '{}'", input)))?;
        let unit_ms: u64 = match &caps[2] {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            _ => 86_400_000,
        };
        let part = amount
            .checked_mul(unit_ms)
            .ok_or_else(|| Error::ParseError(format!("Duration too large: '{}'", input)))?;
        total = total
            .checked_add(Duration::from_millis(part))
            .ok_or_else(|| Error::ParseError(format!("Duration too large: '{}'", input)))?;
    }
    Ok(total)
}

/// Render a duration in the same syntax [`parse_duration`] accepts.
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() != 0 {
        return format!("{}ms", duration.as_millis());
    }

    let total = duration.as_secs();
    if total == 0 {
        return "0s".to_string();
    }

    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    if seconds > 0 {
        out.push_str(&format!("{}s", seconds));
    }
    out
}

/// Parse an inclusive port range `start-end`.
pub fn parse_port_range(input: &str) -> Result<(u16, u16)> {
    let (start, end) = input
        .split_once('-')
        .ok_or_else(|| Error::ParseError(format!("Invalid port range '{}' (expected start-end)", input)))?;

    let start: u16 = start
        .trim()
        .parse()
        .map_err(|_| Error::ParseError(format!("Invalid start port: {}", start.trim())))?;
    let end: u16 = end
        .trim()
        .parse()
        .map_err(|_| Error::ParseError(format!("Invalid end port: {}", end.trim())))?;

    if start == 0 {
        return Err(Error::ParseError("Port 0 is not a valid port".to_string()));
    }
    if start > end {
        return Err(Error::ParseError(format!(
            "Start port {} is greater than end port {}",
            start, end
        )));
    }
    Ok((start, end))
}

fn format_port_range((start, end): (u16, u16)) -> String {
    format!("{}-{}", start, end)
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

mod port_range_str {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &(u16, u16), serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_port_range(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<(u16, u16), D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_port_range(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// ConfigStore
// ============================================================================

/// Configuration store backed by a JSON file.
///
/// Handles reading and writing configuration to `~/.portctl/config.json`.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `~/.portctl/config.json`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        let config_path = home.join(".portctl").join("config.json");

        Ok(Self { config_path })
    }

    /// Create a config store with a custom path (for testing).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, config: &Config) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
                fs::create_dir_all(config_dir).await.map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }
}

impl ConfigRepository for ConfigStore {
    async fn load(&self) -> Result<Config> {
        ConfigStore::load(self).await
    }

    async fn save(&self, config: &Config) -> Result<()> {
        ConfigStore::save(self, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};

    async fn test_store() -> (ConfigStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        (ConfigStore::with_path(path), dir)
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _dir) = test_store().await;
        let config = store.load().await.unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.watch.interval, Duration::from_secs(3));
        assert_eq!(config.scan.concurrent, 50);
        assert!(config.kill.confirm);
        assert_eq!(config.dev.ports, (3000, 9999));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _dir) = test_store().await;

        let mut config = Config::default();
        config.set("scan.timeout", "500ms").unwrap();
        config.set("list.sort", "mem").unwrap();
        config.set("dev.ports", "4000-4999").unwrap();

        store.save(&config).await.unwrap();
        assert!(store.path().exists());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.scan.timeout, Duration::from_millis(500));
        assert_eq!(loaded.list.sort, SortField::Memory);
        assert_eq!(loaded.dev.ports, (4000, 4999));
    }

    #[tokio::test]
    async fn test_file_format_is_readable() {
        let (store, _dir) = test_store().await;
        store.save(&Config::default()).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["watch"]["interval"], "3s");
        assert_eq!(value["dev"]["ports"], "3000-9999");
        assert_eq!(value["output"]["format"], "table");
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let (store, _dir) = test_store().await;
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{"scan": {"concurrent": 10}}"#).unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.scan.concurrent, 10);
        assert_eq!(config.scan.timeout, Duration::from_secs(3));
        assert_eq!(config.watch, WatchConfig::default());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_config_error() {
        let (store, _dir) = test_store().await;
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "not json").unwrap();

        assert!(matches!(store.load().await, Err(Error::Config(_))));
    }

    #[test]
    fn test_set_validation() {
        let mut config = Config::default();
        assert_err!(config.set("scan.concurrent", "0"));
        assert_err!(config.set("output.format", "xml"));
        assert_err!(config.set("watch.interval", "soon"));
        assert_err!(config.set("dev.ports", "5000-5000"));
        assert_err!(config.set("list.sort", "size"));
        assert_err!(config.set("nope", "1"));
        assert_ok!(config.set("output.colors", "false"));
        assert!(!config.output.colors);
    }

    #[test]
    fn test_get_and_reset() {
        let mut config = Config::default();
        config.set("watch.interval", "90s").unwrap();
        assert_eq!(config.get("watch.interval").unwrap(), "1m30s");

        config.reset("watch.interval").unwrap();
        assert_eq!(config.get("watch.interval").unwrap(), "3s");

        let entries = config.entries();
        assert_eq!(entries.len(), KEYS.len());
        assert_eq!(entries[0], ("watch.interval", "3s".to_string()));

        config.set("scan.concurrent", "8").unwrap();
        config.set("kill.confirm", "false").unwrap();
        config.reset_all();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(172_800));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3 s").is_err());
        assert!(parse_duration("1y").is_err());
    }

    #[test]
    fn test_parse_duration_overflow_is_error() {
        let huge = format!("{}ms", u64::MAX);
        // Each part fits, the sum does not
        assert!(matches!(parse_duration(&huge.repeat(1100)), Err(Error::ParseError(_))));
        assert!(matches!(parse_duration(&format!("{}d", u64::MAX)), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(3)), "3s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn test_parse_port_range() {
        assert_eq!(parse_port_range("3000-3010").unwrap(), (3000, 3010));
        assert_eq!(parse_port_range(" 80 - 80 ").unwrap(), (80, 80));
        assert!(parse_port_range("3010-3000").is_err());
        assert!(parse_port_range("0-10").is_err());
        assert!(parse_port_range("abc").is_err());
        assert!(parse_port_range("1-70000").is_err());
    }
}
