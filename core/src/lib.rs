//! portctl Core Library
//!
//! Cross-platform library for finding and terminating processes bound to
//! network ports. Provides functionality to:
//! - Discover processes per port via `lsof`, `netstat` or `tasklist`
//! - Enrich them with live CPU, memory, user and start time
//! - Filter, sort and aggregate the results
//! - Kill processes by PID (gracefully or forcefully)
//! - Watch for port changes and scan remote hosts
//! - Manage user configuration
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure business logic and data models
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: External system implementations
//! - `application`: Use case services
//!
//! # Platform Support
//! - macOS, Linux, BSDs: `lsof`, falling back to `netstat -tulpn`
//! - Windows: `netstat -ano` plus `tasklist`

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod error;
pub mod scan;
pub mod watch;

// Re-export domain types (primary API)
pub use domain::{FilterCriteria, ProcessRecord, Protocol, SortField, SystemStats};

// Re-export other commonly used types
pub use adapters::{NativePlatform, SysinfoProbe};
pub use application::ProcessManager;
pub use config::{Config, ConfigStore, ManagerConfig};
pub use error::{Error, Result};
pub use scan::{ScanResult, Scanner};
pub use watch::{Snapshot, WatchEvent, Watcher};

/// Process manager wired to the running OS.
pub type NativeProcessManager = ProcessManager<NativePlatform, SysinfoProbe>;
