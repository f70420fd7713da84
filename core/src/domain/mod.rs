//! Domain layer - Pure business logic and data models.
//!
//! This module contains domain entities that represent core business concepts.
//! These types have no I/O dependencies and can be tested in isolation.

mod filter;
mod record;
pub mod service;
mod stats;

// Re-export all domain types
pub use filter::{filter_records, filter_records_at, sort_records, FilterCriteria, SortField};
pub use record::{is_valid_pid, ProcessRecord, Protocol};
pub use stats::{memory_percent, HostMetrics, SystemStats};
