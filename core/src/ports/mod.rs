//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with external systems. Implementations live in `adapters`.

mod config;
mod metrics;
mod platform;

pub use config::ConfigRepository;
pub use metrics::{MetricsProbe, ProcessMetrics};
pub use platform::Platform;
