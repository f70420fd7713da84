//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.
//! Each adapter handles communication with external systems: discovery tools
//! run through a [`CommandRunner`], signals, and the OS process table.

pub mod command;
pub mod metrics;
pub mod parser;
pub mod platform;

// Re-export main types for convenience
pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use metrics::SysinfoProbe;
pub use platform::{NativePlatform, UnixPlatform, WindowsPlatform};
