//! Error types for the portctl-core library.

use thiserror::Error;

/// Result type alias for portctl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during discovery, enrichment and process termination.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to execute a system command (missing binary, non-zero exit).
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Failed to parse user supplied input (durations, port lists).
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    /// No process with the given PID exists.
    #[error("Process {0} not found")]
    ProcessNotFound(u32),

    /// PID outside the range accepted by the OS.
    #[error("Invalid process id: {0}")]
    InvalidPid(u32),

    /// Failed to kill a process.
    #[error("Failed to kill process {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },

    /// Permission denied for an operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Platform not supported.
    #[error("Platform not supported: {0}")]
    UnsupportedPlatform(String),

    /// Caller passed arguments that cannot be satisfied.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Whether this error comes from insufficient privileges.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::PermissionDenied(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_permission_denied() {
        assert!(Error::PermissionDenied("pid 1".to_string()).is_permission_denied());
        assert!(Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied)).is_permission_denied());
        assert!(!Error::ProcessNotFound(42).is_permission_denied());
        assert_eq!(Error::InvalidPid(0).to_string(), "Invalid process id: 0");
    }
}
