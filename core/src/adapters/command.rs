//! External command execution.
//!
//! Platforms never spawn processes directly; they go through a
//! [`CommandRunner`] so tests can script tool output.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs external programs.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and capture its output.
    ///
    /// Only spawn failures are errors here; a non-zero exit is reported
    /// through [`CommandOutput::success`] so callers can decide.
    fn run(
        &self,
        program: &str,
        args: &[&str],
    ) -> impl std::future::Future<Output = Result<CommandOutput>> + Send;

    /// Whether `program` resolves on the search path.
    fn is_available(&self, program: &str) -> bool;
}

/// Runner that spawns real processes with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!(program = program, args = ?args, "Running command");

        // Dropping the future (cancellation) kills the child.
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::CommandFailed(format!("Failed to run {}: {}", program, e)))?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted runner for parser and platform tests.

    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::{CommandOutput, CommandRunner};
    use crate::error::{Error, Result};

    /// Returns canned output keyed by the full command line.
    #[derive(Default)]
    pub struct FakeRunner {
        available: Vec<String>,
        responses: HashMap<String, CommandOutput>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_program(mut self, program: &str) -> Self {
            self.available.push(program.to_string());
            self
        }

        pub fn respond(mut self, command_line: &str, output: CommandOutput) -> Self {
            self.responses.insert(command_line.to_string(), output);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            self.calls.lock().push(line.clone());
            self.responses
                .get(&line)
                .cloned()
                .ok_or_else(|| Error::CommandFailed(format!("Failed to run {}: not found", program)))
        }

        fn is_available(&self, program: &str) -> bool {
            self.available.iter().any(|p| p == program)
        }
    }
}
