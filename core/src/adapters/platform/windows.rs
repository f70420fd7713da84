//! Windows platform: `netstat -ano` plus `tasklist`, termination via `taskkill`.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::adapters::command::{CommandRunner, SystemRunner};
use crate::adapters::parser::{parse_tasklist, parse_windows_netstat, UNKNOWN_PROCESS};
use crate::domain::{is_valid_pid, ProcessRecord};
use crate::error::{Error, Result};
use crate::ports::Platform;

/// Windows platform.
///
/// Only the runner touches the OS, so this type builds and is tested on
/// every host.
pub struct WindowsPlatform<R = SystemRunner> {
    runner: R,
}

impl WindowsPlatform<SystemRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemRunner::new())
    }
}

impl Default for WindowsPlatform<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> WindowsPlatform<R> {
    /// Create a platform that runs tools through `runner`.
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    /// Resolve a PID to its image name, `unknown` on any failure.
    async fn process_name(&self, pid: u32) -> String {
        let filter = format!("PID eq {}", pid);
        match self
            .runner
            .run("tasklist", &["/FI", filter.as_str(), "/FO", "CSV", "/NH"])
            .await
        {
            Ok(output) if output.success => {
                parse_tasklist(&output.stdout).unwrap_or_else(|| UNKNOWN_PROCESS.to_string())
            }
            Ok(_) | Err(_) => {
                debug!(pid = pid, "tasklist lookup failed");
                UNKNOWN_PROCESS.to_string()
            }
        }
    }
}

impl<R: CommandRunner> Platform for WindowsPlatform<R> {
    fn name(&self) -> &'static str {
        "windows"
    }

    async fn discover(&self, port: u16) -> Result<Vec<ProcessRecord>> {
        let output = self.runner.run("netstat", &["-ano"]).await?;
        if !output.success {
            return Err(Error::CommandFailed(format!(
                "netstat exited with {:?}: {}",
                output.code,
                output.stderr.trim()
            )));
        }

        let mut records = parse_windows_netstat(&output.stdout, port);

        // One tasklist call per distinct PID
        let mut names: HashMap<u32, String> = HashMap::new();
        for record in records.iter_mut() {
            let name = match names.get(&record.pid) {
                Some(name) => name.clone(),
                None => {
                    let name = self.process_name(record.pid).await;
                    names.insert(record.pid, name.clone());
                    name
                }
            };
            record.command = name;
            record.reclassify();
        }

        Ok(records)
    }

    async fn kill(&self, pid: u32, force: bool) -> Result<()> {
        if !is_valid_pid(pid) {
            return Err(Error::InvalidPid(pid));
        }

        let pid_arg = pid.to_string();
        let mut args = Vec::with_capacity(3);
        if force {
            args.push("/F");
        }
        args.extend(["/PID", pid_arg.as_str()]);

        debug!(pid = pid, force = force, "Running taskkill");
        let output = self.runner.run("taskkill", &args).await?;
        if output.success {
            return Ok(());
        }

        let message = format!("{} {}", output.stderr.trim(), output.stdout.trim());
        let lower = message.to_lowercase();
        warn!(pid = pid, output = %message.trim(), "taskkill failed");

        if lower.contains("access is denied") {
            Err(Error::PermissionDenied(format!(
                "not allowed to terminate process {}",
                pid
            )))
        } else if lower.contains("not found") {
            Err(Error::ProcessNotFound(pid))
        } else {
            Err(Error::KillFailed {
                pid,
                reason: message.trim().to_string(),
            })
        }
    }
}
