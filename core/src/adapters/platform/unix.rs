//! Unix platform: lsof with a netstat fallback, signals via nix.

use tracing::{debug, warn};

use crate::adapters::command::{CommandRunner, SystemRunner};
use crate::adapters::parser;
use crate::domain::{is_valid_pid, ProcessRecord};
use crate::error::{Error, Result};
use crate::ports::Platform;

/// Unix-like platform (Linux, macOS, BSDs).
pub struct UnixPlatform<R = SystemRunner> {
    runner: R,
}

impl UnixPlatform<SystemRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemRunner::new())
    }
}

impl Default for UnixPlatform<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> UnixPlatform<R> {
    /// Create a platform that runs tools through `runner`.
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    async fn run_lsof(&self, port: u16) -> Result<String> {
        let filter = format!(":{}", port);
        let mut args = vec!["-i"];
        if port != 0 {
            args.push(filter.as_str());
        }
        args.extend(["-P", "-n"]);

        let output = self.runner.run("lsof", &args).await?;
        if output.success {
            return Ok(output.stdout);
        }

        // lsof exits 1 silently when a selection matched nothing
        if output.code == Some(1) && output.stdout.trim().is_empty() && output.stderr.trim().is_empty() {
            debug!(port = port, "lsof found no matching sockets");
            return Ok(output.stdout);
        }

        Err(Error::CommandFailed(format!(
            "lsof exited with {:?}: {}",
            output.code,
            output.stderr.trim()
        )))
    }

    async fn run_netstat(&self) -> Result<String> {
        let output = self.runner.run("netstat", &["-tulpn"]).await?;
        if !output.success {
            return Err(Error::CommandFailed(format!(
                "netstat exited with {:?}: {}",
                output.code,
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

impl<R: CommandRunner> Platform for UnixPlatform<R> {
    fn name(&self) -> &'static str {
        "unix"
    }

    async fn discover(&self, port: u16) -> Result<Vec<ProcessRecord>> {
        let output = if self.runner.is_available("lsof") {
            self.run_lsof(port).await?
        } else {
            warn!("lsof not found on PATH, falling back to netstat");
            self.run_netstat().await?
        };

        Ok(parser::parse_unix(&output, port))
    }

    async fn kill(&self, pid: u32, force: bool) -> Result<()> {
        send_signal(pid, force)
    }
}

/// Deliver SIGTERM (or SIGKILL when `force`) to `pid`.
#[cfg(unix)]
fn send_signal(pid: u32, force: bool) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if !is_valid_pid(pid) {
        return Err(Error::InvalidPid(pid));
    }
    let raw = i32::try_from(pid).map_err(|_| Error::InvalidPid(pid))?;
    let target = Pid::from_raw(raw);

    let map_errno = |errno: Errno| match errno {
        Errno::ESRCH => Error::ProcessNotFound(pid),
        Errno::EPERM => Error::PermissionDenied(format!("not allowed to signal process {}", pid)),
        other => Error::KillFailed {
            pid,
            reason: other.desc().to_string(),
        },
    };

    // Signal 0 only checks that the process exists and is ours to signal
    kill(target, None).map_err(map_errno)?;

    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
    debug!(pid = pid, signal = ?signal, "Sending signal to process");
    kill(target, signal).map_err(|e| {
        warn!(pid = pid, signal = ?signal, error = %e, "Failed to signal process");
        map_errno(e)
    })
}

#[cfg(not(unix))]
fn send_signal(pid: u32, _force: bool) -> Result<()> {
    if !is_valid_pid(pid) {
        return Err(Error::InvalidPid(pid));
    }
    Err(Error::UnsupportedPlatform(
        "Unix signals are not available on this OS".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::command::fake::FakeRunner;
    use crate::adapters::command::CommandOutput;

    const LSOF: &str = "COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME\n\
                        node 4242 me 19u IPv4 0x1 0t0 TCP *:3000 (LISTEN)\n";

    const NETSTAT: &str = "Proto Recv-Q Send-Q Local Address Foreign Address State PID/Program name\n\
                           tcp 0 0 0.0.0.0:3000 0.0.0.0:* LISTEN 4242/node\n\
                           tcp 0 0 0.0.0.0:8080 0.0.0.0:* LISTEN 77/nginx\n";

    #[tokio::test]
    async fn test_prefers_lsof() {
        let runner = FakeRunner::new()
            .with_program("lsof")
            .respond("lsof -i :3000 -P -n", CommandOutput::ok(LSOF));
        let platform = UnixPlatform::with_runner(runner);

        let records = platform.discover(3000).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pid, 4242);
        assert_eq!(platform.runner.calls(), vec!["lsof -i :3000 -P -n"]);
    }

    #[tokio::test]
    async fn test_all_ports_omits_filter() {
        let runner = FakeRunner::new()
            .with_program("lsof")
            .respond("lsof -i -P -n", CommandOutput::ok(LSOF));
        let platform = UnixPlatform::with_runner(runner);

        assert_eq!(platform.discover(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_netstat_and_filters() {
        let runner = FakeRunner::new().respond("netstat -tulpn", CommandOutput::ok(NETSTAT));
        let platform = UnixPlatform::with_runner(runner);

        let records = platform.discover(8080).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.iter().all(|r| r.port == 8080));
        assert_eq!(platform.runner.calls(), vec!["netstat -tulpn"]);
    }

    #[tokio::test]
    async fn test_lsof_no_match_is_empty() {
        let runner = FakeRunner::new()
            .with_program("lsof")
            .respond("lsof -i :4000 -P -n", CommandOutput::failed(1, ""));
        let platform = UnixPlatform::with_runner(runner);

        assert!(platform.discover(4000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lsof_exit_one_with_stderr_is_error() {
        let runner = FakeRunner::new()
            .with_program("lsof")
            .respond("lsof -i -P -n", CommandOutput::failed(1, "lsof: unacceptable option"));
        let platform = UnixPlatform::with_runner(runner);

        match platform.discover(0).await {
            Err(Error::CommandFailed(msg)) => assert!(msg.contains("unacceptable option")),
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tool_failure_is_error() {
        let runner = FakeRunner::new()
            .respond("netstat -tulpn", CommandOutput::failed(2, "netstat: permission denied"));
        let platform = UnixPlatform::with_runner(runner);
        assert!(matches!(platform.discover(0).await, Err(Error::CommandFailed(_))));

        // Missing binary entirely
        let platform = UnixPlatform::with_runner(FakeRunner::new());
        assert!(matches!(platform.discover(0).await, Err(Error::CommandFailed(_))));
    }

    #[tokio::test]
    async fn test_kill_rejects_invalid_pid() {
        let platform = UnixPlatform::with_runner(FakeRunner::new());
        assert!(matches!(platform.kill(0, false).await, Err(Error::InvalidPid(0))));
        let too_big = i32::MAX as u32 + 1;
        assert!(matches!(platform.kill(too_big, true).await, Err(Error::InvalidPid(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_missing_process() {
        let platform = UnixPlatform::with_runner(FakeRunner::new());
        // PID far above any default pid_max
        let result = platform.kill(i32::MAX as u32 - 1, false).await;
        assert!(matches!(result, Err(Error::ProcessNotFound(_))));
    }
}
