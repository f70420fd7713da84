//! portctl CLI - Manage processes on network ports
//!
//! A command-line tool for finding, inspecting and killing processes bound
//! to network ports, watching port changes and scanning hosts.

mod commands;
mod tui;

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "portctl")]
#[command(author, version, about = "Manage processes on network ports")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable interactive TUI mode
    #[arg(long, global = true)]
    no_tui: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List processes on a port, or on every port
    #[command(alias = "ls")]
    List {
        /// Only show processes bound to this port
        port: Option<u16>,

        /// Filter by service type or command name
        #[arg(short, long)]
        service: Option<String>,

        /// Filter by owning user
        #[arg(short, long)]
        user: Option<String>,

        /// Sort by field (port, pid, command, service, user, cpu, memory)
        #[arg(long)]
        sort: Option<String>,

        /// Only show processes using more than this many MB
        #[arg(long)]
        mem_limit: Option<f64>,

        /// Only show processes using more than this CPU percentage
        #[arg(long)]
        cpu_limit: Option<f64>,

        /// Group processes by service type
        #[arg(short, long)]
        tree: bool,

        /// Show every field of every process
        #[arg(short, long)]
        details: bool,
    },

    /// Kill processes by port, PID or filter
    Kill {
        /// Ports whose processes should be killed
        ports: Vec<u16>,

        /// Kill this PID instead of looking up ports
        #[arg(short, long)]
        pid: Option<u32>,

        /// Kill every process in a port range (e.g. 3000-3010)
        #[arg(short, long)]
        range: Option<String>,

        /// Kill processes by service type or command name
        #[arg(short, long)]
        service: Option<String>,

        /// Kill processes owned by this user
        #[arg(short, long)]
        user: Option<String>,

        /// Kill processes running for at least this long (e.g. 1h, 30m)
        #[arg(long)]
        older: Option<String>,

        /// Force kill (SIGKILL on Unix, /F on Windows)
        #[arg(short, long)]
        force: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Find free ports
    #[command(alias = "avail")]
    Available {
        /// First port to consider
        #[arg(long, default_value_t = 3000)]
        start: u16,

        /// Last port to consider
        #[arg(long, default_value_t = 9999)]
        end: u16,

        /// Number of ports to report
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },

    /// Show system and port statistics
    Stats,

    /// Watch ports for processes starting and stopping
    Watch {
        /// Only watch this port
        port: Option<u16>,

        /// Polling interval (e.g. 2s, 500ms); defaults to watch.interval
        #[arg(short, long)]
        interval: Option<String>,

        /// Print only changes, never the full table
        #[arg(short, long)]
        changes_only: bool,

        /// Ring the terminal bell when processes come or go
        #[arg(short, long)]
        notify: bool,

        /// Stop after this many polls
        #[arg(long)]
        count: Option<u64>,
    },

    /// Scan a host for open TCP ports
    Scan {
        /// Host to scan
        host: String,

        /// Ports to scan (e.g. 80,443,8000-8100)
        ports: Option<String>,

        /// Ports to scan, same syntax as PORTS; takes precedence over it
        #[arg(short, long)]
        range: Option<String>,

        /// Scan the common service ports
        #[arg(long)]
        common: bool,

        /// Connect timeout per port; defaults to scan.timeout
        #[arg(short, long)]
        timeout: Option<String>,

        /// Maximum simultaneous connection attempts; defaults to scan.concurrent
        #[arg(short, long)]
        concurrent: Option<usize>,
    },

    /// One-shot developer shortcuts
    Quick {
        #[command(subcommand)]
        action: QuickAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Serve tools over the Model Context Protocol on stdio
    Mcp,
}

#[derive(Subcommand)]
enum QuickAction {
    /// Kill every process in the development port range
    KillDev {
        #[arg(short, long)]
        force: bool,
    },
    /// Kill every Node.js process with an open port
    KillNode {
        #[arg(short, long)]
        force: bool,
    },
    /// Kill processes running for more than an hour
    KillStale {
        #[arg(short, long)]
        force: bool,
    },
    /// Kill development and stale processes, then report what is left
    Cleanup {
        #[arg(short, long)]
        force: bool,
    },
    /// Show which common development ports are taken
    DevPorts,
    /// Print the next free development port
    NextPort {
        /// Print only `export PORT=<n>`, for use with eval
        #[arg(long)]
        export: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print one value
    Get { key: String },
    /// Set one value
    Set { key: String, value: String },
    /// Print every value
    #[command(alias = "ls")]
    List,
    /// Restore one key, or everything, to defaults
    Reset { key: Option<String> },
    /// Print the configuration file path
    Path,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

/// Exit code 2 when the failure came from insufficient privileges, else 1.
fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    let denied = error.chain().any(|cause| {
        cause
            .downcast_ref::<portctl_core::Error>()
            .is_some_and(|e| e.is_permission_denied())
    });
    if denied {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let json = cli.json;

    match cli.command {
        Some(Commands::List {
            port,
            service,
            user,
            sort,
            mem_limit,
            cpu_limit,
            tree,
            details,
        }) => {
            let args = commands::list::ListArgs {
                port,
                service,
                user,
                sort,
                mem_limit,
                cpu_limit,
                tree,
                details,
            };
            commands::list::run(args, json).await?;
        }
        Some(Commands::Kill {
            ports,
            pid,
            range,
            service,
            user,
            older,
            force,
            yes,
        }) => {
            let args = commands::kill::KillArgs {
                ports,
                pid,
                range,
                service,
                user,
                older,
                force,
                yes,
            };
            commands::kill::run(args, json).await?;
        }
        Some(Commands::Available { start, end, count }) => {
            commands::available::run(start, end, count, json).await?;
        }
        Some(Commands::Stats) => commands::stats::run(json).await?,
        Some(Commands::Watch {
            port,
            interval,
            changes_only,
            notify,
            count,
        }) => {
            commands::watch::run(port, interval, changes_only, count, notify, json).await?;
        }
        Some(Commands::Scan {
            host,
            ports,
            range,
            common,
            timeout,
            concurrent,
        }) => {
            commands::scan::run(host, range.or(ports), common, timeout, concurrent, json).await?;
        }
        Some(Commands::Quick { action }) => match action {
            QuickAction::KillDev { force } => commands::quick::kill_dev(force, json).await?,
            QuickAction::KillNode { force } => commands::quick::kill_node(force, json).await?,
            QuickAction::KillStale { force } => commands::quick::kill_stale(force, json).await?,
            QuickAction::Cleanup { force } => commands::quick::cleanup(force, json).await?,
            QuickAction::DevPorts => commands::quick::dev_ports(json).await?,
            QuickAction::NextPort { export } => commands::quick::next_port(export, json).await?,
        },
        Some(Commands::Config { action }) => match action {
            ConfigAction::Get { key } => commands::config::get(&key, json).await?,
            ConfigAction::Set { key, value } => commands::config::set(&key, &value).await?,
            ConfigAction::List => commands::config::list(json).await?,
            ConfigAction::Reset { key } => commands::config::reset(key.as_deref()).await?,
            ConfigAction::Path => commands::config::path()?,
        },
        Some(Commands::Mcp) => commands::mcp::serve().await?,
        None => {
            // Default: Launch TUI or list ports
            if cli.no_tui || json || !atty::is(atty::Stream::Stdout) {
                commands::list::run(commands::list::ListArgs::default(), json).await?;
            } else {
                tui::run().await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_kill_flags() {
        let cli = Cli::parse_from(["portctl", "kill", "3000", "8080", "--force", "-y"]);
        match cli.command {
            Some(Commands::Kill { ports, force, yes, .. }) => {
                assert_eq!(ports, vec![3000, 8080]);
                assert!(force);
                assert!(yes);
            }
            _ => panic!("expected kill"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["portctl", "stats", "--json", "-vv"]);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_watch_scan_and_quick_flags() {
        let cli = Cli::parse_from(["portctl", "watch", "3000", "-n", "--count", "3"]);
        match cli.command {
            Some(Commands::Watch { port, notify, count, .. }) => {
                assert_eq!(port, Some(3000));
                assert!(notify);
                assert_eq!(count, Some(3));
            }
            _ => panic!("expected watch"),
        }

        let cli = Cli::parse_from(["portctl", "scan", "localhost", "-r", "80,443"]);
        match cli.command {
            Some(Commands::Scan { range, ports, .. }) => {
                assert_eq!(range.as_deref(), Some("80,443"));
                assert!(ports.is_none());
            }
            _ => panic!("expected scan"),
        }

        let cli = Cli::parse_from(["portctl", "quick", "next-port", "--export"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Quick {
                action: QuickAction::NextPort { export: true }
            })
        ));
    }

    #[test]
    fn test_permission_denied_exit_code() {
        let denied = anyhow::Error::new(portctl_core::Error::PermissionDenied("pid 1".to_string()))
            .context("kill failed");
        assert_eq!(exit_code_for(&denied), ExitCode::from(2));

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&other), ExitCode::FAILURE);
    }
}
