//! Interactive terminal UI.

mod app;
mod ui;

use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use portctl_core::NativeProcessManager;
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::commands::{load_config, manager};
use app::{Action, App};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

/// Run the TUI until the user quits.
pub async fn run() -> Result<()> {
    let config = load_config().await;
    let pm = manager();
    let mut app = App::new(config.list.sort, config.output.colors);
    refresh(&pm, &mut app).await;

    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).context("Failed to create terminal")?;

    let result = event_loop(&mut terminal, &pm, &mut app, config.watch.interval).await;

    // Restore the terminal even when the loop failed
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

async fn event_loop(terminal: &mut Term, pm: &NativeProcessManager, app: &mut App, tick_rate: Duration) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout = tick_rate.checked_sub(last_tick.elapsed()).unwrap_or(Duration::ZERO);
        if event::poll(timeout).context("Event poll failed")? {
            if let Event::Key(key) = event::read().context("Event read failed")? {
                if key.kind == KeyEventKind::Press {
                    match app.handle_key(key.code) {
                        Action::Quit => return Ok(()),
                        Action::Refresh => {
                            refresh(pm, app).await;
                            last_tick = Instant::now();
                        }
                        Action::Kill { pid, force } => {
                            match pm.kill(pid, force).await {
                                Ok(()) => app.set_status(format!("Killed PID {}", pid)),
                                Err(e) => app.set_status(format!("Failed to kill PID {}: {}", pid, e)),
                            }
                            refresh(pm, app).await;
                            last_tick = Instant::now();
                        }
                        Action::None => {}
                    }
                }
            }
        }

        // Pause auto-refresh while a kill is awaiting confirmation
        if last_tick.elapsed() >= tick_rate && app.pending_kill.is_none() {
            refresh(pm, app).await;
            last_tick = Instant::now();
        }
    }
}

async fn refresh(pm: &NativeProcessManager, app: &mut App) {
    match pm.list_all().await {
        Ok(records) => app.set_records(records),
        Err(e) => app.set_status(format!("Refresh failed: {}", e)),
    }
}
