//! TUI application state.

use crossterm::event::KeyCode;
use portctl_core::domain::sort_records;
use portctl_core::{FilterCriteria, ProcessRecord, SortField};

/// What the event loop must do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Refresh,
    Kill { pid: u32, force: bool },
}

/// Kill awaiting a `y` from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingKill {
    pub pid: u32,
    pub port: u16,
    pub force: bool,
}

pub struct App {
    records: Vec<ProcessRecord>,
    pub selected: usize,
    pub search_query: String,
    searching: bool,
    pub sort: SortField,
    pub pending_kill: Option<PendingKill>,
    pub colors: bool,
    status: Option<String>,
}

impl App {
    pub fn new(sort: SortField, colors: bool) -> Self {
        Self {
            records: Vec::new(),
            selected: 0,
            search_query: String::new(),
            searching: false,
            sort,
            pending_kill: None,
            colors,
            status: None,
        }
    }

    /// Replace the records after a refresh, keeping the selection in range.
    pub fn set_records(&mut self, mut records: Vec<ProcessRecord>) {
        sort_records(&mut records, self.sort);
        self.records = records;
        self.clamp_selection();
    }

    /// Records matching the search query, in the current sort order.
    pub fn filtered_records(&self) -> Vec<&ProcessRecord> {
        if self.search_query.is_empty() {
            return self.records.iter().collect();
        }
        let criteria = FilterCriteria {
            service: Some(self.search_query.clone()),
            ..Default::default()
        };
        let now = chrono::Utc::now();
        self.records.iter().filter(|r| criteria.matches(r, now)).collect()
    }

    pub fn selected_record(&self) -> Option<&ProcessRecord> {
        self.filtered_records().get(self.selected).copied()
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn get_status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn clamp_selection(&mut self) {
        let len = self.filtered_records().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    fn next(&mut self) {
        let len = self.filtered_records().len();
        if len > 0 {
            self.selected = (self.selected + 1) % len;
        }
    }

    fn previous(&mut self) {
        let len = self.filtered_records().len();
        if len > 0 {
            self.selected = self.selected.checked_sub(1).unwrap_or(len - 1);
        }
    }

    fn cycle_sort(&mut self) {
        self.sort = self.sort.next();
        sort_records(&mut self.records, self.sort);
        self.set_status(format!("Sorted by {}", self.sort));
    }

    fn request_kill(&mut self, force: bool) {
        match self.selected_record() {
            Some(r) => {
                self.pending_kill = Some(PendingKill {
                    pid: r.pid,
                    port: r.port,
                    force,
                })
            }
            None => self.set_status("Nothing selected"),
        }
    }

    /// Translate a key press into state changes and an action.
    pub fn handle_key(&mut self, key: KeyCode) -> Action {
        if let Some(pending) = self.pending_kill.take() {
            return match key {
                KeyCode::Char('y') | KeyCode::Char('Y') => Action::Kill {
                    pid: pending.pid,
                    force: pending.force,
                },
                _ => {
                    self.set_status("Kill cancelled");
                    Action::None
                }
            };
        }

        if self.searching {
            match key {
                KeyCode::Enter => self.searching = false,
                KeyCode::Esc => {
                    self.searching = false;
                    self.search_query.clear();
                }
                KeyCode::Backspace => {
                    self.search_query.pop();
                }
                KeyCode::Char(c) => self.search_query.push(c),
                _ => {}
            }
            self.clamp_selection();
            return Action::None;
        }

        match key {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Down | KeyCode::Char('j') => {
                self.next();
                Action::None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.previous();
                Action::None
            }
            KeyCode::Char('/') => {
                self.searching = true;
                Action::None
            }
            KeyCode::Char('s') => {
                self.cycle_sort();
                Action::None
            }
            KeyCode::Char('x') => {
                self.request_kill(false);
                Action::None
            }
            KeyCode::Char('X') => {
                self.request_kill(true);
                Action::None
            }
            KeyCode::Char('r') => Action::Refresh,
            _ => Action::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portctl_core::Protocol;

    fn app() -> App {
        let mut app = App::new(SortField::Port, true);
        app.set_records(vec![
            ProcessRecord::basic(30, 8080, "nginx", Protocol::Tcp, "LISTEN", "*", ""),
            ProcessRecord::basic(10, 3000, "node", Protocol::Tcp, "LISTEN", "*", ""),
            ProcessRecord::basic(20, 5432, "postgres", Protocol::Tcp, "LISTEN", "*", ""),
        ]);
        app
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app();
        assert_eq!(app.selected_record().unwrap().port, 3000);
        app.handle_key(KeyCode::Char('k'));
        assert_eq!(app.selected_record().unwrap().port, 8080);
        app.handle_key(KeyCode::Char('j'));
        assert_eq!(app.selected_record().unwrap().port, 3000);
    }

    #[test]
    fn test_search_filters_and_clamps() {
        let mut app = app();
        app.selected = 2;
        assert_eq!(app.handle_key(KeyCode::Char('/')), Action::None);
        assert!(app.is_searching());
        for c in "postgres".chars() {
            app.handle_key(KeyCode::Char(c));
        }
        app.handle_key(KeyCode::Enter);

        assert!(!app.is_searching());
        assert_eq!(app.filtered_records().len(), 1);
        assert_eq!(app.selected, 0);
        assert_eq!(app.selected_record().unwrap().pid, 20);
    }

    #[test]
    fn test_kill_requires_confirmation() {
        let mut app = app();
        assert_eq!(app.handle_key(KeyCode::Char('X')), Action::None);
        assert_eq!(
            app.pending_kill,
            Some(PendingKill {
                pid: 10,
                port: 3000,
                force: true
            })
        );
        assert_eq!(app.handle_key(KeyCode::Char('y')), Action::Kill { pid: 10, force: true });
        assert!(app.pending_kill.is_none());

        app.handle_key(KeyCode::Char('x'));
        assert_eq!(app.handle_key(KeyCode::Char('n')), Action::None);
        assert_eq!(app.get_status(), Some("Kill cancelled"));
    }

    #[test]
    fn test_sort_cycles() {
        let mut app = app();
        app.handle_key(KeyCode::Char('s'));
        assert_eq!(app.sort, SortField::Port.next());
        assert_eq!(app.handle_key(KeyCode::Char('r')), Action::Refresh);
        assert_eq!(app.handle_key(KeyCode::Char('q')), Action::Quit);
    }
}
