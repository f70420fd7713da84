//! TUI rendering.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
};

use super::app::App;
use crate::commands::truncate;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_table(f, app, chunks[1]);
    draw_footer(f, app, chunks[2]);
}

fn style(app: &App, style: Style) -> Style {
    if app.colors {
        style
    } else {
        Style::default()
    }
}

fn service_color(label: &str) -> Color {
    match label {
        "PostgreSQL" | "MySQL" | "Redis" | "MongoDB" | "MSSQL" | "Oracle" | "RabbitMQ" => Color::Blue,
        "HTTP" | "HTTPS" | "HTTP-Alt" | "HTTPS-Alt" | "Nginx" | "Apache" => Color::Green,
        "System" | "SSH" | "DNS" | "FTP" | "SMTP" | "Telnet" | "RPC" | "NetBIOS" | "RDP" | "VNC" => Color::Magenta,
        "Unknown" => Color::DarkGray,
        _ => Color::Yellow,
    }
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let title = if app.is_searching() {
        format!("portctl | Search: {}_", app.search_query)
    } else if !app.search_query.is_empty() {
        format!(
            "portctl | {} processes matching '{}' | sort: {}",
            app.filtered_records().len(),
            app.search_query,
            app.sort
        )
    } else {
        format!("portctl | {} processes | sort: {}", app.filtered_records().len(), app.sort)
    };

    let header = Paragraph::new(title)
        .style(style(app, Style::default().fg(Color::Cyan).bold()))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(style(app, Style::default().fg(Color::DarkGray))),
        );

    f.render_widget(header, area);
}

fn draw_table(f: &mut Frame, app: &App, area: Rect) {
    let header_cells = ["PORT", "PID", "PROTO", "SERVICE", "COMMAND", "CPU%", "MEM(MB)", "USER"]
        .iter()
        .map(|h| Cell::from(*h).style(style(app, Style::default().fg(Color::Yellow).bold())));
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let filtered = app.filtered_records();
    let rows = filtered.iter().enumerate().map(|(i, r)| {
        let is_selected = i == app.selected;

        let cells = vec![
            Cell::from(r.port.to_string()),
            Cell::from(r.pid.to_string()),
            Cell::from(r.protocol.as_str()),
            Cell::from(truncate(&r.service_type, 14))
                .style(style(app, Style::default().fg(service_color(&r.service_type)))),
            Cell::from(truncate(&r.command, 20)),
            Cell::from(format!("{:.1}", r.cpu_percent)),
            Cell::from(format!("{:.1}", r.memory_mb)),
            Cell::from(truncate(r.user.as_deref().unwrap_or("-"), 12)),
        ];

        let row_style = if is_selected {
            Style::default().bg(Color::DarkGray).fg(Color::White)
        } else {
            Style::default()
        };

        Row::new(cells).style(row_style)
    });

    let widths = [
        Constraint::Length(6),
        Constraint::Length(8),
        Constraint::Length(5),
        Constraint::Length(14),
        Constraint::Length(20),
        Constraint::Length(6),
        Constraint::Length(9),
        Constraint::Min(8),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(style(app, Style::default().fg(Color::DarkGray)))
                .title(" Processes on Ports "),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD));

    let mut state = TableState::default();
    state.select(Some(app.selected));

    f.render_stateful_widget(table, area, &mut state);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    if let Some(pending) = app.pending_kill {
        let verb = if pending.force { "FORCE KILL" } else { "Kill" };
        let prompt = format!("{} PID {} on port {}? y: confirm | any other key: cancel", verb, pending.pid, pending.port);
        let footer = Paragraph::new(prompt)
            .style(style(app, Style::default().fg(Color::Red).bold()))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(footer, area);
        return;
    }

    let status = app.get_status().unwrap_or("");

    let help = if app.is_searching() {
        "Type to search | Enter: done | Esc: cancel"
    } else {
        "j/k: navigate | /: search | s: sort | x: kill | X: force kill | r: refresh | q: quit"
    };

    let footer_text = if status.is_empty() {
        help.to_string()
    } else {
        format!("{} | {}", status, help)
    };

    let footer = Paragraph::new(footer_text)
        .style(style(app, Style::default().fg(Color::DarkGray)))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(style(app, Style::default().fg(Color::DarkGray))),
        );

    f.render_widget(footer, area);
}
