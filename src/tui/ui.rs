use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{BarChart, Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs},
    Frame,
};

use crate::completion::completed_by_on;
use crate::models::Priority;
use super::app::{App, DisplayItem, InputMode, View};

fn priority_style(p: Priority) -> Style {
    match p {
        Priority::High => Style::default().fg(Color::Red),
        Priority::Medium => Style::default().fg(Color::Yellow),
        Priority::Low => Style::default().fg(Color::Green),
    }
}

fn header_style() -> Style {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
}

fn highlight_style() -> Style {
    Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray)
}

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Body
            Constraint::Length(3), // Help / status
        ].as_ref())
        .split(f.area());

    let selected_tab = View::ALL.iter().position(|v| *v == app.view).unwrap_or(0);
    let titles: Vec<Line> = View::ALL.iter().map(|v| Line::from(v.title())).collect();
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("chorelog - {}", app.family.name)),
        )
        .select(selected_tab)
        .highlight_style(header_style());
    f.render_widget(tabs, chunks[0]);

    match app.view {
        View::Tasks => draw_tasks(f, app, chunks[1]),
        View::Recorder => draw_recorder(f, app, chunks[1]),
        View::History => draw_history(f, app, chunks[1]),
        View::Trends => draw_trends(f, app, chunks[1]),
    }

    let help_text = match app.input_mode {
        InputMode::Normal => match app.view {
            View::Tasks => "q: Quit | 1-4: Views | g: Group by | d: Del task",
            View::Recorder => "q: Quit | 1-4: Views | ←/→: Day | f: Filter | Space: Mark done",
            View::History => "q: Quit | 1-4: Views | d: Del record",
            View::Trends => "q: Quit | 1-4: Views | w: Week/Month",
        },
        InputMode::CompletedBy => "Enter: Save | Esc: Cancel",
    };
    let footer = match &app.status {
        Some(status) => format!("{}  ·  {}", status, help_text),
        None => help_text.to_string(),
    };
    let help = Paragraph::new(footer)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[2]);

    if app.input_mode == InputMode::CompletedBy {
        let area = centered_rect(60, 3, f.area());
        f.render_widget(Clear, area);
        let title = match app.target.and_then(|id| app.task(id)) {
            Some(t) => format!("Who completed '{}'? (comma separated)", t.title),
            None => "Who completed it?".to_string(),
        };
        let input = Paragraph::new(app.input_buffer.as_str())
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(input, area);
    }
}

fn draw_tasks(f: &mut Frame, app: &mut App, area: Rect) {
    let rows: Vec<Row> = app
        .display_items()
        .iter()
        .filter_map(|item| match item {
            DisplayItem::Header(name, count) => Some(
                Row::new(vec![
                    Cell::from(format!("{} ({})", name, count)),
                    Cell::from(""),
                    Cell::from(""),
                    Cell::from(""),
                ])
                .style(header_style()),
            ),
            DisplayItem::Task(id) => app.task(*id).map(|t| {
                Row::new(vec![
                    Cell::from(format!("  {}", t.title)),
                    Cell::from(t.priority.to_string()).style(priority_style(t.priority)),
                    Cell::from(t.schedule.to_string()),
                    Cell::from(app.family.member_names(&t.assigned_to)),
                ])
            }),
        })
        .collect();

    let widths = [
        Constraint::Min(24),
        Constraint::Length(8),
        Constraint::Length(32),
        Constraint::Length(24),
    ];
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["Title", "Priority", "Schedule", "Assigned to"])
            .style(header_style())
            .bottom_margin(1))
        .block(Block::default().borders(Borders::ALL).title(format!("Tasks (by {})", app.group_by)))
        .row_highlight_style(highlight_style())
        .highlight_symbol(">> ");
    f.render_stateful_widget(table, area, &mut app.state);
}

fn draw_recorder(f: &mut Frame, app: &mut App, area: Rect) {
    let rows: Vec<Row> = app
        .recorder_tasks()
        .iter()
        .map(|t| {
            let done = app.is_done(t.id);
            let by = completed_by_on(&app.records, t.id, app.date);
            let style = if done {
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(if done { "[x]" } else { "[ ]" }),
                Cell::from(t.title.clone()),
                Cell::from(app.family.member_names(&t.assigned_to)),
                Cell::from(app.family.member_names(&by)),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Min(24),
        Constraint::Length(24),
        Constraint::Length(24),
    ];
    let title = format!("{} ({})", app.date.format("%A %B %d, %Y"), app.filter);
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["", "Task", "Assigned to", "Completed by"])
            .style(header_style())
            .bottom_margin(1))
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(highlight_style())
        .highlight_symbol(">> ");
    f.render_stateful_widget(table, area, &mut app.state);
}

fn draw_history(f: &mut Frame, app: &mut App, area: Rect) {
    let rows: Vec<Row> = app
        .history()
        .iter()
        .map(|r| {
            let title = app
                .task(r.task_id)
                .map(|t| t.title.clone())
                .unwrap_or_else(|| "Unknown task".into());
            let date = match r.day() {
                Some(d) => Cell::from(d.format("%b %d, %Y").to_string()),
                None => Cell::from(r.date.clone()).style(Style::default().fg(Color::Red)),
            };
            Row::new(vec![
                date,
                Cell::from(title),
                Cell::from(app.family.member_name(r.completed_by).to_string()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(14),
        Constraint::Min(24),
        Constraint::Length(20),
    ];
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["Date", "Task", "Completed by"])
            .style(header_style())
            .bottom_margin(1))
        .block(Block::default().borders(Borders::ALL).title("Activity History"))
        .row_highlight_style(highlight_style())
        .highlight_symbol(">> ");
    f.render_stateful_widget(table, area, &mut app.state);
}

fn draw_trends(f: &mut Frame, app: &App, area: Rect) {
    let series = app.series();
    let data: Vec<(&str, u64)> = series
        .iter()
        .map(|p| (p.date.as_str(), p.completed as u64))
        .collect();
    let bar_width = (area.width.saturating_sub(2) / series.len().max(1) as u16)
        .saturating_sub(1)
        .max(1);

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Task Completion Trends ({})", app.window)),
        )
        .data(data.as_slice())
        .bar_width(bar_width)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    f.render_widget(chart, area);
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(r.height.saturating_sub(height) / 2),
            Constraint::Length(height),
            Constraint::Length(r.height.saturating_sub(height) / 2),
        ].as_ref())
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ].as_ref())
        .split(popup_layout[1])[1]
}
