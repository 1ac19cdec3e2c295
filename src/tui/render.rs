
use super::ConsoleView;
use crate::feed::types::truncate;
use crate::health::{SourceHealth, SourceStatus};
use crate::scheduler::SchedulerState;
use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

pub fn draw(f: &mut Frame, view: &ConsoleView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(6),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_header(f, view, chunks[0]);
    draw_sources(f, view, chunks[1]);
    draw_content(f, view, chunks[2]);
    draw_message(f, view, chunks[3]);
    draw_footer(f, chunks[4]);
}

fn draw_header(f: &mut Frame, view: &ConsoleView, area: Rect) {
    let status = &view.status;
    let state = match status.state {
        SchedulerState::Rendering => {
            Span::styled("RENDERING", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        }
        SchedulerState::Idle => Span::styled("IDLE", Style::default().fg(Color::Green)),
    };

    let mut spans = vec![
        Span::raw(format!(
            " Mode: {} | Every {} min | Last run: {} | ",
            status.mode,
            status.interval_minutes,
            status.last_run_age(Local::now()),
        )),
        state,
    ];
    if let Some(err) = &status.last_error {
        spans.push(Span::styled(" | ERR ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)));
        spans.push(Span::styled(err.as_str(), Style::default().fg(Color::Red)));
    }

    let block = Block::default().title(" Inky Refresh ").borders(Borders::ALL);
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn health_line<'a>(label: &'a str, health: &SourceHealth) -> Line<'a> {
    let color = match health.status {
        SourceStatus::Live | SourceStatus::Connected | SourceStatus::Online => Color::Green,
        SourceStatus::Cached => Color::Yellow,
        SourceStatus::Unavailable | SourceStatus::Offline => Color::Red,
        SourceStatus::Unknown => Color::DarkGray,
    };
    let updated = health
        .last_update
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    Line::from(vec![
        Span::raw(format!(" {:<8}", label)),
        Span::styled(format!("{:<12}", health.status.to_string()), Style::default().fg(color)),
        Span::styled(format!("at {}", updated), Style::default().fg(Color::DarkGray)),
    ])
}

fn draw_sources(f: &mut Frame, view: &ConsoleView, area: Rect) {
    let status = &view.status;
    let mut network = health_line("Network", &status.network);
    if status.consecutive_offline > 0 {
        network.spans.push(Span::styled(
            format!("  ({} offline in a row)", status.consecutive_offline),
            Style::default().fg(Color::Yellow),
        ));
    }
    let lines = vec![
        network,
        health_line("Feed", &status.feed),
        health_line("Notes", &status.notes),
    ];
    let block = Block::default().title(" Sources ").borders(Borders::ALL);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_content(f: &mut Frame, view: &ConsoleView, area: Rect) {
    let max_width = area.width.saturating_sub(2) as usize;
    let status = &view.status;
    let mut lines = Vec::new();

    if let Some(title) = &status.current_title {
        lines.push(Line::from(Span::styled(
            truncate(title, max_width),
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }
    if let Some(item) = &status.current_feed_item {
        lines.push(Line::from(item.text.as_str()));
    }
    if let Some(image) = &status.current_image {
        lines.push(Line::from(vec![
            Span::styled("Showing ", Style::default().fg(Color::DarkGray)),
            Span::raw(image.as_str()),
        ]));
    }
    if !view.images.is_empty() {
        lines.push(Line::from(""));
        let listing = view
            .images
            .iter()
            .map(|name| {
                if status.current_image.as_deref() == Some(name.as_str()) {
                    format!("[{}]", name)
                } else {
                    name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(Line::from(Span::styled(listing, Style::default().fg(Color::DarkGray))));
    }

    let block = Block::default().title(" On panel ").borders(Borders::ALL);
    let para = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(para, area);
}

fn draw_message(f: &mut Frame, view: &ConsoleView, area: Rect) {
    let text = view.message.as_deref().unwrap_or("");
    f.render_widget(
        Paragraph::new(Span::styled(format!("  {}", text), Style::default().fg(Color::Cyan))),
        area,
    );
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled("  [q]", Style::default().fg(Color::Yellow)),
        Span::raw("uit  "),
        Span::styled("[r]", Style::default().fg(Color::Yellow)),
        Span::raw("efresh  "),
        Span::styled("[f]", Style::default().fg(Color::Yellow)),
        Span::raw("eed  "),
        Span::styled("[s]", Style::default().fg(Color::Yellow)),
        Span::raw("lideshow  "),
        Span::styled("[+/-]", Style::default().fg(Color::Yellow)),
        Span::raw(" interval  "),
    ]);
    f.render_widget(Paragraph::new(line), area);
}
