use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style, Modifier},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use brawl_gym_core::logger::{COLOR_BLUE, COLOR_GRAY, COLOR_YELLOW};
use brawl_gym_core::types::{Dashboard, RunnerState};
use crate::App;

fn key(k: &'static str) -> Span<'static> {
    Span::styled(k, Style::default().fg(Color::Yellow))
}

fn stat(label: &'static str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" {:<14}", label), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
    ])
}

fn dashboard_lines(dash: &Dashboard, selected: usize, banner_color: Color) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            key(" s"),
            Span::raw(" start/stop, "),
            key("r"),
            Span::raw(" reset episode, "),
            key("l"),
            Span::raw(" logs, "),
            key("q"),
            Span::raw(" quit"),
        ]),
        Line::from(""),
        stat("episode", dash.episode_index.to_string()),
        stat("steps", dash.steps.to_string()),
        stat("last reward", dash.last_reward.to_string()),
        stat("best reward", dash.best_reward.to_string()),
        stat("total reward", dash.total_reward.to_string()),
        stat("last action", dash.last_action.map_or("-".into(), |a| format!("{:?}", a))),
    ];
    if let Some(info) = &dash.last_info {
        lines.push(stat(
            "step time",
            format!(
                "{:.3}s + {:.3}s paused",
                info.step_duration.as_secs_f64(),
                info.paused_duration.as_secs_f64()
            ),
        ));
    }
    if let Some(err) = &dash.error {
        lines.push(Line::from(Span::styled(format!(" err: {}", err), Style::default().fg(Color::Red))));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" Episodes", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))));
    // Most recent first
    for (i, ep) in dash.episodes.iter().rev().enumerate() {
        let prefix = if i == selected { "> " } else { "  " };
        lines.push(Line::from(vec![
            Span::raw(prefix),
            Span::styled(format!("#{:<4}", ep.index), Style::default().fg(banner_color)),
            Span::styled(
                format!(
                    " {:>4} steps  total {:>7}  best {:>5}  {:.2}s/step",
                    ep.steps,
                    ep.total_reward,
                    ep.best_reward,
                    ep.mean_step.as_secs_f64()
                ),
                Style::default().fg(Color::White),
            ),
        ]));
    }
    lines
}

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    // -- Left panel: runner banner and dashboard --
    let (banner_label, banner_bg) = match *app.runner_state.lock().unwrap() {
        RunnerState::Running => ("RUNNING (Press S to stop)", Color::Green),
        RunnerState::Stopping => ("STOPPING...", Color::Yellow),
        RunnerState::Stopped => ("STOPPED (Press S to start)", Color::Red),
    };

    let lines = {
        let dash = app.dashboard.lock().unwrap();
        dashboard_lines(&dash, app.selected, banner_bg)
    };

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(chunks[0]);

    let banner_width = left_chunks[0].width as usize;
    let pad_total = banner_width.saturating_sub(banner_label.len());
    let pad_left = pad_total / 2;
    let pad_right = pad_total - pad_left;
    let centered_banner = format!("{}{}{}", " ".repeat(pad_left), banner_label, " ".repeat(pad_right));
    let banner = Paragraph::new(Line::from(Span::styled(
        centered_banner,
        Style::default().fg(Color::Black).bg(banner_bg).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, left_chunks[0]);

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(panel, left_chunks[1]);

    // -- Right panel: logs --
    if app.log_visible && chunks.len() > 1 {
        let visible_height = chunks[1].height.saturating_sub(2) as usize;
        let total = app.log_messages.len();
        let max_scroll = total.saturating_sub(visible_height);
        let scroll = app.log_scroll.min(max_scroll);
        let start = total.saturating_sub(visible_height + scroll);
        let end = total.saturating_sub(scroll);
        let log_lines: Vec<Line> = app.log_messages[start..end]
            .iter()
            .map(|m| parse_log_line(m))
            .collect();

        let log_panel = Paragraph::new(log_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Logs ")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(log_panel, chunks[1]);
    }

    if let Some(dialog) = &app.confirm {
        dialog.render(f);
    }
}

fn prefix_color(idx: u8) -> Color {
    match idx {
        COLOR_GRAY => Color::DarkGray,
        COLOR_BLUE => Color::LightBlue,
        COLOR_YELLOW => Color::Yellow,
        _ => Color::White,
    }
}

/// Parse a structured log line (level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage)
/// into a colored Line for TUI rendering.
fn parse_log_line(raw: &str) -> Line<'_> {
    let parts: Vec<&str> = raw.splitn(5, '\x1f').collect();
    let &[level, prefix, color, timestamp, message] = parts.as_slice() else {
        return Line::from(raw);
    };
    let color = prefix_color(color.parse().unwrap_or(0));

    let mut spans = vec![
        Span::styled(timestamp, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
    ];
    match level {
        "ERROR" => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        "WARN" => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        _ => {}
    }
    if !prefix.is_empty() {
        spans.push(Span::styled(prefix, Style::default().fg(color).add_modifier(Modifier::BOLD)));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(message, Style::default().fg(color)));
    Line::from(spans)
}
