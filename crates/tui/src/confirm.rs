use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

/// Yes/No modal drawn over the dashboard.
pub struct ConfirmDialog {
    pub message: String,
    pub selected: bool, // true = Yes
}

impl ConfirmDialog {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), selected: false }
    }

    pub fn toggle(&mut self) {
        self.selected = !self.selected;
    }

    pub fn select(&mut self, yes: bool) {
        self.selected = yes;
    }

    pub fn render(&self, f: &mut Frame) {
        let width = (self.message.chars().count() as u16 + 6).max(30);
        let area = centered_rect(width, 6, f.area());
        f.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Quit ");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let [_, msg_row, _, button_row] = Layout::vertical([Constraint::Length(1); 4]).areas(inner);

        let msg = Paragraph::new(Span::styled(self.message.as_str(), Style::default().fg(Color::White)))
            .alignment(Alignment::Center);
        f.render_widget(msg, msg_row);

        let button = |label: &'static str, active: bool, bg: Color| {
            if active {
                Span::styled(label, Style::default().fg(Color::Black).bg(bg).add_modifier(Modifier::BOLD))
            } else {
                Span::styled(label, Style::default().fg(Color::DarkGray))
            }
        };
        let buttons = Line::from(vec![
            button("  [Yes]  ", self.selected, Color::Green),
            Span::raw("   "),
            button("  [No]  ", !self.selected, Color::Red),
        ]);
        f.render_widget(Paragraph::new(buttons).alignment(Alignment::Center), button_row);
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
