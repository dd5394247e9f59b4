use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, Overlay};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();

    let msg_color = if app.status_msg.starts_with("Error") || app.status_msg.to_lowercase().contains("revert") {
        Color::Red
    } else if app.status_msg.contains("applied") || app.status_msg.starts_with("Saved") {
        Color::Green
    } else {
        Color::White
    };

    let mut spans = vec![Span::styled(app.status_msg.as_str(), Style::default().fg(msg_color))];
    if !app.missing.is_empty() {
        spans.push(Span::styled(
            format!("  Missing: {}", app.missing.join(", ")),
            Style::default().fg(Color::Yellow),
        ));
    }
    lines.push(Line::from(spans));

    let help = match &app.overlay {
        Overlay::Confirm { .. } => "[Y/Space] Keep  [N/Esc] Revert",
        Overlay::Save { .. } => "Type name, [Enter] Save  [Esc] Cancel",
        Overlay::Delete { .. } => "[Y] Delete  [N/Esc] Keep",
        Overlay::None => "[j/k] Nav  [Enter] Apply  [s] Save current  [d] Delete  [u] Undo  [r] Reload  [q] Quit",
    };
    lines.push(Line::from(Span::styled(help, Style::default().fg(Color::DarkGray))));

    let para = Paragraph::new(lines).alignment(Alignment::Center);
    f.render_widget(para, area);
}
