use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::centered_rect;

pub fn draw_save(f: &mut Frame, input: &str, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Save the current layout as:",
            Style::default().fg(Color::White),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("▸ {}_", input),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "[Enter] Save  [Esc] Cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    draw_popup(f, " Save Profile ", Color::Green, lines, area);
}

pub fn draw_delete(f: &mut Frame, name: &str, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("Delete profile '{}'?", name),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled("[Y] Delete  [N / Esc] Keep", Style::default().fg(Color::DarkGray))),
    ];
    draw_popup(f, " Delete Profile ", Color::Red, lines, area);
}

fn draw_popup(f: &mut Frame, title: &str, color: Color, lines: Vec<Line>, area: Rect) {
    let popup = centered_rect(50, 30, area);
    f.render_widget(Clear, popup);

    let para = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        )
        .alignment(Alignment::Center);

    f.render_widget(para, popup);
}
