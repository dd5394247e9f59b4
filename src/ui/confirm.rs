use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use std::time::Duration;

use super::centered_rect;

const BAR_WIDTH: usize = 20;

/// Filled cells of the countdown bar for `remaining` out of `total`.
fn filled_cells(remaining: Duration, total: Duration) -> usize {
    if total.is_zero() {
        return 0;
    }
    let fraction = remaining.as_secs_f64() / total.as_secs_f64();
    ((fraction * BAR_WIDTH as f64).ceil() as usize).min(BAR_WIDTH)
}

pub fn draw(f: &mut Frame, remaining: Duration, total: Duration, area: Rect) {
    let popup = centered_rect(40, 25, area);
    f.render_widget(Clear, popup);

    let secs = remaining.as_secs_f64().ceil() as u64;
    let filled = filled_cells(remaining, total);
    let bar = format!("[{}{}]", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));
    let color = if secs <= 3 { Color::Red } else { Color::Yellow };

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Keep this display configuration?",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(format!("Reverting in {}s", secs), Style::default().fg(color))),
        Line::from(Span::styled(bar, Style::default().fg(color))),
        Line::from(""),
        Line::from(Span::styled(
            "[Y / Space] Keep   [N / Esc] Revert",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let para = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Confirm ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        )
        .alignment(Alignment::Center);

    f.render_widget(para, popup);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_scales_with_configured_timeout() {
        let total = Duration::from_secs(30);
        assert_eq!(filled_cells(total, total), BAR_WIDTH);
        assert_eq!(filled_cells(Duration::from_secs(15), total), BAR_WIDTH / 2);
        assert_eq!(filled_cells(Duration::ZERO, total), 0);
        assert_eq!(filled_cells(Duration::from_secs(5), Duration::ZERO), 0);
    }
}
