use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Rectangle},
        Block, Borders, Paragraph,
    },
    Frame,
};

use crate::monitor::MonitorConfig;
use crate::profile::DisplayProfile;

/// Approximate width:height ratio of a terminal cell.
const CHAR_ASPECT: f64 = 2.0;

/// Desktop-space bounds of the active monitors: (min_x, min_y, max_x, max_y).
pub fn desktop_bounds<'a>(monitors: impl IntoIterator<Item = &'a MonitorConfig>) -> Option<(i64, i64, i64, i64)> {
    monitors.into_iter().fold(None, |acc, m| {
        let (w, h) = m.desktop_size();
        let (x0, y0) = (m.x as i64, m.y as i64);
        let (x1, y1) = (x0 + w as i64, y0 + h as i64);
        Some(match acc {
            None => (x0, y0, x1, y1),
            Some((a, b, c, d)) => (a.min(x0), b.min(y0), c.max(x1), d.max(y1)),
        })
    })
}

/// Static diagram of the arrangement stored in a profile.
pub fn draw(f: &mut Frame, profile: Option<&DisplayProfile>, area: Rect) {
    let Some(profile) = profile else {
        f.render_widget(empty_block(" Layout ", "No profile selected"), area);
        return;
    };

    let inactive = profile.monitors.len() - profile.active_count();
    let title = if inactive > 0 {
        format!(" {} ({} off) ", profile.name, inactive)
    } else {
        format!(" {} ", profile.name)
    };

    let active: Vec<&MonitorConfig> = profile.active_monitors().collect();
    let Some((min_x, min_y, max_x, max_y)) = desktop_bounds(active.iter().copied()) else {
        f.render_widget(empty_block(&title, "No active monitors"), area);
        return;
    };

    let content_w = (max_x - min_x) as f64;
    let content_h = (max_y - min_y) as f64;
    if content_w <= 0.0 || content_h <= 0.0 {
        return;
    }

    // fit the content inside the borders, keeping its proportions
    let canvas_w = area.width.saturating_sub(2) as f64;
    let canvas_h = area.height.saturating_sub(2) as f64 * CHAR_ASPECT;
    let scale = (canvas_w / content_w).min(canvas_h / content_h);
    let pad_x = (canvas_w - content_w * scale) / 2.0;
    let pad_y = (canvas_h - content_h * scale) / 2.0;

    let x_lo = min_x as f64 - pad_x / scale;
    let x_hi = max_x as f64 + pad_x / scale;
    let y_lo = min_y as f64 - pad_y / scale;
    let y_hi = max_y as f64 + pad_y / scale;

    let canvas = Canvas::default()
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .marker(Marker::Braille)
        .x_bounds([x_lo, x_hi])
        .y_bounds([y_lo, y_hi])
        .paint(move |ctx| {
            for m in &active {
                let (w, h) = m.desktop_size();
                let (w, h) = (w as f64, h as f64);
                let color = if m.primary { Color::Yellow } else { Color::Cyan };

                // canvas y grows upward, desktop y grows downward
                let flipped_y = (y_hi + y_lo) - m.y as f64 - h;

                ctx.draw(&Rectangle {
                    x: m.x as f64,
                    y: flipped_y,
                    width: w,
                    height: h,
                    color,
                });

                let cx = m.x as f64 + w / 4.0;
                let cy = flipped_y + h / 2.0;
                ctx.print(cx, cy + h * 0.12, Line::from(Span::styled(m.display_name(), Style::default().fg(color))));

                let mut detail = format!("{} {}", m.resolution_string(), m.refresh_rate);
                if !m.rotation.label().is_empty() {
                    detail.push_str(&format!(" {}", m.rotation.label()));
                }
                ctx.print(cx, cy - h * 0.12, Line::from(Span::styled(detail, Style::default().fg(Color::DarkGray))));
            }
        });

    f.render_widget(canvas, area);
}

fn empty_block<'a>(title: &'a str, msg: &'a str) -> Paragraph<'a> {
    Paragraph::new(msg)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().fg(Color::DarkGray))
}
