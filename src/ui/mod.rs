pub mod confirm;
pub mod dialog;
pub mod layout_pane;
pub mod profile_list;
pub mod status_bar;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    Frame,
};

use crate::app::{App, Overlay};

pub fn draw(f: &mut Frame, app: &App) {
    let size = f.size();

    if size.width < 60 || size.height < 15 {
        let msg = ratatui::widgets::Paragraph::new("Terminal too small (min 60x15)")
            .style(Style::default().fg(Color::Red));
        f.render_widget(msg, size);
        return;
    }

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(3)])
        .split(size);

    // list | layout side by side, stacked when narrow
    let direction = if size.width >= 100 {
        Direction::Horizontal
    } else {
        Direction::Vertical
    };
    let constraints = if size.width >= 100 {
        [Constraint::Percentage(35), Constraint::Percentage(65)]
    } else {
        [Constraint::Percentage(50), Constraint::Percentage(50)]
    };
    let panes = Layout::default()
        .direction(direction)
        .constraints(constraints)
        .split(outer[0]);

    profile_list::draw(f, app, panes[0]);
    layout_pane::draw(f, app.selected_profile(), panes[1]);
    status_bar::draw(f, app, outer[1]);

    match &app.overlay {
        Overlay::Confirm { countdown_start, duration, .. } => {
            let remaining = duration.saturating_sub(countdown_start.elapsed());
            confirm::draw(f, remaining, *duration, size);
        }
        Overlay::Save { input } => dialog::draw_save(f, input, size),
        Overlay::Delete { name } => dialog::draw_delete(f, name, size),
        Overlay::None => {}
    }
}

/// Create a centered popup rect of given percentage size.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
