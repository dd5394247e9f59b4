use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Profiles ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if app.profiles.is_empty() {
        let msg = Paragraph::new("No saved profiles\n\n[s] Save the current layout")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(msg, area);
        return;
    }

    let items: Vec<ListItem> = app
        .profiles
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let is_selected = i == app.selected;
            let name_style = if is_selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan)
            };
            let marker = if is_selected { "▸ " } else { "  " };

            let mut lines = vec![
                Line::from(vec![Span::styled(marker, name_style), Span::styled(p.name.clone(), name_style)]),
                Line::from(vec![
                    Span::raw("    "),
                    Span::styled(p.summary(), Style::default().fg(Color::Green)),
                ]),
            ];
            if !p.description.is_empty() {
                lines.push(Line::from(vec![
                    Span::raw("    "),
                    Span::styled(
                        p.description.chars().take(40).collect::<String>(),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]));
            }

            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default();
    state.select(Some(app.selected));
    f.render_stateful_widget(list, area, &mut state);
}
