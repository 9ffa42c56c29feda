//! Layout rendering (seed bar, sidebar)

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Padding, Paragraph},
    Frame,
};

use crate::model::{ActiveSection, ContentState, PlaybackInfo, SidebarItem, UiState};

fn section_border(ui_state: &UiState, section: ActiveSection) -> Style {
    if ui_state.active_section == section {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    }
}

pub fn render_top_bar(frame: &mut Frame, area: Rect, ui_state: &UiState, playback: &PlaybackInfo) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(30)])
        .split(area);

    let focused = ui_state.active_section == ActiveSection::Seed;
    let (seed_text, seed_style) = if ui_state.seed_input.is_empty() && !focused {
        ("Track - Artist".to_string(), Style::default().fg(Color::DarkGray))
    } else if focused {
        (format!("{}▏", ui_state.seed_input), Style::default().fg(Color::Green))
    } else {
        (ui_state.seed_input.clone(), Style::default().fg(Color::White))
    };

    let seed = Paragraph::new(seed_text).style(seed_style).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Seed (Enter for recommendations) ")
            .padding(Padding::horizontal(1))
            .border_style(section_border(ui_state, ActiveSection::Seed)),
    );
    frame.render_widget(seed, chunks[0]);

    let user = ui_state.user_name.as_deref().unwrap_or("Guest");
    let account = Paragraph::new(format!("{} · {}", user, playback.settings.mode.label()))
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title(" Account "));
    frame.render_widget(account, chunks[1]);
}

pub fn render_sidebar(frame: &mut Frame, area: Rect, ui_state: &UiState, content_state: &ContentState) {
    let focused = ui_state.active_section == ActiveSection::Sidebar;

    let items: Vec<ListItem> = ui_state
        .sidebar_items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let is_open = *item == content_state.view;
            let style = if i == ui_state.sidebar_selected && focused {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if i == ui_state.sidebar_selected || is_open {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            let text = match item {
                SidebarItem::Recommendations => item.label(),
                SidebarItem::Bucket(n) => {
                    format!("{} [{}]", item.label(), content_state.buckets.bucket(*n).len())
                }
            };
            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Library ")
            .padding(Padding::horizontal(1))
            .border_style(section_border(ui_state, ActiveSection::Sidebar)),
    );

    let mut list_state = ListState::default();
    list_state.select(Some(ui_state.sidebar_selected));

    frame.render_stateful_widget(list, area, &mut list_state);
}
