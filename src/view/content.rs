//! Main content area rendering (recommendation cards, rating buckets)

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, ListItem, Padding, Paragraph},
    Frame,
};

use crate::model::{ActiveSection, ContentState, SidebarItem, Track, UiState};
use crate::playback::usable_preview_url;
use super::utils::{calculate_num_width, render_scrollable_list, truncate_string};

pub fn render_main_content(
    frame: &mut Frame,
    area: Rect,
    ui_state: &UiState,
    content_state: &ContentState,
    playing_id: Option<&str>,
) {
    let is_focused = ui_state.active_section == ActiveSection::MainContent;
    let border_style = if is_focused {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };

    let hint = match content_state.view {
        SidebarItem::Recommendations => " 0-5 rate · Enter play ",
        SidebarItem::Bucket(_) => " 0-5 move · d remove · Enter play ",
    };
    let mut block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", content_state.title()))
        .title_bottom(Line::from(hint).right_aligned())
        .padding(Padding::horizontal(1))
        .border_style(border_style);
    if let Some(status) = &ui_state.status_message {
        block = block.title_bottom(Line::from(format!(" {} ", status)).left_aligned());
    }

    if content_state.is_loading {
        let loading = Paragraph::new("Loading...")
            .style(Style::default().fg(Color::Yellow))
            .block(block);
        frame.render_widget(loading, area);
        return;
    }

    let tracks = content_state.tracks();
    if tracks.is_empty() {
        let message = match content_state.view {
            SidebarItem::Recommendations => {
                "Type a seed as \"track - artist\" and press Enter\n\nUse Tab to navigate between sections\nPress H for help"
            }
            SidebarItem::Bucket(_) => "No tracks rated here yet",
        };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let content_width = area.width.saturating_sub(4) as usize;
    let mut items = track_items(tracks, content_state.selected_index, is_focused, playing_id, content_width);

    if let SidebarItem::Recommendations = content_state.view {
        let reserve = content_state.recommendations.reserve_len();
        if reserve > 0 {
            items.push(
                ListItem::new(format!(" +{} more after rating", reserve))
                    .style(Style::default().fg(Color::DarkGray)),
            );
        }
    }

    // +1 for the header row
    render_scrollable_list(frame, area, items, content_state.selected_index + 1, block);
}

fn track_items(
    tracks: &[Track],
    selected: usize,
    is_focused: bool,
    playing_id: Option<&str>,
    content_width: usize,
) -> Vec<ListItem<'static>> {
    let num_width = calculate_num_width(tracks.len());
    let preview_width = 7;
    let fixed_width = 1 + num_width + 3 + 3 + 3 + preview_width;
    let remaining_width = content_width.saturating_sub(fixed_width);
    let title_width = (remaining_width * 55) / 100;
    let artist_width = remaining_width.saturating_sub(title_width);

    let mut items = vec![ListItem::new(format!(
        " {:<num_width$}   {:<title_width$}   {:<artist_width$}   {}",
        "#", "Title", "Artist", "Preview",
    ))
    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))];

    items.extend(tracks.iter().enumerate().map(|(i, track)| {
        let is_playing = playing_id == Some(track.id.as_str());
        let style = if i == selected && is_focused {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else if is_playing {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else if i == selected {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let playing_indicator = if is_playing { "▶" } else { " " };
        let preview = if usable_preview_url(track).is_some() { "yes" } else { "-" };

        ListItem::new(format!(
            "{}{:<num_width$}   {}   {}   {}",
            playing_indicator,
            i + 1,
            truncate_string(&track.name, title_width),
            truncate_string(&track.artist, artist_width),
            preview,
        ))
        .style(style)
    }));

    items
}
