//! View module - UI rendering
//!
//! - `utils`: Formatting helpers and the scrollable list
//! - `layout`: Seed bar and sidebar
//! - `content`: Recommendation cards and bucket listings
//! - `progress`: Progress bar with playback settings
//! - `overlays`: Error notification and help popup

mod utils;
mod layout;
mod content;
mod progress;
mod overlays;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use crate::model::{ContentState, PlaybackInfo, UiState};

pub struct AppView;

impl AppView {
    pub fn render(frame: &mut Frame, playback: &PlaybackInfo, ui_state: &UiState, content_state: &ContentState) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Seed input + account
                Constraint::Min(0),    // Sidebar + content
                Constraint::Length(3), // Progress bar
            ])
            .split(frame.area());

        layout::render_top_bar(frame, chunks[0], ui_state, playback);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(25), Constraint::Percentage(75)])
            .split(chunks[1]);

        layout::render_sidebar(frame, main_chunks[0], ui_state, content_state);

        let playing_id = playback.track.as_ref().map(|t| t.id.as_str());
        content::render_main_content(frame, main_chunks[1], ui_state, content_state, playing_id);

        progress::render_progress_bar(frame, chunks[2], playback);

        if ui_state.error_message.is_some() {
            overlays::render_error_notification(frame, ui_state);
        }

        if ui_state.show_help_popup {
            overlays::render_help_popup(frame);
        }
    }
}
