//! Core type definitions for the application

use std::time::Instant;
use serde::{Deserialize, Serialize};

/// A track as delivered by the recommender backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artist: String,
    #[serde(rename = "album_cover_url", default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// Which playback mechanism the account is allowed to use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    Premium,
    Preview,
}

impl PlaybackMode {
    pub fn from_product_type(product_type: &str) -> Self {
        if product_type.eq_ignore_ascii_case("premium") {
            PlaybackMode::Premium
        } else {
            PlaybackMode::Preview
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackMode::Premium => "Premium",
            PlaybackMode::Preview => "Preview",
        }
    }
}

/// Snapshot of what is playing, handed to the UI on every tick and transition
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub track: Track,
    pub position_ms: u32,
    pub duration_ms: u32,
    pub is_paused: bool,
}

/// Repeat mode state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatState {
    Off,
    #[default]
    All,
    One,
}

impl RepeatState {
    pub fn cycle(self) -> Self {
        match self {
            RepeatState::Off => RepeatState::All,
            RepeatState::All => RepeatState::One,
            RepeatState::One => RepeatState::Off,
        }
    }
}

/// Which section of the UI is currently active/focused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveSection {
    Seed,
    Sidebar,
    MainContent,
}

impl ActiveSection {
    pub fn next(self) -> Self {
        match self {
            ActiveSection::Seed => ActiveSection::Sidebar,
            ActiveSection::Sidebar => ActiveSection::MainContent,
            ActiveSection::MainContent => ActiveSection::Seed,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            ActiveSection::Seed => ActiveSection::MainContent,
            ActiveSection::Sidebar => ActiveSection::Seed,
            ActiveSection::MainContent => ActiveSection::Sidebar,
        }
    }
}

/// An entry of the sidebar: the recommendation grid or one rating bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SidebarItem {
    Recommendations,
    Bucket(u8),
}

impl SidebarItem {
    pub fn all() -> Vec<SidebarItem> {
        let mut items = vec![SidebarItem::Recommendations];
        items.extend((0..=5).map(SidebarItem::Bucket));
        items
    }

    pub fn label(self) -> String {
        match self {
            SidebarItem::Recommendations => "Recommendations".to_string(),
            SidebarItem::Bucket(0) => "Skipped".to_string(),
            SidebarItem::Bucket(n) => format!("{} ({})", "★".repeat(n as usize), n),
        }
    }
}

/// UI state for the application
#[derive(Clone)]
pub struct UiState {
    pub active_section: ActiveSection,
    pub seed_input: String,
    pub sidebar_items: Vec<SidebarItem>,
    pub sidebar_selected: usize,
    pub user_name: Option<String>,
    pub error_message: Option<String>,
    pub error_timestamp: Option<Instant>,
    pub status_message: Option<String>,
    pub show_help_popup: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            active_section: ActiveSection::Seed,
            seed_input: String::new(),
            sidebar_items: SidebarItem::all(),
            sidebar_selected: 0,
            user_name: None,
            error_message: None,
            error_timestamp: None,
            status_message: None,
            show_help_popup: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_reads_backend_json() {
        let json = r#"{
            "id": "4uLU6hMCjMI75M1A2tKUQC",
            "name": "Never Gonna Give You Up",
            "artist": "Rick Astley",
            "album_cover_url": "https://i.scdn.co/image/abc",
            "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
            "preview_url": null,
            "seed_track_name": "Take On Me",
            "rating": 4.0
        }"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.artist, "Rick Astley");
        assert_eq!(track.artwork_url.as_deref(), Some("https://i.scdn.co/image/abc"));
        assert_eq!(track.preview_url, None);
    }

    #[test]
    fn product_type_selects_mode() {
        assert_eq!(PlaybackMode::from_product_type("premium"), PlaybackMode::Premium);
        assert_eq!(PlaybackMode::from_product_type("free"), PlaybackMode::Preview);
        assert_eq!(PlaybackMode::from_product_type("open"), PlaybackMode::Preview);
    }

    #[test]
    fn sidebar_lists_recommendations_then_six_buckets() {
        let items = SidebarItem::all();
        assert_eq!(items.len(), 7);
        assert_eq!(items[0], SidebarItem::Recommendations);
        assert_eq!(SidebarItem::Bucket(0).label(), "Skipped");
        assert_eq!(SidebarItem::Bucket(3).label(), "★★★ (3)");
    }
}
