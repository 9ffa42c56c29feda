//! Main application model with state management

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use super::buckets::PlaylistBuckets;
use super::content::ContentState;
use super::playback::{PlaybackInfo, PlaybackSettings};
use super::recommendations::Seed;
use super::types::{ActiveSection, PlaybackState, RepeatState, SidebarItem, Track, UiState};

const ERROR_DISPLAY_SECS: u64 = 5;

/// Main application model containing all state
pub struct AppModel {
    playback: Arc<Mutex<PlaybackInfo>>,
    pub ui_state: Arc<Mutex<UiState>>,
    pub content_state: Arc<Mutex<ContentState>>,
    pub should_quit: Arc<Mutex<bool>>,
}

impl AppModel {
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            playback: Arc::new(Mutex::new(PlaybackInfo {
                settings,
                ..Default::default()
            })),
            ui_state: Arc::new(Mutex::new(UiState::default())),
            content_state: Arc::new(Mutex::new(ContentState::default())),
            should_quit: Arc::new(Mutex::new(false)),
        }
    }

    // ========================================================================
    // Playback
    // ========================================================================

    pub async fn apply_playback_state(&self, state: Option<PlaybackState>) {
        let mut playback = self.playback.lock().await;
        if state.is_some() {
            playback.loading = false;
        }
        playback.apply_state(state);
    }

    pub async fn set_loading(&self, loading: bool) {
        self.playback.lock().await.loading = loading;
    }

    pub async fn get_playback_info(&self) -> PlaybackInfo {
        self.playback.lock().await.clone()
    }

    pub async fn set_shuffle(&self, shuffle: bool) {
        self.playback.lock().await.settings.shuffle = shuffle;
    }

    pub async fn set_repeat(&self, repeat: RepeatState) {
        self.playback.lock().await.settings.repeat = repeat;
    }

    pub async fn set_volume(&self, volume: u8) {
        self.playback.lock().await.settings.volume = volume;
    }

    pub async fn should_quit(&self) -> bool {
        *self.should_quit.lock().await
    }

    pub async fn set_should_quit(&self, quit: bool) {
        *self.should_quit.lock().await = quit;
    }

    // ========================================================================
    // UI State
    // ========================================================================

    pub async fn get_ui_state(&self) -> UiState {
        self.ui_state.lock().await.clone()
    }

    pub async fn set_user_name(&self, name: String) {
        self.ui_state.lock().await.user_name = Some(name);
    }

    pub async fn cycle_section_forward(&self) {
        let mut state = self.ui_state.lock().await;
        state.active_section = state.active_section.next();
    }

    pub async fn cycle_section_backward(&self) {
        let mut state = self.ui_state.lock().await;
        state.active_section = state.active_section.prev();
    }

    pub async fn set_active_section(&self, section: ActiveSection) {
        self.ui_state.lock().await.active_section = section;
    }

    pub async fn move_selection_up(&self) {
        let mut state = self.ui_state.lock().await;
        let section = state.active_section;
        match section {
            ActiveSection::Sidebar => {
                state.sidebar_selected = state.sidebar_selected.saturating_sub(1);
            }
            ActiveSection::MainContent => {
                drop(state);
                self.content_state.lock().await.move_up();
            }
            ActiveSection::Seed => {}
        }
    }

    pub async fn move_selection_down(&self) {
        let mut state = self.ui_state.lock().await;
        let section = state.active_section;
        match section {
            ActiveSection::Sidebar => {
                if state.sidebar_selected + 1 < state.sidebar_items.len() {
                    state.sidebar_selected += 1;
                }
            }
            ActiveSection::MainContent => {
                drop(state);
                self.content_state.lock().await.move_down();
            }
            ActiveSection::Seed => {}
        }
    }

    pub async fn selected_sidebar_item(&self) -> Option<SidebarItem> {
        let state = self.ui_state.lock().await;
        state.sidebar_items.get(state.sidebar_selected).copied()
    }

    pub async fn append_to_seed(&self, c: char) {
        self.ui_state.lock().await.seed_input.push(c);
    }

    pub async fn backspace_seed(&self) {
        self.ui_state.lock().await.seed_input.pop();
    }

    pub async fn seed_input(&self) -> String {
        self.ui_state.lock().await.seed_input.clone()
    }

    pub async fn set_error(&self, message: String) {
        let mut state = self.ui_state.lock().await;
        state.error_message = Some(message);
        state.error_timestamp = Some(Instant::now());
    }

    pub async fn clear_error(&self) {
        let mut state = self.ui_state.lock().await;
        state.error_message = None;
        state.error_timestamp = None;
    }

    pub async fn has_error(&self) -> bool {
        self.ui_state.lock().await.error_message.is_some()
    }

    pub async fn auto_clear_old_errors(&self) {
        let mut state = self.ui_state.lock().await;
        if let Some(timestamp) = state.error_timestamp {
            if timestamp.elapsed().as_secs() >= ERROR_DISPLAY_SECS {
                state.error_message = None;
                state.error_timestamp = None;
            }
        }
    }

    pub async fn set_status(&self, message: impl Into<String>) {
        self.ui_state.lock().await.status_message = Some(message.into());
    }

    pub async fn show_help_popup(&self) {
        self.ui_state.lock().await.show_help_popup = true;
    }

    pub async fn hide_help_popup(&self) {
        self.ui_state.lock().await.show_help_popup = false;
    }

    pub async fn is_help_popup_open(&self) -> bool {
        self.ui_state.lock().await.show_help_popup
    }

    // ========================================================================
    // Content
    // ========================================================================

    pub async fn get_content_state(&self) -> ContentState {
        self.content_state.lock().await.clone()
    }

    pub async fn set_content_loading(&self, loading: bool) {
        self.content_state.lock().await.is_loading = loading;
    }

    pub async fn show_view(&self, view: SidebarItem) {
        let mut state = self.content_state.lock().await;
        if state.view != view {
            state.view = view;
            state.selected_index = 0;
        }
    }

    pub async fn set_recommendations(&self, seed: Seed, tracks: Vec<Track>, visible: usize) {
        let mut state = self.content_state.lock().await;
        state.recommendations.load(seed, tracks, visible);
        state.view = SidebarItem::Recommendations;
        state.selected_index = 0;
        state.is_loading = false;
    }

    pub async fn set_buckets(&self, buckets: PlaylistBuckets) {
        let mut state = self.content_state.lock().await;
        state.buckets = buckets;
        state.clamp_selection();
    }

    /// Swap the rated recommendation card for a fresh one.
    pub async fn replace_rated(&self, track_id: &str) -> Option<Track> {
        let mut state = self.content_state.lock().await;
        let rated = state.recommendations.replace_rated(track_id);
        state.clamp_selection();
        rated
    }

    pub async fn remove_from_bucket(&self, bucket: u8, track_id: &str) -> bool {
        let mut state = self.content_state.lock().await;
        let removed = state.buckets.remove(bucket, track_id);
        state.clamp_selection();
        removed
    }

    /// The listed tracks and the selected position, ready to become a queue
    pub async fn selected_queue(&self) -> Option<(Vec<Track>, usize)> {
        let state = self.content_state.lock().await;
        let tracks = state.tracks();
        (state.selected_index < tracks.len()).then(|| (tracks.to_vec(), state.selected_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track {
            id: id.into(),
            name: id.into(),
            artist: "Band".into(),
            artwork_url: None,
            uri: None,
            preview_url: None,
        }
    }

    fn seed() -> Seed {
        Seed::parse("Take On Me - a-ha").unwrap()
    }

    #[tokio::test]
    async fn selection_follows_active_section() {
        let model = AppModel::new(PlaybackSettings::default());
        model.set_recommendations(seed(), vec![track("a"), track("b")], 12).await;

        model.set_active_section(ActiveSection::MainContent).await;
        model.move_selection_down().await;
        model.move_selection_down().await;
        assert_eq!(model.get_content_state().await.selected_index, 1);

        model.set_active_section(ActiveSection::Sidebar).await;
        model.move_selection_down().await;
        assert_eq!(model.selected_sidebar_item().await, Some(SidebarItem::Bucket(0)));
        model.move_selection_up().await;
        model.move_selection_up().await;
        assert_eq!(model.selected_sidebar_item().await, Some(SidebarItem::Recommendations));
    }

    #[tokio::test]
    async fn rating_last_card_keeps_selection_in_bounds() {
        let model = AppModel::new(PlaybackSettings::default());
        model.set_recommendations(seed(), vec![track("a"), track("b")], 12).await;
        model.set_active_section(ActiveSection::MainContent).await;
        model.move_selection_down().await;

        assert_eq!(model.replace_rated("b").await.unwrap().id, "b");
        let content = model.get_content_state().await;
        assert_eq!(content.selected_index, 0);
        assert_eq!(model.selected_queue().await.unwrap().0.len(), 1);
    }

    #[tokio::test]
    async fn cleared_playback_state_stops_loading() {
        let model = AppModel::new(PlaybackSettings::default());
        model.set_loading(true).await;
        model.apply_playback_state(None).await;
        let info = model.get_playback_info().await;
        assert!(!info.loading);
        assert!(info.track.is_none());
    }

    #[tokio::test]
    async fn errors_can_be_cleared() {
        let model = AppModel::new(PlaybackSettings::default());
        model.set_error("boom".into()).await;
        assert!(model.has_error().await);
        model.auto_clear_old_errors().await;
        assert!(model.has_error().await);
        model.clear_error().await;
        assert!(!model.has_error().await);
    }
}
