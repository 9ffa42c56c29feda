//! State of the main content pane: recommendation cards or a rating bucket

use super::buckets::PlaylistBuckets;
use super::recommendations::RecommendationPool;
use super::types::{SidebarItem, Track};

#[derive(Clone, Debug)]
pub struct ContentState {
    pub view: SidebarItem,
    pub recommendations: RecommendationPool,
    pub buckets: PlaylistBuckets,
    pub selected_index: usize,
    pub is_loading: bool,
}

impl Default for ContentState {
    fn default() -> Self {
        Self {
            view: SidebarItem::Recommendations,
            recommendations: RecommendationPool::default(),
            buckets: PlaylistBuckets::default(),
            selected_index: 0,
            is_loading: false,
        }
    }
}

impl ContentState {
    /// Tracks listed in the current view
    pub fn tracks(&self) -> &[Track] {
        match self.view {
            SidebarItem::Recommendations => self.recommendations.visible(),
            SidebarItem::Bucket(n) => self.buckets.bucket(n),
        }
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.tracks().get(self.selected_index)
    }

    pub fn title(&self) -> String {
        match (self.view, self.recommendations.seed()) {
            (SidebarItem::Recommendations, Some(seed)) => {
                format!("Recommendations for {} - {}", seed.track_name, seed.artist_name)
            }
            (view, _) => view.label(),
        }
    }

    pub fn move_up(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        let len = self.tracks().len();
        if self.selected_index + 1 < len {
            self.selected_index += 1;
        }
    }

    /// Keep the selection inside the list after it shrank
    pub fn clamp_selection(&mut self) {
        let len = self.tracks().len();
        if self.selected_index >= len {
            self.selected_index = len.saturating_sub(1);
        }
    }
}
