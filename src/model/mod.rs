//! Model module - Application state and data types
//!
//! - `types`: Core type definitions (tracks, modes, UI state)
//! - `queue`: The playback queue and its traversal rules
//! - `playback`: Playback timing and what the player bar shows
//! - `recommendations`: Visible recommendation cards and their reserve
//! - `buckets`: Rating buckets stored by the backend
//! - `content`: Main content pane state
//! - `recommender_client`: HTTP client for the recommender backend
//! - `app_model`: Main application model with state management methods

mod types;
mod queue;
mod playback;
mod recommendations;
mod buckets;
mod content;
mod recommender_client;
mod app_model;

pub use types::{
    ActiveSection, PlaybackMode, PlaybackState, RepeatState, SidebarItem, Track, UiState,
};

pub use queue::{Direction, TrackQueue};

pub use playback::{PlaybackInfo, PlaybackSettings, PlaybackTiming};

pub use recommendations::{RecommendationPool, Seed};

pub use buckets::PlaylistBuckets;

pub use content::ContentState;

pub use recommender_client::{FeedbackRequest, RecommenderClient, SdkToken, TokenProvider, UserProfile};

#[cfg(test)]
pub use recommender_client::MockTokenProvider;

pub use app_model::AppModel;
