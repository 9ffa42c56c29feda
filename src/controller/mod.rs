//! Controller module - Application logic and event handling
//!
//! - `input`: Key event handling
//! - `playback`: Playback control through the session
//! - `navigation`: Seeds, recommendations, ratings and buckets
//! - `session_events`: Forwards session events into the model

mod input;
mod playback;
mod navigation;
mod session_events;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::RecommendationsConfig;
use crate::error::ApiError;
use crate::model::{AppModel, RecommenderClient};
use crate::playback::PlaybackSession;

#[derive(Clone)]
pub struct AppController {
    pub(crate) model: Arc<Mutex<AppModel>>,
    pub(crate) session: PlaybackSession,
    pub(crate) client: RecommenderClient,
    pub(crate) recommendations: RecommendationsConfig,
}

impl AppController {
    pub fn new(
        model: Arc<Mutex<AppModel>>,
        session: PlaybackSession,
        client: RecommenderClient,
        recommendations: RecommendationsConfig,
    ) -> Self {
        Self {
            model,
            session,
            client,
            recommendations,
        }
    }

    pub(crate) fn format_error(error: &ApiError) -> String {
        match error {
            ApiError::Status { status: 401, .. } => {
                "Not logged in. Log in to Spotify through the backend and restart.".to_string()
            }
            ApiError::Status { status: 429, .. } => "Rate limited. Please wait a moment.".to_string(),
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Http(e) if e.is_connect() => {
                "Cannot reach the recommender backend. Is it running?".to_string()
            }
            ApiError::Http(e) if e.is_timeout() => "The backend took too long to answer.".to_string(),
            other => format!("Error: {}", other),
        }
    }

    pub(crate) async fn show_error(&self, message: String) {
        self.model.lock().await.set_error(message).await;
    }
}
