//! Listener that mirrors playback session events into the model

use tokio::sync::mpsc::UnboundedReceiver;

use crate::playback::{SessionEvent, SessionState};
use super::AppController;

impl AppController {
    pub fn start_session_listener(&self, mut events: UnboundedReceiver<SessionEvent>) {
        let model = self.model.clone();
        tracing::info!("Starting playback session event listener");

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let model_guard = model.lock().await;

                if model_guard.should_quit().await {
                    tracing::debug!("Session event listener shutting down");
                    break;
                }

                match event {
                    SessionEvent::StateChanged(state) => {
                        tracing::trace!(has_track = state.is_some(), "SessionEvent::StateChanged");
                        model_guard.apply_playback_state(state).await;
                    }
                    SessionEvent::Transition(state) => {
                        tracing::debug!(state = ?state, "SessionEvent::Transition");
                        let loading = matches!(state, SessionState::Loading | SessionState::Advancing);
                        model_guard.set_loading(loading).await;
                    }
                    SessionEvent::Error(message) => {
                        tracing::warn!(message = %message, "SessionEvent::Error");
                        model_guard.set_error(message).await;
                    }
                }
            }
        });
    }
}
