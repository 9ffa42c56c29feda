//! Playback control methods

use crate::error::PlaybackError;
use super::AppController;

const SEEK_STEP_MS: i64 = 5_000;
const VOLUME_STEP: u8 = 5;

impl AppController {
    async fn report(&self, action: &str, result: Result<(), PlaybackError>) {
        match result {
            Ok(()) | Err(PlaybackError::Superseded) => {}
            Err(e) => {
                tracing::error!(action, error = %e, "Playback action failed");
                self.show_error(e.user_message()).await;
            }
        }
    }

    /// Failures of a started play reach the UI as `SessionEvent::Error`, so
    /// only errors raised before the session took the request are shown here.
    pub(crate) async fn report_play(&self, action: &str, result: Result<(), PlaybackError>) {
        match result {
            Err(e @ PlaybackError::IndexOutOfRange { .. }) => self.report(action, Err(e)).await,
            Ok(()) | Err(PlaybackError::Superseded) => {}
            Err(e) => tracing::debug!(action, error = %e, "Play failure already reported by the session"),
        }
    }

    /// Play the selected track with the rest of the listed tracks as the queue.
    pub async fn play_selected(&self) {
        let Some((tracks, index)) = self.model.lock().await.selected_queue().await else {
            return;
        };
        tracing::debug!(index, queue_len = tracks.len(), "Playing selected track");

        // Downloads and device calls must not stall the UI loop
        let controller = self.clone();
        tokio::spawn(async move {
            let result = controller.session.play(tracks, index).await;
            controller.report_play("play", result).await;
        });
    }

    pub async fn toggle_playback(&self) {
        let result = self.session.pause_toggle().await;
        self.report("toggle", result).await;
    }

    pub async fn next_track(&self) {
        let controller = self.clone();
        tokio::spawn(async move {
            let result = controller.session.next().await;
            controller.report_play("next", result).await;
        });
    }

    pub async fn previous_track(&self) {
        let controller = self.clone();
        tokio::spawn(async move {
            let result = controller.session.previous().await;
            controller.report_play("previous", result).await;
        });
    }

    pub async fn seek_forward(&self) {
        let result = self.session.seek_by(SEEK_STEP_MS).await;
        self.report("seek", result).await;
    }

    pub async fn seek_backward(&self) {
        let result = self.session.seek_by(-SEEK_STEP_MS).await;
        self.report("seek", result).await;
    }

    pub async fn toggle_shuffle(&self) {
        let shuffle = !self.session.shuffle().await;
        self.session.set_shuffle(shuffle).await;
        self.model.lock().await.set_shuffle(shuffle).await;
        tracing::info!(shuffle, "Shuffle toggled");
    }

    pub async fn cycle_repeat(&self) {
        let repeat = self.session.repeat().await.cycle();
        self.session.set_repeat(repeat).await;
        self.model.lock().await.set_repeat(repeat).await;
        tracing::info!(repeat = ?repeat, "Repeat mode changed");
    }

    async fn change_volume(&self, up: bool) {
        let current = (self.session.volume().await * 100.0).round() as u8;
        let new_volume = if up {
            current.saturating_add(VOLUME_STEP).min(100)
        } else {
            current.saturating_sub(VOLUME_STEP)
        };

        match self.session.set_volume(new_volume as f32 / 100.0).await {
            Ok(()) => self.model.lock().await.set_volume(new_volume).await,
            Err(e) => {
                tracing::error!(error = %e, "Volume change failed");
                self.show_error(e.user_message()).await;
            }
        }
    }

    pub async fn volume_up(&self) {
        self.change_volume(true).await;
    }

    pub async fn volume_down(&self) {
        self.change_volume(false).await;
    }

    pub async fn close_player(&self) {
        self.session.close().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex};

    use crate::config::{BackendConfig, RecommendationsConfig};
    use crate::error::PlaybackError;
    use crate::model::{AppModel, PlaybackMode, PlaybackSettings, RecommenderClient, Track};
    use crate::playback::{BackendKind, MockPlaybackBackend, PlaybackSession, SessionConfig, SessionEvent};
    use super::AppController;

    fn controller(preview: MockPlaybackBackend) -> (AppController, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = PlaybackSession::new(
            PlaybackMode::Preview,
            None,
            Arc::new(preview),
            SessionConfig::default(),
            tx,
        );
        let model = Arc::new(Mutex::new(AppModel::new(PlaybackSettings::default())));
        let client = RecommenderClient::new(&BackendConfig::default()).unwrap();
        (AppController::new(model, session, client, RecommendationsConfig::default()), rx)
    }

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

    #[tokio::test]
    async fn failed_play_is_shown_once() {
        let mut preview = MockPlaybackBackend::new();
        preview.expect_kind().return_const(BackendKind::Preview);
        preview.expect_is_ready().return_const(true);
        preview.expect_play().returning(|_| Err(PlaybackError::NoPreviewAvailable));
        let (controller, mut rx) = controller(preview);

        let result = controller.session.play(vec![track("a")], 0).await;
        controller.report_play("play", result).await;

        // The controller left the message to the session event
        assert!(!controller.model.lock().await.has_error().await);
        let mut errors = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::Error(_)) {
                errors += 1;
            }
        }
        assert_eq!(errors, 1);
    }

    #[tokio::test]
    async fn rejected_index_is_shown_by_the_controller() {
        let mut preview = MockPlaybackBackend::new();
        preview.expect_kind().return_const(BackendKind::Preview);
        preview.expect_play().times(0);
        let (controller, mut rx) = controller(preview);

        let result = controller.session.play(vec![track("a")], 3).await;
        controller.report_play("play", result).await;

        assert!(controller.model.lock().await.has_error().await);
        assert!(rx.try_recv().is_err());
    }
}
