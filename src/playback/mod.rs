//! Playback backends and the session that drives them

mod preview;
mod remote;
mod session;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::PlaybackError;
use crate::model::Track;

pub use preview::{usable_preview_url, LocalPreviewBackend};
pub use remote::{spawn_event_listener, RemoteDeviceBackend};
pub use session::{PlaybackSession, SessionConfig, SessionEvent, SessionState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Remote,
    Preview,
}

/// What a backend reports when sampled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendState {
    pub position_ms: u32,
    pub duration_ms: u32,
    pub is_paused: bool,
    /// Audio ran out before the position reached the reported duration
    pub finished: bool,
}

/// Something that can play a single track and be sampled for progress.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether the backend can take a play request right now
    fn is_ready(&self) -> bool;

    async fn play(&self, track: &Track) -> Result<(), PlaybackError>;

    async fn pause(&self) -> Result<(), PlaybackError>;

    /// Flip between playing and paused; returns the new paused flag.
    async fn toggle_play(&self) -> Result<bool, PlaybackError>;

    async fn seek(&self, position_ms: u32) -> Result<(), PlaybackError>;

    async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError>;

    async fn current_state(&self) -> Option<BackendState>;

    async fn stop(&self) -> Result<(), PlaybackError>;
}

/// Handle to a periodic update task. Dropping it aborts the task.
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle: Some(handle) }
    }

    /// Release the task without aborting it. Used by the task itself when it
    /// hands over to the auto-advance path.
    pub fn detach(mut self) {
        self.handle.take();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn dropping_subscription_aborts_task() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let abort = handle.abort_handle();

        drop(Subscription::new(handle));
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(abort.is_finished());
    }

    #[tokio::test]
    async fn detached_subscription_keeps_task_running() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(());
        });

        Subscription::new(handle).detach();
        assert!(rx.await.is_ok());
    }
}
