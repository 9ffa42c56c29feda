//! Playback session: queue traversal, backend selection and auto-advance

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::PlaybackError;
use crate::model::{Direction, PlaybackMode, PlaybackState, RepeatState, Track, TrackQueue};
use super::{BackendKind, BackendState, PlaybackBackend, Subscription};

#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// How often the active backend is sampled while playing
    pub update_interval: Duration,
    /// Remaining time at which a track counts as finished
    pub end_threshold_ms: u32,
    pub repeat: RepeatState,
    pub volume: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_millis(250),
            end_threshold_ms: 1000,
            repeat: RepeatState::All,
            volume: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Playing,
    Paused,
    Advancing,
}

/// Notifications for the UI. `StateChanged(None)` hides the player.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    StateChanged(Option<PlaybackState>),
    Transition(SessionState),
    Error(String),
}

struct SessionInner {
    queue: TrackQueue,
    state: SessionState,
    /// Bumped by every request that replaces the current track
    generation: u64,
    active: Option<Arc<dyn PlaybackBackend>>,
    subscription: Option<Subscription>,
    shuffle: bool,
    repeat: RepeatState,
    volume: f32,
    mode: PlaybackMode,
    last_snapshot: Option<PlaybackState>,
}

/// Cloneable handle to the playback state machine.
///
/// The lock on the inner state is never held across a backend call. Every
/// request that changes the current track takes a new generation, and any
/// completion carrying an older generation is discarded.
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<Mutex<SessionInner>>,
    remote: Option<Arc<dyn PlaybackBackend>>,
    preview: Arc<dyn PlaybackBackend>,
    config: SessionConfig,
    events: UnboundedSender<SessionEvent>,
}

impl PlaybackSession {
    pub fn new(
        mode: PlaybackMode,
        remote: Option<Arc<dyn PlaybackBackend>>,
        preview: Arc<dyn PlaybackBackend>,
        config: SessionConfig,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        let inner = SessionInner {
            queue: TrackQueue::new(),
            state: SessionState::Idle,
            generation: 0,
            active: None,
            subscription: None,
            shuffle: false,
            repeat: config.repeat,
            volume: config.volume.clamp(0.0, 1.0),
            mode,
            last_snapshot: None,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
            remote,
            preview,
            config,
            events,
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Session event receiver dropped");
        }
    }

    fn transition(&self, inner: &mut SessionInner, state: SessionState) {
        if inner.state != state {
            tracing::debug!(from = ?inner.state, to = ?state, "Session transition");
            inner.state = state;
            self.emit(SessionEvent::Transition(state));
        }
    }

    /// Claim the session for a new track: cancels older plays and the ticker.
    fn begin_play(&self, inner: &mut SessionInner) -> u64 {
        inner.generation += 1;
        inner.subscription = None;
        self.transition(inner, SessionState::Loading);
        inner.generation
    }

    fn other_backend(&self, kind: BackendKind) -> Option<Arc<dyn PlaybackBackend>> {
        match kind {
            BackendKind::Remote => Some(self.preview.clone()),
            BackendKind::Preview => self.remote.clone(),
        }
    }

    async fn is_stale(&self, generation: u64) -> bool {
        self.inner.lock().await.generation != generation
    }

    /// Replace the queue and start playing `tracks[index]`.
    pub async fn play(&self, tracks: Vec<Track>, index: usize) -> Result<(), PlaybackError> {
        if index >= tracks.len() {
            return Err(PlaybackError::IndexOutOfRange { index, len: tracks.len() });
        }

        let generation = {
            let mut inner = self.inner.lock().await;
            inner.queue.replace(tracks);
            inner.queue.set_current(index)?;
            self.begin_play(&mut inner)
        };

        self.start(generation).await
    }

    pub async fn next(&self) -> Result<(), PlaybackError> {
        self.step(Direction::Next).await
    }

    pub async fn previous(&self) -> Result<(), PlaybackError> {
        self.step(Direction::Previous).await
    }

    async fn step(&self, direction: Direction) -> Result<(), PlaybackError> {
        let generation = {
            let mut inner = self.inner.lock().await;
            let shuffle = inner.shuffle;
            if inner.queue.advance(direction, shuffle).is_none() {
                return Ok(());
            }
            self.begin_play(&mut inner)
        };

        self.start(generation).await
    }

    /// Play the queue's current track: remote first when allowed, then a
    /// single preview attempt.
    async fn start(&self, generation: u64) -> Result<(), PlaybackError> {
        let (track, mode) = {
            let inner = self.inner.lock().await;
            if inner.generation != generation {
                return Err(PlaybackError::Superseded);
            }
            match inner.queue.current() {
                Some(track) => (track.clone(), inner.mode),
                None => return Ok(()),
            }
        };

        let mut chosen = None;
        if mode == PlaybackMode::Premium {
            match self.remote.as_ref().filter(|remote| remote.is_ready()) {
                Some(remote) => match remote.play(&track).await {
                    Ok(()) => chosen = Some(remote.clone()),
                    Err(PlaybackError::Superseded) => return Err(PlaybackError::Superseded),
                    Err(e) => {
                        if self.is_stale(generation).await {
                            return Err(PlaybackError::Superseded);
                        }
                        tracing::warn!(error = %e, track_id = %track.id, "Remote playback failed, falling back to preview");
                    }
                },
                None => tracing::debug!("Remote device not ready, using preview"),
            }
        }

        let backend = match chosen {
            Some(backend) => backend,
            None => match self.preview.play(&track).await {
                Ok(()) => self.preview.clone(),
                Err(PlaybackError::Superseded) => return Err(PlaybackError::Superseded),
                Err(e) => return Err(self.fail(generation, &track, e).await),
            },
        };

        self.commit(generation, track, backend).await
    }

    async fn fail(&self, generation: u64, track: &Track, error: PlaybackError) -> PlaybackError {
        let previous = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return PlaybackError::Superseded;
            }
            inner.subscription = None;
            inner.last_snapshot = None;
            self.transition(&mut inner, SessionState::Idle);
            inner.active.take()
        };

        tracing::warn!(error = %error, track_id = %track.id, "Playback failed");
        self.emit(SessionEvent::Error(error.user_message()));
        self.emit(SessionEvent::StateChanged(None));

        if let Some(previous) = previous {
            if let Err(e) = previous.stop().await {
                tracing::debug!(error = %e, "Failed to stop previous backend");
            }
        }
        error
    }

    async fn commit(
        &self,
        generation: u64,
        track: Track,
        backend: Arc<dyn PlaybackBackend>,
    ) -> Result<(), PlaybackError> {
        let stale = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                // Nothing is meant to be audible once the session went idle
                let idle = inner.state == SessionState::Idle;
                let settled = !matches!(inner.state, SessionState::Loading | SessionState::Advancing);
                let ours_active = inner.active.as_ref().is_some_and(|a| a.kind() == backend.kind());
                Some(idle || (settled && !ours_active))
            } else {
                inner.active = Some(backend.clone());
                self.transition(&mut inner, SessionState::Playing);
                tracing::info!(track_id = %track.id, backend = ?backend.kind(), "Playing track");

                let snapshot = PlaybackState {
                    track,
                    position_ms: 0,
                    duration_ms: 0,
                    is_paused: false,
                };
                inner.last_snapshot = Some(snapshot.clone());
                self.emit(SessionEvent::StateChanged(Some(snapshot)));
                inner.subscription = Some(self.spawn_ticker(generation));
                None
            }
        };

        if let Some(stop_ours) = stale {
            if stop_ours {
                if let Err(e) = backend.stop().await {
                    tracing::debug!(error = %e, "Failed to stop superseded backend");
                }
            }
            return Err(PlaybackError::Superseded);
        }

        // Never leave two sources playing at once
        if let Some(other) = self.other_backend(backend.kind()) {
            if other.current_state().await.is_some() && !self.is_stale(generation).await {
                if let Err(e) = other.stop().await {
                    tracing::debug!(error = %e, kind = ?other.kind(), "Failed to stop inactive backend");
                }
            }
        }
        Ok(())
    }

    fn spawn_ticker(&self, generation: u64) -> Subscription {
        let session = self.clone();
        let period = self.config.update_interval;

        Subscription::new(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !session.tick(generation).await {
                    break;
                }
            }
        }))
    }

    fn reached_end(&self, state: &BackendState) -> bool {
        if state.finished {
            return true;
        }
        !state.is_paused
            && state.duration_ms > 0
            && state.position_ms.saturating_add(self.config.end_threshold_ms) >= state.duration_ms
    }

    fn publish(&self, inner: &mut SessionInner, state: BackendState) {
        let Some(track) = inner.queue.current().cloned() else {
            return;
        };
        let snapshot = PlaybackState {
            track,
            position_ms: state.position_ms,
            duration_ms: state.duration_ms,
            is_paused: state.is_paused,
        };
        if inner.last_snapshot.as_ref() != Some(&snapshot) {
            inner.last_snapshot = Some(snapshot.clone());
            self.emit(SessionEvent::StateChanged(Some(snapshot)));
        }
    }

    /// Sample the active backend once. Returns whether the ticker should keep going.
    async fn tick(&self, generation: u64) -> bool {
        let backend = {
            let inner = self.inner.lock().await;
            if inner.generation != generation || inner.state != SessionState::Playing {
                return false;
            }
            match inner.active.clone() {
                Some(backend) => backend,
                None => return false,
            }
        };

        let Some(state) = backend.current_state().await else {
            return true;
        };

        let mut inner = self.inner.lock().await;
        if inner.generation != generation || inner.state != SessionState::Playing {
            return false;
        }
        self.publish(&mut inner, state);

        if !self.reached_end(&state) {
            return true;
        }

        tracing::debug!(
            position_ms = state.position_ms,
            duration_ms = state.duration_ms,
            finished = state.finished,
            "Track reached its end"
        );
        self.transition(&mut inner, SessionState::Advancing);
        // This may be the ticker itself, so it is released rather than aborted
        if let Some(subscription) = inner.subscription.take() {
            subscription.detach();
        }

        let session = self.clone();
        tokio::spawn(async move { session.auto_advance(generation).await });
        false
    }

    async fn auto_advance(&self, generation: u64) {
        let next_generation = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation || inner.state != SessionState::Advancing {
                return;
            }

            let shuffle = inner.shuffle;
            let next = match inner.repeat {
                RepeatState::One => inner.queue.current_index(),
                RepeatState::Off if !shuffle && inner.queue.is_last() => None,
                _ => inner.queue.advance(Direction::Next, shuffle),
            };

            if next.is_none() {
                tracing::info!("Reached end of queue");
                inner.generation += 1;
                inner.last_snapshot = None;
                self.transition(&mut inner, SessionState::Idle);
                self.emit(SessionEvent::StateChanged(None));
                return;
            }
            self.begin_play(&mut inner)
        };

        if let Err(e) = self.start(next_generation).await {
            tracing::debug!(error = %e, "Auto-advance did not start the next track");
        }
    }

    /// Flip play/pause on the active backend.
    pub async fn pause_toggle(&self) -> Result<(), PlaybackError> {
        let (backend, generation) = {
            let inner = self.inner.lock().await;
            match (inner.state, inner.active.clone()) {
                (SessionState::Playing | SessionState::Paused, Some(backend)) => (backend, inner.generation),
                _ => return Ok(()),
            }
        };

        let now_paused = backend.toggle_play().await?;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return Ok(());
        }

        if now_paused {
            inner.subscription = None;
            self.transition(&mut inner, SessionState::Paused);
        } else {
            self.transition(&mut inner, SessionState::Playing);
            inner.subscription = Some(self.spawn_ticker(generation));
        }

        if let Some(snapshot) = inner.last_snapshot.as_mut() {
            snapshot.is_paused = now_paused;
            let snapshot = snapshot.clone();
            self.emit(SessionEvent::StateChanged(Some(snapshot)));
        }
        Ok(())
    }

    /// Stop everything and hide the player. The queue is kept.
    ///
    /// The active backend is released and stopped, which also cancels any
    /// download it still has in flight.
    pub async fn close(&self) {
        let active = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.subscription = None;
            inner.last_snapshot = None;
            self.transition(&mut inner, SessionState::Idle);
            inner.active.take()
        };

        self.emit(SessionEvent::StateChanged(None));

        if let Some(backend) = active {
            if let Err(e) = backend.stop().await {
                tracing::debug!(error = %e, "Failed to stop backend on close");
            }
        }
        tracing::info!("Playback session closed");
    }

    async fn loaded_backend(&self) -> Option<Arc<dyn PlaybackBackend>> {
        let inner = self.inner.lock().await;
        match inner.state {
            SessionState::Playing | SessionState::Paused => inner.active.clone(),
            _ => None,
        }
    }

    pub async fn seek(&self, position_ms: u32) -> Result<(), PlaybackError> {
        let Some(backend) = self.loaded_backend().await else {
            return Ok(());
        };
        backend.seek(position_ms).await?;
        self.refresh().await;
        Ok(())
    }

    /// Seek relative to the last known position.
    pub async fn seek_by(&self, delta_ms: i64) -> Result<(), PlaybackError> {
        let Some(position_ms) = self.snapshot().await.map(|s| s.position_ms) else {
            return Ok(());
        };
        let target = (position_ms as i64 + delta_ms).max(0) as u32;
        self.seek(target).await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        let volume = volume.clamp(0.0, 1.0);
        let active = {
            let mut inner = self.inner.lock().await;
            inner.volume = volume;
            inner.active.clone()
        };

        if let Some(backend) = &active {
            backend.set_volume(volume).await?;
        }
        if active.map(|b| b.kind()) != Some(BackendKind::Preview) {
            self.preview.set_volume(volume).await?;
        }
        Ok(())
    }

    pub async fn volume(&self) -> f32 {
        self.inner.lock().await.volume
    }

    pub async fn set_shuffle(&self, shuffle: bool) {
        self.inner.lock().await.shuffle = shuffle;
    }

    pub async fn shuffle(&self) -> bool {
        self.inner.lock().await.shuffle
    }

    pub async fn set_repeat(&self, repeat: RepeatState) {
        self.inner.lock().await.repeat = repeat;
    }

    pub async fn repeat(&self) -> RepeatState {
        self.inner.lock().await.repeat
    }

    pub async fn set_mode(&self, mode: PlaybackMode) {
        self.inner.lock().await.mode = mode;
    }

    pub async fn mode(&self) -> PlaybackMode {
        self.inner.lock().await.mode
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn current_index(&self) -> Option<usize> {
        self.inner.lock().await.queue.current_index()
    }

    pub async fn snapshot(&self) -> Option<PlaybackState> {
        self.inner.lock().await.last_snapshot.clone()
    }

    /// Sample the active backend now instead of waiting for the next tick.
    pub async fn refresh(&self) {
        let (generation, state, backend) = {
            let inner = self.inner.lock().await;
            (inner.generation, inner.state, inner.active.clone())
        };

        match (state, backend) {
            (SessionState::Playing, _) => {
                self.tick(generation).await;
            }
            (SessionState::Paused, Some(backend)) => {
                let Some(backend_state) = backend.current_state().await else {
                    return;
                };
                let mut inner = self.inner.lock().await;
                if inner.generation == generation && inner.state == SessionState::Paused {
                    self.publish(&mut inner, backend_state);
                }
            }
            _ => {}
        }
    }

    #[cfg(test)]
    async fn is_ticking(&self) -> bool {
        self.inner
            .lock()
            .await
            .subscription
            .as_ref()
            .is_some_and(|s| !s.is_finished())
    }
}
