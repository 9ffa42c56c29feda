//! Remote playback on the Spotify Connect device through the Web API

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use librespot::playback::player::{PlayerEvent, PlayerEventChannel};
use rspotify::model::{PlayableId, TrackId};
use rspotify::prelude::*;
use rspotify::{AuthCodeSpotify, Config, Token};
use tokio::task::JoinHandle;

use crate::error::PlaybackError;
use crate::model::{PlaybackTiming, Track, TokenProvider};
use super::{BackendKind, BackendState, PlaybackBackend};

const TRACK_URI_PREFIX: &str = "spotify:track:";

/// Last known state of the Connect device, fed by librespot player events
#[derive(Clone, Debug, Default)]
pub struct DeviceStatus {
    pub timing: PlaybackTiming,
    pub uri: Option<String>,
    pub finished: bool,
}

impl DeviceStatus {
    fn on_position(&mut self, position_ms: u32, is_playing: bool) {
        self.timing.update_position(position_ms, is_playing);
    }

    fn on_track_changed(&mut self, uri: String, duration_ms: u32) {
        self.uri = Some(uri);
        self.timing.duration_ms = duration_ms;
        self.finished = false;
    }

    fn on_end_of_track(&mut self) {
        self.timing.position_ms = self.timing.duration_ms;
        self.finished = true;
    }

    fn on_play_requested(&mut self, uri: &str) {
        self.uri = Some(uri.to_string());
        self.timing = PlaybackTiming {
            is_playing: true,
            ..Default::default()
        };
        self.finished = false;
    }

    fn state(&self) -> Option<BackendState> {
        self.uri.as_ref()?;
        Some(BackendState {
            position_ms: self.timing.current_position_ms(),
            duration_ms: self.timing.duration_ms,
            is_paused: !self.timing.is_playing,
            finished: self.finished,
        })
    }
}

pub struct RemoteDeviceBackend {
    spotify: AuthCodeSpotify,
    tokens: Arc<dyn TokenProvider>,
    device_name: String,
    fallback_device_id: Option<String>,
    device_id: tokio::sync::Mutex<Option<String>>,
    status: Arc<Mutex<DeviceStatus>>,
    ready: Arc<AtomicBool>,
    requests: AtomicU64,
}

impl RemoteDeviceBackend {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        device_name: impl Into<String>,
        fallback_device_id: Option<String>,
    ) -> Self {
        let spotify = AuthCodeSpotify::with_config(
            Default::default(),
            Default::default(),
            Config {
                token_cached: false,
                token_refreshing: false,
                ..Default::default()
            },
        );

        Self {
            spotify,
            tokens,
            device_name: device_name.into(),
            fallback_device_id,
            device_id: tokio::sync::Mutex::new(None),
            status: Arc::new(Mutex::new(DeviceStatus::default())),
            ready: Arc::new(AtomicBool::new(true)),
            requests: AtomicU64::new(0),
        }
    }

    fn with_status<R>(&self, f: impl FnOnce(&mut DeviceStatus) -> R) -> R {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut status)
    }

    /// Fetch a fresh access token and install it into the Web API client.
    async fn authorize(&self) -> Result<(), PlaybackError> {
        let sdk_token = self
            .tokens
            .fetch_token()
            .await
            .map_err(|e| PlaybackError::RemoteToken(e.to_string()))?;

        let expires_in = chrono::Duration::seconds(sdk_token.expires_in.unwrap_or(3600));
        let token = Token {
            access_token: sdk_token.access_token,
            expires_in,
            expires_at: Some(Utc::now() + expires_in),
            ..Default::default()
        };

        match self.spotify.token.lock().await {
            Ok(mut guard) => *guard = Some(token),
            Err(_) => return Err(PlaybackError::RemoteToken("token store is poisoned".to_string())),
        }
        tracing::trace!("Installed fresh access token");
        Ok(())
    }

    /// Web API id of our Connect device, looked up by name once and cached.
    async fn device_id(&self) -> Option<String> {
        let mut cached = self.device_id.lock().await;
        if cached.is_some() {
            return cached.clone();
        }

        match self.spotify.device().await {
            Ok(devices) => {
                let found = devices
                    .into_iter()
                    .find(|d| d.name == self.device_name)
                    .and_then(|d| d.id);
                if let Some(id) = &found {
                    tracing::debug!(device_name = %self.device_name, device_id = %id, "Resolved Connect device");
                    *cached = found.clone();
                    return found;
                }
                tracing::debug!(device_name = %self.device_name, "Connect device not listed yet");
            }
            Err(e) => tracing::debug!(error = %e, "Failed to list devices"),
        }

        self.fallback_device_id.clone()
    }

    async fn forget_device(&self) {
        *self.device_id.lock().await = None;
    }

    fn device_error(e: rspotify::ClientError) -> PlaybackError {
        PlaybackError::RemoteDevice(e.to_string())
    }
}

#[async_trait]
impl PlaybackBackend for RemoteDeviceBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn play(&self, track: &Track) -> Result<(), PlaybackError> {
        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;

        let uri = track
            .uri
            .as_deref()
            .filter(|uri| uri.len() > TRACK_URI_PREFIX.len() && uri.starts_with(TRACK_URI_PREFIX))
            .ok_or_else(|| PlaybackError::InvalidTrackUri(track.uri.clone().unwrap_or_default()))?;
        let track_id = TrackId::from_id(&uri[TRACK_URI_PREFIX.len()..])
            .map_err(|_| PlaybackError::InvalidTrackUri(uri.to_string()))?;

        self.authorize().await?;

        if self.requests.load(Ordering::SeqCst) != request {
            tracing::debug!(uri = %uri, "Remote play superseded before it was sent");
            return Err(PlaybackError::Superseded);
        }

        let device_id = self.device_id().await;
        tracing::debug!(uri = %uri, device_id = ?device_id, "API: start_uris_playback");

        let result = self
            .spotify
            .start_uris_playback([PlayableId::Track(track_id)], device_id.as_deref(), None, None)
            .await;

        if let Err(e) = result {
            // The device may have re-registered under a new id
            self.forget_device().await;
            return Err(Self::device_error(e));
        }

        self.with_status(|status| status.on_play_requested(uri));
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlaybackError> {
        self.authorize().await?;
        let device_id = self.device_id().await;
        tracing::debug!(device_id = ?device_id, "API: pause_playback");
        self.spotify
            .pause_playback(device_id.as_deref())
            .await
            .map_err(Self::device_error)?;
        self.with_status(|status| status.timing.set_playing(false));
        Ok(())
    }

    async fn toggle_play(&self) -> Result<bool, PlaybackError> {
        let is_playing = self.with_status(|status| status.timing.is_playing);
        self.authorize().await?;
        let device_id = self.device_id().await;

        if is_playing {
            tracing::debug!(device_id = ?device_id, "API: pause_playback");
            self.spotify
                .pause_playback(device_id.as_deref())
                .await
                .map_err(Self::device_error)?;
        } else {
            tracing::debug!(device_id = ?device_id, "API: resume_playback");
            self.spotify
                .resume_playback(device_id.as_deref(), None)
                .await
                .map_err(Self::device_error)?;
        }

        self.with_status(|status| status.timing.set_playing(!is_playing));
        Ok(is_playing)
    }

    async fn seek(&self, position_ms: u32) -> Result<(), PlaybackError> {
        self.authorize().await?;
        let device_id = self.device_id().await;
        tracing::debug!(position_ms, device_id = ?device_id, "API: seek_track");
        self.spotify
            .seek_track(chrono::Duration::milliseconds(position_ms as i64), device_id.as_deref())
            .await
            .map_err(Self::device_error)?;
        self.with_status(|status| {
            let is_playing = status.timing.is_playing;
            status.on_position(position_ms, is_playing);
        });
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        let percent = (volume.clamp(0.0, 1.0) * 100.0).round() as u8;
        self.authorize().await?;
        let device_id = self.device_id().await;
        tracing::debug!(volume = percent, device_id = ?device_id, "API: volume");
        self.spotify
            .volume(percent, device_id.as_deref())
            .await
            .map_err(Self::device_error)
    }

    async fn current_state(&self) -> Option<BackendState> {
        self.with_status(|status| status.state())
    }

    async fn stop(&self) -> Result<(), PlaybackError> {
        let is_playing = self.with_status(|status| status.timing.is_playing);
        if is_playing {
            self.pause().await?;
        }
        self.with_status(|status| {
            status.uri = None;
            status.finished = false;
        });
        Ok(())
    }
}

/// Feed librespot player events into the backend's device status.
///
/// When the channel closes the device is gone and the backend reports itself
/// as not ready, so the session falls back to previews.
pub fn spawn_event_listener(
    mut events: PlayerEventChannel,
    backend: &RemoteDeviceBackend,
) -> JoinHandle<()> {
    let status = backend.status.clone();
    let ready = backend.ready.clone();
    tracing::info!("Starting librespot player event listener");

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let mut status = status.lock().unwrap_or_else(|e| e.into_inner());

            match event {
                PlayerEvent::Playing { position_ms, .. } => {
                    tracing::trace!(position_ms, "PlayerEvent::Playing");
                    status.on_position(position_ms, true);
                }
                PlayerEvent::Paused { position_ms, .. } => {
                    tracing::debug!(position_ms, "PlayerEvent::Paused");
                    status.on_position(position_ms, false);
                }
                PlayerEvent::PositionChanged { position_ms, .. } => {
                    tracing::trace!(position_ms, "PlayerEvent::PositionChanged");
                    let is_playing = status.timing.is_playing;
                    status.on_position(position_ms, is_playing);
                }
                PlayerEvent::Seeked { position_ms, .. } => {
                    tracing::debug!(position_ms, "PlayerEvent::Seeked");
                    let is_playing = status.timing.is_playing;
                    status.on_position(position_ms, is_playing);
                }
                PlayerEvent::TrackChanged { audio_item } => {
                    let uri = audio_item.track_id.to_uri().unwrap_or_default();
                    tracing::info!(
                        track = %audio_item.name,
                        duration_ms = audio_item.duration_ms,
                        uri = %uri,
                        "PlayerEvent::TrackChanged"
                    );
                    status.on_track_changed(uri, audio_item.duration_ms);
                }
                PlayerEvent::Loading { position_ms, .. } => {
                    tracing::debug!(position_ms, "PlayerEvent::Loading");
                    status.on_position(position_ms, false);
                }
                PlayerEvent::Stopped { .. } => {
                    tracing::debug!("PlayerEvent::Stopped");
                    status.timing.set_playing(false);
                }
                PlayerEvent::EndOfTrack { .. } => {
                    tracing::debug!("PlayerEvent::EndOfTrack");
                    status.on_end_of_track();
                }
                _ => {
                    tracing::trace!("PlayerEvent: other event received");
                }
            }
        }

        tracing::warn!("Player event channel closed, remote playback unavailable");
        ready.store(false, Ordering::SeqCst);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::model::{MockTokenProvider, SdkToken};
    use tokio::sync::Notify;

    fn track(uri: Option<&str>) -> Track {
        Track {
            id: "t".into(),
            name: "Song".into(),
            artist: "Band".into(),
            artwork_url: None,
            uri: uri.map(str::to_string),
            preview_url: None,
        }
    }

    #[tokio::test]
    async fn invalid_uri_fails_before_any_token_fetch() {
        let mut tokens = MockTokenProvider::new();
        tokens.expect_fetch_token().times(0);
        let backend = RemoteDeviceBackend::new(Arc::new(tokens), "Bandit Player", None);

        for uri in [None, Some(""), Some("spotify:album:abc"), Some("spotify:track:")] {
            let err = backend.play(&track(uri)).await.unwrap_err();
            assert!(matches!(err, PlaybackError::InvalidTrackUri(_)), "uri {:?}", uri);
        }
    }

    #[tokio::test]
    async fn token_failure_is_a_remote_token_error() {
        let mut tokens = MockTokenProvider::new();
        tokens.expect_fetch_token().times(1).returning(|| {
            Err(ApiError::Status { status: 401, message: "User not authenticated".into() })
        });
        let backend = RemoteDeviceBackend::new(Arc::new(tokens), "Bandit Player", None);

        let err = backend
            .play(&track(Some("spotify:track:4uLU6hMCjMI75M1A2tKUQC")))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::RemoteToken(_)));
        assert!(backend.current_state().await.is_none());
    }

    struct GatedTokens {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl TokenProvider for GatedTokens {
        async fn fetch_token(&self) -> Result<SdkToken, ApiError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(SdkToken {
                access_token: "BQD".into(),
                product_type: "premium".into(),
                expires_in: Some(3600),
            })
        }
    }

    #[tokio::test]
    async fn newer_play_supersedes_pending_one() {
        let tokens = Arc::new(GatedTokens { entered: Notify::new(), release: Notify::new() });
        let backend = Arc::new(RemoteDeviceBackend::new(tokens.clone(), "Bandit Player", None));

        let first = {
            let backend = backend.clone();
            tokio::spawn(async move {
                backend.play(&track(Some("spotify:track:4uLU6hMCjMI75M1A2tKUQC"))).await
            })
        };
        tokens.entered.notified().await;

        // A second request bumps the counter even though it fails validation
        assert!(backend.play(&track(Some("bad"))).await.is_err());
        tokens.release.notify_one();

        let err = first.await.unwrap().unwrap_err();
        assert!(matches!(err, PlaybackError::Superseded));
    }

    #[test]
    fn device_status_tracks_events() {
        let mut status = DeviceStatus::default();
        assert!(status.state().is_none());

        status.on_play_requested("spotify:track:a");
        status.on_track_changed("spotify:track:a".into(), 200_000);
        status.on_position(10_000, false);
        let state = status.state().unwrap();
        assert_eq!(state.position_ms, 10_000);
        assert_eq!(state.duration_ms, 200_000);
        assert!(state.is_paused);
        assert!(!state.finished);

        status.on_end_of_track();
        let state = status.state().unwrap();
        assert!(state.finished);
        assert_eq!(state.position_ms, 199_999);
    }
}
