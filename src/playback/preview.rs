//! Preview clip playback through a local rodio output

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tokio::sync::oneshot;

use crate::error::{ApiError, PlaybackError};
use crate::model::Track;
use super::{BackendKind, BackendState, PlaybackBackend};

const TICK_MS: u64 = 200;

/// Strings the backend has been seen to send in place of a missing url
const NULL_EQUIVALENTS: [&str; 3] = ["null", "none", "undefined"];

/// The preview url of a track, if it has a usable one.
pub fn usable_preview_url(track: &Track) -> Option<&str> {
    let url = track.preview_url.as_deref()?.trim();
    if url.is_empty() || NULL_EQUIVALENTS.iter().any(|n| url.eq_ignore_ascii_case(n)) {
        return None;
    }
    Some(url)
}

#[derive(Clone, Copy, Debug, Default)]
struct ClipStatus {
    loaded: bool,
    position_ms: u32,
    duration_ms: u32,
    is_paused: bool,
    finished: bool,
}

enum EngineCommand {
    Play {
        bytes: Vec<u8>,
        volume: f32,
        reply: oneshot::Sender<Result<(), String>>,
    },
    Pause,
    Resume,
    Seek(u32),
    SetVolume(f32),
    Stop,
    Shutdown,
}

/// Owner of the output stream. rodio's stream is not `Send`, so it lives on
/// its own thread and is driven by commands.
struct PreviewEngine {
    stream: Option<OutputStream>,
    sink: Option<Sink>,
    status: Arc<Mutex<ClipStatus>>,
    clip_ms: u32,
}

impl PreviewEngine {
    fn run(mut self, commands: Receiver<EngineCommand>) {
        let tick = Duration::from_millis(TICK_MS);

        loop {
            match commands.recv_timeout(tick) {
                Ok(EngineCommand::Shutdown) => break,
                Ok(command) => self.handle_command(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.tick();
        }

        self.stop_internal();
        tracing::debug!("Preview engine stopped");
    }

    fn set_status(&self, f: impl FnOnce(&mut ClipStatus)) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut status);
    }

    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Play { bytes, volume, reply } => {
                let result = self.play_bytes(bytes, volume);
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "Failed to start preview clip");
                }
                let _ = reply.send(result);
            }
            EngineCommand::Pause => {
                if let Some(sink) = &self.sink {
                    sink.pause();
                }
            }
            EngineCommand::Resume => {
                if let Some(sink) = &self.sink {
                    sink.play();
                }
            }
            EngineCommand::Seek(position_ms) => {
                if let Some(sink) = &self.sink {
                    if let Err(e) = sink.try_seek(Duration::from_millis(position_ms as u64)) {
                        tracing::warn!(error = %e, position_ms, "Preview seek failed");
                    }
                }
            }
            EngineCommand::SetVolume(volume) => {
                if let Some(sink) = &self.sink {
                    sink.set_volume(volume);
                }
            }
            EngineCommand::Stop => self.stop_internal(),
            EngineCommand::Shutdown => {}
        }
    }

    fn tick(&mut self) {
        let Some(sink) = &self.sink else {
            return;
        };

        let position_ms = sink.get_pos().as_millis() as u32;
        let is_paused = sink.is_paused();
        let finished = sink.empty();

        self.set_status(|status| {
            status.is_paused = is_paused;
            if finished {
                status.position_ms = status.duration_ms;
                status.finished = true;
            } else {
                status.position_ms = position_ms.min(status.duration_ms);
            }
        });
    }

    fn play_bytes(&mut self, bytes: Vec<u8>, volume: f32) -> Result<(), String> {
        self.stop_internal();

        let stream = self.stream.as_ref().ok_or("no audio output device")?;
        let decoder = Decoder::new(Cursor::new(bytes)).map_err(|e| format!("decode failed: {e}"))?;
        let duration_ms = decoder
            .total_duration()
            .map(|d| d.as_millis() as u32)
            .filter(|ms| *ms > 0)
            .unwrap_or(self.clip_ms);

        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(volume);
        sink.append(decoder);
        sink.play();
        self.sink = Some(sink);

        self.set_status(|status| {
            *status = ClipStatus {
                loaded: true,
                duration_ms,
                ..Default::default()
            };
        });
        Ok(())
    }

    fn stop_internal(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.set_status(|status| *status = ClipStatus::default());
    }
}

pub struct LocalPreviewBackend {
    http: reqwest::Client,
    commands: Sender<EngineCommand>,
    status: Arc<Mutex<ClipStatus>>,
    volume: Mutex<f32>,
    output_ok: Arc<AtomicBool>,
    requests: AtomicU64,
}

impl LocalPreviewBackend {
    pub fn new(clip_ms: u32, volume: f32, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let status = Arc::new(Mutex::new(ClipStatus::default()));
        let output_ok = Arc::new(AtomicBool::new(false));
        let (commands, receiver) = mpsc::channel();

        let engine_status = status.clone();
        let engine_ok = output_ok.clone();
        std::thread::Builder::new()
            .name("preview-audio".to_string())
            .spawn(move || {
                let stream = match OutputStreamBuilder::open_default_stream() {
                    Ok(mut stream) => {
                        stream.log_on_drop(false);
                        engine_ok.store(true, Ordering::SeqCst);
                        Some(stream)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to open default audio output");
                        None
                    }
                };

                PreviewEngine {
                    stream,
                    sink: None,
                    status: engine_status,
                    clip_ms,
                }
                .run(receiver);
            })
            .context("Failed to spawn preview audio thread")?;

        Ok(Self {
            http,
            commands,
            status,
            volume: Mutex::new(volume.clamp(0.0, 1.0)),
            output_ok,
            requests: AtomicU64::new(0),
        })
    }

    fn send(&self, command: EngineCommand) -> Result<(), PlaybackError> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::Audio("preview engine is not running".to_string()))
    }

    fn status(&self) -> ClipStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update_status(&self, f: impl FnOnce(&mut ClipStatus)) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut status);
    }

    fn volume(&self) -> f32 {
        *self.volume.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: format!("preview download failed for {}", url),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl PlaybackBackend for LocalPreviewBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Preview
    }

    fn is_ready(&self) -> bool {
        self.output_ok.load(Ordering::SeqCst)
    }

    async fn play(&self, track: &Track) -> Result<(), PlaybackError> {
        let url = usable_preview_url(track).ok_or(PlaybackError::NoPreviewAvailable)?;
        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::debug!(track_id = %track.id, url = %url, "Downloading preview clip");
        let bytes = self.download(url).await?;

        if self.requests.load(Ordering::SeqCst) != request {
            tracing::debug!(track_id = %track.id, "Preview download superseded");
            return Err(PlaybackError::Superseded);
        }

        let (reply, response) = oneshot::channel();
        self.send(EngineCommand::Play {
            bytes,
            volume: self.volume(),
            reply,
        })?;

        response
            .await
            .map_err(|_| PlaybackError::Audio("preview engine stopped".to_string()))?
            .map_err(PlaybackError::Audio)
    }

    async fn pause(&self) -> Result<(), PlaybackError> {
        self.send(EngineCommand::Pause)?;
        self.update_status(|status| status.is_paused = true);
        Ok(())
    }

    async fn toggle_play(&self) -> Result<bool, PlaybackError> {
        let status = self.status();
        if !status.loaded {
            return Err(PlaybackError::Audio("no preview clip loaded".to_string()));
        }

        let now_paused = !status.is_paused;
        self.send(if now_paused { EngineCommand::Pause } else { EngineCommand::Resume })?;
        self.update_status(|status| status.is_paused = now_paused);
        Ok(now_paused)
    }

    async fn seek(&self, position_ms: u32) -> Result<(), PlaybackError> {
        let status = self.status();
        if !status.loaded {
            return Ok(());
        }

        let position_ms = position_ms.min(status.duration_ms);
        self.send(EngineCommand::Seek(position_ms))?;
        self.update_status(|status| status.position_ms = position_ms);
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        let volume = volume.clamp(0.0, 1.0);
        *self.volume.lock().unwrap_or_else(|e| e.into_inner()) = volume;
        self.send(EngineCommand::SetVolume(volume))
    }

    async fn current_state(&self) -> Option<BackendState> {
        let status = self.status();
        status.loaded.then_some(BackendState {
            position_ms: status.position_ms,
            duration_ms: status.duration_ms,
            is_paused: status.is_paused,
            finished: status.finished,
        })
    }

    async fn stop(&self) -> Result<(), PlaybackError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.send(EngineCommand::Stop)?;
        self.update_status(|status| *status = ClipStatus::default());
        Ok(())
    }
}

impl Drop for LocalPreviewBackend {
    fn drop(&mut self) {
        let _ = self.commands.send(EngineCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use tokio::sync::Notify;

    fn track(preview_url: Option<&str>) -> Track {
        Track {
            id: "t".into(),
            name: "Song".into(),
            artist: "Band".into(),
            artwork_url: None,
            uri: None,
            preview_url: preview_url.map(str::to_string),
        }
    }

    fn backend() -> LocalPreviewBackend {
        LocalPreviewBackend::new(30_000, 0.5, Duration::from_secs(5)).unwrap()
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn null_equivalent_urls_are_unusable() {
        for url in [None, Some(""), Some("  "), Some("null"), Some("None"), Some("undefined")] {
            assert!(usable_preview_url(&track(url)).is_none(), "url {:?}", url);
        }
        assert_eq!(
            usable_preview_url(&track(Some("https://p.scdn.co/mp3-preview/x"))),
            Some("https://p.scdn.co/mp3-preview/x")
        );
    }

    #[tokio::test]
    async fn missing_preview_fails_without_touching_the_engine() {
        let backend = backend();
        let err = backend.play(&track(Some("None"))).await.unwrap_err();
        assert!(matches!(err, PlaybackError::NoPreviewAvailable));
        assert!(backend.current_state().await.is_none());
    }

    #[tokio::test]
    async fn failed_download_is_a_network_error() {
        let base = serve(Router::new().route("/clip", get(|| async { StatusCode::NOT_FOUND }))).await;
        let backend = backend();

        let err = backend.play(&track(Some(&format!("{}/clip", base)))).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Network(ApiError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn slow_download_is_superseded_by_newer_play() {
        let gate = Arc::new(Notify::new());
        let gate_in_handler = gate.clone();
        let app = Router::new()
            .route(
                "/slow",
                get(move || {
                    let gate = gate_in_handler.clone();
                    async move {
                        gate.notified().await;
                        vec![0u8; 16]
                    }
                }),
            )
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }));
        let base = serve(app).await;
        let backend = Arc::new(backend());

        let slow = {
            let backend = backend.clone();
            let url = format!("{}/slow", base);
            tokio::spawn(async move { backend.play(&track(Some(&url))).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(backend.play(&track(Some(&format!("{}/missing", base)))).await.is_err());
        gate.notify_one();

        let err = slow.await.unwrap().unwrap_err();
        assert!(matches!(err, PlaybackError::Superseded));
    }

    #[tokio::test]
    async fn controls_without_a_clip_are_harmless() {
        let backend = backend();
        assert!(backend.seek(5_000).await.is_ok());
        assert!(backend.toggle_play().await.is_err());
        assert!(backend.set_volume(2.0).await.is_ok());
        assert_eq!(backend.volume(), 1.0);
    }
}
