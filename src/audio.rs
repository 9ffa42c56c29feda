//! Local Spotify Connect device backed by librespot

use anyhow::{anyhow, Result};
use librespot::connect::{ConnectConfig, Spirc};
use librespot::core::authentication::Credentials;
use librespot::core::config::SessionConfig;
use librespot::core::session::Session;
use librespot::playback::config::{AudioFormat, Bitrate, PlayerConfig};
use librespot::playback::mixer::{MixerConfig, NoOpVolume};
use librespot::playback::player::{Player, PlayerEventChannel};
use librespot::playback::{audio_backend, mixer};
use std::sync::Arc;

use crate::model::SdkToken;

/// A Connect device registered under this machine's name, which the Web API
/// can target for full-track playback.
pub struct ConnectDevice {
    player: Arc<Player>,
    spirc: Spirc,
    device_id: String,
    device_name: String,
}

impl ConnectDevice {
    pub async fn new(token: &SdkToken, device_name: &str) -> Result<Self> {
        let device_id = device_id_for(device_name);
        tracing::info!(device_name, device_id = %device_id, "Starting librespot Connect device");

        let session_config = SessionConfig {
            device_id: device_id.clone(),
            ..Default::default()
        };
        let player_config = PlayerConfig {
            bitrate: Bitrate::Bitrate320,
            ..Default::default()
        };
        let connect_config = ConnectConfig {
            name: device_name.to_string(),
            ..Default::default()
        };

        let sink_builder = audio_backend::find(None).ok_or_else(|| anyhow!("No audio sink available"))?;
        let mixer_builder = mixer::find(None).ok_or_else(|| anyhow!("No audio mixer available"))?;
        let mixer = mixer_builder(MixerConfig::default())?;

        let session = Session::new(session_config, None);
        let audio_format = AudioFormat::default();
        let player = Player::new(
            player_config,
            session.clone(),
            Box::new(NoOpVolume),
            move || sink_builder(None, audio_format),
        );

        let credentials = Credentials::with_access_token(token.access_token.clone());
        let (spirc, spirc_task) = Spirc::new(
            connect_config,
            session.clone(),
            credentials,
            player.clone(),
            mixer,
        )
        .await?;
        spirc.activate()?;

        tokio::spawn(async move {
            spirc_task.await;
            tracing::info!("Spirc task finished");
        });

        tracing::info!(user = %session.username(), "Connect device online");

        Ok(Self {
            player,
            spirc,
            device_id,
            device_name: device_name.to_string(),
        })
    }

    pub fn player_events(&self) -> PlayerEventChannel {
        self.player.get_player_event_channel()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.spirc.shutdown() {
            tracing::warn!(error = %e, "Spirc shutdown failed");
        }
    }
}

fn device_id_for(device_name: &str) -> String {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}-{}", device_name.replace(' ', "-"), hostname)
}
