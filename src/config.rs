use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::RepeatState;
use crate::playback::SessionConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub playback: PlaybackConfig,
    pub recommendations: RecommendationsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Value of the backend's `session_id` cookie, if the session was created elsewhere
    pub session_id: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            session_id: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub update_interval_ms: u64,
    pub end_threshold_ms: u32,
    pub preview_clip_ms: u32,
    pub volume: f32,
    pub device_name: String,
    pub repeat: RepeatState,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 250,
            end_threshold_ms: 1000,
            preview_clip_ms: 30_000,
            volume: 0.5,
            device_name: "Bandit Player".to_string(),
            repeat: RepeatState::All,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationsConfig {
    /// How many recommendations to request per seed
    pub count: usize,
    /// How many of them are shown at once; the rest refill rated cards
    pub visible: usize,
}

impl Default for RecommendationsConfig {
    fn default() -> Self {
        Self { count: 16, visible: 12 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub directory: PathBuf,
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".logs"),
            filter: "bandit_player=debug,librespot=info,rspotify=info,warn".to_string(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config.normalized())
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("bandit-player").join("config.toml"))
    }

    /// Load an explicitly given file, or the default one if it exists.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file just yields the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Merge the overrides published by the backend's `/config` endpoint.
    pub fn apply_overrides(&mut self, overrides: &serde_json::Map<String, serde_json::Value>) {
        for (key, value) in overrides {
            match (key.as_str(), value.as_u64()) {
                ("num_recommendations", Some(n)) if n > 0 => {
                    self.recommendations.count = n as usize;
                }
                ("update_interval_ms", Some(ms)) if ms > 0 => {
                    self.playback.update_interval_ms = ms;
                }
                _ => tracing::debug!(key = %key, value = %value, "Ignoring backend config entry"),
            }
        }
        *self = std::mem::take(self).normalized();
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            update_interval: Duration::from_millis(self.playback.update_interval_ms),
            end_threshold_ms: self.playback.end_threshold_ms,
            repeat: self.playback.repeat,
            volume: self.playback.volume,
        }
    }

    fn normalized(mut self) -> Self {
        self.playback.volume = self.playback.volume.clamp(0.0, 1.0);
        self.playback.update_interval_ms = self.playback.update_interval_ms.max(1);
        self.recommendations.visible = self.recommendations.visible.min(self.recommendations.count);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.backend.timeout_secs, 10);
        assert_eq!(config.playback.update_interval_ms, 250);
        assert_eq!(config.playback.end_threshold_ms, 1000);
        assert_eq!(config.playback.repeat, RepeatState::All);
        assert_eq!(config.recommendations.count, 16);
        assert_eq!(config.recommendations.visible, 12);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str::<Config>(
            r#"
            [backend]
            session_id = "abc"

            [playback]
            repeat = "off"
            volume = 3.0
            "#,
        )
        .unwrap()
        .normalized();

        assert_eq!(config.backend.session_id.as_deref(), Some("abc"));
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.playback.repeat, RepeatState::Off);
        assert_eq!(config.playback.volume, 1.0);
        assert_eq!(config.playback.device_name, "Bandit Player");
    }

    #[test]
    fn backend_overrides_apply_known_keys_only() {
        let mut config = Config::default();
        let overrides = json!({
            "num_recommendations": 8,
            "update_interval_ms": 500,
            "max_tracks": 99,
        });
        config.apply_overrides(overrides.as_object().unwrap());

        assert_eq!(config.recommendations.count, 8);
        assert_eq!(config.recommendations.visible, 8);
        assert_eq!(config.session_config().update_interval, Duration::from_millis(500));
    }

    #[test]
    fn zero_overrides_are_ignored() {
        let mut config = Config::default();
        let overrides = json!({ "num_recommendations": 0, "update_interval_ms": "fast" });
        config.apply_overrides(overrides.as_object().unwrap());

        assert_eq!(config.recommendations.count, 16);
        assert_eq!(config.playback.update_interval_ms, 250);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("bandit-player-does-not-exist.toml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
