//! Playback-related types and state management

use std::time::Instant;

use super::types::{PlaybackMode, PlaybackState, RepeatState, Track};

/// Position timing for a source that only reports position on events.
///
/// Between events the position is extrapolated from the wall clock while
/// playing, so the UI can show a smooth progress bar.
#[derive(Clone, Debug)]
pub struct PlaybackTiming {
    pub position_ms: u32,
    pub last_update: Instant,
    pub is_playing: bool,
    pub duration_ms: u32,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            position_ms: 0,
            last_update: Instant::now(),
            is_playing: false,
            duration_ms: 0,
        }
    }
}

impl PlaybackTiming {
    pub fn current_position_ms(&self) -> u32 {
        if self.is_playing && self.duration_ms > 0 {
            let elapsed = self.last_update.elapsed().as_millis() as u32;
            self.position_ms.saturating_add(elapsed).min(self.duration_ms)
        } else {
            self.position_ms.min(self.duration_ms.max(1) - 1)
        }
    }

    pub fn update_position(&mut self, new_position_ms: u32, is_playing: bool) {
        let current_calculated = self.current_position_ms();
        let diff = new_position_ms as i64 - current_calculated as i64;

        let state_changed = self.is_playing != is_playing;
        let significant_jump = diff.abs() > 2000;
        let was_paused = !self.is_playing;
        let acceptable_sync = diff >= -100;

        if state_changed || significant_jump || was_paused || acceptable_sync {
            self.position_ms = new_position_ms;
            self.last_update = Instant::now();
        }
        self.is_playing = is_playing;
    }

    /// Freeze the extrapolated position, e.g. on pause.
    pub fn set_playing(&mut self, is_playing: bool) {
        self.position_ms = self.current_position_ms();
        self.is_playing = is_playing;
        self.last_update = Instant::now();
    }
}

/// Settings related to playback (mode, shuffle, repeat, volume)
#[derive(Clone, Debug)]
pub struct PlaybackSettings {
    pub mode: PlaybackMode,
    pub shuffle: bool,
    pub repeat: RepeatState,
    pub volume: u8,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::Preview,
            shuffle: false,
            repeat: RepeatState::All,
            volume: 50,
        }
    }
}

/// Complete playback information for rendering the UI
#[derive(Clone, Debug, Default)]
pub struct PlaybackInfo {
    pub track: Option<Track>,
    pub progress_ms: u32,
    pub duration_ms: u32,
    pub is_playing: bool,
    pub loading: bool,
    pub settings: PlaybackSettings,
}

impl PlaybackInfo {
    pub fn apply_state(&mut self, state: Option<PlaybackState>) {
        match state {
            Some(state) => {
                self.progress_ms = state.position_ms;
                self.duration_ms = state.duration_ms;
                self.is_playing = !state.is_paused;
                self.track = Some(state.track);
            }
            None => {
                self.track = None;
                self.progress_ms = 0;
                self.duration_ms = 0;
                self.is_playing = false;
                self.loading = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn paused_timing_does_not_advance() {
        let mut timing = PlaybackTiming {
            duration_ms: 30_000,
            ..Default::default()
        };
        timing.update_position(5_000, false);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(timing.current_position_ms(), 5_000);
    }

    #[test]
    fn playing_timing_extrapolates_but_clamps_to_duration() {
        let mut timing = PlaybackTiming {
            duration_ms: 1_010,
            ..Default::default()
        };
        timing.update_position(1_000, true);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(timing.current_position_ms(), 1_010);
    }

    #[test]
    fn set_playing_freezes_position() {
        let mut timing = PlaybackTiming {
            duration_ms: 60_000,
            ..Default::default()
        };
        timing.update_position(10_000, true);
        std::thread::sleep(Duration::from_millis(20));
        timing.set_playing(false);
        let frozen = timing.current_position_ms();
        assert!(frozen >= 10_020);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(timing.current_position_ms(), frozen);
    }

    #[test]
    fn clearing_state_hides_track() {
        let mut info = PlaybackInfo::default();
        info.apply_state(Some(PlaybackState {
            track: Track {
                id: "a".into(),
                name: "A".into(),
                artist: "X".into(),
                artwork_url: None,
                uri: None,
                preview_url: None,
            },
            position_ms: 1_000,
            duration_ms: 30_000,
            is_paused: false,
        }));
        assert!(info.is_playing);
        info.apply_state(None);
        assert!(info.track.is_none());
        assert!(!info.is_playing);
    }
}
