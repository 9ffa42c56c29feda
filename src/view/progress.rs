//! Progress bar rendering

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Gauge},
    Frame,
};

use crate::model::{PlaybackInfo, RepeatState};
use super::utils::format_duration;

fn status_text(playback: &PlaybackInfo) -> String {
    match &playback.track {
        None if playback.loading => " Loading...".to_string(),
        None => " No track playing".to_string(),
        Some(track) => {
            let icon = if playback.loading {
                "…"
            } else if playback.is_playing {
                "▶"
            } else {
                "⏸"
            };
            format!(" {} {} | {}", icon, track.name, track.artist)
        }
    }
}

fn controls_text(playback: &PlaybackInfo) -> String {
    let settings = &playback.settings;
    let shuffle = if settings.shuffle { "Shuffle: On" } else { "Shuffle: Off" };
    let repeat = match settings.repeat {
        RepeatState::Off => "Repeat: Off",
        RepeatState::All => "Repeat: All",
        RepeatState::One => "Repeat: One",
    };
    format!(
        " {} | {} | {} | Vol: {}% ",
        settings.mode.label(),
        shuffle,
        repeat,
        settings.volume
    )
}

pub fn render_progress_bar(frame: &mut Frame, area: Rect, playback: &PlaybackInfo) {
    let progress_ratio = if playback.duration_ms > 0 {
        (playback.progress_ms as f64 / playback.duration_ms as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let time_str = format!(
        "{} / {}",
        format_duration(playback.progress_ms),
        format_duration(playback.duration_ms)
    );

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} ", status_text(playback)))
                .title_bottom(Line::from(controls_text(playback)).right_aligned()),
        )
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(progress_ratio)
        .label(time_str);

    frame.render_widget(gauge, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PlaybackMode, PlaybackSettings, Track};

    #[test]
    fn idle_bar_says_nothing_is_playing() {
        let playback = PlaybackInfo::default();
        assert_eq!(status_text(&playback), " No track playing");
    }

    #[test]
    fn controls_show_mode_and_settings() {
        let playback = PlaybackInfo {
            settings: PlaybackSettings {
                mode: PlaybackMode::Premium,
                shuffle: true,
                repeat: RepeatState::One,
                volume: 70,
            },
            ..Default::default()
        };
        assert_eq!(
            controls_text(&playback),
            " Premium | Shuffle: On | Repeat: One | Vol: 70% "
        );
    }

    #[test]
    fn paused_track_shows_pause_icon() {
        let playback = PlaybackInfo {
            track: Some(Track {
                id: "a".into(),
                name: "Hey Jude".into(),
                artist: "The Beatles".into(),
                artwork_url: None,
                uri: None,
                preview_url: None,
            }),
            is_playing: false,
            ..Default::default()
        };
        assert_eq!(status_text(&playback), " ⏸ Hey Jude | The Beatles");
    }
}
