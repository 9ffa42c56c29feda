//! Error types for playback and backend calls

use thiserror::Error;

/// Failure talking to the recommender backend or fetching a clip.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            ApiError::Status { status, .. } => Some(*status),
        }
    }
}

/// Errors produced by the track queue, the playback backends and the session.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The short-lived access token could not be fetched right before a remote call
    #[error("could not obtain a fresh access token: {0}")]
    RemoteToken(String),

    /// The remote device endpoint answered with a non-success status
    #[error("remote device rejected the request: {0}")]
    RemoteDevice(String),

    #[error("no preview available for this track")]
    NoPreviewAvailable,

    #[error("track index {index} out of range for queue of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid track uri: {0}")]
    InvalidTrackUri(String),

    #[error("network error: {0}")]
    Network(#[from] ApiError),

    #[error("audio output error: {0}")]
    Audio(String),

    /// A newer play request started while this one was in flight
    #[error("request superseded by a newer one")]
    Superseded,
}

impl PlaybackError {
    /// Message shown in the UI when this error ends a play attempt.
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::NoPreviewAvailable => "No preview available for this track.".to_string(),
            PlaybackError::RemoteToken(_) => {
                "Spotify session expired. Please log in again on the backend.".to_string()
            }
            PlaybackError::RemoteDevice(msg) if msg.contains("403") => {
                "Playback forbidden. Check your Spotify Premium status.".to_string()
            }
            PlaybackError::RemoteDevice(msg) if msg.contains("404") => {
                "Player device not found. Try again in a moment.".to_string()
            }
            other => format!("Error: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_for_status_errors() {
        let err = ApiError::Status { status: 401, message: "User not authenticated".into() };
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "server returned 401: User not authenticated");
    }

    #[test]
    fn user_messages_are_specific_for_common_failures() {
        assert_eq!(
            PlaybackError::NoPreviewAvailable.user_message(),
            "No preview available for this track."
        );
        assert!(PlaybackError::RemoteDevice("http status: 403".into())
            .user_message()
            .contains("Premium"));
        assert!(PlaybackError::Audio("no output device".into())
            .user_message()
            .starts_with("Error: "));
    }
}
