//! HTTP client for the recommender backend

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::ApiError;
use crate::{log_api_request, log_api_result};
use super::buckets::{PlaylistBuckets, PlaylistEntry};
use super::types::Track;

/// Fresh credential plus the account tier it belongs to
#[derive(Clone, Debug, Deserialize)]
pub struct SdkToken {
    pub access_token: String,
    #[serde(default = "default_product_type")]
    pub product_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

fn default_product_type() -> String {
    "free".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProfileImage {
    pub url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub images: Vec<ProfileImage>,
}

impl UserProfile {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FeedbackRequest {
    pub track_id: String,
    pub rating: u8,
    pub seed_track_name: String,
    pub seed_artist_name: String,
    pub track_info: Option<Track>,
}

#[derive(Serialize)]
struct RecommendRequest<'a> {
    track_name: &'a str,
    artist_name: &'a str,
    num_recommendations: usize,
}

#[derive(Deserialize)]
struct RecommendResponse {
    recommendations: Vec<Track>,
}

#[derive(Serialize)]
struct RemoveTrackRequest<'a> {
    playlist_id: String,
    track_id: &'a str,
}

#[derive(Serialize)]
struct AddTrackRequest<'a> {
    playlist_id: String,
    track: &'a Track,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Source of the short-lived access token used for remote playback calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<SdkToken, ApiError>;
}

/// Recommender backend client
#[derive(Clone)]
pub struct RecommenderClient {
    http: reqwest::Client,
    base_url: String,
}

impl RecommenderClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        reqwest::Url::parse(&config.base_url)
            .with_context(|| format!("Invalid backend url: {}", config.base_url))?;

        let mut headers = HeaderMap::new();
        if let Some(session_id) = &config.session_id {
            let cookie = HeaderValue::from_str(&format!("session_id={}", session_id))
                .context("Session id contains characters not allowed in a cookie")?;
            headers.insert(COOKIE, cookie);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&body).ok().and_then(|b| b.detail) {
            Some(serde_json::Value::String(detail)) => detail,
            Some(detail) => detail.to_string(),
            None if !body.is_empty() => body,
            None => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };

        Err(ApiError::Status { status: status.as_u16(), message })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.http.get(self.url(path)).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn sdk_token(&self) -> Result<SdkToken, ApiError> {
        tracing::trace!("API: spotify_sdk_token");
        self.get_json("spotify_sdk_token").await
    }

    pub async fn user_profile(&self) -> Result<UserProfile, ApiError> {
        log_api_request!("user_profile");
        let result: Result<UserProfile, ApiError> = self.get_json("user_profile").await;
        log_api_result!("user_profile", result);
        result
    }

    /// Client configuration overrides published by the backend
    pub async fn client_config(&self) -> Result<serde_json::Map<String, serde_json::Value>, ApiError> {
        log_api_request!("config");
        let result: Result<serde_json::Map<String, serde_json::Value>, ApiError> =
            self.get_json("config").await;
        log_api_result!("config", result);
        result
    }

    pub async fn recommendations(
        &self,
        track_name: &str,
        artist_name: &str,
        count: usize,
    ) -> Result<Vec<Track>, ApiError> {
        log_api_request!("recommendations", track_name, artist_name, count);
        let request = RecommendRequest {
            track_name,
            artist_name,
            num_recommendations: count,
        };
        let result: Result<RecommendResponse, ApiError> =
            self.post_json("recommendations", &request).await;
        log_api_result!("recommendations", result);
        Ok(result?.recommendations)
    }

    pub async fn feedback(&self, feedback: &FeedbackRequest) -> Result<(), ApiError> {
        log_api_request!("feedback", track_id = %feedback.track_id, rating = feedback.rating);
        let result: Result<serde_json::Value, ApiError> = self.post_json("feedback", feedback).await;
        log_api_result!("feedback", result);
        result.map(|_| ())
    }

    pub async fn playlists(&self) -> Result<PlaylistBuckets, ApiError> {
        log_api_request!("playlists");
        let result: Result<HashMap<String, Vec<PlaylistEntry>>, ApiError> =
            self.get_json("playlists").await;
        log_api_result!("playlists", result);
        Ok(PlaylistBuckets::from_raw(result?))
    }

    pub async fn remove_playlist_track(&self, bucket: u8, track_id: &str) -> Result<(), ApiError> {
        log_api_request!("remove_local_playlist_track", bucket, track_id);
        let request = RemoveTrackRequest {
            playlist_id: bucket.to_string(),
            track_id,
        };
        let result: Result<serde_json::Value, ApiError> =
            self.post_json("remove_local_playlist_track", &request).await;
        log_api_result!("remove_local_playlist_track", result);
        result.map(|_| ())
    }

    pub async fn add_playlist_track(&self, bucket: u8, track: &Track) -> Result<(), ApiError> {
        log_api_request!("add_track_to_local_playlist", bucket, track_id = %track.id);
        let request = AddTrackRequest {
            playlist_id: bucket.to_string(),
            track,
        };
        let result: Result<serde_json::Value, ApiError> =
            self.post_json("add_track_to_local_playlist", &request).await;
        log_api_result!("add_track_to_local_playlist", result);
        result.map(|_| ())
    }

    pub async fn reset_bandit(&self) -> Result<(), ApiError> {
        log_api_request!("reset_bandit");
        let response = self.http.post(self.url("reset_bandit")).send().await;
        let result = match response {
            Ok(response) => Self::check_status(response).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };
        log_api_result!("reset_bandit", result);
        result
    }
}

#[async_trait]
impl TokenProvider for RecommenderClient {
    async fn fetch_token(&self) -> Result<SdkToken, ApiError> {
        self.sdk_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(app: Router) -> RecommenderClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = BackendConfig {
            base_url: format!("http://{}/", addr),
            session_id: Some("abc123".to_string()),
            timeout_secs: 5,
        };
        RecommenderClient::new(&config).unwrap()
    }

    fn track_json(id: &str) -> Value {
        json!({
            "id": id,
            "name": format!("Song {}", id),
            "artist": "Band",
            "album_cover_url": "https://img/cover.jpg",
            "uri": format!("spotify:track:{}", id),
            "preview_url": format!("https://p.scdn.co/mp3-preview/{}", id),
        })
    }

    #[tokio::test]
    async fn sdk_token_defaults_product_type_to_free() {
        let app = Router::new().route(
            "/spotify_sdk_token",
            get(|| async { Json(json!({ "access_token": "BQD", "token_type": "Bearer" })) }),
        );
        let client = serve(app).await;

        let token = client.fetch_token().await.unwrap();
        assert_eq!(token.access_token, "BQD");
        assert_eq!(token.product_type, "free");
    }

    #[tokio::test]
    async fn session_cookie_is_sent() {
        let app = Router::new().route(
            "/user_profile",
            get(|headers: axum::http::HeaderMap| async move {
                let cookie = headers
                    .get("cookie")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "id": "u1", "display_name": cookie, "images": [] }))
            }),
        );
        let client = serve(app).await;

        let profile = client.user_profile().await.unwrap();
        assert_eq!(profile.name(), "session_id=abc123");
    }

    #[tokio::test]
    async fn recommendations_post_seed_and_count() {
        let seen = Arc::new(Mutex::new(Vec::<Value>::new()));
        let seen_in_handler = seen.clone();
        let app = Router::new().route(
            "/recommendations",
            post(move |Json(body): Json<Value>| {
                let seen = seen_in_handler.clone();
                async move {
                    seen.lock().unwrap().push(body);
                    Json(json!({ "recommendations": [track_json("a"), track_json("b")] }))
                }
            }),
        );
        let client = serve(app).await;

        let tracks = client.recommendations("Take On Me", "a-ha", 16).await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].uri.as_deref(), Some("spotify:track:b"));

        let body = seen.lock().unwrap()[0].clone();
        assert_eq!(body["track_name"], "Take On Me");
        assert_eq!(body["artist_name"], "a-ha");
        assert_eq!(body["num_recommendations"], 16);
    }

    #[tokio::test]
    async fn error_detail_becomes_message() {
        let app = Router::new().route(
            "/recommendations",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "detail": "Could not find any of the recommended tracks on Spotify." })),
                )
            }),
        );
        let client = serve(app).await;

        let err = client.recommendations("x", "y", 4).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("Could not find any"));
    }

    #[tokio::test]
    async fn feedback_sends_track_info() {
        let seen = Arc::new(Mutex::new(None::<Value>));
        let seen_in_handler = seen.clone();
        let app = Router::new().route(
            "/feedback",
            post(move |Json(body): Json<Value>| {
                let seen = seen_in_handler.clone();
                async move {
                    *seen.lock().unwrap() = Some(body);
                    Json(json!({ "message": "Feedback processed successfully" }))
                }
            }),
        );
        let client = serve(app).await;

        let track: Track = serde_json::from_value(track_json("t1")).unwrap();
        client
            .feedback(&FeedbackRequest {
                track_id: "t1".into(),
                rating: 4,
                seed_track_name: "Take On Me".into(),
                seed_artist_name: "a-ha".into(),
                track_info: Some(track),
            })
            .await
            .unwrap();

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["rating"], 4);
        assert_eq!(body["seed_artist_name"], "a-ha");
        assert_eq!(body["track_info"]["album_cover_url"], "https://img/cover.jpg");
    }

    #[tokio::test]
    async fn playlists_are_grouped_into_buckets() {
        let app = Router::new().route(
            "/playlists",
            get(|| async {
                Json(json!({
                    "0": [track_json("s")],
                    "4": [track_json("a"), "legacy-id-only"],
                    "5": [],
                }))
            }),
        );
        let client = serve(app).await;

        let buckets = client.playlists().await.unwrap();
        assert_eq!(buckets.bucket(0).len(), 1);
        assert_eq!(buckets.bucket(4).len(), 1);
        assert!(buckets.bucket(3).is_empty());
    }

    #[tokio::test]
    async fn reset_bandit_reports_auth_failure() {
        let app = Router::new().route(
            "/reset_bandit",
            post(|| async {
                (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "User not authenticated" })))
            }),
        );
        let client = serve(app).await;

        let err = client.reset_bandit().await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 401, .. }));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = BackendConfig {
            base_url: "not a url".into(),
            session_id: None,
            timeout_secs: 5,
        };
        assert!(RecommenderClient::new(&config).is_err());
    }
}
