//! Seed submission, recommendation ratings and rating buckets

use crate::model::{ActiveSection, FeedbackRequest, Seed, SidebarItem};
use super::AppController;

impl AppController {
    pub async fn submit_seed(&self) {
        let input = self.model.lock().await.seed_input().await;
        let Some(seed) = Seed::parse(&input) else {
            self.show_error("Enter a seed as: track - artist".to_string()).await;
            return;
        };

        tracing::debug!(track = %seed.track_name, artist = %seed.artist_name, "Requesting recommendations");
        self.model.lock().await.set_content_loading(true).await;

        match self
            .client
            .recommendations(&seed.track_name, &seed.artist_name, self.recommendations.count)
            .await
        {
            Ok(tracks) if tracks.is_empty() => {
                let model = self.model.lock().await;
                model.set_content_loading(false).await;
                model.set_error("No recommendations found for this seed.".to_string()).await;
            }
            Ok(tracks) => {
                tracing::info!(count = tracks.len(), "Recommendations loaded");
                let model = self.model.lock().await;
                model.set_recommendations(seed, tracks, self.recommendations.visible).await;
                model.set_active_section(ActiveSection::MainContent).await;
            }
            Err(e) => {
                let model = self.model.lock().await;
                model.set_content_loading(false).await;
                model.set_error(Self::format_error(&e)).await;
            }
        }
    }

    pub async fn open_sidebar_item(&self) {
        let model = self.model.lock().await;
        let Some(item) = model.selected_sidebar_item().await else {
            return;
        };
        model.show_view(item).await;
        model.set_active_section(ActiveSection::MainContent).await;
        drop(model);

        if let SidebarItem::Bucket(_) = item {
            self.load_buckets().await;
        }
    }

    pub async fn load_buckets(&self) {
        match self.client.playlists().await {
            Ok(buckets) => {
                tracing::debug!(total = buckets.total(), "Rating buckets loaded");
                self.model.lock().await.set_buckets(buckets).await;
            }
            Err(e) => self.show_error(Self::format_error(&e)).await,
        }
    }

    /// Rate the selected recommendation and replace its card on success.
    pub async fn rate_selected(&self, rating: u8) {
        let (track, seed) = {
            let model = self.model.lock().await;
            let content = model.get_content_state().await;
            if content.view != SidebarItem::Recommendations {
                return;
            }
            let (Some(track), Some(seed)) = (content.selected_track().cloned(), content.recommendations.seed().cloned())
            else {
                return;
            };
            (track, seed)
        };

        let feedback = FeedbackRequest {
            track_id: track.id.clone(),
            rating,
            seed_track_name: seed.track_name,
            seed_artist_name: seed.artist_name,
            track_info: Some(track.clone()),
        };

        match self.client.feedback(&feedback).await {
            Ok(()) => {
                tracing::info!(track_id = %track.id, rating, "Feedback sent");
                let model = self.model.lock().await;
                model.replace_rated(&track.id).await;
                model.set_status(format!("Rated \"{}\" {}", track.name, rating)).await;
                drop(model);
                self.load_buckets().await;
            }
            Err(e) => self.show_error(Self::format_error(&e)).await,
        }
    }

    pub async fn remove_selected_from_bucket(&self) {
        let (bucket, track) = {
            let model = self.model.lock().await;
            let content = model.get_content_state().await;
            let SidebarItem::Bucket(bucket) = content.view else {
                return;
            };
            let Some(track) = content.selected_track().cloned() else {
                return;
            };
            (bucket, track)
        };

        match self.client.remove_playlist_track(bucket, &track.id).await {
            Ok(()) => {
                let model = self.model.lock().await;
                model.remove_from_bucket(bucket, &track.id).await;
                model.set_status(format!("Removed \"{}\"", track.name)).await;
            }
            Err(e) => self.show_error(Self::format_error(&e)).await,
        }
    }

    /// Move the selected track into another rating bucket.
    pub async fn move_selected_to_bucket(&self, target: u8) {
        let (source, track) = {
            let model = self.model.lock().await;
            let content = model.get_content_state().await;
            let SidebarItem::Bucket(source) = content.view else {
                return;
            };
            let Some(track) = content.selected_track().cloned() else {
                return;
            };
            (source, track)
        };
        if source == target {
            return;
        }

        let result = match self.client.add_playlist_track(target, &track).await {
            Ok(()) => self.client.remove_playlist_track(source, &track.id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.model
                    .lock()
                    .await
                    .set_status(format!("Moved \"{}\" to {}", track.name, SidebarItem::Bucket(target).label()))
                    .await;
                self.load_buckets().await;
            }
            Err(e) => self.show_error(Self::format_error(&e)).await,
        }
    }

    pub async fn reset_bandit(&self) {
        match self.client.reset_bandit().await {
            Ok(()) => {
                tracing::info!("Bandit model reset");
                self.model.lock().await.set_status("Bandit model reset").await;
            }
            Err(e) => self.show_error(Self::format_error(&e)).await,
        }
    }
}
