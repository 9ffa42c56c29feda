//! Visible recommendation cards plus the reserve used to refill rated ones

use super::types::Track;

/// Seed the current recommendations were generated from
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Seed {
    pub track_name: String,
    pub artist_name: String,
}

impl Seed {
    /// Parse `track - artist` from the seed input bar.
    pub fn parse(input: &str) -> Option<Self> {
        let (track, artist) = input.split_once(" - ")?;
        let (track, artist) = (track.trim(), artist.trim());
        if track.is_empty() || artist.is_empty() {
            return None;
        }
        Some(Self {
            track_name: track.to_string(),
            artist_name: artist.to_string(),
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecommendationPool {
    seed: Option<Seed>,
    visible: Vec<Track>,
    reserve: Vec<Track>,
}

impl RecommendationPool {
    pub fn load(&mut self, seed: Seed, mut tracks: Vec<Track>, visible: usize) {
        let reserve = tracks.split_off(visible.min(tracks.len()));
        self.seed = Some(seed);
        self.visible = tracks;
        self.reserve = reserve;
    }

    /// Swap the rated card for the next reserve track, or drop it when the
    /// reserve is exhausted. Returns the rated track.
    ///
    /// Cards are found by id: earlier ratings may have shifted positions
    /// while this one was in flight.
    pub fn replace_rated(&mut self, track_id: &str) -> Option<Track> {
        let index = self.visible.iter().position(|t| t.id == track_id)?;

        if self.reserve.is_empty() {
            tracing::debug!(index, "Recommendation pool is empty, removing card");
            Some(self.visible.remove(index))
        } else {
            let replacement = self.reserve.remove(0);
            Some(std::mem::replace(&mut self.visible[index], replacement))
        }
    }

    pub fn seed(&self) -> Option<&Seed> {
        self.seed.as_ref()
    }

    pub fn visible(&self) -> &[Track] {
        &self.visible
    }

    pub fn reserve_len(&self) -> usize {
        self.reserve.len()
    }
}
