//! Rating buckets kept by the backend (0 = skipped, 1-5 = stars)

use std::collections::HashMap;
use serde::Deserialize;

use super::types::Track;

pub const BUCKET_COUNT: u8 = 6;

/// One stored playlist entry. Older backends stored bare track ids.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum PlaylistEntry {
    Track(Track),
    Id(String),
}

#[derive(Clone, Debug, Default)]
pub struct PlaylistBuckets {
    buckets: Vec<Vec<Track>>,
}

impl PlaylistBuckets {
    pub fn from_raw(raw: HashMap<String, Vec<PlaylistEntry>>) -> Self {
        let mut buckets = vec![Vec::new(); BUCKET_COUNT as usize];

        for (key, entries) in raw {
            let Some(index) = key.parse::<u8>().ok().filter(|i| *i < BUCKET_COUNT) else {
                tracing::debug!(bucket = %key, "Ignoring unknown playlist bucket");
                continue;
            };

            for entry in entries {
                match entry {
                    PlaylistEntry::Track(track) => buckets[index as usize].push(track),
                    PlaylistEntry::Id(id) => {
                        tracing::debug!(bucket = index, track_id = %id, "Skipping id-only playlist entry");
                    }
                }
            }
        }

        Self { buckets }
    }

    pub fn bucket(&self, index: u8) -> &[Track] {
        self.buckets
            .get(index as usize)
            .map(|b| b.as_slice())
            .unwrap_or(&[])
    }

    pub fn remove(&mut self, index: u8, track_id: &str) -> bool {
        let Some(bucket) = self.buckets.get_mut(index as usize) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|t| t.id != track_id);
        bucket.len() < before
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> PlaylistEntry {
        PlaylistEntry::Track(Track {
            id: id.to_string(),
            name: id.to_uppercase(),
            artist: "Artist".to_string(),
            artwork_url: None,
            uri: None,
            preview_url: None,
        })
    }

    #[test]
    fn unknown_keys_and_bare_ids_are_dropped() {
        let mut raw = HashMap::new();
        raw.insert("2".to_string(), vec![entry("a"), PlaylistEntry::Id("b".into())]);
        raw.insert("9".to_string(), vec![entry("c")]);
        raw.insert("liked".to_string(), vec![entry("d")]);

        let buckets = PlaylistBuckets::from_raw(raw);
        assert_eq!(buckets.bucket(2).len(), 1);
        assert_eq!(buckets.total(), 1);
        assert!(buckets.bucket(9).is_empty());
    }

    #[test]
    fn remove_reports_whether_track_was_present() {
        let mut raw = HashMap::new();
        raw.insert("5".to_string(), vec![entry("a"), entry("b")]);
        let mut buckets = PlaylistBuckets::from_raw(raw);

        assert!(buckets.remove(5, "a"));
        assert!(!buckets.remove(5, "a"));
        assert!(!buckets.remove(7, "b"));
        assert_eq!(buckets.bucket(5)[0].id, "b");
    }
}
