//! Ordered playback queue with position bookkeeping

use rand::Rng;

use crate::error::PlaybackError;
use super::types::Track;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// The active playlist and the position inside it.
///
/// `current` is `None` only before the first track of a freshly replaced
/// queue is selected; afterwards it always points inside `tracks`.
#[derive(Clone, Debug, Default)]
pub struct TrackQueue {
    tracks: Vec<Track>,
    current: Option<usize>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.current = None;
    }

    pub fn set_current(&mut self, index: usize) -> Result<(), PlaybackError> {
        if self.tracks.is_empty() {
            return Ok(());
        }
        if index >= self.tracks.len() {
            return Err(PlaybackError::IndexOutOfRange { index, len: self.tracks.len() });
        }
        self.current = Some(index);
        Ok(())
    }

    /// Move to the next/previous track and return the new index.
    pub fn advance(&mut self, direction: Direction, shuffle: bool) -> Option<usize> {
        self.advance_with(direction, shuffle, &mut rand::thread_rng())
    }

    pub fn advance_with<R: Rng + ?Sized>(
        &mut self,
        direction: Direction,
        shuffle: bool,
        rng: &mut R,
    ) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        // Shuffle may land on the track that is already current
        let index = if shuffle {
            rng.gen_range(0..len)
        } else {
            match (direction, self.current) {
                (Direction::Next, None) => 0,
                (Direction::Next, Some(i)) => (i + 1) % len,
                (Direction::Previous, None) | (Direction::Previous, Some(0)) => len - 1,
                (Direction::Previous, Some(i)) => i - 1,
            }
        };

        self.current = Some(index);
        Some(index)
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn is_last(&self) -> bool {
        matches!(self.current, Some(i) if i + 1 == self.tracks.len())
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Track {}", id),
            artist: "Artist".to_string(),
            artwork_url: None,
            uri: Some(format!("spotify:track:{}", id)),
            preview_url: None,
        }
    }

    fn queue_of(n: usize) -> TrackQueue {
        let mut queue = TrackQueue::new();
        queue.replace((0..n).map(|i| track(&i.to_string())).collect());
        queue
    }

    #[test]
    fn replace_resets_selection() {
        let mut queue = queue_of(3);
        queue.set_current(2).unwrap();
        queue.replace(vec![track("x")]);
        assert_eq!(queue.current_index(), None);
        assert!(queue.current().is_none());
    }

    #[test]
    fn set_current_rejects_out_of_range() {
        let mut queue = queue_of(2);
        let err = queue.set_current(2).unwrap_err();
        assert!(matches!(err, PlaybackError::IndexOutOfRange { index: 2, len: 2 }));
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn set_current_on_empty_queue_is_noop() {
        let mut queue = TrackQueue::new();
        assert!(queue.set_current(5).is_ok());
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn next_cycles_through_three_tracks() {
        let mut queue = queue_of(3);
        queue.set_current(0).unwrap();
        assert_eq!(queue.advance(Direction::Next, false), Some(1));
        assert_eq!(queue.advance(Direction::Next, false), Some(2));
        assert_eq!(queue.advance(Direction::Next, false), Some(0));
        assert_eq!(queue.advance(Direction::Next, false), Some(1));
        assert_eq!(queue.current().map(|t| t.id.as_str()), Some("1"));
    }

    #[test]
    fn next_applied_len_times_returns_to_start() {
        for len in 1..8 {
            for start in 0..len {
                let mut queue = queue_of(len);
                queue.set_current(start).unwrap();
                for _ in 0..len {
                    queue.advance(Direction::Next, false);
                }
                assert_eq!(queue.current_index(), Some(start), "len={} start={}", len, start);
            }
        }
    }

    #[test]
    fn previous_undoes_next() {
        for len in 1..8 {
            for start in 0..len {
                let mut queue = queue_of(len);
                queue.set_current(start).unwrap();
                queue.advance(Direction::Next, false);
                assert_eq!(queue.advance(Direction::Previous, false), Some(start));

                queue.advance(Direction::Previous, false);
                assert_eq!(queue.advance(Direction::Next, false), Some(start));
            }
        }
    }

    #[test]
    fn previous_wraps_from_first_to_last() {
        let mut queue = queue_of(4);
        queue.set_current(0).unwrap();
        assert_eq!(queue.advance(Direction::Previous, false), Some(3));
    }

    #[test]
    fn advance_without_selection_starts_at_either_end() {
        let mut queue = queue_of(4);
        assert_eq!(queue.advance(Direction::Next, false), Some(0));

        let mut queue = queue_of(4);
        assert_eq!(queue.advance(Direction::Previous, false), Some(3));
    }

    #[test]
    fn advance_on_empty_queue_yields_none() {
        let mut queue = TrackQueue::new();
        assert_eq!(queue.advance(Direction::Next, false), None);
        assert_eq!(queue.advance(Direction::Previous, false), None);
        assert_eq!(queue.advance(Direction::Next, true), None);
    }

    #[test]
    fn shuffle_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut queue = queue_of(5);
        queue.set_current(0).unwrap();
        for _ in 0..200 {
            let index = queue.advance_with(Direction::Next, true, &mut rng).unwrap();
            assert!(index < 5);
            assert_eq!(queue.current_index(), Some(index));
        }
    }

    #[test]
    fn is_last_tracks_the_final_position() {
        let mut queue = queue_of(2);
        assert!(!queue.is_last());
        queue.set_current(1).unwrap();
        assert!(queue.is_last());
    }
}
