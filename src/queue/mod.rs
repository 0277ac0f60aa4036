//! Ordered, circularly navigable playlist with a single cursor
//!
//! `next()` and `previous()` always wrap around, while `has_next()` and
//! `has_previous()` only report linear neighbours. The predicates are meant
//! for UI affordances and never gate navigation.

use crate::catalog::Track;
use thiserror::Error;


/// Errors raised by cursor moves
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Track not found in queue: {0}")]
    NotFound(String),
    #[error("Index {index} out of bounds for queue of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Playback order plus cursor. Track content is never mutated after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Queue {
    tracks: Vec<Track>,
    /// Meaningful only while `tracks` is non-empty
    current_index: usize,
}

impl Queue {
    /// Creates a queue in insertion order with the cursor on the first track.
    pub fn new(tracks: Vec<Track>) -> Self {
        Queue { tracks, current_index: 0 }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Cursor position, `None` when the queue is empty.
    pub fn current_index(&self) -> Option<usize> {
        if self.tracks.is_empty() {
            None
        } else {
            Some(self.current_index)
        }
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    /// Advances the cursor, wrapping from the last track to the first.
    pub fn next(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        self.current_index = (self.current_index + 1) % self.tracks.len();
        self.current()
    }

    /// Retreats the cursor, wrapping from the first track to the last.
    pub fn previous(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        let len = self.tracks.len();
        self.current_index = (self.current_index + len - 1) % len;
        self.current()
    }

    /// Moves the cursor to the first track equal to `track`.
    pub fn jump_to(&mut self, track: &Track) -> Result<usize, QueueError> {
        let index = self.index_of(track).ok_or_else(|| QueueError::NotFound(track.id.clone()))?;
        self.current_index = index;
        Ok(index)
    }

    pub fn jump_to_index(&mut self, index: usize) -> Result<&Track, QueueError> {
        if index >= self.tracks.len() {
            return Err(QueueError::IndexOutOfBounds { index, len: self.tracks.len() });
        }
        self.current_index = index;
        Ok(&self.tracks[index])
    }

    pub fn index_of(&self, track: &Track) -> Option<usize> {
        self.tracks.iter().position(|t| t == track)
    }

    pub fn contains(&self, track: &Track) -> bool {
        self.index_of(track).is_some()
    }

    /// Whether a track exists after the cursor without wrapping.
    pub fn has_next(&self) -> bool {
        !self.tracks.is_empty() && self.current_index < self.tracks.len() - 1
    }

    /// Whether a track exists before the cursor without wrapping.
    pub fn has_previous(&self) -> bool {
        !self.tracks.is_empty() && self.current_index > 0
    }
}

impl From<Vec<Track>> for Queue {
    fn from(tracks: Vec<Track>) -> Self {
        Queue::new(tracks)
    }
}
