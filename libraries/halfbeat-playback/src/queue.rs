//! Play queue
//!
//! An ordered list of track ids plus a pointer to the active entry. Track
//! data lives in [`crate::TrackLibrary`]; the queue only references it.
//!
//! The pointer is `Some` exactly when the queue is non-empty, and then
//! always points inside it.

use crate::error::{PlaybackError, Result};
use crate::types::PlayMode;
use halfbeat_core::TrackId;
use rand::Rng;

/// What happened to the active entry after [`Queue::remove`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The queue is now empty; playback should stop
    Emptied,

    /// The active entry was removed; the track now at this index should play
    ActiveReplaced(usize),

    /// Some other entry was removed; the pointer was shifted if needed
    Adjusted,
}

/// Ordered list of track ids with an active pointer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Queue {
    ids: Vec<TrackId>,
    current: Option<usize>,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole queue; the pointer moves to the first entry
    pub fn replace(&mut self, ids: Vec<TrackId>) {
        self.replace_at(ids, 0);
    }

    /// Replace the whole queue and point at `index` (clamped into range)
    pub fn replace_at(&mut self, ids: Vec<TrackId>, index: usize) {
        self.current = if ids.is_empty() {
            None
        } else {
            Some(index.min(ids.len() - 1))
        };
        self.ids = ids;
    }

    /// Place `id` right after the active entry and make it active
    ///
    /// An existing occurrence is moved rather than duplicated: it is taken
    /// out first and the id lands at the pre-removal `current + 1` (clamped
    /// to the end). Re-inserting the active track moves it one slot forward.
    /// On an empty queue the owning collection (or just `id`, when the
    /// collection is absent or lacks it) becomes the queue. Returns the new
    /// active index.
    pub fn insert_next(&mut self, id: TrackId, collection: Option<&[TrackId]>) -> usize {
        let Some(current) = self.current else {
            let ids = match collection {
                Some(ids) if ids.contains(&id) => ids.to_vec(),
                _ => vec![id.clone()],
            };
            let index = ids.iter().position(|t| *t == id).unwrap_or(0);
            self.replace_at(ids, index);
            return index;
        };

        if let Some(pos) = self.ids.iter().position(|t| *t == id) {
            self.ids.remove(pos);
        }

        let index = (current + 1).min(self.ids.len());
        self.ids.insert(index, id);
        self.current = Some(index);
        index
    }

    /// Move the entry at `from` to `to`; the pointer follows the active track
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.ids.len();
        for index in [from, to] {
            if index >= len {
                return Err(PlaybackError::IndexOutOfBounds { index, len });
            }
        }

        let moved = self.ids.remove(from);
        self.ids.insert(to, moved);

        if let Some(current) = self.current {
            self.current = Some(if current == from {
                to
            } else if from < current && to >= current {
                current - 1
            } else if from > current && to <= current {
                current + 1
            } else {
                current
            });
        }

        Ok(())
    }

    /// Remove the entry at `index`
    pub fn remove(&mut self, index: usize) -> Result<RemoveOutcome> {
        let len = self.ids.len();
        if index >= len {
            return Err(PlaybackError::IndexOutOfBounds { index, len });
        }

        self.ids.remove(index);

        if self.ids.is_empty() {
            self.current = None;
            return Ok(RemoveOutcome::Emptied);
        }

        let Some(current) = self.current else {
            self.current = Some(0);
            return Ok(RemoveOutcome::Adjusted);
        };

        if index == current {
            let next = index.min(self.ids.len() - 1);
            self.current = Some(next);
            Ok(RemoveOutcome::ActiveReplaced(next))
        } else {
            if index < current {
                self.current = Some(current - 1);
            }
            Ok(RemoveOutcome::Adjusted)
        }
    }

    /// Point at `index`
    pub fn select(&mut self, index: usize) -> Result<&TrackId> {
        let len = self.ids.len();
        let id = self
            .ids
            .get(index)
            .ok_or(PlaybackError::IndexOutOfBounds { index, len })?;
        self.current = Some(index);
        Ok(id)
    }

    /// Index `next` should move to, or `None` on an empty queue
    ///
    /// `Single` stays put, `Loop` wraps, `Random` is uniform over the whole
    /// queue and may pick the current entry again.
    pub fn next_index<R: Rng + ?Sized>(&self, mode: PlayMode, rng: &mut R) -> Option<usize> {
        let current = self.current?;
        let len = self.ids.len();
        Some(match mode {
            PlayMode::Single => current,
            PlayMode::Loop => (current + 1) % len,
            PlayMode::Random => rng.gen_range(0..len),
        })
    }

    /// Index `prev` should move to (wraps, independent of play mode)
    pub fn prev_index(&self) -> Option<usize> {
        let current = self.current?;
        let len = self.ids.len();
        Some((current + len - 1) % len)
    }

    pub fn ids(&self) -> &[TrackId] {
        &self.ids
    }

    pub fn get(&self, index: usize) -> Option<&TrackId> {
        self.ids.get(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_id(&self) -> Option<&TrackId> {
        self.current.and_then(|i| self.ids.get(i))
    }

    pub fn position_of(&self, id: &TrackId) -> Option<usize> {
        self.ids.iter().position(|t| t == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.ids.clear();
        self.current = None;
    }
}
