//! Collections and persisted queue state

use super::ids::TrackId;
use serde::{Deserialize, Serialize};

/// A user collection (favorite list) that owns tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection identifier, recorded with play history
    pub id: String,

    /// Member tracks, in display order
    pub track_ids: Vec<TrackId>,
}

impl Collection {
    /// Create a collection
    pub fn new(id: impl Into<String>, track_ids: Vec<TrackId>) -> Self {
        Self {
            id: id.into(),
            track_ids,
        }
    }

    /// Check whether the collection contains a track
    pub fn contains(&self, id: &TrackId) -> bool {
        self.track_ids.contains(id)
    }
}

/// Queue state as last saved by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPlaylist {
    /// Queue order
    pub track_ids: Vec<TrackId>,

    /// Index of the active entry
    pub current_index: usize,
}
