//! Collaborator contracts consumed by the playback engine
//!
//! The host shell implements these against the backend services (stream
//! proxy, download manager, database). All of them are async and object
//! safe so the engine can hold them as `Arc<dyn Trait>`.

use crate::error::Result;
use crate::types::{SavedPlaylist, StreamGrant, Track, TrackId};
use async_trait::async_trait;

/// Media resolution service
///
/// Turns an external source reference into a fresh proxied URL.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Request a new playable URL for `source_ref`
    ///
    /// # Errors
    /// Returns `CoreError::Resolution` when the source is invalid or unavailable
    async fn playable_url(&self, source_ref: &str) -> Result<StreamGrant>;
}

/// Local cache service (passive cache + explicit downloads)
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// URL of the locally cached file for a track, if one exists
    async fn local_url(&self, id: &TrackId) -> Result<Option<String>>;

    /// Whether the track has been explicitly downloaded
    async fn is_downloaded(&self, id: &TrackId) -> Result<bool>;
}

/// Durable track storage
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Insert or update tracks by id
    async fn upsert(&self, tracks: &[Track]) -> Result<()>;

    /// Load every stored track, in library order
    async fn list_all(&self) -> Result<Vec<Track>>;
}

/// Play-history sink
#[async_trait]
pub trait PlayHistorySink: Send + Sync {
    /// Record that a track started playing from a collection (`""` when none)
    async fn record(&self, collection_id: &str, id: &TrackId) -> Result<()>;
}

/// Queue persistence
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Save the queue order and the current position
    async fn save(&self, track_ids: &[TrackId], current_index: usize) -> Result<()>;

    /// Load the last saved queue (empty when nothing was saved)
    async fn load(&self) -> Result<SavedPlaylist>;
}
