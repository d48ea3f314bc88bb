//! Playback events
//!
//! The controller queues events as state changes; the host drains them with
//! [`crate::PlaybackController::drain_events`] to keep its views in sync.

use crate::types::{PlayMode, PlaybackState};
use halfbeat_core::TrackId;
use serde::{Deserialize, Serialize};

/// Events emitted by the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Playback state changed
    StateChanged { state: PlaybackState },

    /// A different track became active
    TrackChanged {
        track_id: TrackId,
        previous_track_id: Option<TrackId>,
    },

    /// Position update from the output
    PositionUpdate { position_secs: f64, duration_secs: f64 },

    /// Volume or mute changed
    VolumeChanged {
        /// Level (0.0 - 1.0)
        level: f32,
        is_muted: bool,
    },

    PlayModeChanged { mode: PlayMode },

    /// Queue contents or pointer changed
    QueueChanged {
        length: usize,
        current_index: Option<usize>,
    },

    /// Track data changed (for instance its skip window)
    TrackUpdated { track_id: TrackId },

    /// Whether the active track has an explicit download
    DownloadStateChanged { track_id: TrackId, downloaded: bool },

    /// Human-readable status line
    Status { message: String },

    /// Playback failed
    Error {
        track_id: Option<TrackId>,
        message: String,
        /// No further automatic retries will happen
        fatal: bool,
    },
}
