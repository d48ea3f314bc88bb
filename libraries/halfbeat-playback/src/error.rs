//! Error types for the playback engine

use halfbeat_core::{CoreError, TrackId};
use std::time::Duration;
use thiserror::Error;

/// Playback errors
///
/// Collaborator failures never cross a component boundary as `CoreError`;
/// each async boundary converts them into one of these kinds.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Every resolution strategy was exhausted
    #[error("No playable source for track {0}")]
    NoPlayableSource(TrackId),

    /// The media backend rejected the source reference
    #[error("Failed to resolve playable URL: {0}")]
    Resolution(String),

    /// The media backend did not answer in time
    #[error("Resolution timed out after {0:?}")]
    ResolutionTimeout(Duration),

    /// The output resource rejected play or failed to decode
    #[error("Transport error: {0}")]
    Transport(String),

    /// A durable write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Track id not present in the track table
    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),

    /// Index out of bounds
    #[error("Index out of bounds: {index} (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PlaybackError {
    /// Whether this error should be shown to the user as a status message
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }
}

impl From<CoreError> for PlaybackError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Resolution(msg) | CoreError::Network(msg) => Self::Resolution(msg),
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for PlaybackError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
