//! Core types for playback management

use halfbeat_core::Track;
use serde::{Deserialize, Serialize};

/// Play mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Repeat the active track
    Single,

    /// Advance sequentially, wrapping at the end
    #[default]
    Loop,

    /// Pick a uniformly random queue entry (may repeat the current one)
    Random,
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No track loaded
    Stopped,

    /// Resolving the source of a track that should start playing
    Loading,

    /// Currently playing
    Playing,

    /// Paused mid-track (or resolved but not started)
    Paused,
}

impl PlaybackState {
    /// Whether the user intends audio to be playing
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing | Self::Loading)
    }
}

/// Result of a request to play a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Source assigned and the transport started
    Started,

    /// Source assigned, playback left paused
    Ready,

    /// The transport rejected play; it will be retried on the next ready signal
    RetryScheduled {
        /// Consecutive failures recorded for the track so far
        attempts: u32,
    },

    /// Another track became active while this one was resolving; result dropped
    Superseded,
}

/// Where a resolved stream URL came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    /// Locally cached file (process-local, never persisted)
    LocalCache,

    /// The track's existing proxy URL was still valid
    Cached,

    /// Freshly issued by the media backend and persisted
    Fresh,
}

/// A track with a stream URL ready to hand to the output
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub track: Track,
    pub origin: SourceOrigin,
}

impl Resolved {
    /// The URL to assign to the output element
    pub fn url(&self) -> &str {
        self.track.stream_url.as_deref().unwrap_or_default()
    }
}

/// Trim window of a track, in seconds
///
/// `end == 0` (or `end <= start`) means "play to the natural duration".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SkipWindow {
    pub start: f64,
    pub end: f64,
}

impl SkipWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Window stored on a track
    pub fn of(track: &Track) -> Self {
        Self::new(track.skip_start, track.skip_end)
    }

    /// Whether an explicit trim end is set
    pub fn is_trimmed(&self) -> bool {
        self.end > 0.0 && self.end > self.start
    }

    /// Effective end for a track of the given natural duration
    ///
    /// Returns `None` when no trim is set and the duration is not known yet.
    pub fn effective_end(&self, duration: f64) -> Option<f64> {
        if self.is_trimmed() {
            Some(self.end)
        } else if duration.is_finite() && duration > 0.0 {
            Some(duration)
        } else {
            None
        }
    }

    /// Clamp a position into `[start, effective_end]`
    pub fn clamp(&self, position: f64, duration: f64) -> f64 {
        let position = if position.is_finite() { position } else { 0.0 };
        match self.effective_end(duration) {
            Some(end) if end >= self.start => position.clamp(self.start, end),
            _ => position.max(self.start),
        }
    }

    /// Length of the playable window
    pub fn length(&self, duration: f64) -> f64 {
        self.effective_end(duration)
            .map(|end| (end - self.start).max(0.0))
            .unwrap_or(0.0)
    }

    /// Progress inside the window, `0.0..=1.0`
    pub fn progress(&self, position: f64, duration: f64) -> f64 {
        let length = self.length(duration);
        if length <= 0.0 {
            return 0.0;
        }
        ((position - self.start) / length).clamp(0.0, 1.0)
    }

    /// Whether `position` has reached the trim end
    pub fn reached_end(&self, position: f64) -> bool {
        self.is_trimmed() && position >= self.end
    }
}
