//! Track type
//!
//! A playable unit with display metadata, a resolvable remote source and a
//! per-track skip window.

use super::ids::TrackId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Track as stored by the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Library-unique identifier
    pub id: TrackId,

    /// External video/audio identifier (empty for manually added tracks)
    #[serde(default)]
    pub source_ref: String,

    /// Display title
    pub name: String,

    /// Display artist
    pub singer: String,

    /// Cover image URL (may be empty)
    #[serde(default)]
    pub cover: String,

    /// Last playable URL handed out for this track (ephemeral)
    #[serde(default)]
    pub stream_url: Option<String>,

    /// When `stream_url` stops working; `None` if unknown
    #[serde(default)]
    pub stream_url_expires_at: Option<DateTime<Utc>>,

    /// Trim start, in seconds
    #[serde(default)]
    pub skip_start: f64,

    /// Trim end, in seconds. `0` or `<= skip_start` means "play to the end".
    #[serde(default)]
    pub skip_end: f64,

    /// Lyric display offset, in seconds
    #[serde(default)]
    pub lyric_offset: f64,

    /// Last time the stored record changed
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Track {
    /// Create a track with no source and no trim
    pub fn new(id: impl Into<TrackId>, name: impl Into<String>, singer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_ref: String::new(),
            name: name.into(),
            singer: singer.into(),
            cover: String::new(),
            stream_url: None,
            stream_url_expires_at: None,
            skip_start: 0.0,
            skip_end: 0.0,
            lyric_offset: 0.0,
            updated_at: None,
        }
    }

    /// Builder: set the external source identifier
    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = source_ref.into();
        self
    }

    /// Builder: set a stream URL and its expiry
    pub fn with_stream(mut self, url: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        self.stream_url = Some(url.into());
        self.stream_url_expires_at = expires_at;
        self
    }

    /// Builder: set the skip window
    pub fn with_skip(mut self, start: f64, end: f64) -> Self {
        self.skip_start = start;
        self.skip_end = end;
        self
    }

    /// Whether the track can be resolved through the media backend
    pub fn has_source_ref(&self) -> bool {
        !self.source_ref.trim().is_empty()
    }

    /// Whether a trim end is set
    pub fn has_skip_end(&self) -> bool {
        self.skip_end > 0.0 && self.skip_end > self.skip_start
    }
}
