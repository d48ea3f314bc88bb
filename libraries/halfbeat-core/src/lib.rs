//! Half Beat Core
//!
//! Platform-agnostic domain types, collaborator traits, and error handling
//! shared by the Half Beat playback engine and its host shell.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `Collection`, `StreamGrant`
//! - **Collaborator Traits**: `MediaResolver`, `LocalCache`, `TrackStore`,
//!   `PlayHistorySink`, `PlaylistStore`
//! - **Error Handling**: `CoreError` and `Result`
//!
//! The host shell implements the traits (backend bindings, database, disk
//! cache); the engine only ever talks to them through these contracts.
//!
//! # Example
//!
//! ```rust
//! use halfbeat_core::{Track, TrackId};
//!
//! let track = Track::new("song-1", "Tomorin", "MyGO").with_source_ref("BV1xx411c7mD");
//! assert_eq!(track.id, TrackId::new("song-1"));
//! assert!(track.has_source_ref());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{CoreError, Result};
pub use traits::{LocalCache, MediaResolver, PlayHistorySink, PlaylistStore, TrackStore};
pub use types::{Collection, SavedPlaylist, StreamGrant, Track, TrackId};
