//! Half Beat - Streaming Playback Engine
//!
//! Drives a single shared audio output through a queue of tracks whose
//! playable locations are expiring, proxy-fronted URLs or locally cached
//! files.
//!
//! This crate provides:
//! - Shared output resource with reference counting and an optional
//!   loudness-compensation graph
//! - Source resolution (local cache, cached proxy URL, fresh URL)
//! - Play queue with insert-next, reorder and remove semantics
//! - Play modes (Single, Loop, Random)
//! - Per-track skip windows with debounced persistence
//! - Bounded retry of rejected starts
//!
//! # Architecture
//!
//! `halfbeat-playback` never touches a concrete audio API or database.
//! The host shell provides:
//! - [`AudioBackend`] to create the native element and gain chain
//! - The collaborator traits from `halfbeat-core` (media backend, cache,
//!   track store, play history, queue storage)
//!
//! Track data lives in one [`TrackLibrary`]; the queue and the active track
//! reference it by id.
//!
//! # Example: Queue and skip windows
//!
//! ```rust
//! use halfbeat_playback::{PlayMode, Queue, SkipWindow};
//! use halfbeat_core::TrackId;
//!
//! let mut queue = Queue::new();
//! queue.replace(vec![TrackId::new("a"), TrackId::new("b"), TrackId::new("c")]);
//! queue.select(1).unwrap();
//!
//! // An earlier occurrence is taken out; "a" lands at the old `current + 1`
//! queue.insert_next(TrackId::new("a"), None);
//! assert_eq!(queue.position_of(&TrackId::new("a")), Some(2));
//! assert_eq!(queue.current_id(), Some(&TrackId::new("a")));
//!
//! let mut rng = rand::thread_rng();
//! assert_eq!(queue.next_index(PlayMode::Loop, &mut rng), Some(0));
//!
//! // No trim end: play to the natural duration
//! let window = SkipWindow::new(12.0, 0.0);
//! assert_eq!(window.effective_end(180.0), Some(180.0));
//! ```
//!
//! # Example: Wiring a controller
//!
//! ```rust,no_run
//! use halfbeat_playback::{
//!     AudioBackend, EngineConfig, PlaybackController, PlaybackServices, SharedAudioResource,
//!     TrackLibrary,
//! };
//! use std::sync::Arc;
//!
//! async fn start(backend: Arc<dyn AudioBackend>, services: PlaybackServices) -> halfbeat_playback::Result<()> {
//!     let config = EngineConfig::load(None)?;
//!     let output = SharedAudioResource::new(backend);
//!     let library = Arc::new(TrackLibrary::new());
//!
//!     let controller = PlaybackController::new(&output, library, services, &config);
//!     controller.reload_library().await?;
//!     controller.restore_queue().await?;
//!     controller.play().await?;
//!
//!     for event in controller.drain_events() {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

mod controller;
mod debounce;
mod error;
mod events;
mod library;
mod queue;
mod resolver;
mod retry;
mod skip_window;
mod volume;

pub mod config;
pub mod output;
pub mod types;

// Public exports
pub use config::EngineConfig;
pub use controller::{PlaybackController, PlaybackServices};
pub use debounce::Debouncer;
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use library::TrackLibrary;
pub use output::{
    AudioBackend, AudioElement, GraphCapability, OutputError, OutputEvent, OutputHandle,
    ProcessingGraph, RuntimeSignature, SharedAudioResource,
};
pub use queue::{Queue, RemoveOutcome};
pub use resolver::{SourceResolver, UrlKind, UrlPolicy};
pub use retry::{RetryDecision, RetryLedger};
pub use skip_window::{SkipEditKind, SkipWindowEditor};
pub use types::{PlayMode, PlayOutcome, PlaybackState, Resolved, SkipWindow, SourceOrigin};
pub use volume::Volume;
