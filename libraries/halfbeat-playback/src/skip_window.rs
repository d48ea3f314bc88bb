//! Skip window editing
//!
//! Edits land in the shared [`TrackLibrary`] immediately, so the queue, the
//! active track and collection views all see them at once. A process-local
//! mirror keeps the latest values until the durable write succeeds, and the
//! durable write itself is debounced per `(kind, track)`.

use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::error::{PlaybackError, Result};
use crate::library::TrackLibrary;
use crate::types::SkipWindow;
use halfbeat_core::{Track, TrackId, TrackStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Which part of the window an edit touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipEditKind {
    Interval,
    Start,
    End,
}

impl SkipEditKind {
    const ALL: [Self; 3] = [Self::Interval, Self::Start, Self::End];
}

type Mirror = Arc<Mutex<HashMap<TrackId, SkipWindow>>>;

pub struct SkipWindowEditor {
    library: Arc<TrackLibrary>,
    store: Arc<dyn TrackStore>,
    writes: Debouncer<(SkipEditKind, TrackId)>,
    mirror: Mirror,
    /// Rounding resolution, in steps per second
    steps_per_sec: f64,
}

impl SkipWindowEditor {
    pub fn new(library: Arc<TrackLibrary>, store: Arc<dyn TrackStore>, config: &EngineConfig) -> Self {
        let steps_per_sec = (1.0 / config.persistence.skip_tick_secs).round().max(1.0);
        Self {
            library,
            store,
            writes: Debouncer::new(config.skip_write_debounce()),
            mirror: Arc::new(Mutex::new(HashMap::new())),
            steps_per_sec,
        }
    }

    /// Round a position to the editing resolution
    pub fn round(&self, secs: f64) -> f64 {
        if !secs.is_finite() || secs <= 0.0 {
            return 0.0;
        }
        (secs * self.steps_per_sec).round() / self.steps_per_sec
    }

    /// Set both ends of the window
    pub fn set_window(&self, id: &TrackId, start: f64, end: f64) -> Result<Track> {
        let window = SkipWindow::new(self.round(start), self.round(end));
        self.apply(id, SkipEditKind::Interval, |_| window)
    }

    /// Set the start, keeping the end
    pub fn set_start(&self, id: &TrackId, start: f64) -> Result<Track> {
        let start = self.round(start);
        self.apply(id, SkipEditKind::Start, |w| SkipWindow::new(start, w.end))
    }

    /// Set the end, keeping the start (`0` clears the trim)
    pub fn set_end(&self, id: &TrackId, end: f64) -> Result<Track> {
        let end = self.round(end);
        self.apply(id, SkipEditKind::End, |w| SkipWindow::new(w.start, end))
    }

    fn apply<F>(&self, id: &TrackId, kind: SkipEditKind, edit: F) -> Result<Track>
    where
        F: FnOnce(SkipWindow) -> SkipWindow,
    {
        let current = self
            .library
            .get(id)
            .ok_or_else(|| PlaybackError::UnknownTrack(id.clone()))?;
        let before = SkipWindow::of(&current);
        let window = edit(before);

        if window == before && !self.has_pending_write(id) {
            debug!(track_id = %id, "Skip window unchanged");
            return Ok(current);
        }

        let updated = self
            .library
            .update(id, |track| {
                track.skip_start = window.start;
                track.skip_end = window.end;
            })
            .ok_or_else(|| PlaybackError::UnknownTrack(id.clone()))?;

        lock(&self.mirror).insert(id.clone(), window);
        self.schedule_write(kind, id.clone());

        debug!(track_id = %id, start = window.start, end = window.end, ?kind, "Skip window edited");
        Ok(updated)
    }

    fn schedule_write(&self, kind: SkipEditKind, id: TrackId) {
        let library = Arc::clone(&self.library);
        let store = Arc::clone(&self.store);
        let mirror = Arc::clone(&self.mirror);
        let track_id = id.clone();

        self.writes.schedule((kind, id), move || async move {
            // Write whatever is current, not the value at scheduling time
            let Some(track) = library.get(&track_id) else {
                return;
            };
            let written = SkipWindow::of(&track);

            match store.upsert(std::slice::from_ref(&track)).await {
                Ok(()) => {
                    let mut mirror = lock(&mirror);
                    if mirror.get(&track_id) == Some(&written) {
                        mirror.remove(&track_id);
                    }
                    debug!(track_id = %track_id, "Skip window persisted");
                }
                Err(e) => {
                    let err = PlaybackError::Persistence(e.to_string());
                    warn!(track_id = %track_id, error = %err, "Failed to persist skip window");
                }
            }
        });
    }

    pub fn has_pending_write(&self, id: &TrackId) -> bool {
        SkipEditKind::ALL
            .iter()
            .any(|kind| self.writes.is_pending(&(*kind, id.clone())))
    }

    /// Unpersisted window for a track, if any
    pub fn mirrored(&self, id: &TrackId) -> Option<SkipWindow> {
        lock(&self.mirror).get(id).copied()
    }

    /// Overlay unpersisted windows onto tracks loaded from the store
    pub fn apply_mirror(&self, tracks: &mut [Track]) {
        let mirror = lock(&self.mirror);
        for track in tracks.iter_mut() {
            if let Some(window) = mirror.get(&track.id) {
                track.skip_start = window.start;
                track.skip_end = window.end;
            }
        }
    }

    /// Reload the library from the store, keeping unpersisted edits
    pub async fn reload_library(&self) -> Result<usize> {
        let mut tracks = self.store.list_all().await?;
        self.apply_mirror(&mut tracks);
        let count = tracks.len();
        self.library.replace_all(tracks);
        debug!(count, "Track library reloaded");
        Ok(count)
    }
}

impl std::fmt::Debug for SkipWindowEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipWindowEditor")
            .field("steps_per_sec", &self.steps_per_sec)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
