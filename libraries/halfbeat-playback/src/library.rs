//! In-memory track table
//!
//! The single source of truth for track data during a session. The queue,
//! the active track and collection views all reference tracks by id and
//! read them from here, so an edit is visible everywhere at once.

use halfbeat_core::{Track, TrackId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Table {
    tracks: HashMap<TrackId, Track>,
    /// Library order (insertion order of first appearance)
    order: Vec<TrackId>,
}

/// Shared, indexed track table
#[derive(Debug, Default)]
pub struct TrackLibrary {
    table: RwLock<Table>,
}

impl TrackLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a library from tracks in library order
    pub fn with_tracks(tracks: Vec<Track>) -> Self {
        let library = Self::new();
        library.replace_all(tracks);
        library
    }

    fn read(&self) -> RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole table (later duplicates win)
    pub fn replace_all(&self, tracks: Vec<Track>) {
        let mut table = self.write();
        table.tracks.clear();
        table.order.clear();
        for track in tracks {
            if !table.tracks.contains_key(&track.id) {
                table.order.push(track.id.clone());
            }
            table.tracks.insert(track.id.clone(), track);
        }
    }

    /// Insert or replace a track
    pub fn upsert(&self, track: Track) {
        let mut table = self.write();
        if !table.tracks.contains_key(&track.id) {
            table.order.push(track.id.clone());
        }
        table.tracks.insert(track.id.clone(), track);
    }

    /// Edit a track in place; returns the updated copy
    pub fn update<F>(&self, id: &TrackId, edit: F) -> Option<Track>
    where
        F: FnOnce(&mut Track),
    {
        let mut table = self.write();
        let track = table.tracks.get_mut(id)?;
        edit(track);
        Some(track.clone())
    }

    pub fn get(&self, id: &TrackId) -> Option<Track> {
        self.read().tracks.get(id).cloned()
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.read().tracks.contains_key(id)
    }

    /// Every track in library order
    pub fn all(&self) -> Vec<Track> {
        let table = self.read();
        table
            .order
            .iter()
            .filter_map(|id| table.tracks.get(id).cloned())
            .collect()
    }

    /// Keep only ids present in the table, preserving order
    pub fn known(&self, ids: &[TrackId]) -> Vec<TrackId> {
        let table = self.read();
        ids.iter()
            .filter(|id| table.tracks.contains_key(*id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().tracks.is_empty()
    }
}
