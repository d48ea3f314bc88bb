//! Playback controller
//!
//! Owns the playback session and is the only component that issues
//! transport commands to the shared output. Every public verb takes `&self`;
//! the session lock is only held between suspension points, never across an
//! `.await`.
//!
//! Track switches bump a generation counter. A resolution that finishes
//! after another switch sees a different generation and is dropped, so a
//! slow URL refresh can never overwrite a newer selection.

use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::library::TrackLibrary;
use crate::output::{OutputEvent, OutputHandle, SharedAudioResource};
use crate::queue::{Queue, RemoveOutcome};
use crate::resolver::SourceResolver;
use crate::retry::{RetryDecision, RetryLedger};
use crate::skip_window::SkipWindowEditor;
use crate::types::{PlayMode, PlayOutcome, PlaybackState, SkipWindow, SourceOrigin};
use crate::volume::Volume;
use halfbeat_core::{
    Collection, LocalCache, MediaResolver, PlayHistorySink, PlaylistStore, Track, TrackId,
    TrackStore,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Collaborators supplied by the host
#[derive(Clone)]
pub struct PlaybackServices {
    pub media: Arc<dyn MediaResolver>,
    pub cache: Arc<dyn LocalCache>,
    pub tracks: Arc<dyn TrackStore>,
    pub history: Arc<dyn PlayHistorySink>,
    pub playlists: Arc<dyn PlaylistStore>,
}

#[derive(Debug, Clone)]
struct ActiveTrack {
    id: TrackId,
    /// URL assigned to the output; `None` while resolving
    url: Option<String>,
}

struct Session {
    queue: Queue,
    active: Option<ActiveTrack>,
    state: PlaybackState,
    progress: f64,
    duration: f64,
    volume: Volume,
    play_mode: PlayMode,
    /// Collection the queue was started from
    collection_id: Option<String>,
    generation: u64,
    retries: RetryLedger,
    /// Waiting for the next `CanPlay` to retry a rejected start
    retry_pending: bool,
    status: Option<String>,
    /// Active track has an explicit download
    downloaded: bool,
    pending_events: Vec<PlaybackEvent>,
    rng: StdRng,
}

impl Session {
    fn emit(&mut self, event: PlaybackEvent) {
        self.pending_events.push(event);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.emit(PlaybackEvent::StateChanged { state });
        }
    }

    fn set_status(&mut self, message: String) {
        self.status = Some(message.clone());
        self.emit(PlaybackEvent::Status { message });
    }

    fn fail(&mut self, track_id: Option<TrackId>, err: &PlaybackError, fatal: bool) {
        if err.is_user_visible() {
            self.set_status(err.to_string());
        }
        self.emit(PlaybackEvent::Error {
            track_id,
            message: err.to_string(),
            fatal,
        });
    }

    fn set_downloaded(&mut self, id: &TrackId, downloaded: bool) {
        if self.downloaded != downloaded {
            self.downloaded = downloaded;
            self.emit(PlaybackEvent::DownloadStateChanged {
                track_id: id.clone(),
                downloaded,
            });
        }
    }

    fn queue_changed(&mut self) {
        let event = PlaybackEvent::QueueChanged {
            length: self.queue.len(),
            current_index: self.queue.current_index(),
        };
        self.emit(event);
    }

    fn volume_changed(&mut self) {
        let event = PlaybackEvent::VolumeChanged {
            level: self.volume.level(),
            is_muted: self.volume.is_muted(),
        };
        self.emit(event);
    }

    /// Make `id` the active track and start a new generation
    fn activate(&mut self, id: &TrackId) -> u64 {
        self.generation += 1;
        self.retries.clear(id);
        self.retry_pending = false;
        self.progress = 0.0;
        self.duration = 0.0;

        let previous = self
            .active
            .replace(ActiveTrack {
                id: id.clone(),
                url: None,
            })
            .map(|a| a.id);

        if previous.as_ref() != Some(id) {
            self.emit(PlaybackEvent::TrackChanged {
                track_id: id.clone(),
                previous_track_id: previous,
            });
        }
        self.generation
    }

    /// Active track whose source has been assigned to the output
    fn assigned(&self) -> Option<(TrackId, String)> {
        let active = self.active.as_ref()?;
        let url = active.url.clone()?;
        Some((active.id.clone(), url))
    }
}

/// Drives the shared output through a queue of tracks
pub struct PlaybackController {
    output: OutputHandle,
    library: Arc<TrackLibrary>,
    resolver: SourceResolver,
    cache: Arc<dyn LocalCache>,
    skip_windows: SkipWindowEditor,
    history: Arc<dyn PlayHistorySink>,
    playlists: Arc<dyn PlaylistStore>,
    playlist_saves: Debouncer<()>,
    session: Mutex<Session>,
}

impl PlaybackController {
    /// Create a controller holding a handle on the shared output
    pub fn new(
        output: &Arc<SharedAudioResource>,
        library: Arc<TrackLibrary>,
        services: PlaybackServices,
        config: &EngineConfig,
    ) -> Self {
        let handle = output.acquire();

        let mut volume = Volume::new(config.playback.initial_volume);
        volume.set_compensation_db(config.playback.volume_compensation_db);
        handle.apply_volume(&volume);

        let resolver = SourceResolver::new(
            services.media,
            Arc::clone(&services.cache),
            Arc::clone(&services.tracks),
            Arc::clone(&library),
            config,
        );
        let skip_windows = SkipWindowEditor::new(Arc::clone(&library), services.tracks, config);

        Self {
            output: handle,
            library,
            resolver,
            cache: services.cache,
            skip_windows,
            history: services.history,
            playlists: services.playlists,
            playlist_saves: Debouncer::new(config.playlist_save_debounce()),
            session: Mutex::new(Session {
                queue: Queue::new(),
                active: None,
                state: PlaybackState::Stopped,
                progress: 0.0,
                duration: 0.0,
                volume,
                play_mode: config.playback.play_mode,
                collection_id: None,
                generation: 0,
                retries: RetryLedger::new(config.playback.max_play_attempts),
                retry_pending: false,
                status: None,
                downloaded: false,
                pending_events: Vec::new(),
                rng: StdRng::from_entropy(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Transport =====

    /// Start or resume playback
    ///
    /// A deliberate play resets the failure count of the active track.
    pub async fn play(&self) -> Result<PlayOutcome> {
        let restart = {
            let mut session = self.lock();
            match session.active.clone() {
                Some(ActiveTrack { id, url: Some(url) }) => {
                    session.retries.clear(&id);
                    self.prepare_output(&url);
                    return self.try_play(&mut session, &id);
                }
                Some(ActiveTrack { id, url: None }) => id,
                None => session
                    .queue
                    .current_id()
                    .cloned()
                    .ok_or(PlaybackError::NoTrackLoaded)?,
            }
        };

        self.start_track(restart).await
    }

    /// Pause playback
    pub fn pause(&self) {
        let mut session = self.lock();
        self.output.pause();
        session.retry_pending = false;
        if session.state != PlaybackState::Stopped {
            session.set_state(PlaybackState::Paused);
        }
    }

    /// Toggle play/pause
    ///
    /// Resuming first clamps the position into the track's skip window.
    /// Does nothing while no source is assigned.
    pub fn toggle(&self) -> Result<()> {
        let mut session = self.lock();
        let Some((id, url)) = session.assigned() else {
            return Ok(());
        };

        if session.state.is_playing() {
            self.output.pause();
            session.retry_pending = false;
            session.set_state(PlaybackState::Paused);
            return Ok(());
        }

        let window = self
            .library
            .get(&id)
            .map(|t| SkipWindow::of(&t))
            .unwrap_or_default();
        let position = self.output.current_time();
        let resume_at = window.clamp(position, self.output.duration());
        if (resume_at - position).abs() > f64::EPSILON {
            self.output.seek(resume_at);
            session.progress = resume_at;
        }

        session.retries.clear(&id);
        self.prepare_output(&url);
        self.try_play(&mut session, &id).map(|_| ())
    }

    /// Seek within the active track
    pub fn seek(&self, secs: f64) -> Result<()> {
        let mut session = self.lock();
        if session.assigned().is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }

        let position = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
        self.output.seek(position);
        session.progress = position;
        let duration = session.duration;
        session.emit(PlaybackEvent::PositionUpdate {
            position_secs: position,
            duration_secs: duration,
        });
        Ok(())
    }

    /// Stop playback and unload the source; the queue is kept
    pub fn stop(&self) {
        let mut session = self.lock();
        self.stop_locked(&mut session);
    }

    fn stop_locked(&self, session: &mut Session) {
        // Invalidate any resolution still in flight
        session.generation += 1;
        session.retry_pending = false;
        session.active = None;
        session.progress = 0.0;
        session.duration = 0.0;

        self.output.pause();
        self.output.set_source(None);
        self.output.load();

        session.set_state(PlaybackState::Stopped);
    }

    /// Advance according to the play mode
    ///
    /// `Single` replays the active track from its skip start without moving
    /// the pointer. `Loop` and `Random` switch tracks and start playing.
    pub async fn next(&self) -> Result<PlayOutcome> {
        let id = {
            let mut session = self.lock();
            let mode = session.play_mode;

            let Session { queue, rng, .. } = &mut *session;
            let index = queue
                .next_index(mode, rng)
                .ok_or(PlaybackError::NoTrackLoaded)?;

            if mode == PlayMode::Single {
                if let Some((id, url)) = session.assigned() {
                    return self.replay_from_start(&mut session, &id, &url);
                }
            }

            let id = session.queue.select(index)?.clone();
            session.queue_changed();
            self.schedule_playlist_save(&session);
            id
        };

        self.start_track(id).await
    }

    /// Go to the previous entry (wraps), regardless of play mode
    pub async fn prev(&self) -> Result<PlayOutcome> {
        let id = {
            let mut session = self.lock();
            let index = session
                .queue
                .prev_index()
                .ok_or(PlaybackError::NoTrackLoaded)?;
            let id = session.queue.select(index)?.clone();
            session.queue_changed();
            self.schedule_playlist_save(&session);
            id
        };

        self.start_track(id).await
    }

    fn replay_from_start(&self, session: &mut Session, id: &TrackId, url: &str) -> Result<PlayOutcome> {
        let start = self.library.get(id).map_or(0.0, |t| t.skip_start);
        debug!(track_id = %id, start, "Replaying track");

        self.prepare_output(url);
        self.output.seek(start);
        session.progress = start;
        self.try_play(session, id)
    }

    // ===== Volume =====

    /// Set volume (0.0 - 1.0)
    pub fn set_volume(&self, level: f32) {
        let mut session = self.lock();
        session.volume.set_level(level);
        self.output.apply_volume(&session.volume);
        session.volume_changed();
    }

    pub fn mute(&self) {
        let mut session = self.lock();
        session.volume.mute();
        self.output.apply_volume(&session.volume);
        session.volume_changed();
    }

    pub fn unmute(&self) {
        let mut session = self.lock();
        session.volume.unmute();
        self.output.apply_volume(&session.volume);
        session.volume_changed();
    }

    pub fn toggle_mute(&self) {
        let mut session = self.lock();
        session.volume.toggle_mute();
        self.output.apply_volume(&session.volume);
        session.volume_changed();
    }

    /// Set loudness compensation in dB
    pub fn set_volume_compensation(&self, db: f32) {
        let mut session = self.lock();
        session.volume.set_compensation_db(db);
        self.output.apply_volume(&session.volume);
    }

    pub fn set_play_mode(&self, mode: PlayMode) {
        let mut session = self.lock();
        if session.play_mode != mode {
            session.play_mode = mode;
            session.emit(PlaybackEvent::PlayModeChanged { mode });
        }
    }

    // ===== Queue =====

    /// Replace the queue with a collection and play its first track
    pub async fn play_collection(&self, collection: &Collection) -> Result<PlayOutcome> {
        let ids = self.library.known(&collection.track_ids);
        let Some(first) = ids.first().cloned() else {
            return Err(PlaybackError::NoTrackLoaded);
        };

        {
            let mut session = self.lock();
            session.collection_id = Some(collection.id.clone());
            session.queue.replace(ids);
            session.queue_changed();
            self.schedule_playlist_save(&session);
        }

        info!(collection_id = %collection.id, "Playing collection");
        self.start_track(first).await
    }

    /// Play a track next, inserting it right after the active entry
    ///
    /// On an empty queue the track's owning collection becomes the queue.
    pub async fn play_single(&self, id: &TrackId, collection: Option<&Collection>) -> Result<PlayOutcome> {
        if !self.library.contains(id) {
            return Err(PlaybackError::UnknownTrack(id.clone()));
        }

        let owning = collection.map(|c| self.library.known(&c.track_ids));
        {
            let mut session = self.lock();
            session.queue.insert_next(id.clone(), owning.as_deref());
            if let Some(collection) = collection {
                session.collection_id = Some(collection.id.clone());
            }
            session.queue_changed();
            self.schedule_playlist_save(&session);
        }

        self.start_track(id.clone()).await
    }

    /// Jump to a queue entry and play it
    pub async fn select(&self, index: usize) -> Result<PlayOutcome> {
        let id = {
            let mut session = self.lock();
            let id = session.queue.select(index)?.clone();
            session.queue_changed();
            self.schedule_playlist_save(&session);
            id
        };

        self.start_track(id).await
    }

    /// Move a queue entry; playback is not interrupted
    pub fn reorder(&self, from: usize, to: usize) -> Result<()> {
        let mut session = self.lock();
        session.queue.reorder(from, to)?;
        session.queue_changed();
        self.schedule_playlist_save(&session);
        Ok(())
    }

    /// Remove a queue entry
    ///
    /// Removing the active entry plays whatever now occupies its slot (or
    /// the new last entry); removing the only entry stops playback.
    pub async fn remove(&self, index: usize) -> Result<RemoveOutcome> {
        let (outcome, replacement) = {
            let mut session = self.lock();
            let outcome = session.queue.remove(index)?;
            session.queue_changed();
            self.schedule_playlist_save(&session);

            let replacement = match outcome {
                RemoveOutcome::Emptied => {
                    self.stop_locked(&mut session);
                    None
                }
                RemoveOutcome::ActiveReplaced(i) => session.queue.get(i).cloned(),
                RemoveOutcome::Adjusted => None,
            };
            (outcome, replacement)
        };

        if let Some(id) = replacement {
            self.start_track(id).await?;
        }

        Ok(outcome)
    }

    /// Load the last saved queue without starting playback
    pub async fn restore_queue(&self) -> Result<usize> {
        let saved = self.playlists.load().await?;
        let ids = self.library.known(&saved.track_ids);

        let mut session = self.lock();
        session.queue.replace_at(ids, saved.current_index);
        session.queue_changed();

        debug!(
            length = session.queue.len(),
            current_index = ?session.queue.current_index(),
            "Queue restored"
        );
        Ok(session.queue.len())
    }

    /// Reload the track table from storage, keeping unsaved skip edits
    pub async fn reload_library(&self) -> Result<usize> {
        self.skip_windows.reload_library().await
    }

    // ===== Skip windows =====

    pub fn set_skip_window(&self, id: &TrackId, start: f64, end: f64) -> Result<Track> {
        let track = self.skip_windows.set_window(id, start, end)?;
        self.after_skip_edit(&track);
        Ok(track)
    }

    pub fn set_skip_start(&self, id: &TrackId, start: f64) -> Result<Track> {
        let track = self.skip_windows.set_start(id, start)?;
        self.after_skip_edit(&track);
        Ok(track)
    }

    pub fn set_skip_end(&self, id: &TrackId, end: f64) -> Result<Track> {
        let track = self.skip_windows.set_end(id, end)?;
        self.after_skip_edit(&track);
        Ok(track)
    }

    fn after_skip_edit(&self, track: &Track) {
        let mut session = self.lock();
        session.emit(PlaybackEvent::TrackUpdated {
            track_id: track.id.clone(),
        });

        let is_active = session
            .assigned()
            .is_some_and(|(id, _)| id == track.id);
        if is_active && self.output.current_time() < track.skip_start {
            self.output.seek(track.skip_start);
            session.progress = track.skip_start;
        }
    }

    // ===== Output events =====

    /// Feed an event from the output element
    pub async fn handle_output_event(&self, event: OutputEvent) -> Result<()> {
        let track_ended = match event {
            OutputEvent::TimeUpdate { position } => self.on_time_update(position),
            OutputEvent::Loaded { duration } => {
                self.on_loaded(duration);
                false
            }
            OutputEvent::CanPlay => {
                self.on_can_play()?;
                false
            }
            OutputEvent::Ended => self.state() == PlaybackState::Playing,
            OutputEvent::Error(message) => {
                self.on_output_error(&message)?;
                false
            }
        };

        if track_ended {
            self.next().await?;
        }
        Ok(())
    }

    /// Returns whether the skip end was reached
    fn on_time_update(&self, position: f64) -> bool {
        let mut session = self.lock();
        session.progress = position;
        let duration = session.duration;
        session.emit(PlaybackEvent::PositionUpdate {
            position_secs: position,
            duration_secs: duration,
        });

        if session.state != PlaybackState::Playing {
            return false;
        }
        let Some((id, _)) = session.assigned() else {
            return false;
        };

        let reached = self
            .library
            .get(&id)
            .is_some_and(|t| SkipWindow::of(&t).reached_end(position));
        if reached {
            debug!(track_id = %id, position, "Reached skip end");
        }
        reached
    }

    fn on_loaded(&self, duration: f64) {
        let mut session = self.lock();
        session.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };

        let Some((id, _)) = session.assigned() else {
            return;
        };
        let start = self.library.get(&id).map_or(0.0, |t| t.skip_start);
        if start > 0.0 && self.output.current_time() < start {
            self.output.seek(start);
            session.progress = start;
        }
    }

    fn on_can_play(&self) -> Result<()> {
        let mut session = self.lock();
        if !session.retry_pending {
            return Ok(());
        }
        let Some((id, _)) = session.assigned() else {
            return Ok(());
        };
        if !session.retries.can_retry(&id) {
            session.retry_pending = false;
            return Ok(());
        }

        debug!(track_id = %id, attempts = session.retries.attempts(&id), "Retrying play");
        session.retry_pending = false;
        self.try_play(&mut session, &id).map(|_| ())
    }

    fn on_output_error(&self, message: &str) -> Result<()> {
        let mut session = self.lock();
        let Some((id, _)) = session.assigned() else {
            return Ok(());
        };
        if !session.state.is_playing() {
            return Ok(());
        }

        warn!(track_id = %id, error = message, "Output element error");
        let outcome = self.record_play_failure(&mut session, &id, message)?;
        if matches!(outcome, PlayOutcome::RetryScheduled { .. }) {
            // Reloading re-arms the ready signal that drives the retry
            self.output.load();
        }
        Ok(())
    }

    // ===== Internals =====

    /// Switch to `id`: resolve its source, assign it and start if wanted
    async fn start_track(&self, id: TrackId) -> Result<PlayOutcome> {
        let (generation, track) = {
            let mut session = self.lock();
            let track = self
                .library
                .get(&id)
                .ok_or_else(|| PlaybackError::UnknownTrack(id.clone()))?;
            let generation = session.activate(&id);
            session.set_state(PlaybackState::Loading);
            (generation, track)
        };

        info!(track_id = %id, name = %track.name, "Switching track");
        let resolved = self.resolver.resolve(&track).await;

        let (outcome, collection_id, origin) = {
            let mut session = self.lock();
            if session.generation != generation {
                debug!(track_id = %id, "Discarding stale resolution");
                return Ok(PlayOutcome::Superseded);
            }

            let resolved = match resolved {
                Ok(resolved) => resolved,
                Err(e) => {
                    error!(track_id = %id, error = %e, "Failed to resolve track source");
                    // The previous track must not keep sounding under a paused state
                    self.output.pause();
                    self.output.set_source(None);
                    self.output.load();
                    session.set_state(PlaybackState::Paused);
                    session.set_downloaded(&id, false);
                    session.fail(Some(id.clone()), &e, true);
                    return Err(e);
                }
            };

            let url = resolved.url().to_string();
            let autoplay = session.state.is_playing();
            if autoplay {
                self.output.ensure_processing_graph();
            }
            self.output.pause();
            self.output.set_source(Some(&url));
            self.output.load();

            if let Some(active) = session.active.as_mut() {
                active.url = Some(url);
            }

            let outcome = if autoplay {
                self.try_play(&mut session, &id)
            } else {
                Ok(PlayOutcome::Ready)
            };
            (
                outcome,
                session.collection_id.clone().unwrap_or_default(),
                resolved.origin,
            )
        };

        self.record_history(collection_id, id.clone());
        self.refresh_downloaded(&id, generation, origin).await;
        outcome
    }

    /// Look up whether the active track is downloaded and publish it
    async fn refresh_downloaded(&self, id: &TrackId, generation: u64, origin: SourceOrigin) {
        let downloaded = if origin == SourceOrigin::LocalCache {
            true
        } else {
            match self.cache.is_downloaded(id).await {
                Ok(downloaded) => downloaded,
                Err(e) => {
                    warn!(track_id = %id, error = %e, "Download state lookup failed");
                    false
                }
            }
        };

        let mut session = self.lock();
        if session.generation == generation {
            session.set_downloaded(id, downloaded);
        }
    }

    /// Build the graph on first use and reassign the source if a downgrade
    /// replaced the element
    fn prepare_output(&self, url: &str) {
        self.output.ensure_processing_graph();
        if self.output.source().as_deref() != Some(url) {
            self.output.set_source(Some(url));
            self.output.load();
        }
    }

    fn try_play(&self, session: &mut Session, id: &TrackId) -> Result<PlayOutcome> {
        match self.output.play() {
            Ok(()) => {
                session.retries.clear(id);
                session.retry_pending = false;
                session.set_state(PlaybackState::Playing);
                Ok(PlayOutcome::Started)
            }
            Err(e) => self.record_play_failure(session, id, &e.to_string()),
        }
    }

    fn record_play_failure(&self, session: &mut Session, id: &TrackId, reason: &str) -> Result<PlayOutcome> {
        match session.retries.record_failure(id) {
            RetryDecision::Retry { attempts } => {
                warn!(track_id = %id, attempts, reason, "Play rejected, will retry");
                session.retry_pending = true;
                session.set_state(PlaybackState::Loading);
                let max = session.retries.max_attempts();
                session.set_status(format!("Playback failed, retrying ({attempts}/{max})"));
                Ok(PlayOutcome::RetryScheduled { attempts })
            }
            RetryDecision::GiveUp { attempts } => {
                let err = PlaybackError::Transport(reason.to_string());
                error!(track_id = %id, attempts, error = %err, "Giving up on track");
                session.retry_pending = false;
                self.output.pause();
                session.set_state(PlaybackState::Paused);
                session.fail(Some(id.clone()), &err, true);
                Err(err)
            }
        }
    }

    fn record_history(&self, collection_id: String, id: TrackId) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(track_id = %id, "No async runtime, play history not recorded");
            return;
        };

        let history = Arc::clone(&self.history);
        runtime.spawn(async move {
            if let Err(e) = history.record(&collection_id, &id).await {
                warn!(track_id = %id, error = %e, "Failed to record play history");
            }
        });
    }

    fn schedule_playlist_save(&self, session: &Session) {
        if session.queue.is_empty() {
            self.playlist_saves.cancel(&());
            return;
        }

        let ids = session.queue.ids().to_vec();
        let index = session.queue.current_index().unwrap_or(0);
        let playlists = Arc::clone(&self.playlists);

        self.playlist_saves.schedule((), move || async move {
            match playlists.save(&ids, index).await {
                Ok(()) => debug!(length = ids.len(), index, "Queue saved"),
                Err(e) => {
                    let err = PlaybackError::Persistence(e.to_string());
                    warn!(error = %err, "Failed to save queue");
                }
            }
        });
    }

    // ===== State =====

    pub fn state(&self) -> PlaybackState {
        self.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.lock().state.is_playing()
    }

    /// Active track as stored, with the URL actually assigned to the output
    pub fn current_track(&self) -> Option<Track> {
        let active = self.lock().active.clone()?;
        let mut track = self.library.get(&active.id)?;
        if let Some(url) = active.url {
            track.stream_url = Some(url);
        }
        Some(track)
    }

    pub fn current_track_id(&self) -> Option<TrackId> {
        self.lock().active.as_ref().map(|a| a.id.clone())
    }

    pub fn current_index(&self) -> Option<usize> {
        self.lock().queue.current_index()
    }

    pub fn queue_ids(&self) -> Vec<TrackId> {
        self.lock().queue.ids().to_vec()
    }

    /// Queue entries resolved against the track table
    pub fn queue_tracks(&self) -> Vec<Track> {
        let ids = self.queue_ids();
        ids.iter().filter_map(|id| self.library.get(id)).collect()
    }

    /// Playback position in seconds
    pub fn progress(&self) -> f64 {
        self.lock().progress
    }

    pub fn duration(&self) -> f64 {
        self.lock().duration
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume.level()
    }

    pub fn is_muted(&self) -> bool {
        self.lock().volume.is_muted()
    }

    pub fn play_mode(&self) -> PlayMode {
        self.lock().play_mode
    }

    /// Last status line shown to the user
    pub fn status(&self) -> Option<String> {
        self.lock().status.clone()
    }

    /// Whether the active track has an explicit download
    pub fn is_downloaded(&self) -> bool {
        let session = self.lock();
        session.active.is_some() && session.downloaded
    }

    /// Consecutive play failures recorded for a track
    pub fn play_attempts(&self, id: &TrackId) -> u32 {
        self.lock().retries.attempts(id)
    }

    pub fn skip_windows(&self) -> &SkipWindowEditor {
        &self.skip_windows
    }

    pub fn library(&self) -> &Arc<TrackLibrary> {
        &self.library
    }

    pub fn output(&self) -> &SharedAudioResource {
        &self.output
    }

    // ===== Events =====

    /// Drain all pending events
    pub fn drain_events(&self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.lock().pending_events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.lock().pending_events.is_empty()
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.lock();
        f.debug_struct("PlaybackController")
            .field("state", &session.state)
            .field("active", &session.active)
            .field("queue", &session.queue)
            .field("play_mode", &session.play_mode)
            .field("generation", &session.generation)
            .finish_non_exhaustive()
    }
}
