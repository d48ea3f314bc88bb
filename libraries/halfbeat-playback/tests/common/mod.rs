//! Shared test fixtures: in-memory collaborators and a scriptable output

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use halfbeat_core::{
    CoreError, LocalCache, MediaResolver, PlayHistorySink, PlaylistStore, SavedPlaylist,
    StreamGrant, Track, TrackId, TrackStore,
};
use halfbeat_playback::{
    AudioBackend, AudioElement, EngineConfig, OutputError, PlaybackController, PlaybackServices,
    ProcessingGraph, RuntimeSignature, SharedAudioResource, TrackLibrary,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};
use std::time::Duration;

pub const PROXY_PREFIX: &str = "http://127.0.0.1:9999/audio?u=";
pub const LOCAL_PREFIX: &str = "http://127.0.0.1:9999/local?f=";

// ===== Tracks =====

/// Track with a proxy URL valid for another hour
pub fn streamable(id: &str) -> Track {
    Track::new(id, format!("Song {id}"), "Singer")
        .with_source_ref(format!("BV{id}"))
        .with_stream(
            format!("{PROXY_PREFIX}{id}"),
            Some(Utc::now() + ChronoDuration::hours(1)),
        )
}

/// Track whose proxy URL expired a minute ago
pub fn expired(id: &str) -> Track {
    Track::new(id, format!("Song {id}"), "Singer")
        .with_source_ref(format!("BV{id}"))
        .with_stream(
            format!("{PROXY_PREFIX}{id}-old"),
            Some(Utc::now() - ChronoDuration::minutes(1)),
        )
}

pub fn ids(names: &[&str]) -> Vec<TrackId> {
    names.iter().map(|n| TrackId::from(*n)).collect()
}

// ===== Output =====

#[derive(Debug, Default)]
pub struct ElementState {
    pub src: Option<String>,
    pub paused: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f32,
    pub muted: bool,
    pub detached: bool,
    pub play_calls: usize,
    pub loads: usize,
}

#[derive(Debug, Default)]
pub struct OutputScript {
    /// Number of upcoming `play()` calls to reject
    pub reject_plays: u32,
    pub elements: Vec<Arc<Mutex<ElementState>>>,
    pub graphs: usize,
    pub graph_gain: f32,
}

pub struct FakeElement {
    state: Arc<Mutex<ElementState>>,
    script: Arc<Mutex<OutputScript>>,
}

impl AudioElement for FakeElement {
    fn set_source(&mut self, url: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.src = url.map(str::to_string);
        state.current_time = 0.0;
    }
    fn source(&self) -> Option<String> {
        self.state.lock().unwrap().src.clone()
    }
    fn load(&mut self) {
        self.state.lock().unwrap().loads += 1;
    }
    fn play(&mut self) -> Result<(), OutputError> {
        let mut script = self.script.lock().unwrap();
        let mut state = self.state.lock().unwrap();
        state.play_calls += 1;
        if script.reject_plays > 0 {
            script.reject_plays -= 1;
            return Err(OutputError::PlayRejected("NotAllowedError".to_string()));
        }
        state.paused = false;
        Ok(())
    }
    fn pause(&mut self) {
        self.state.lock().unwrap().paused = true;
    }
    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }
    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }
    fn set_current_time(&mut self, secs: f64) {
        self.state.lock().unwrap().current_time = secs;
    }
    fn duration(&self) -> f64 {
        self.state.lock().unwrap().duration
    }
    fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }
    fn set_volume(&mut self, volume: f32) {
        self.state.lock().unwrap().volume = volume;
    }
    fn set_muted(&mut self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }
    fn detach(&mut self) {
        self.state.lock().unwrap().detached = true;
    }
}

pub struct FakeGraph {
    script: Arc<Mutex<OutputScript>>,
}

impl ProcessingGraph for FakeGraph {
    fn set_gain(&mut self, gain: f32) {
        self.script.lock().unwrap().graph_gain = gain;
    }
    fn is_suspended(&self) -> bool {
        false
    }
    fn resume(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
    fn close(&mut self) {}
}

pub struct FakeBackend {
    pub script: Arc<Mutex<OutputScript>>,
    pub signature: RuntimeSignature,
}

impl FakeBackend {
    pub fn chromium() -> Arc<Self> {
        Arc::new(Self {
            script: Arc::default(),
            signature: RuntimeSignature {
                embedded_host: true,
                os: "windows".to_string(),
                user_agent: "Mozilla/5.0 AppleWebKit/537.36 Chrome/120.0 Safari/537.36 Edg/120.0"
                    .to_string(),
            },
        })
    }

    pub fn linux_webkit() -> Arc<Self> {
        Arc::new(Self {
            script: Arc::default(),
            signature: RuntimeSignature {
                embedded_host: true,
                os: "linux".to_string(),
                user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/605.1.15".to_string(),
            },
        })
    }

    /// State of the most recently created element
    pub fn element(&self) -> Arc<Mutex<ElementState>> {
        let script = self.script.lock().unwrap();
        Arc::clone(script.elements.last().expect("no element created"))
    }

    pub fn reject_next_plays(&self, count: u32) {
        self.script.lock().unwrap().reject_plays = count;
    }
}

impl AudioBackend for FakeBackend {
    fn create_element(&self) -> Box<dyn AudioElement> {
        let state = Arc::new(Mutex::new(ElementState {
            paused: true,
            volume: 1.0,
            ..ElementState::default()
        }));
        self.script.lock().unwrap().elements.push(Arc::clone(&state));
        Box::new(FakeElement {
            state,
            script: Arc::clone(&self.script),
        })
    }

    fn create_graph(
        &self,
        _element: &mut dyn AudioElement,
    ) -> Result<Box<dyn ProcessingGraph>, OutputError> {
        self.script.lock().unwrap().graphs += 1;
        Ok(Box::new(FakeGraph {
            script: Arc::clone(&self.script),
        }))
    }

    fn runtime_signature(&self) -> RuntimeSignature {
        self.signature.clone()
    }
}

// ===== Collaborators =====

/// Media backend issuing `{PROXY_PREFIX}{source_ref}-fresh` URLs
#[derive(Default)]
pub struct FakeMedia {
    pub calls: AtomicUsize,
    /// Artificial latency per source reference
    pub delays: Mutex<HashMap<String, Duration>>,
    pub fail: Mutex<bool>,
}

impl FakeMedia {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn delay(&self, source_ref: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(source_ref.to_string(), delay);
    }
}

#[async_trait]
impl MediaResolver for FakeMedia {
    async fn playable_url(&self, source_ref: &str) -> halfbeat_core::Result<StreamGrant> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().get(source_ref).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail.lock().unwrap() {
            return Err(CoreError::resolution("video unavailable"));
        }
        Ok(StreamGrant::new(
            format!("{PROXY_PREFIX}{source_ref}-fresh"),
            Utc::now() + ChronoDuration::hours(2),
        ))
    }
}

#[derive(Default)]
pub struct FakeCache {
    pub files: Mutex<HashMap<TrackId, String>>,
}

impl FakeCache {
    pub fn insert(&self, id: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(TrackId::from(id), format!("{LOCAL_PREFIX}{id}.m4s"));
    }
}

#[async_trait]
impl LocalCache for FakeCache {
    async fn local_url(&self, id: &TrackId) -> halfbeat_core::Result<Option<String>> {
        Ok(self.files.lock().unwrap().get(id).cloned())
    }

    async fn is_downloaded(&self, id: &TrackId) -> halfbeat_core::Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(id))
    }
}

#[derive(Default)]
pub struct MemoryTrackStore {
    pub tracks: Mutex<Vec<Track>>,
    pub upserts: Mutex<Vec<Vec<Track>>>,
    pub fail: Mutex<bool>,
}

impl MemoryTrackStore {
    pub fn with_tracks(tracks: Vec<Track>) -> Self {
        Self {
            tracks: Mutex::new(tracks),
            ..Self::default()
        }
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }

    pub fn stored(&self, id: &str) -> Option<Track> {
        let id = TrackId::from(id);
        self.tracks.lock().unwrap().iter().find(|t| t.id == id).cloned()
    }
}

#[async_trait]
impl TrackStore for MemoryTrackStore {
    async fn upsert(&self, tracks: &[Track]) -> halfbeat_core::Result<()> {
        self.upserts.lock().unwrap().push(tracks.to_vec());
        if *self.fail.lock().unwrap() {
            return Err(CoreError::storage("database is locked"));
        }
        let mut stored = self.tracks.lock().unwrap();
        for track in tracks {
            match stored.iter_mut().find(|t| t.id == track.id) {
                Some(existing) => *existing = track.clone(),
                None => stored.push(track.clone()),
            }
        }
        Ok(())
    }

    async fn list_all(&self) -> halfbeat_core::Result<Vec<Track>> {
        Ok(self.tracks.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct RecordingHistory {
    pub records: Mutex<Vec<(String, TrackId)>>,
}

#[async_trait]
impl PlayHistorySink for RecordingHistory {
    async fn record(&self, collection_id: &str, id: &TrackId) -> halfbeat_core::Result<()> {
        self.records
            .lock()
            .unwrap()
            .push((collection_id.to_string(), id.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPlaylists {
    pub saves: Mutex<Vec<SavedPlaylist>>,
    pub saved: Mutex<SavedPlaylist>,
}

#[async_trait]
impl PlaylistStore for MemoryPlaylists {
    async fn save(&self, track_ids: &[TrackId], current_index: usize) -> halfbeat_core::Result<()> {
        let playlist = SavedPlaylist {
            track_ids: track_ids.to_vec(),
            current_index,
        };
        self.saves.lock().unwrap().push(playlist.clone());
        *self.saved.lock().unwrap() = playlist;
        Ok(())
    }

    async fn load(&self) -> halfbeat_core::Result<SavedPlaylist> {
        Ok(self.saved.lock().unwrap().clone())
    }
}

// ===== Harness =====

pub struct Harness {
    pub controller: PlaybackController,
    pub backend: Arc<FakeBackend>,
    pub output: Arc<SharedAudioResource>,
    pub library: Arc<TrackLibrary>,
    pub media: Arc<FakeMedia>,
    pub cache: Arc<FakeCache>,
    pub store: Arc<MemoryTrackStore>,
    pub history: Arc<RecordingHistory>,
    pub playlists: Arc<MemoryPlaylists>,
}

impl Harness {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self::with_backend(tracks, FakeBackend::chromium(), &EngineConfig::default())
    }

    pub fn with_backend(tracks: Vec<Track>, backend: Arc<FakeBackend>, config: &EngineConfig) -> Self {
        let library = Arc::new(TrackLibrary::with_tracks(tracks.clone()));
        let media = Arc::new(FakeMedia::default());
        let cache = Arc::new(FakeCache::default());
        let store = Arc::new(MemoryTrackStore::with_tracks(tracks));
        let history = Arc::new(RecordingHistory::default());
        let playlists = Arc::new(MemoryPlaylists::default());

        let services = PlaybackServices {
            media: Arc::clone(&media) as Arc<dyn MediaResolver>,
            cache: Arc::clone(&cache) as Arc<dyn LocalCache>,
            tracks: Arc::clone(&store) as Arc<dyn TrackStore>,
            history: Arc::clone(&history) as Arc<dyn PlayHistorySink>,
            playlists: Arc::clone(&playlists) as Arc<dyn PlaylistStore>,
        };

        let output = SharedAudioResource::new(Arc::clone(&backend) as Arc<dyn AudioBackend>);
        let controller = PlaybackController::new(&output, Arc::clone(&library), services, config);

        Self {
            controller,
            backend,
            output,
            library,
            media,
            cache,
            store,
            history,
            playlists,
        }
    }

    pub fn element(&self) -> Arc<Mutex<ElementState>> {
        self.backend.element()
    }

    pub fn element_src(&self) -> Option<String> {
        self.element().lock().unwrap().src.clone()
    }

    pub fn current(&self) -> Option<String> {
        self.controller.current_track_id().map(|id| id.to_string())
    }
}

/// Let spawned tasks (history, debounced writes) run
pub async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

/// Drive a future to completion on the calling thread, with no Tokio runtime
pub fn block_on_without_runtime<F: Future>(future: F) -> F::Output {
    struct ThreadWaker(std::thread::Thread);

    impl Wake for ThreadWaker {
        fn wake(self: Arc<Self>) {
            self.0.unpark();
        }
    }

    let waker = Waker::from(Arc::new(ThreadWaker(std::thread::current())));
    let mut cx = Context::from_waker(&waker);
    let mut future = std::pin::pin!(future);
    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return output;
        }
        std::thread::park();
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("halfbeat_playback=debug")
        .with_test_writer()
        .try_init();
}
