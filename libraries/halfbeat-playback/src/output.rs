//! Shared audio output resource
//!
//! One output element exists per process. Every view that needs it acquires
//! an [`OutputHandle`]; the element is torn down when the last handle drops.
//! An optional processing graph (gain chain) sits behind the element for
//! loudness compensation and is built lazily on the first playback attempt.
//!
//! Only [`crate::PlaybackController`] issues transport commands.

use crate::volume::Volume;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reason recorded when the runtime cannot host a processing graph
pub const EMBEDDED_LINUX_WEBKIT: &str = "embedded-linux-webkit";

/// Output-level failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    /// The element refused to start (autoplay policy, decode failure, ...)
    #[error("Play rejected: {0}")]
    PlayRejected(String),

    /// The processing graph could not be built or resumed
    #[error("Processing graph unavailable: {0}")]
    GraphUnavailable(String),

    /// No handle currently holds the resource
    #[error("Output element not acquired")]
    NotAcquired,
}

/// Native audio element provided by the host
pub trait AudioElement: Send {
    fn set_source(&mut self, url: Option<&str>);
    fn source(&self) -> Option<String>;
    fn load(&mut self);
    fn play(&mut self) -> Result<(), OutputError>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, secs: f64);

    /// Natural duration in seconds (0.0 or NaN while unknown)
    fn duration(&self) -> f64;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn set_muted(&mut self, muted: bool);

    /// Remove the element from the host document
    fn detach(&mut self);
}

/// Gain chain routed behind an [`AudioElement`]
pub trait ProcessingGraph: Send {
    fn set_gain(&mut self, gain: f32);
    fn is_suspended(&self) -> bool;
    fn resume(&mut self) -> Result<(), OutputError>;
    fn close(&mut self);
}

/// Factory for output objects, implemented by the host shell
pub trait AudioBackend: Send + Sync {
    fn create_element(&self) -> Box<dyn AudioElement>;

    /// Route `element` through a new gain chain
    ///
    /// An element can be bound to at most one graph for its lifetime.
    fn create_graph(
        &self,
        element: &mut dyn AudioElement,
    ) -> Result<Box<dyn ProcessingGraph>, OutputError>;

    fn runtime_signature(&self) -> RuntimeSignature;
}

/// What the host reports about the runtime it renders in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeSignature {
    /// Running inside an embedded desktop webview rather than a browser
    pub embedded_host: bool,

    /// Operating system name, as in `std::env::consts::OS`
    pub os: String,

    pub user_agent: String,
}

impl RuntimeSignature {
    /// WebKit engine that is not a Chromium derivative
    pub fn is_plain_webkit(&self) -> bool {
        let ua = self.user_agent.to_ascii_lowercase();
        ua.contains("applewebkit")
            && !ua.contains("chrome")
            && !ua.contains("chromium")
            && !ua.contains("edg")
    }

    /// Reason the processing graph must stay disabled, if any
    pub fn graph_blocker(&self) -> Option<&'static str> {
        let linux = self.os.eq_ignore_ascii_case("linux");
        if self.embedded_host && linux && self.is_plain_webkit() {
            Some(EMBEDDED_LINUX_WEBKIT)
        } else {
            None
        }
    }
}

/// Whether the processing graph may be used
///
/// `Disabled` is terminal for the lifetime of the resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GraphCapability {
    #[default]
    Unknown,
    Enabled,
    Disabled { reason: String },
}

impl GraphCapability {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled { .. })
    }
}

/// Events the host forwards from the element
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Playback position changed
    TimeUpdate { position: f64 },

    /// Metadata loaded; duration known
    Loaded { duration: f64 },

    /// Enough data buffered to start
    CanPlay,

    /// Natural end of the media
    Ended,

    /// Decode or network failure on the element
    Error(String),
}

struct OutputInner {
    element: Option<Box<dyn AudioElement>>,
    graph: Option<Box<dyn ProcessingGraph>>,
    ref_count: usize,
    capability: GraphCapability,
    detected: bool,
    /// "Resume the graph before starting" hook on `play`
    shim_installed: bool,
    volume: Volume,
}

/// Process-wide output element plus optional gain chain
pub struct SharedAudioResource {
    backend: Arc<dyn AudioBackend>,
    inner: Mutex<OutputInner>,
}

impl SharedAudioResource {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            inner: Mutex::new(OutputInner {
                element: None,
                graph: None,
                ref_count: 0,
                capability: GraphCapability::Unknown,
                detected: false,
                shim_installed: false,
                volume: Volume::default(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, OutputInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a reference to the shared element, creating it on first use
    pub fn acquire(self: &Arc<Self>) -> OutputHandle {
        let mut inner = self.lock();
        inner.ref_count += 1;

        if inner.element.is_none() {
            let mut element = self.backend.create_element();
            element.set_volume(inner.volume.element_volume(false));
            inner.element = Some(element);
            debug!("Created shared output element");
        }

        if !inner.detected {
            inner.detected = true;
            if let Some(reason) = self.backend.runtime_signature().graph_blocker() {
                info!(reason, "Processing graph disabled for this runtime");
                inner.capability = GraphCapability::Disabled {
                    reason: reason.to_string(),
                };
            }
        }

        debug!(ref_count = inner.ref_count, "Output acquired");
        OutputHandle {
            resource: Arc::clone(self),
        }
    }

    fn release(&self) {
        let mut inner = self.lock();
        inner.ref_count = inner.ref_count.saturating_sub(1);
        debug!(ref_count = inner.ref_count, "Output released");

        if inner.ref_count > 0 {
            return;
        }

        if let Some(mut graph) = inner.graph.take() {
            graph.close();
        }
        if let Some(mut element) = inner.element.take() {
            element.pause();
            element.set_source(None);
            element.load();
            element.detach();
        }
        inner.shim_installed = false;
        debug!("Shared output element torn down");
    }

    pub fn ref_count(&self) -> usize {
        self.lock().ref_count
    }

    pub fn capability(&self) -> GraphCapability {
        self.lock().capability.clone()
    }

    pub fn has_graph(&self) -> bool {
        self.lock().graph.is_some()
    }

    /// Build the gain chain if allowed; returns whether a graph is active
    ///
    /// Idempotent. A construction failure downgrades to native output.
    pub fn ensure_processing_graph(&self) -> bool {
        let failure = {
            let mut inner = self.lock();
            if inner.graph.is_some() {
                return true;
            }
            if inner.capability.is_disabled() {
                return false;
            }

            let OutputInner { element, .. } = &mut *inner;
            let Some(element) = element.as_deref_mut() else {
                return false;
            };

            match self.backend.create_graph(element) {
                Ok(mut graph) => {
                    graph.set_gain(inner.volume.graph_gain());
                    let element_volume = inner.volume.element_volume(true);
                    if let Some(element) = inner.element.as_deref_mut() {
                        element.set_volume(element_volume);
                    }
                    inner.graph = Some(graph);
                    inner.shim_installed = true;
                    inner.capability = GraphCapability::Enabled;
                    debug!("Processing graph attached");
                    return true;
                }
                Err(e) => e,
            }
        };

        warn!(error = %failure, "Processing graph construction failed");
        self.downgrade_to_native_output(&failure.to_string());
        false
    }

    /// Permanently fall back to the plain element
    ///
    /// If a graph was ever attached, the element is bound to it and has to be
    /// replaced; the fresh element keeps the current volume but has no source.
    /// Returns whether the element was replaced.
    pub fn downgrade_to_native_output(&self, reason: &str) -> bool {
        let mut inner = self.lock();
        inner.capability = GraphCapability::Disabled {
            reason: reason.to_string(),
        };

        if inner.graph.is_none() && !inner.shim_installed {
            info!(reason, "Processing graph disabled");
            return false;
        }

        if let Some(mut graph) = inner.graph.take() {
            graph.close();
        }
        inner.shim_installed = false;

        if let Some(mut old) = inner.element.take() {
            old.pause();
            old.set_source(None);
            old.load();
            old.detach();

            let mut fresh = self.backend.create_element();
            fresh.set_volume(inner.volume.element_volume(false));
            inner.element = Some(fresh);
        }

        info!(reason, "Downgraded to native output");
        true
    }

    /// Apply volume, mute and compensation to the element and graph
    pub fn apply_volume(&self, volume: &Volume) {
        let mut inner = self.lock();
        inner.volume = volume.clone();

        let graph_active = inner.graph.is_some();
        if let Some(graph) = inner.graph.as_deref_mut() {
            graph.set_gain(volume.graph_gain());
        }
        if let Some(element) = inner.element.as_deref_mut() {
            element.set_volume(volume.element_volume(graph_active));
            element.set_muted(volume.is_muted());
        }
    }

    pub fn set_source(&self, url: Option<&str>) {
        if let Some(element) = self.lock().element.as_deref_mut() {
            element.set_source(url);
        }
    }

    pub fn source(&self) -> Option<String> {
        self.lock().element.as_deref().and_then(|e| e.source())
    }

    pub fn load(&self) {
        if let Some(element) = self.lock().element.as_deref_mut() {
            element.load();
        }
    }

    /// Start the element, resuming a suspended graph first
    pub fn play(&self) -> Result<(), OutputError> {
        let mut inner = self.lock();
        let OutputInner {
            element,
            graph,
            shim_installed,
            volume,
            ..
        } = &mut *inner;

        let element = element.as_deref_mut().ok_or(OutputError::NotAcquired)?;

        if *shim_installed {
            if let Some(graph) = graph.as_deref_mut().filter(|g| g.is_suspended()) {
                if let Err(e) = graph.resume() {
                    warn!(error = %e, "Failed to resume processing graph");
                }
            }
        }

        element.set_muted(volume.is_muted());
        element.play()
    }

    pub fn pause(&self) {
        if let Some(element) = self.lock().element.as_deref_mut() {
            element.pause();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.lock().element.as_deref().map_or(true, |e| e.is_paused())
    }

    pub fn seek(&self, secs: f64) {
        if let Some(element) = self.lock().element.as_deref_mut() {
            element.set_current_time(secs);
        }
    }

    pub fn current_time(&self) -> f64 {
        self.lock()
            .element
            .as_deref()
            .map_or(0.0, |e| e.current_time())
    }

    /// Natural duration, 0.0 while unknown
    pub fn duration(&self) -> f64 {
        let duration = self.lock().element.as_deref().map_or(0.0, |e| e.duration());
        if duration.is_finite() {
            duration
        } else {
            0.0
        }
    }
}

impl std::fmt::Debug for SharedAudioResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SharedAudioResource")
            .field("ref_count", &inner.ref_count)
            .field("capability", &inner.capability)
            .field("has_element", &inner.element.is_some())
            .field("has_graph", &inner.graph.is_some())
            .field("shim_installed", &inner.shim_installed)
            .finish()
    }
}

/// Reference to the shared output; releases on drop
#[derive(Debug)]
pub struct OutputHandle {
    resource: Arc<SharedAudioResource>,
}

impl std::ops::Deref for OutputHandle {
    type Target = SharedAudioResource;

    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        self.resource.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log {
        created: usize,
        detached: usize,
        graphs: usize,
        closed: usize,
        resumed: usize,
    }

    struct StubElement {
        log: Arc<Mutex<Log>>,
        src: Option<String>,
        paused: bool,
        volume: f32,
    }

    impl AudioElement for StubElement {
        fn set_source(&mut self, url: Option<&str>) {
            self.src = url.map(str::to_string);
        }
        fn source(&self) -> Option<String> {
            self.src.clone()
        }
        fn load(&mut self) {}
        fn play(&mut self) -> Result<(), OutputError> {
            self.paused = false;
            Ok(())
        }
        fn pause(&mut self) {
            self.paused = true;
        }
        fn is_paused(&self) -> bool {
            self.paused
        }
        fn current_time(&self) -> f64 {
            0.0
        }
        fn set_current_time(&mut self, _secs: f64) {}
        fn duration(&self) -> f64 {
            f64::NAN
        }
        fn volume(&self) -> f32 {
            self.volume
        }
        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }
        fn set_muted(&mut self, _muted: bool) {}
        fn detach(&mut self) {
            self.log.lock().unwrap().detached += 1;
        }
    }

    struct StubGraph {
        log: Arc<Mutex<Log>>,
        suspended: bool,
    }

    impl ProcessingGraph for StubGraph {
        fn set_gain(&mut self, _gain: f32) {}
        fn is_suspended(&self) -> bool {
            self.suspended
        }
        fn resume(&mut self) -> Result<(), OutputError> {
            self.suspended = false;
            self.log.lock().unwrap().resumed += 1;
            Ok(())
        }
        fn close(&mut self) {
            self.log.lock().unwrap().closed += 1;
        }
    }

    struct StubBackend {
        log: Arc<Mutex<Log>>,
        signature: RuntimeSignature,
        graph_fails: bool,
    }

    impl StubBackend {
        fn new(signature: RuntimeSignature) -> (Arc<Self>, Arc<Mutex<Log>>) {
            let log = Arc::new(Mutex::new(Log::default()));
            let backend = Arc::new(Self {
                log: Arc::clone(&log),
                signature,
                graph_fails: false,
            });
            (backend, log)
        }
    }

    impl AudioBackend for StubBackend {
        fn create_element(&self) -> Box<dyn AudioElement> {
            self.log.lock().unwrap().created += 1;
            Box::new(StubElement {
                log: Arc::clone(&self.log),
                src: None,
                paused: true,
                volume: 1.0,
            })
        }

        fn create_graph(
            &self,
            _element: &mut dyn AudioElement,
        ) -> Result<Box<dyn ProcessingGraph>, OutputError> {
            if self.graph_fails {
                return Err(OutputError::GraphUnavailable("no context".to_string()));
            }
            self.log.lock().unwrap().graphs += 1;
            Ok(Box::new(StubGraph {
                log: Arc::clone(&self.log),
                suspended: true,
            }))
        }

        fn runtime_signature(&self) -> RuntimeSignature {
            self.signature.clone()
        }
    }

    fn desktop_chromium() -> RuntimeSignature {
        RuntimeSignature {
            embedded_host: true,
            os: "windows".to_string(),
            user_agent: "Mozilla/5.0 AppleWebKit/537.36 Chrome/120.0 Edg/120.0".to_string(),
        }
    }

    fn linux_webkit() -> RuntimeSignature {
        RuntimeSignature {
            embedded_host: true,
            os: "linux".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/605.1.15 (KHTML, like Gecko)"
                .to_string(),
        }
    }

    #[test]
    fn second_acquire_shares_element() {
        let (backend, log) = StubBackend::new(desktop_chromium());
        let resource = SharedAudioResource::new(backend);

        let first = resource.acquire();
        first.set_source(Some("http://127.0.0.1:9999/audio?u=a"));
        let second = resource.acquire();
        assert_eq!(resource.ref_count(), 2);

        drop(second);
        assert_eq!(resource.ref_count(), 1);
        assert_eq!(
            first.source().as_deref(),
            Some("http://127.0.0.1:9999/audio?u=a")
        );
        assert_eq!(log.lock().unwrap().created, 1);
        assert_eq!(log.lock().unwrap().detached, 0);
    }

    #[test]
    fn last_release_tears_down() {
        let (backend, log) = StubBackend::new(desktop_chromium());
        let resource = SharedAudioResource::new(backend);

        let handle = resource.acquire();
        assert!(handle.ensure_processing_graph());
        drop(handle);

        let log = log.lock().unwrap();
        assert_eq!(log.detached, 1);
        assert_eq!(log.closed, 1);
        assert!(resource.source().is_none());
        assert!(!resource.has_graph());
    }

    #[test]
    fn graph_is_lazy_and_idempotent() {
        let (backend, log) = StubBackend::new(desktop_chromium());
        let resource = SharedAudioResource::new(backend);
        let handle = resource.acquire();

        assert_eq!(handle.capability(), GraphCapability::Unknown);
        assert!(!handle.has_graph());

        assert!(handle.ensure_processing_graph());
        assert!(handle.ensure_processing_graph());
        assert_eq!(log.lock().unwrap().graphs, 1);
        assert_eq!(handle.capability(), GraphCapability::Enabled);
    }

    #[test]
    fn linux_webkit_host_disables_graph() {
        let (backend, log) = StubBackend::new(linux_webkit());
        let resource = SharedAudioResource::new(backend);
        let handle = resource.acquire();

        assert_eq!(
            handle.capability(),
            GraphCapability::Disabled {
                reason: EMBEDDED_LINUX_WEBKIT.to_string()
            }
        );
        assert!(!handle.ensure_processing_graph());
        assert_eq!(log.lock().unwrap().graphs, 0);
    }

    #[test]
    fn play_resumes_suspended_graph() {
        let (backend, log) = StubBackend::new(desktop_chromium());
        let resource = SharedAudioResource::new(backend);
        let handle = resource.acquire();

        handle.ensure_processing_graph();
        handle.play().unwrap();
        handle.play().unwrap();

        assert_eq!(log.lock().unwrap().resumed, 1);
        assert!(!handle.is_paused());
    }

    #[test]
    fn downgrade_replaces_bound_element() {
        let (backend, log) = StubBackend::new(desktop_chromium());
        let resource = SharedAudioResource::new(backend);
        let handle = resource.acquire();

        handle.ensure_processing_graph();
        handle.set_source(Some("http://127.0.0.1:9999/audio?u=a"));

        assert!(handle.downgrade_to_native_output("decode stall"));
        assert!(handle.capability().is_disabled());
        assert!(handle.source().is_none());
        assert!(!handle.ensure_processing_graph());

        let log = log.lock().unwrap();
        assert_eq!(log.created, 2);
        assert_eq!(log.closed, 1);
    }

    #[test]
    fn downgrade_without_graph_keeps_element() {
        let (backend, log) = StubBackend::new(desktop_chromium());
        let resource = SharedAudioResource::new(backend);
        let handle = resource.acquire();

        assert!(!handle.downgrade_to_native_output("user preference"));
        assert_eq!(log.lock().unwrap().created, 1);
    }

    #[test]
    fn failed_graph_construction_downgrades() {
        let log = Arc::new(Mutex::new(Log::default()));
        let backend = Arc::new(StubBackend {
            log: Arc::clone(&log),
            signature: desktop_chromium(),
            graph_fails: true,
        });
        let resource = SharedAudioResource::new(backend);
        let handle = resource.acquire();

        assert!(!handle.ensure_processing_graph());
        assert!(handle.capability().is_disabled());
    }

    #[test]
    fn apply_volume_without_graph_folds_compensation() {
        let (backend, _log) = StubBackend::new(desktop_chromium());
        let resource = SharedAudioResource::new(backend);
        let handle = resource.acquire();

        let mut volume = Volume::new(0.5);
        volume.set_compensation_db(-6.0);
        handle.apply_volume(&volume);

        let inner = handle.lock();
        let element_volume = inner.element.as_deref().map(|e| e.volume()).unwrap();
        assert!((element_volume - 0.5 * crate::volume::db_to_linear(-6.0)).abs() < 1e-6);
    }

    #[test]
    fn signature_detection() {
        assert_eq!(linux_webkit().graph_blocker(), Some(EMBEDDED_LINUX_WEBKIT));
        assert_eq!(desktop_chromium().graph_blocker(), None);

        let browser = RuntimeSignature {
            embedded_host: false,
            ..linux_webkit()
        };
        assert_eq!(browser.graph_blocker(), None);
    }
}
