//! Stream source resolution
//!
//! Produces a playable URL for a track. Strategies are tried in order and
//! the first match wins:
//!
//! 1. Locally cached file
//! 2. The track's existing proxy URL, if not about to expire
//! 3. A fresh URL from the media backend (persisted back to the store)
//!
//! A fresh URL is merged into the [`TrackLibrary`] entry before it is
//! written, so the stored record never rolls back edits made while the
//! backend was being asked.
//!
//! Resolution never retries; retry policy belongs to the controller.

use crate::config::EngineConfig;
use crate::error::{PlaybackError, Result};
use crate::library::TrackLibrary;
use crate::types::{Resolved, SourceOrigin};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use halfbeat_core::{LocalCache, MediaResolver, Track, TrackStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Kind of stream URL, by where it is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Served from the local file cache; never expires
    Local,

    /// Fronted by the stream proxy; carries an upstream expiry
    Proxy,

    /// Anything else (direct upstream links, legacy values)
    Foreign,
}

/// Rules for classifying stream URLs and deciding freshness
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    proxy_marker: String,
    local_marker: String,
    expiry_margin: ChronoDuration,
    local_ttl: ChronoDuration,
}

impl UrlPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        let resolver = &config.resolver;
        Self {
            proxy_marker: resolver.proxy_url_marker.clone(),
            local_marker: resolver.local_url_marker.clone(),
            expiry_margin: ChronoDuration::seconds(resolver.expiry_margin_secs),
            local_ttl: ChronoDuration::days(resolver.local_url_ttl_days),
        }
    }

    pub fn classify(&self, url: &str) -> UrlKind {
        // host:port/path, or the raw string when it does not parse
        let location = Url::parse(url).ok().map(|parsed| {
            let host = parsed.host_str().unwrap_or_default();
            match parsed.port_or_known_default() {
                Some(port) => format!("{host}:{port}{}", parsed.path()),
                None => format!("{host}{}", parsed.path()),
            }
        });
        let matches = |marker: &str| match &location {
            Some(location) => location.starts_with(marker),
            None => url.contains(marker),
        };

        if matches(self.local_marker.as_str()) {
            UrlKind::Local
        } else if matches(self.proxy_marker.as_str()) {
            UrlKind::Proxy
        } else {
            UrlKind::Foreign
        }
    }

    /// Whether the track's stored URL must be replaced before playing
    ///
    /// Local URLs never need a refresh. Missing and non-proxy URLs always
    /// do. A proxy URL is refreshed once its expiry falls inside the margin;
    /// an unknown expiry counts as still valid.
    pub fn needs_refresh(&self, track: &Track, now: DateTime<Utc>) -> bool {
        let Some(url) = track.stream_url.as_deref().filter(|u| !u.is_empty()) else {
            return true;
        };

        match self.classify(url) {
            UrlKind::Local => false,
            UrlKind::Foreign => true,
            UrlKind::Proxy => track
                .stream_url_expires_at
                .is_some_and(|expires| expires <= now + self.expiry_margin),
        }
    }

    /// Nominal expiry handed to locally cached URLs
    pub fn local_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.local_ttl
    }
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Turns a track into something the output can play
pub struct SourceResolver {
    media: Arc<dyn MediaResolver>,
    cache: Arc<dyn LocalCache>,
    store: Arc<dyn TrackStore>,
    library: Arc<TrackLibrary>,
    policy: UrlPolicy,
    timeout: Option<Duration>,
}

impl SourceResolver {
    pub fn new(
        media: Arc<dyn MediaResolver>,
        cache: Arc<dyn LocalCache>,
        store: Arc<dyn TrackStore>,
        library: Arc<TrackLibrary>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            media,
            cache,
            store,
            library,
            policy: UrlPolicy::from_config(config),
            timeout: config.resolve_timeout(),
        }
    }

    pub fn policy(&self) -> &UrlPolicy {
        &self.policy
    }

    /// Resolve a playable URL for `track`
    ///
    /// The returned track is a copy; a local-cache URL on it must not be
    /// persisted.
    pub async fn resolve(&self, track: &Track) -> Result<Resolved> {
        let now = Utc::now();

        match self.cache.local_url(&track.id).await {
            Ok(Some(local)) if !local.is_empty() => {
                debug!(track_id = %track.id, "Resolved from local cache");
                let mut resolved = track.clone();
                resolved.stream_url = Some(local);
                resolved.stream_url_expires_at = Some(self.policy.local_expiry(now));
                return Ok(Resolved {
                    track: resolved,
                    origin: SourceOrigin::LocalCache,
                });
            }
            Ok(_) => {}
            Err(e) => {
                warn!(track_id = %track.id, error = %e, "Local cache lookup failed");
            }
        }

        if !self.policy.needs_refresh(track, now) {
            debug!(track_id = %track.id, "Stored stream URL still valid");
            return Ok(Resolved {
                track: track.clone(),
                origin: SourceOrigin::Cached,
            });
        }

        if !track.has_source_ref() {
            debug!(track_id = %track.id, "No source reference to refresh from");
            return Err(PlaybackError::NoPlayableSource(track.id.clone()));
        }

        let grant = self.request_grant(track).await?;

        let apply = |t: &mut Track| {
            t.stream_url = Some(grant.proxy_url.clone());
            t.stream_url_expires_at = Some(grant.expires_at);
            t.updated_at = Some(now);
        };

        // Only the stream fields change; anything else comes from the table
        let refreshed = self.library.update(&track.id, &apply).unwrap_or_else(|| {
            let mut detached = track.clone();
            apply(&mut detached);
            detached
        });

        if let Err(e) = self.store.upsert(std::slice::from_ref(&refreshed)).await {
            let err = PlaybackError::Persistence(e.to_string());
            warn!(track_id = %track.id, error = %err, "Failed to persist refreshed URL");
        }

        info!(
            track_id = %track.id,
            expires_at = %grant.expires_at,
            "Refreshed stream URL"
        );

        Ok(Resolved {
            track: refreshed,
            origin: SourceOrigin::Fresh,
        })
    }

    async fn request_grant(&self, track: &Track) -> Result<halfbeat_core::StreamGrant> {
        let request = self.media.playable_url(&track.source_ref);

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| PlaybackError::ResolutionTimeout(limit))?,
            None => request.await,
        };

        outcome.map_err(|e| {
            debug!(track_id = %track.id, error = %e, "Media backend rejected source");
            PlaybackError::Resolution(e.to_string())
        })
    }
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
