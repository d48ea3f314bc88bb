//! Engine configuration
//!
//! Loaded from an optional TOML file, then overridden by `HALFBEAT_`
//! environment variables (`HALFBEAT_RESOLVER__RESOLVE_TIMEOUT_SECS=5`).

use crate::error::{PlaybackError, Result};
use crate::types::PlayMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub resolver: ResolverSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaybackSettings {
    /// Initial volume (0.0 - 1.0)
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,

    /// Loudness compensation in dB
    #[serde(default)]
    pub volume_compensation_db: f32,

    #[serde(default)]
    pub play_mode: PlayMode,

    /// Consecutive transport failures before giving up on a track
    #[serde(default = "default_max_play_attempts")]
    pub max_play_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResolverSettings {
    /// A proxy URL expiring sooner than this is refreshed
    #[serde(default = "default_expiry_margin_secs")]
    pub expiry_margin_secs: i64,

    /// Nominal lifetime given to locally cached URLs
    #[serde(default = "default_local_url_ttl_days")]
    pub local_url_ttl_days: i64,

    /// Upper bound on a fresh resolution (0 disables the timeout)
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,

    #[serde(default = "default_proxy_url_marker")]
    pub proxy_url_marker: String,

    #[serde(default = "default_local_url_marker")]
    pub local_url_marker: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PersistenceSettings {
    #[serde(default = "default_skip_write_debounce_ms")]
    pub skip_write_debounce_ms: u64,

    #[serde(default = "default_playlist_save_debounce_ms")]
    pub playlist_save_debounce_ms: u64,

    /// Skip window values are rounded to this step, in seconds
    #[serde(default = "default_skip_tick_secs")]
    pub skip_tick_secs: f64,
}

impl EngineConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path.filter(|p| p.exists()) {
            settings = settings.add_source(config::File::from(path));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("HALFBEAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;
        if !(0.0..=1.0).contains(&playback.initial_volume) {
            return Err(PlaybackError::Config(format!(
                "initial_volume must be within 0.0..=1.0, got {}",
                playback.initial_volume
            )));
        }

        if !playback.volume_compensation_db.is_finite() {
            return Err(PlaybackError::Config(
                "volume_compensation_db must be finite".to_string(),
            ));
        }

        if playback.max_play_attempts == 0 {
            return Err(PlaybackError::Config(
                "max_play_attempts must be at least 1".to_string(),
            ));
        }

        if self.resolver.expiry_margin_secs < 0 || self.resolver.local_url_ttl_days <= 0 {
            return Err(PlaybackError::Config(
                "expiry margin and local URL lifetime must be positive".to_string(),
            ));
        }

        if self.resolver.proxy_url_marker.is_empty() || self.resolver.local_url_marker.is_empty() {
            return Err(PlaybackError::Config("URL markers must not be empty".to_string()));
        }

        let tick = self.persistence.skip_tick_secs;
        if !tick.is_finite() || tick <= 0.0 {
            return Err(PlaybackError::Config(format!(
                "skip_tick_secs must be positive, got {tick}"
            )));
        }

        Ok(())
    }

    pub fn resolve_timeout(&self) -> Option<Duration> {
        match self.resolver.resolve_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn skip_write_debounce(&self) -> Duration {
        Duration::from_millis(self.persistence.skip_write_debounce_ms)
    }

    pub fn playlist_save_debounce(&self) -> Duration {
        Duration::from_millis(self.persistence.playlist_save_debounce_ms)
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            initial_volume: default_initial_volume(),
            volume_compensation_db: 0.0,
            play_mode: PlayMode::default(),
            max_play_attempts: default_max_play_attempts(),
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            expiry_margin_secs: default_expiry_margin_secs(),
            local_url_ttl_days: default_local_url_ttl_days(),
            resolve_timeout_secs: default_resolve_timeout_secs(),
            proxy_url_marker: default_proxy_url_marker(),
            local_url_marker: default_local_url_marker(),
        }
    }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            skip_write_debounce_ms: default_skip_write_debounce_ms(),
            playlist_save_debounce_ms: default_playlist_save_debounce_ms(),
            skip_tick_secs: default_skip_tick_secs(),
        }
    }
}

// Default values
fn default_initial_volume() -> f32 {
    0.5
}

fn default_max_play_attempts() -> u32 {
    3
}

fn default_expiry_margin_secs() -> i64 {
    60
}

fn default_local_url_ttl_days() -> i64 {
    365
}

fn default_resolve_timeout_secs() -> u64 {
    20
}

fn default_proxy_url_marker() -> String {
    "127.0.0.1:9999/audio".to_string()
}

fn default_local_url_marker() -> String {
    "127.0.0.1:9999/local".to_string()
}

fn default_skip_write_debounce_ms() -> u64 {
    500
}

fn default_playlist_save_debounce_ms() -> u64 {
    1000
}

fn default_skip_tick_secs() -> f64 {
    0.05
}
