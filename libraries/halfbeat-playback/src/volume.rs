//! Volume control with loudness compensation
//!
//! The user-facing level is linear (0.0 - 1.0). A separate compensation
//! value in dB evens out loudness between tracks and is applied either on
//! the processing graph's gain node or folded into the element volume.

/// Lower bound of the graph gain multiplier
pub const MIN_GRAPH_GAIN: f32 = 0.25;

/// Upper bound of the graph gain multiplier
pub const MAX_GRAPH_GAIN: f32 = 4.0;

/// Volume controller
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Volume level (0.0 - 1.0)
    level: f32,

    /// Mute state (preserves volume level)
    muted: bool,

    /// Loudness compensation in dB
    compensation_db: f32,
}

impl Volume {
    /// Create new volume controller
    ///
    /// Non-finite levels become 0.0, others are clamped to `0.0..=1.0`.
    pub fn new(level: f32) -> Self {
        Self {
            level: clamp_unit(level),
            muted: false,
            compensation_db: 0.0,
        }
    }

    /// Set volume level (0.0 - 1.0)
    pub fn set_level(&mut self, level: f32) {
        self.level = clamp_unit(level);
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Mute audio (preserves volume level)
    pub fn mute(&mut self) {
        self.muted = true;
    }

    /// Unmute audio (restores previous volume)
    pub fn unmute(&mut self) {
        self.muted = false;
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Set loudness compensation; non-finite values count as 0 dB
    pub fn set_compensation_db(&mut self, db: f32) {
        self.compensation_db = if db.is_finite() { db } else { 0.0 };
    }

    pub fn compensation_db(&self) -> f32 {
        self.compensation_db
    }

    /// Linear multiplier for the compensation: `10^(dB/20)`
    pub fn compensation_gain(&self) -> f32 {
        db_to_linear(self.compensation_db)
    }

    /// Gain node value when a processing graph is active
    pub fn graph_gain(&self) -> f32 {
        self.compensation_gain().clamp(MIN_GRAPH_GAIN, MAX_GRAPH_GAIN)
    }

    /// Volume to set on the output element
    ///
    /// With an active graph the compensation lives on the gain node, so the
    /// element carries the plain level. Without one the compensation is
    /// folded into the element volume and clamped to `0.0..=1.0`.
    pub fn element_volume(&self, graph_active: bool) -> f32 {
        if graph_active {
            self.level
        } else {
            clamp_unit(self.level * self.compensation_gain())
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(0.5)
    }
}

/// Convert dB to linear gain; non-finite input is treated as 0 dB
pub fn db_to_linear(db: f32) -> f32 {
    let db = if db.is_finite() { db } else { 0.0 };
    10.0_f32.powf(db / 20.0)
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
