//! # Player Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Release the resource and return to idle when a track ends on its own.
    ///
    /// Default: true.
    #[serde(default = "default_auto_release")]
    pub auto_release_on_finish: bool,

    /// Volume applied when a track is opened, in `0.0..=1.0`.
    ///
    /// Default: 1.0.
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,

    /// How often the host should publish position updates.
    ///
    /// Default: 500ms.
    #[serde(default = "default_status_interval")]
    pub status_interval: Duration,
}

fn default_auto_release() -> bool {
    true
}

fn default_initial_volume() -> f32 {
    1.0
}

fn default_status_interval() -> Duration {
    Duration::from_millis(500)
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            auto_release_on_finish: default_auto_release(),
            initial_volume: default_initial_volume(),
            status_interval: default_status_interval(),
        }
    }
}

impl PlayerConfig {
    pub fn with_auto_release(mut self, enabled: bool) -> Self {
        self.auto_release_on_finish = enabled;
        self
    }

    /// Set the initial volume, clamped to `0.0..=1.0`.
    pub fn with_initial_volume(mut self, volume: f32) -> Self {
        self.initial_volume = clamp_volume(volume);
        self
    }

    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(format!(
                "initial_volume must be between 0.0 and 1.0, got {}",
                self.initial_volume
            ));
        }

        if self.status_interval.is_zero() {
            return Err("status_interval must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Clamp a volume to `0.0..=1.0`, mapping NaN to silence.
pub(crate) fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
