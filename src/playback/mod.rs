pub mod engine;
pub mod scheduler;

pub use engine::{PlaybackEngine, PlaybackEvent};
pub use scheduler::{Scheduler, TimerId};

use serde::{Deserialize, Serialize};

/// Number of interpolation steps between two waypoints
pub const SUB_STEPS: u32 = 20;

pub const MIN_INTERVAL_MS: u32 = 200;
pub const MAX_INTERVAL_MS: u32 = 3000;
pub const INTERVAL_STEP_MS: u32 = 100;
pub const DEFAULT_INTERVAL_MS: u32 = 1000;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Last waypoint reached, toggling is disabled until reset
    AtEnd,
    Paused,
    Playing,
}

/// Playback configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Time between waypoints, also the duration of each sub-animation
    pub interval_ms: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { interval_ms: DEFAULT_INTERVAL_MS }
    }
}

impl PlaybackConfig {
    /// Clamp to the slider range and snap to the slider step
    pub fn normalize_interval(ms: u32) -> u32 {
        let snapped = (ms.saturating_add(INTERVAL_STEP_MS / 2) / INTERVAL_STEP_MS) * INTERVAL_STEP_MS;
        snapped.clamp(MIN_INTERVAL_MS, MAX_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_interval() {
        assert_eq!(PlaybackConfig::normalize_interval(0), MIN_INTERVAL_MS);
        assert_eq!(PlaybackConfig::normalize_interval(1049), 1000);
        assert_eq!(PlaybackConfig::normalize_interval(1050), 1100);
        assert_eq!(PlaybackConfig::normalize_interval(9999), MAX_INTERVAL_MS);
        assert_eq!(PlaybackConfig::normalize_interval(u32::MAX), MAX_INTERVAL_MS);
    }
}
