//! Rate control for feed subscriptions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a feed subscriber wants snapshots delivered
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every snapshot the source produces
    #[default]
    Native,

    /// At most this many snapshots per second, latest wins.
    /// A rate at or above the source rate behaves like Native.
    Max(u32),
}

impl UpdateRate {
    /// Resolve against the source rate in Hz
    pub fn normalize(self, source_hz: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            // zero would never emit, treat it as "no limit"
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if f64::from(hz) >= source_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
        }
    }

    /// Minimum spacing between delivered snapshots, if throttling applies
    pub fn throttle_interval(self, source_hz: f64) -> Option<Duration> {
        match self.normalize(source_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }
}
