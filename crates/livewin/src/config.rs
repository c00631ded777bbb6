use std::time::Duration;

use serde::Deserialize;

use crate::{ADVANCE_INTERVAL, MIN_UPDATE_INTERVAL, NETWORK_LATENCY, SEEK_TOLERANCE};

/// Tunables of the live scheduler, all in seconds.
///
/// Every field falls back to its default when missing, so a partial TOML table
/// like `min_update_interval = 5` is valid.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Floor applied to `MPD@minimumUpdatePeriod`, and the rate limit of
    /// refreshes triggered by the advancing window.
    pub min_update_interval: f64,
    /// Cadence of the window-advance timer.
    pub advance_interval: f64,
    /// Subtracted from the last-but-one segment start to get the target update time.
    pub network_latency: f64,
    pub seek_tolerance: f64,
}

impl LiveConfig {
    /// Delay before the refresh timer fires for a manifest declaring `min_update_period`.
    pub fn refresh_delay(&self, min_update_period: f64) -> Duration {
        Duration::from_secs_f64(min_update_period.max(self.min_update_interval).max(0.))
    }

    pub fn advance_delay(&self) -> Duration {
        Duration::from_secs_f64(self.advance_interval.max(0.))
    }

    pub fn min_update_delay(&self) -> Duration {
        Duration::from_secs_f64(self.min_update_interval.max(0.))
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            min_update_interval: MIN_UPDATE_INTERVAL,
            advance_interval: ADVANCE_INTERVAL,
            network_latency: NETWORK_LATENCY,
            seek_tolerance: SEEK_TOLERANCE,
        }
    }
}
