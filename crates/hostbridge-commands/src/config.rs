//! Engine timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Publish cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay before the very first cycle, in milliseconds
    #[serde(default = "default_first_delay_ms")]
    pub first_delay_ms: u64,
    /// Delay between subsequent cycles, in seconds
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    /// Minimum time between availability/autodiscovery rounds, in seconds
    #[serde(default = "default_announce_interval_secs")]
    pub announce_interval_secs: u64,
    /// Poll interval while waiting for the bus to finish connecting, in milliseconds
    #[serde(default = "default_connect_poll_ms")]
    pub connect_poll_ms: u64,
}

fn default_first_delay_ms() -> u64 {
    1000
}

fn default_cycle_interval_secs() -> u64 {
    30
}

fn default_announce_interval_secs() -> u64 {
    30
}

fn default_connect_poll_ms() -> u64 {
    250
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            first_delay_ms: default_first_delay_ms(),
            cycle_interval_secs: default_cycle_interval_secs(),
            announce_interval_secs: default_announce_interval_secs(),
            connect_poll_ms: default_connect_poll_ms(),
        }
    }
}

impl EngineConfig {
    /// Sleep before the given iteration.
    pub fn delay_for(&self, first_iteration: bool) -> Duration {
        if first_iteration {
            Duration::from_millis(self.first_delay_ms)
        } else {
            Duration::from_secs(self.cycle_interval_secs)
        }
    }

    /// Announce throttle as a Duration.
    pub fn announce_interval(&self) -> Duration {
        Duration::from_secs(self.announce_interval_secs)
    }

    /// Connect poll interval as a Duration.
    pub fn connect_poll(&self) -> Duration {
        Duration::from_millis(self.connect_poll_ms)
    }
}
