use serde::{Deserialize, Serialize};

/// Configuration for the scheduler loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the loop runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_tick_interval_secs() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}
