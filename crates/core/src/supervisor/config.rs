use serde::{Deserialize, Serialize};

/// Configuration for the encoder process supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Path to the ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Seconds to wait after a graceful quit signal before killing the
    /// encoder.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Number of trailing stderr lines kept for crash diagnostics.
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_grace_period_secs() -> u64 {
    5
}

fn default_stderr_tail_lines() -> usize {
    20
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            grace_period_secs: default_grace_period_secs(),
            stderr_tail_lines: default_stderr_tail_lines(),
        }
    }
}
