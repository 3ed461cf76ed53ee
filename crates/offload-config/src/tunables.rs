//! The four timing knobs the client's concurrency model is built around.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client-side timing tunables.
///
/// Defaults match the spec's fixed constants; a deployment can override any
/// of them without a recompile through config files or environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunablesConfig {
    /// Transport poll/read timeout. Exceeding it implies disconnect.
    #[serde(default = "TunablesConfig::default_server_timeout_secs")]
    pub server_timeout_secs: u64,

    /// Minimum gap between non-forced heartbeats.
    #[serde(default = "TunablesConfig::default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Deadline for a single TokenPool::acquire attempt.
    #[serde(default = "TunablesConfig::default_token_acquire_timeout_secs")]
    pub token_acquire_timeout_secs: u64,

    /// Deadline for a ProducerDriver waiting on its next frame.
    #[serde(default = "TunablesConfig::default_frame_await_timeout_secs")]
    pub frame_await_timeout_secs: u64,
}

impl TunablesConfig {
    fn default_server_timeout_secs() -> u64 {
        10
    }

    fn default_heartbeat_interval_secs() -> u64 {
        1
    }

    fn default_token_acquire_timeout_secs() -> u64 {
        1
    }

    fn default_frame_await_timeout_secs() -> u64 {
        1
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn token_acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.token_acquire_timeout_secs)
    }

    pub fn frame_await_timeout(&self) -> Duration {
        Duration::from_secs(self.frame_await_timeout_secs)
    }
}

impl Default for TunablesConfig {
    fn default() -> Self {
        Self {
            server_timeout_secs: Self::default_server_timeout_secs(),
            heartbeat_interval_secs: Self::default_heartbeat_interval_secs(),
            token_acquire_timeout_secs: Self::default_token_acquire_timeout_secs(),
            frame_await_timeout_secs: Self::default_frame_await_timeout_secs(),
        }
    }
}
