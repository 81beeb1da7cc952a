//! Engine timing configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::application::EngineSettings;

/// The `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Sleep between master loop iterations.
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,
    /// Sleep between quote fetches per venue and pair.
    #[serde(default = "default_quote_interval_ms")]
    pub quote_interval_ms: u64,
    #[serde(default = "default_wallet_poll_interval_secs")]
    pub wallet_poll_interval_secs: u64,
    /// Stop after this many seconds. Runs until interrupted when unset.
    #[serde(default)]
    pub max_runtime_secs: Option<u64>,
    /// Shut down once this file exists. Not watched when unset.
    #[serde(default)]
    pub stop_file: Option<PathBuf>,
    #[serde(default = "default_stop_file_check_secs")]
    pub stop_file_check_secs: u64,
}

impl EngineConfig {
    #[must_use]
    pub fn stop_file_check_interval(&self) -> Duration {
        Duration::from_secs(self.stop_file_check_secs)
    }
}

const fn default_loop_interval_ms() -> u64 {
    100
}

const fn default_quote_interval_ms() -> u64 {
    5_000
}

const fn default_wallet_poll_interval_secs() -> u64 {
    5 * 60
}

const fn default_stop_file_check_secs() -> u64 {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: default_loop_interval_ms(),
            quote_interval_ms: default_quote_interval_ms(),
            wallet_poll_interval_secs: default_wallet_poll_interval_secs(),
            max_runtime_secs: None,
            stop_file: None,
            stop_file_check_secs: default_stop_file_check_secs(),
        }
    }
}

impl From<EngineConfig> for EngineSettings {
    fn from(config: EngineConfig) -> Self {
        Self {
            loop_interval: Duration::from_millis(config.loop_interval_ms),
            quote_interval: Duration::from_millis(config.quote_interval_ms),
            wallet_poll_interval: Duration::from_secs(config.wallet_poll_interval_secs),
            max_runtime: config.max_runtime_secs.map(Duration::from_secs),
        }
    }
}
