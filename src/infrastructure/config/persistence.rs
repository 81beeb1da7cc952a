//! Position snapshot configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// The `[persistence]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Where open positions are written.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    /// Seconds between auto-save checks.
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u64,
}

const fn default_enabled() -> bool {
    true
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("positions.json")
}

const fn default_autosave_interval_secs() -> u64 {
    10
}

impl PersistenceConfig {
    #[must_use]
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            snapshot_path: default_snapshot_path(),
            autosave_interval_secs: default_autosave_interval_secs(),
        }
    }
}
