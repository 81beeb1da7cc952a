//! Operator stop switch.
//!
//! Creating the watched file asks a running process to shut down cleanly:
//! open positions stay in the snapshot and resume on the next start.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cancels the run once a file appears.
#[derive(Debug, Clone)]
pub struct StopFileWatcher {
    path: PathBuf,
    interval: Duration,
}

impl StopFileWatcher {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
        }
    }

    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Check every interval until the file exists or `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        info!(path = %self.path.display(), "Watching for stop file");
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
            if self.path.exists() {
                info!(path = %self.path.display(), "Stop file found, shutting down");
                token.cancel();
                break;
            }
        }
        debug!("Stop file watcher stopped");
    }
}
