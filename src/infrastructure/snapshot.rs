//! Open position snapshot on disk.
//!
//! The snapshot identifies legs by venue name and currency codes, so it can
//! be loaded by a run with a different set of configured venues. Positions
//! on venues that are no longer configured are dropped with a warning.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::PositionRegistry;
use crate::domain::{Position, VenueId};
use crate::error::Result;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    positions: Vec<Position>,
}

/// Reads and writes the position snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every position in `registry`.
    ///
    /// An empty registry deletes the file instead, so a clean shutdown
    /// leaves nothing to resume.
    pub fn export(&self, registry: &PositionRegistry) -> Result<()> {
        let positions = registry.snapshot();
        if positions.is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!(path = %self.path.display(), "Removed empty snapshot"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        let count = positions.len();
        let snapshot = Snapshot {
            saved_at: Utc::now(),
            positions,
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), positions = count, "Snapshot written");
        Ok(())
    }

    /// Positions in the file, or none if it does not exist.
    pub fn load(&self) -> Result<Vec<Position>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        Ok(snapshot.positions)
    }

    /// Build a registry from the file, keeping positions whose venues are known.
    ///
    /// Versions start from zero so the first auto-save only fires on change.
    pub fn import(&self, venues: &HashSet<VenueId>) -> Result<PositionRegistry> {
        let positions = self.load()?;
        let total = positions.len();
        let kept: Vec<Position> = positions
            .into_iter()
            .filter(|position| {
                let known = venues.contains(position.long().venue())
                    && venues.contains(position.short().venue());
                if !known {
                    warn!(
                        position = %position.id(),
                        long = %position.long(),
                        short = %position.short(),
                        "Dropping position on unconfigured venue"
                    );
                }
                known
            })
            .collect();

        let registry = PositionRegistry::from_positions(kept);
        registry.reset_versions();
        info!(
            path = %self.path.display(),
            loaded = registry.len(),
            dropped = total - registry.len(),
            "Positions restored"
        );
        Ok(registry)
    }
}

/// Writes the registry whenever its version moves.
pub struct AutoSave {
    store: SnapshotStore,
    registry: Arc<PositionRegistry>,
    interval: Duration,
}

impl AutoSave {
    pub fn new(store: SnapshotStore, registry: Arc<PositionRegistry>, interval: Duration) -> Self {
        Self {
            store,
            registry,
            interval,
        }
    }

    /// Save on change every interval, and once more on cancellation.
    pub async fn run(self, token: CancellationToken) {
        let mut last = self.registry.version();
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
            let version = self.registry.version();
            if version == last {
                continue;
            }
            // Copy first so the file matches one consistent version.
            let copy = self.registry.copy();
            match self.store.export(&copy) {
                Ok(()) => last = version,
                Err(e) => error!(error = %e, "Auto-save failed"),
            }
        }

        if let Err(e) = self.store.export(&self.registry) {
            error!(error = %e, "Final snapshot failed");
        }
        debug!("Auto-save stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurrencyPair, LegPair, ObservedPairKey, PositionId, VenueAndPair};
    use rust_decimal_macros::dec;

    fn position(id: u64, long: &str, short: &str) -> Position {
        let pair = CurrencyPair::new("BTC", "USD");
        Position::new(
            PositionId::new(id),
            ObservedPairKey::new(
                VenueAndPair::new(VenueId::new(long), pair.clone()),
                VenueAndPair::new(VenueId::new(short), pair),
            ),
            LegPair::new(dec!(0.002), dec!(0.002)),
        )
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("positions.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn empty_registry_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("positions.json"));
        let registry = PositionRegistry::from_positions([position(1, "a", "b")]);
        store.export(&registry).unwrap();
        assert!(store.path().exists());

        registry.remove(PositionId::new(1));
        store.export(&registry).unwrap();
        assert!(!store.path().exists());
    }
}
