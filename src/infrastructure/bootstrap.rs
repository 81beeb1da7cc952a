//! Infrastructure bootstrap helpers for runtime wiring.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapter::outbound::SimulatedVenue;
use crate::application::venue::{VenueGateway, VenueGateways};
use crate::application::{Engine, EngineSettings, PositionRegistry, TradingParams};
use crate::domain::VenueId;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::config::venue::VenueKind;
use crate::infrastructure::snapshot::{AutoSave, SnapshotStore};
use crate::infrastructure::stop_file::StopFileWatcher;
use crate::port::{LogNotifier, NotifierRegistry, Venue};

/// Build one gateway per configured venue.
pub fn build_gateways(config: &Config) -> Result<VenueGateways> {
    let cancel_revert_delay = Duration::from_secs(config.trading.cancel_revert_delay_secs);
    let mut gateways = VenueGateways::new();
    for venue_config in &config.venues {
        let venue: Arc<dyn Venue> = match venue_config.kind {
            VenueKind::Simulated => Arc::new(SimulatedVenue::from_config(venue_config)?),
        };
        let settings =
            venue_config.gateway_settings(cancel_revert_delay, config.trading.demo_mode);
        info!(
            venue = %venue_config.name,
            kind = ?venue_config.kind,
            long_pairs = venue_config.long_pairs.len(),
            short_pairs = venue_config.short_pairs.len(),
            "Venue configured"
        );
        gateways.insert(VenueGateway::new(venue, settings));
    }
    Ok(gateways)
}

/// Restore open positions from the snapshot, or start empty.
pub fn build_registry(config: &Config, gateways: &VenueGateways) -> Result<PositionRegistry> {
    if !config.persistence.enabled {
        return Ok(PositionRegistry::new());
    }
    let venues: HashSet<VenueId> = gateways.ids().cloned().collect();
    SnapshotStore::new(&config.persistence.snapshot_path).import(&venues)
}

/// Build notifier registry from configuration.
pub fn build_notifier_registry(_config: &Config) -> NotifierRegistry {
    let mut registry = NotifierRegistry::new();
    registry.register(Box::new(LogNotifier));
    registry
}

/// Everything a run needs, wired from one config.
pub struct Runtime {
    engine: Engine,
    autosave: Option<AutoSave>,
    stop_file: Option<StopFileWatcher>,
}

impl Runtime {
    pub fn build(config: &Config, token: CancellationToken) -> Result<Self> {
        let gateways = Arc::new(build_gateways(config)?);
        let registry = Arc::new(build_registry(config, &gateways)?);
        let params = Arc::new(TradingParams::from(config.trading.clone()));
        let settings = EngineSettings::from(config.engine.clone());

        let autosave = config.persistence.enabled.then(|| {
            AutoSave::new(
                SnapshotStore::new(&config.persistence.snapshot_path),
                Arc::clone(&registry),
                config.persistence.autosave_interval(),
            )
        });
        if autosave.is_none() {
            warn!("Persistence disabled, open positions will not survive a restart");
        }

        let stop_file = config.engine.stop_file.as_ref().map(|path| {
            StopFileWatcher::new(path, config.engine.stop_file_check_interval())
        });

        let engine = Engine::new(
            gateways,
            registry,
            params,
            settings,
            build_notifier_registry(config),
            token,
        )?;
        Ok(Self {
            engine,
            autosave,
            stop_file,
        })
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run the engine, the auto-save task and the stop file watcher until
    /// cancellation.
    pub async fn run(self) -> Result<()> {
        let token = self.engine.token().clone();
        let autosave = self.autosave.map(|autosave| tokio::spawn(autosave.run(token.clone())));
        let stop_file = self.stop_file.map(|watcher| tokio::spawn(watcher.run(token.clone())));

        let result = self.engine.run().await;
        // The engine may stop on its own when the maximum runtime passes.
        token.cancel();
        if let Some(task) = autosave {
            if let Err(e) = task.await {
                warn!(error = %e, "Auto-save task failed");
            }
        }
        if let Some(task) = stop_file {
            if let Err(e) = task.await {
                warn!(error = %e, "Stop file watcher failed");
            }
        }
        result
    }
}
