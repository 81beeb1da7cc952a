//! Wallet refresh and initial balance validation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::params::TradingParams;
use super::registry::PositionRegistry;
use super::venue::{VenueGateway, VenueGateways};
use crate::domain::{VenueAndPair, VenueId};

/// Keeps every venue's wallet cache fresh.
///
/// The first time a venue's wallet is populated, its base-currency balances
/// are checked against `max_initial_balance` for every pair not already in
/// market. A venue holding more than allowed is circuit-broken and its
/// wallet cleared, which also keeps pollers away from it.
pub struct WalletPoller {
    gateways: Arc<VenueGateways>,
    registry: Arc<PositionRegistry>,
    params: Arc<TradingParams>,
    interval: Duration,
    validated: Mutex<HashSet<VenueId>>,
}

impl WalletPoller {
    pub fn new(
        gateways: Arc<VenueGateways>,
        registry: Arc<PositionRegistry>,
        params: Arc<TradingParams>,
        interval: Duration,
    ) -> Self {
        Self {
            gateways,
            registry,
            params,
            interval,
            validated: Mutex::new(HashSet::new()),
        }
    }

    /// Refresh every enabled venue once.
    pub async fn refresh_all(&self) {
        for gateway in self.gateways.iter() {
            if gateway.is_disabled() {
                debug!(venue = %gateway.id(), "Skipping wallet refresh for disabled venue");
                continue;
            }
            if let Err(e) = gateway.refresh_wallet().await {
                if gateway.is_retryable(&e) {
                    warn!(
                        venue = %gateway.id(),
                        error = %e,
                        "Wallet refresh failed, disabling venue"
                    );
                    gateway.disable_temporarily();
                } else {
                    error!(venue = %gateway.id(), error = %e, "Wallet refresh failed");
                }
                continue;
            }

            let first = self.validated.lock().insert(gateway.id().clone());
            if first && !self.validate(gateway) {
                self.validated.lock().remove(gateway.id());
                gateway.disable_temporarily();
                gateway.clear_wallet();
                continue;
            }
            log_balances(gateway);
        }
    }

    /// Whether the venue's base balances are within the configured maximum.
    fn validate(&self, gateway: &VenueGateway) -> bool {
        let mut valid = true;
        for (currency, amount) in gateway.cached_balances() {
            let Some(max) = self.params.max_initial_balance(&currency) else {
                continue;
            };
            let in_market = gateway
                .traded_pairs()
                .into_iter()
                .filter(|pair| pair.base() == &currency)
                .any(|pair| {
                    self.registry
                        .is_in_market(&VenueAndPair::new(gateway.id().clone(), pair))
                });
            if !in_market && amount > max {
                error!(
                    venue = %gateway.id(),
                    currency = %currency,
                    balance = %amount,
                    max = %max,
                    "Balance above the allowed initial maximum"
                );
                valid = false;
            }
        }
        valid
    }

    /// Refresh on every interval until cancelled.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        info!(interval = ?self.interval, "Wallet poller started");
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
            self.refresh_all().await;
        }
        debug!("Wallet poller stopped");
    }
}

fn log_balances(gateway: &VenueGateway) {
    for (currency, amount) in gateway.cached_balances() {
        info!(venue = %gateway.id(), currency = %currency, balance = %amount, "Balance");
    }
}
