//! Venue access layer: guarded gateways and the set of configured venues.

mod circuit;
mod gateway;
mod rate_limit;
mod retry;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use circuit::CircuitBreaker;
pub use gateway::{GatewaySettings, VenueGateway};
pub use rate_limit::{OperationClass, RateLimiter, RateLimiterSet, RateLimits};
pub use retry::call_with_retry;

use tracing::warn;

use crate::domain::{VenueAndPair, VenueId};
use crate::error::{Error, Result};

/// All configured venue gateways, keyed by venue id.
#[derive(Debug, Default)]
pub struct VenueGateways {
    by_id: BTreeMap<VenueId, Arc<VenueGateway>>,
}

impl VenueGateways {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a gateway, replacing any previous one with the same id.
    pub fn insert(&mut self, gateway: VenueGateway) {
        self.by_id.insert(gateway.id().clone(), Arc::new(gateway));
    }

    /// Gateway for `id`.
    pub fn get(&self, id: &VenueId) -> Result<&Arc<VenueGateway>> {
        self.by_id
            .get(id)
            .ok_or_else(|| Error::UnknownVenue(id.clone()))
    }

    /// Gateway trading `leg`.
    pub fn for_leg(&self, leg: &VenueAndPair) -> Result<&Arc<VenueGateway>> {
        self.get(leg.venue())
    }

    /// Circuit-break the venue behind `error` if its predicate calls it retryable.
    ///
    /// Returns whether a venue was disabled.
    pub fn disable_if_retryable(&self, error: &Error) -> bool {
        let Error::Venue { venue, source } = error else {
            return false;
        };
        let Ok(gateway) = self.get(venue) else {
            return false;
        };
        if !gateway.is_retryable(source) {
            return false;
        }
        warn!(venue = %venue, error = %source, "Venue error, disabling venue");
        gateway.disable_temporarily();
        true
    }

    #[must_use]
    pub fn contains(&self, id: &VenueId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<VenueGateway>> {
        self.by_id.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &VenueId> {
        self.by_id.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl FromIterator<VenueGateway> for VenueGateways {
    fn from_iter<I: IntoIterator<Item = VenueGateway>>(iter: I) -> Self {
        let mut gateways = Self::new();
        for gateway in iter {
            gateways.insert(gateway);
        }
        gateways
    }
}
