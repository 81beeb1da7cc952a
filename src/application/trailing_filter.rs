//! Trailing-stop confirmation filter.
//!
//! A single excursion past the target is not acted on. The filter keeps a
//! stop that ratchets toward the best spread seen and approves only once the
//! spread has retreated past the stop and held there for the required number
//! of observations.

use dashmap::DashMap;
use tracing::debug;

use crate::domain::{MarketPhase, ObservedPairKey, Ratio, TrailingDetails};

/// Stateful approval over per-pair [`TrailingDetails`].
///
/// Entry and exit use separate instances, so their state never mixes.
#[derive(Debug)]
pub struct TrailingStopFilter {
    phase: MarketPhase,
    offset: Ratio,
    required_confirmations: u32,
    details: DashMap<ObservedPairKey, TrailingDetails>,
}

impl TrailingStopFilter {
    #[must_use]
    pub fn new(phase: MarketPhase, offset: Ratio, required_confirmations: u32) -> Self {
        Self {
            phase,
            offset,
            required_confirmations,
            details: DashMap::new(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> MarketPhase {
        self.phase
    }

    /// Feed one spread observation for `key`. Returns `true` on approval.
    ///
    /// The caller resets the key after acting on an approval.
    pub fn evaluate(&self, key: &ObservedPairKey, current: Ratio, target: Ratio) -> bool {
        let mut details = self.details.entry(key.clone()).or_default();

        if self.is_behind(current, target) {
            details.reset();
            return false;
        }

        let candidate = match self.phase {
            MarketPhase::Entry => current - self.offset,
            MarketPhase::Exit => current + self.offset,
        };

        let stop = match details.trailing() {
            None => {
                debug!(
                    phase = self.phase.as_str(),
                    key = %key,
                    trailing = %candidate,
                    "Trailing stop set"
                );
                details.set_trailing(candidate);
                details.reset_confirmations();
                return false;
            }
            Some(stored) if self.is_ahead(candidate, stored) => {
                debug!(
                    phase = self.phase.as_str(),
                    key = %key,
                    trailing = %candidate,
                    "Trailing stop moved"
                );
                details.set_trailing(candidate);
                details.reset_confirmations();
                candidate
            }
            Some(stored) => stored,
        };

        if !self.is_behind(current, stop) {
            details.reset_confirmations();
            return false;
        }

        if details.confirmations() < self.required_confirmations {
            details.increment_confirmations();
            return false;
        }

        true
    }

    /// Clear the state for `key`.
    pub fn reset(&self, key: &ObservedPairKey) {
        if let Some(mut details) = self.details.get_mut(key) {
            details.reset();
        }
    }

    /// Current state for `key`.
    #[must_use]
    pub fn details(&self, key: &ObservedPairKey) -> Option<TrailingDetails> {
        self.details.get(key).map(|d| d.value().clone())
    }

    /// `value` is on the unfavourable side of `threshold`.
    ///
    /// Entry wants a wide spread, exit a narrow one.
    fn is_behind(&self, value: Ratio, threshold: Ratio) -> bool {
        match self.phase {
            MarketPhase::Entry => value < threshold,
            MarketPhase::Exit => value > threshold,
        }
    }

    /// `value` is strictly more favourable than `threshold`.
    fn is_ahead(&self, value: Ratio, threshold: Ratio) -> bool {
        match self.phase {
            MarketPhase::Entry => value > threshold,
            MarketPhase::Exit => value < threshold,
        }
    }
}
