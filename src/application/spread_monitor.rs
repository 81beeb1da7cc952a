//! Event-driven spread statistics per observed pair.

use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::domain::{ObservedPairKey, Ratio, SpreadBounds};
use crate::error::ConfigError;
use crate::port::{Event, Notifier};

/// Keeps a [`SpreadBounds`] per observed pair, fed by quote-pair evaluations.
#[derive(Debug)]
pub struct SpreadMonitor {
    window: Duration,
    valid_after: Duration,
    bounds: DashMap<ObservedPairKey, SpreadBounds>,
}

impl SpreadMonitor {
    /// Create a monitor. The window must be at least as long as `valid_after`.
    pub fn new(window: Duration, valid_after: Duration) -> Result<Self, ConfigError> {
        if SpreadBounds::new(window, valid_after).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "spread_window_secs",
                reason: "must not be shorter than spread_valid_after_secs".into(),
            });
        }
        Ok(Self {
            window,
            valid_after,
            bounds: DashMap::new(),
        })
    }

    /// Run `f` against the bounds for `key`, creating them on first use.
    pub fn with_bounds<R>(
        &self,
        key: &ObservedPairKey,
        f: impl FnOnce(&mut SpreadBounds) -> R,
    ) -> Option<R> {
        if !self.bounds.contains_key(key) {
            let fresh = SpreadBounds::new(self.window, self.valid_after)?;
            self.bounds.entry(key.clone()).or_insert(fresh);
        }
        self.bounds.get_mut(key).map(|mut bounds| f(&mut bounds))
    }

    /// Record a spread sample for `key`.
    pub fn input(&self, key: &ObservedPairKey, spread: Ratio) {
        self.with_bounds(key, |bounds| bounds.input(spread));
    }

    /// Window average for `key`, once enough history exists.
    #[must_use]
    pub fn window_average(&self, key: &ObservedPairKey) -> Option<Ratio> {
        self.bounds.get_mut(key).and_then(|mut bounds| {
            if bounds.has_window_average() {
                bounds.window_average()
            } else {
                None
            }
        })
    }

    /// Snapshot of the bounds for `key`.
    #[must_use]
    pub fn bounds(&self, key: &ObservedPairKey) -> Option<SpreadBounds> {
        self.bounds.get(key).map(|b| b.value().clone())
    }

    /// Clear the history for `key`.
    pub fn reset(&self, key: &ObservedPairKey) {
        if let Some(mut bounds) = self.bounds.get_mut(key) {
            debug!(key = %key, "Spread bounds reset");
            bounds.reset();
        }
    }
}

impl Notifier for SpreadMonitor {
    fn notify(&self, event: &Event) {
        match event {
            Event::QuotePairEvaluated { pair, phase } => {
                self.input(&pair.key(), pair.spread(*phase));
            }
            Event::EntryOrdersFilled(position) | Event::PositionRemoved(position) => {
                self.reset(position.key());
            }
            _ => {}
        }
    }
}
