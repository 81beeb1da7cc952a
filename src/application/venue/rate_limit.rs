//! Per-operation request spacing for venue calls.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::time::{sleep_until, Instant};

/// Kind of venue call, each with its own limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Quote,
    Wallet,
    Order,
    Query,
}

impl OperationClass {
    pub const ALL: [Self; 4] = [Self::Quote, Self::Wallet, Self::Order, Self::Query];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Wallet => "wallet",
            Self::Order => "order",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests per second allowed for each operation class.
///
/// A rate of zero disables limiting for that class.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RateLimits {
    #[serde(default = "default_rate")]
    pub quote: f64,
    #[serde(default = "default_rate")]
    pub wallet: f64,
    #[serde(default = "default_rate")]
    pub order: f64,
    #[serde(default = "default_rate")]
    pub query: f64,
}

const fn default_rate() -> f64 {
    0.5
}

impl RateLimits {
    /// No limiting on any class.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            quote: 0.0,
            wallet: 0.0,
            order: 0.0,
            query: 0.0,
        }
    }

    #[must_use]
    pub const fn rate(&self, class: OperationClass) -> f64 {
        match class {
            OperationClass::Quote => self.quote,
            OperationClass::Wallet => self.wallet,
            OperationClass::Order => self.order,
            OperationClass::Query => self.query,
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            quote: default_rate(),
            wallet: default_rate(),
            order: default_rate(),
            query: default_rate(),
        }
    }
}

/// Spaces permits evenly at a fixed rate.
///
/// Callers reserve the next free slot under the lock and then sleep until it
/// arrives, so concurrent callers queue in arrival order.
#[derive(Debug)]
pub struct RateLimiter {
    spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Limiter admitting `rate` requests per second.
    #[must_use]
    pub fn per_second(rate: f64) -> Self {
        let spacing = if rate > 0.0 && rate.is_finite() {
            Duration::from_secs_f64(1.0 / rate)
        } else {
            Duration::ZERO
        };
        Self {
            spacing,
            next_slot: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait for a permit.
    pub async fn acquire(&self) {
        if self.spacing.is_zero() {
            return;
        }
        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.spacing);
            slot
        };
        sleep_until(slot).await;
    }
}

/// One limiter per operation class.
#[derive(Debug)]
pub struct RateLimiterSet {
    limiters: HashMap<OperationClass, RateLimiter>,
}

impl RateLimiterSet {
    #[must_use]
    pub fn new(limits: &RateLimits) -> Self {
        let limiters = OperationClass::ALL
            .into_iter()
            .map(|class| (class, RateLimiter::per_second(limits.rate(class))))
            .collect();
        Self { limiters }
    }

    /// Wait for a permit for `class`.
    pub async fn acquire(&self, class: OperationClass) {
        if let Some(limiter) = self.limiters.get(&class) {
            limiter.acquire().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_disables_limiting() {
        assert_eq!(RateLimiter::per_second(0.0).spacing(), Duration::ZERO);
        assert_eq!(RateLimiter::per_second(2.0).spacing(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn permits_are_spaced() {
        let limiter = RateLimiter::per_second(2.0);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn classes_are_independent() {
        let set = RateLimiterSet::new(&RateLimits::default());
        let start = Instant::now();
        set.acquire(OperationClass::Quote).await;
        set.acquire(OperationClass::Order).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
