//! Timed circuit breaker for a venue.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    /// Calls are allowed.
    Closed,
    /// Calls are refused until the cooldown expires.
    Open {
        /// Instant when the circuit breaker will transition back to Closed.
        until: Instant,
    },
}

/// Cooldown switch consulted before every venue call.
#[derive(Debug)]
pub struct CircuitBreaker {
    label: String,
    cooldown: Duration,
    state: Mutex<CircuitState>,
}

impl CircuitBreaker {
    pub fn new(label: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            label: label.into(),
            cooldown,
            state: Mutex::new(CircuitState::Closed),
        }
    }

    /// Whether the circuit is currently open.
    ///
    /// An expired cooldown closes the circuit as a side effect.
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            CircuitState::Closed => false,
            CircuitState::Open { until } => {
                if Instant::now() >= until {
                    info!(venue = %self.label, "Circuit breaker cooldown expired");
                    *state = CircuitState::Closed;
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Open the circuit for the configured cooldown.
    ///
    /// Tripping an open circuit extends its cooldown.
    pub fn trip(&self) {
        let until = Instant::now() + self.cooldown;
        *self.state.lock() = CircuitState::Open { until };
        warn!(
            venue = %self.label,
            cooldown_secs = self.cooldown.as_secs(),
            "Circuit breaker tripped, venue disabled temporarily"
        );
    }

    /// Time left until the circuit closes.
    pub fn remaining(&self) -> Option<Duration> {
        match *self.state.lock() {
            CircuitState::Closed => None,
            CircuitState::Open { until } => {
                Some(until.saturating_duration_since(Instant::now()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn trips_and_closes_after_cooldown() {
        let breaker = CircuitBreaker::new("test", Duration::from_secs(60));
        assert!(!breaker.is_open());

        breaker.trip();
        assert!(breaker.is_open());
        assert!(breaker.remaining().is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!breaker.is_open());
        assert_eq!(breaker.remaining(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn tripping_again_extends_cooldown() {
        let breaker = CircuitBreaker::new("test", Duration::from_secs(10));
        breaker.trip();
        tokio::time::advance(Duration::from_secs(8)).await;
        breaker.trip();
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(breaker.is_open());
    }
}
