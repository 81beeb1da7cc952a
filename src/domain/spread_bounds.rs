//! Sliding-window spread statistics for one observed pair.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;

use super::money::Ratio;

/// Global min/max plus a time-windowed average of spread samples.
///
/// The window average only becomes available once the oldest retained sample
/// is at least `valid_after` old. After that it stays available for as long as
/// the window holds any sample.
#[derive(Debug, Clone)]
pub struct SpreadBounds {
    min: Option<Ratio>,
    max: Option<Ratio>,
    samples: VecDeque<(Instant, Ratio)>,
    sum: Decimal,
    window: Duration,
    valid_after: Duration,
    established: bool,
}

impl SpreadBounds {
    /// Create empty bounds.
    ///
    /// Returns `None` when `window` is shorter than `valid_after`, since such
    /// bounds could never produce an average.
    #[must_use]
    pub fn new(window: Duration, valid_after: Duration) -> Option<Self> {
        if window < valid_after {
            return None;
        }
        Some(Self {
            min: None,
            max: None,
            samples: VecDeque::new(),
            sum: Decimal::ZERO,
            window,
            valid_after,
            established: false,
        })
    }

    /// Record a sample taken now.
    pub fn input(&mut self, value: Ratio) {
        self.input_at(value, Instant::now());
    }

    /// Record a sample taken at `now`.
    pub fn input_at(&mut self, value: Ratio, now: Instant) {
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.samples.push_back((now, value));
        self.sum += value;
        self.trim(now);
    }

    /// Whether enough history exists for a window average.
    pub fn has_window_average(&mut self) -> bool {
        self.has_window_average_at(Instant::now())
    }

    pub fn has_window_average_at(&mut self, now: Instant) -> bool {
        if self.established && !self.samples.is_empty() {
            return true;
        }
        let met = self
            .samples
            .front()
            .is_some_and(|(at, _)| now.saturating_duration_since(*at) >= self.valid_after);
        if met {
            self.established = true;
        }
        met
    }

    /// Mean of the samples still inside the window.
    pub fn window_average(&mut self) -> Option<Ratio> {
        self.window_average_at(Instant::now())
    }

    pub fn window_average_at(&mut self, now: Instant) -> Option<Ratio> {
        self.trim(now);
        if !self.established || self.samples.is_empty() {
            return None;
        }
        Some(self.sum / Decimal::from(self.samples.len()))
    }

    /// Time left until the window average becomes available.
    ///
    /// `None` when no sample has been recorded yet.
    #[must_use]
    pub fn time_until_window_met(&self, now: Instant) -> Option<Duration> {
        if self.established {
            return Some(Duration::ZERO);
        }
        self.samples
            .front()
            .map(|(at, _)| self.valid_after.saturating_sub(now.saturating_duration_since(*at)))
    }

    /// Clear every sample and statistic.
    pub fn reset(&mut self) {
        self.min = None;
        self.max = None;
        self.samples.clear();
        self.sum = Decimal::ZERO;
        self.established = false;
    }

    #[must_use]
    pub fn min(&self) -> Option<Ratio> {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> Option<Ratio> {
        self.max
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn is_established(&self) -> bool {
        self.established
    }

    fn trim(&mut self, now: Instant) {
        while let Some((at, value)) = self.samples.front().copied() {
            if now.saturating_duration_since(at) <= self.window {
                break;
            }
            self.sum -= value;
            self.samples.pop_front();
        }
    }
}
