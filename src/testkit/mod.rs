//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`venue`] - [`MockVenue`], a scripted in-memory [`Venue`](crate::port::Venue).
//! - [`config`] - Canonical trading, gateway and engine settings.

pub mod config;
pub mod venue;

pub use config::{engine_settings, gateway_settings, test_params};
pub use venue::MockVenue;
