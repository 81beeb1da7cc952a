//! Outbound adapters (driven side).

pub mod simulated;

pub use simulated::SimulatedVenue;
