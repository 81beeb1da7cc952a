//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the venues the engine trades on and the
//! observers it reports to.

pub mod notifier;
pub mod venue;
