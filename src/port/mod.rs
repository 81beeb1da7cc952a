//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │                         │
//!          ┌─────────┤  Domain + Port          ├─────────┐
//!          │         │                         │         │
//!          │         └─────────────────────────┘         │
//!          ▼                                             ▼
//!     ┌─────────┐                                  ┌───────────┐
//!     │  Venue  │                                  │ Notifier  │
//!     │ Adapter │                                  │  Adapter  │
//!     └─────────┘                                  └───────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`Venue`] - Market data, balances and order execution
//! - [`Notifier`] - Engine event observers

pub mod outbound;

pub use outbound::notifier::{Event, LogNotifier, Notifier, NotifierRegistry, NullNotifier};
pub use outbound::venue::{Venue, VenueResult};
