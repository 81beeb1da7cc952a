//! Application services (use cases).
//!
//! These services orchestrate domain logic and coordinate venue gateways
//! to implement the trading engine: spread tracking, entry and exit
//! decisions, order completion polling and the master loop.

pub mod balance;
pub mod completion;
pub mod engine;
pub mod entry;
pub mod exit;
pub mod params;
pub mod poller;
pub mod quote_service;
pub mod registry;
pub mod spread_monitor;
pub mod trailing_filter;
pub mod venue;

pub use balance::WalletPoller;
pub use completion::CompletionHandler;
pub use engine::{Engine, EngineSettings};
pub use entry::{EntryDecision, MarketEntryService};
pub use exit::{ExitDecision, MarketExitService};
pub use params::TradingParams;
pub use poller::{LegTarget, OrderCompletionPoller, PollRequest};
pub use quote_service::QuoteService;
pub use registry::PositionRegistry;
pub use spread_monitor::SpreadMonitor;
pub use trailing_filter::TrailingStopFilter;
