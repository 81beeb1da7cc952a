//! Trailspread - Cross-venue spread arbitrage with trailing-stop confirmation.
//!
//! The engine watches the same currency pair on several venues, buys where it
//! is cheap and shorts where it is expensive once the spread clears fees plus
//! a target profit, and closes both legs when the spread has narrowed enough
//! to lock in that profit. Entry and exit decisions are confirmed by a
//! trailing stop on the spread so a single noisy quote cannot trigger a trade.
//!
//! # Architecture
//!
//! - **`domain`** - Venue-agnostic types: quotes, order books, positions
//! - **`port`** - Venue and notifier traits
//! - **`application`** - Entry/exit services, order polling and the engine loop
//! - **`adapter`** - Venue implementations
//! - **`infrastructure`** - Configuration, persistence and runtime wiring
//!
//! # Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use trailspread::infrastructure::bootstrap::Runtime;
//! use trailspread::infrastructure::config::settings::Config;
//!
//! # async fn example() -> trailspread::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let runtime = Runtime::build(&config, CancellationToken::new())?;
//! runtime.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
