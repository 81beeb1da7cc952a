//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all application settings.
//! Configuration is loaded from a TOML file; a `.env` file is read by the
//! binary beforehand so `RUST_LOG` and friends can live next to it.
//!
//! # Example
//!
//! ```no_run
//! use trailspread::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use super::engine::EngineConfig;
use super::logging::LoggingConfig;
use super::persistence::PersistenceConfig;
use super::trading::TradingConfig;
use super::venue::VenueConfig;
use crate::error::{ConfigError, Result};

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Entry and exit decision parameters.
    #[serde(default)]
    pub trading: TradingConfig,

    /// Master loop and background task timings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Open position snapshot.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Venues to trade on. At least two are needed to form a pair.
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        self.trading.validate()?;

        if self.venues.is_empty() {
            return Err(ConfigError::MissingField { field: "venues" }.into());
        }
        let mut names = HashSet::new();
        for venue in &self.venues {
            venue.validate()?;
            if !names.insert(venue.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "venues.name",
                    reason: format!("duplicate venue '{}'", venue.name),
                }
                .into());
            }
        }

        if self.engine.loop_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "loop_interval_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.engine.quote_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "quote_interval_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.engine.wallet_poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "wallet_poll_interval_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.persistence.enabled && self.persistence.autosave_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "autosave_interval_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
