//! Venue configuration.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::venue::{GatewaySettings, RateLimits};
use crate::domain::{Currency, CurrencyPair, Price, Ratio, TradingRule, TradingRules, VenueId};
use crate::error::ConfigError;

/// Supported venue adapters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    /// Paper venue with random-walk quotes and immediate fills.
    #[default]
    Simulated,
}

/// One `[[venues]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    /// Unique venue name, used in logs and snapshots.
    pub name: String,
    #[serde(default)]
    pub kind: VenueKind,
    /// Fee per trade as a fraction of the traded amount.
    #[serde(default = "default_fee")]
    pub fee: Ratio,
    /// Pairs that may be bought.
    #[serde(default)]
    pub long_pairs: Vec<CurrencyPair>,
    /// Pairs that may be sold short.
    #[serde(default)]
    pub short_pairs: Vec<CurrencyPair>,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default)]
    pub rate_limits: RateLimits,
    /// Circuit breaker cooldown in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Freshness window for cached balances in seconds.
    #[serde(default = "default_wallet_cache_secs")]
    pub wallet_cache_secs: u64,
    /// Multiplier on volume when walking the order book.
    #[serde(default = "default_order_book_factor")]
    pub order_book_factor: Decimal,
    /// Leverage levels offered on every pair without its own rule.
    #[serde(default)]
    pub leverages: Vec<u32>,
    /// Trading rules keyed by pair (`"BTC/USD"`) or base currency (`BTC`).
    #[serde(default)]
    pub trading_rules: HashMap<String, TradingRule>,
    /// Starting balances for simulated venues.
    #[serde(default)]
    pub balances: HashMap<Currency, Decimal>,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Random-walk parameters for a simulated venue.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Starting mid price per pair.
    pub start_prices: HashMap<CurrencyPair, Price>,
    /// Mid price for pairs without a start price.
    pub default_price: Price,
    /// Largest relative move per quote.
    pub volatility: Ratio,
    /// Relative distance from mid to bid and ask.
    pub half_spread: Ratio,
    /// Levels per side of the synthesized book.
    pub book_levels: usize,
    /// Volume resting at each level.
    pub level_volume: Decimal,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_prices: HashMap::new(),
            default_price: Decimal::from(100),
            volatility: Decimal::new(2, 3),
            half_spread: Decimal::new(5, 4),
            book_levels: 5,
            level_volume: Decimal::ONE,
        }
    }
}

fn default_fee() -> Ratio {
    Decimal::new(2, 3) // 0.2%
}

const fn default_retry_attempts() -> u32 {
    3
}

const fn default_cooldown_secs() -> u64 {
    60
}

const fn default_wallet_cache_secs() -> u64 {
    5 * 60
}

fn default_order_book_factor() -> Decimal {
    Decimal::ONE
}

impl VenueConfig {
    /// Config for a simulated venue with defaults everywhere else.
    #[must_use]
    pub fn simulated(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: VenueKind::Simulated,
            fee: default_fee(),
            long_pairs: Vec::new(),
            short_pairs: Vec::new(),
            retry_attempts: default_retry_attempts(),
            rate_limits: RateLimits::default(),
            cooldown_secs: default_cooldown_secs(),
            wallet_cache_secs: default_wallet_cache_secs(),
            order_book_factor: default_order_book_factor(),
            leverages: Vec::new(),
            trading_rules: HashMap::new(),
            balances: HashMap::new(),
            simulation: SimulationConfig::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> VenueId {
        VenueId::new(&self.name)
    }

    /// Rules by pair, falling back to rules by base currency.
    ///
    /// Venue-wide leverages fill in for rules that list none.
    pub fn rules(&self) -> Result<TradingRules, ConfigError> {
        let mut rules = TradingRules::new();
        for (key, rule) in &self.trading_rules {
            let mut rule = rule.clone();
            if rule.leverages.is_empty() {
                rule.leverages = self.leverages.iter().copied().collect();
            }
            if key.contains('/') {
                let pair = key.parse::<CurrencyPair>().map_err(|reason| {
                    ConfigError::InvalidValue {
                        field: "trading_rules",
                        reason,
                    }
                })?;
                rules.insert_pair(pair, rule);
            } else {
                rules.insert_base(Currency::new(key), rule);
            }
        }
        Ok(rules)
    }

    /// Rule applied to pairs without an entry in `trading_rules`.
    #[must_use]
    pub fn default_rule(&self) -> TradingRule {
        TradingRule {
            leverages: self.leverages.iter().copied().collect(),
            ..TradingRule::default()
        }
    }

    /// Gateway settings for this venue.
    #[must_use]
    pub fn gateway_settings(
        &self,
        cancel_revert_delay: Duration,
        demo_mode: bool,
    ) -> GatewaySettings {
        GatewaySettings {
            retry_attempts: self.retry_attempts,
            cooldown: Duration::from_secs(self.cooldown_secs),
            wallet_cache: Duration::from_secs(self.wallet_cache_secs),
            rate_limits: self.rate_limits,
            order_book_factor: self.order_book_factor,
            cancel_revert_delay,
            demo_mode,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "venues.name" });
        }
        if self.long_pairs.is_empty() && self.short_pairs.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "venues.long_pairs",
                reason: format!("venue '{}' trades no pairs", self.name),
            });
        }
        if self.fee < Decimal::ZERO || self.fee >= Decimal::ONE {
            return Err(ConfigError::InvalidValue {
                field: "venues.fee",
                reason: "must be between 0 and 1".to_string(),
            });
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "venues.retry_attempts",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.order_book_factor <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "venues.order_book_factor",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.simulation.book_levels == 0 {
            return Err(ConfigError::InvalidValue {
                field: "venues.simulation.book_levels",
                reason: "must be greater than 0".to_string(),
            });
        }
        self.rules()?;
        Ok(())
    }
}
