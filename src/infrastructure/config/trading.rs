//! Trading configuration.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::TradingParams;
use crate::domain::{Currency, CurrencyPair, Price, Ratio};
use crate::error::ConfigError;

/// The `[trading]` section.
///
/// Fractions are written as decimals: `target_profit = 0.01` is 1%.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_target_profit")]
    pub target_profit: Ratio,
    #[serde(default = "default_trailing_offset")]
    pub trailing_offset: Ratio,
    #[serde(default = "default_trailing_confirmations")]
    pub trailing_confirmations: u32,
    /// Retention of spread samples in seconds.
    #[serde(default = "default_spread_window_secs")]
    pub spread_window_secs: u64,
    /// Age the oldest sample must reach before the window average is used.
    #[serde(default = "default_spread_valid_after_secs")]
    pub spread_valid_after_secs: u64,
    #[serde(default = "default_max_quote_skew_ms")]
    pub max_quote_skew_ms: u64,
    /// Accepted distance between a book-implied limit price and the quote.
    #[serde(default = "default_max_limit_price_difference")]
    pub max_limit_price_difference: Price,
    #[serde(default)]
    pub adapt_to_window_average: bool,
    /// Per counter currency, e.g. `USD = 1000`.
    #[serde(default)]
    pub max_exposure: HashMap<Currency, Price>,
    /// Per base currency, checked once per venue at startup.
    #[serde(default)]
    pub max_initial_balance: HashMap<Currency, Decimal>,
    /// Per pair, e.g. `"BTC/USD" = 250`.
    #[serde(default)]
    pub max_transaction_amount: HashMap<CurrencyPair, Price>,
    /// Interchangeable currencies written as `"USD:USDT"`.
    #[serde(default)]
    pub equivalent_currencies: Vec<String>,
    #[serde(default = "default_order_completion_max_secs")]
    pub order_completion_max_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_unfilled_entry_cleanup_delay_secs")]
    pub unfilled_entry_cleanup_delay_secs: u64,
    #[serde(default = "default_cancel_revert_delay_secs")]
    pub cancel_revert_delay_secs: u64,
    /// Simulate orders instead of sending them.
    #[serde(default)]
    pub demo_mode: bool,
}

fn default_target_profit() -> Ratio {
    Decimal::new(1, 2) // 1%
}

fn default_trailing_offset() -> Ratio {
    Decimal::new(2, 3)
}

const fn default_trailing_confirmations() -> u32 {
    2
}

const fn default_spread_window_secs() -> u64 {
    3 * 60 * 60
}

const fn default_spread_valid_after_secs() -> u64 {
    10 * 60
}

const fn default_max_quote_skew_ms() -> u64 {
    15_000
}

fn default_max_limit_price_difference() -> Price {
    Decimal::new(1, 2)
}

const fn default_order_completion_max_secs() -> u64 {
    5 * 60
}

const fn default_poll_interval_ms() -> u64 {
    5_000
}

const fn default_unfilled_entry_cleanup_delay_secs() -> u64 {
    30
}

const fn default_cancel_revert_delay_secs() -> u64 {
    30
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            target_profit: default_target_profit(),
            trailing_offset: default_trailing_offset(),
            trailing_confirmations: default_trailing_confirmations(),
            spread_window_secs: default_spread_window_secs(),
            spread_valid_after_secs: default_spread_valid_after_secs(),
            max_quote_skew_ms: default_max_quote_skew_ms(),
            max_limit_price_difference: default_max_limit_price_difference(),
            adapt_to_window_average: false,
            max_exposure: HashMap::new(),
            max_initial_balance: HashMap::new(),
            max_transaction_amount: HashMap::new(),
            equivalent_currencies: Vec::new(),
            order_completion_max_secs: default_order_completion_max_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            unfilled_entry_cleanup_delay_secs: default_unfilled_entry_cleanup_delay_secs(),
            cancel_revert_delay_secs: default_cancel_revert_delay_secs(),
            demo_mode: false,
        }
    }
}

impl TradingConfig {
    /// Parse `equivalent_currencies` into currency pairs.
    pub fn equivalent_pairs(&self) -> Result<Vec<(Currency, Currency)>, ConfigError> {
        self.equivalent_currencies
            .iter()
            .map(|entry| {
                let (a, b) = entry.split_once(':').ok_or_else(|| ConfigError::InvalidValue {
                    field: "equivalent_currencies",
                    reason: format!("'{entry}' must look like A:B"),
                })?;
                if a.trim().is_empty() || b.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "equivalent_currencies",
                        reason: format!("'{entry}' has an empty currency"),
                    });
                }
                Ok((Currency::new(a.trim()), Currency::new(b.trim())))
            })
            .collect()
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.target_profit < Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "target_profit",
                reason: "must be 0 or greater".to_string(),
            });
        }
        if self.trailing_offset < Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "trailing_offset",
                reason: "must be 0 or greater".to_string(),
            });
        }
        if self.spread_window_secs < self.spread_valid_after_secs {
            return Err(ConfigError::InvalidValue {
                field: "spread_window_secs",
                reason: "must be >= spread_valid_after_secs".to_string(),
            });
        }
        if self.max_limit_price_difference < Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "max_limit_price_difference",
                reason: "must be 0 or greater".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.order_completion_max_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "order_completion_max_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        if let Some((currency, _)) = self.max_exposure.iter().find(|(_, v)| **v <= Decimal::ZERO) {
            return Err(ConfigError::InvalidValue {
                field: "max_exposure",
                reason: format!("{currency} must be greater than 0"),
            });
        }
        self.equivalent_pairs()?;
        Ok(())
    }
}

impl From<TradingConfig> for TradingParams {
    fn from(config: TradingConfig) -> Self {
        // Malformed entries are rejected by validation before conversion.
        let equivalent_currencies = config.equivalent_pairs().unwrap_or_default();
        Self {
            target_profit: config.target_profit,
            trailing_offset: config.trailing_offset,
            trailing_confirmations: config.trailing_confirmations,
            spread_window: Duration::from_secs(config.spread_window_secs),
            spread_valid_after: Duration::from_secs(config.spread_valid_after_secs),
            max_quote_skew: Duration::from_millis(config.max_quote_skew_ms),
            max_limit_price_difference: config.max_limit_price_difference,
            adapt_to_window_average: config.adapt_to_window_average,
            max_exposure: config.max_exposure,
            max_initial_balance: config.max_initial_balance,
            max_transaction_amount: config.max_transaction_amount,
            equivalent_currencies,
            order_completion_max: Duration::from_secs(config.order_completion_max_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            unfilled_entry_cleanup_delay: Duration::from_secs(
                config.unfilled_entry_cleanup_delay_secs,
            ),
            cancel_revert_delay: Duration::from_secs(config.cancel_revert_delay_secs),
            demo_mode: config.demo_mode,
        }
    }
}
