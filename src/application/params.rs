//! Trading parameters shared by the decision services.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::domain::{Currency, CurrencyPair, Price, Ratio};

/// Typed parameters for the entry/exit pipeline and completion polling.
///
/// Built from the `[trading]` config section and handed to each service
/// behind an `Arc`.
#[derive(Debug, Clone)]
pub struct TradingParams {
    /// Profit required on top of fees (0.02 = 2%).
    pub target_profit: Ratio,
    /// Distance between the current spread and its trailing stop.
    pub trailing_offset: Ratio,
    /// Consecutive observations the spread must hold past the stop.
    pub trailing_confirmations: u32,
    /// Retention period for spread samples.
    pub spread_window: Duration,
    /// Minimum age of the oldest sample before the window average counts.
    pub spread_valid_after: Duration,
    /// Largest accepted creation-time difference between paired quotes.
    pub max_quote_skew: Duration,
    /// Largest accepted distance between a book-implied limit price and the quote.
    pub max_limit_price_difference: Price,
    /// Add the window average to the entry target.
    pub adapt_to_window_average: bool,
    /// Maximum exposure per counter currency.
    pub max_exposure: HashMap<Currency, Price>,
    /// Base-currency balance above which a venue is refused at startup.
    pub max_initial_balance: HashMap<Currency, Decimal>,
    /// Maximum notional per entry transaction, per pair.
    pub max_transaction_amount: HashMap<CurrencyPair, Price>,
    /// Currencies treated as interchangeable, e.g. USD and USDT.
    pub equivalent_currencies: Vec<(Currency, Currency)>,
    /// How long a leg poller waits for a terminal order status.
    pub order_completion_max: Duration,
    /// Sleep between order status queries.
    pub poll_interval: Duration,
    /// Wait before unwinding a partially entered position.
    pub unfilled_entry_cleanup_delay: Duration,
    /// Wait before a cancel-or-revert cancels its order.
    pub cancel_revert_delay: Duration,
    /// Simulate orders instead of sending them.
    pub demo_mode: bool,
}

impl Default for TradingParams {
    fn default() -> Self {
        Self {
            target_profit: Decimal::new(1, 2), // 1%
            trailing_offset: Decimal::new(2, 3),
            trailing_confirmations: 2,
            spread_window: Duration::from_secs(3 * 60 * 60),
            spread_valid_after: Duration::from_secs(10 * 60),
            max_quote_skew: Duration::from_secs(15),
            max_limit_price_difference: Decimal::new(1, 2),
            adapt_to_window_average: false,
            max_exposure: HashMap::new(),
            max_initial_balance: HashMap::new(),
            max_transaction_amount: HashMap::new(),
            equivalent_currencies: Vec::new(),
            order_completion_max: Duration::from_secs(5 * 60),
            poll_interval: Duration::from_secs(5),
            unfilled_entry_cleanup_delay: Duration::from_secs(30),
            cancel_revert_delay: Duration::from_secs(30),
            demo_mode: false,
        }
    }
}

impl TradingParams {
    /// Whether two currencies are equal or configured as equivalent.
    #[must_use]
    pub fn currencies_equivalent(&self, a: &Currency, b: &Currency) -> bool {
        a == b
            || self
                .equivalent_currencies
                .iter()
                .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    /// Whether two pairs trade the same thing: bases and counters each equivalent.
    #[must_use]
    pub fn pairs_equivalent(&self, a: &CurrencyPair, b: &CurrencyPair) -> bool {
        self.currencies_equivalent(a.base(), b.base())
            && self.currencies_equivalent(a.counter(), b.counter())
    }

    /// Maximum exposure for `currency`, checking equivalents after the exact key.
    #[must_use]
    pub fn max_exposure(&self, currency: &Currency) -> Option<Price> {
        self.lookup_currency(&self.max_exposure, currency)
    }

    /// Maximum initial balance for `currency`, checking equivalents after the exact key.
    #[must_use]
    pub fn max_initial_balance(&self, currency: &Currency) -> Option<Decimal> {
        self.lookup_currency(&self.max_initial_balance, currency)
    }

    /// Maximum transaction amount for `pair`, checking equivalent pairs after the exact key.
    #[must_use]
    pub fn max_transaction_amount(&self, pair: &CurrencyPair) -> Option<Price> {
        self.max_transaction_amount.get(pair).copied().or_else(|| {
            self.max_transaction_amount
                .iter()
                .find(|(candidate, _)| self.pairs_equivalent(candidate, pair))
                .map(|(_, amount)| *amount)
        })
    }

    fn lookup_currency(
        &self,
        table: &HashMap<Currency, Decimal>,
        currency: &Currency,
    ) -> Option<Decimal> {
        table.get(currency).copied().or_else(|| {
            table
                .iter()
                .find(|(candidate, _)| self.currencies_equivalent(candidate, currency))
                .map(|(_, value)| *value)
        })
    }
}
