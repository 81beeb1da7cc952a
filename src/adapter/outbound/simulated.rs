//! Paper venue with random-walk quotes.
//!
//! Every quote fetch moves the mid price by a uniform random step of at most
//! `volatility` of the price. The synthesized book has `book_levels` levels
//! per side, each `half_spread` further from mid. Orders fill in full on
//! placement and move the simulated wallet.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    BookLevel, Currency, CurrencyPair, OrderBook, OrderId, OrderRequest, OrderSide, OrderSnapshot,
    OrderStatus, Price, Pricing, Quote, Ratio, TradingRule, TradingRules, VenueAndPair, VenueId,
};
use crate::error::{ConfigError, VenueError};
use crate::infrastructure::config::venue::{SimulationConfig, VenueConfig};
use crate::port::{Venue, VenueResult};

struct Market {
    prices: HashMap<CurrencyPair, Price>,
    balances: HashMap<Currency, Decimal>,
    orders: HashMap<OrderId, OrderSnapshot>,
    rng: StdRng,
}

/// Simulated venue built from a `kind = "simulated"` venue config.
pub struct SimulatedVenue {
    id: VenueId,
    fee: Ratio,
    long_pairs: Vec<CurrencyPair>,
    short_pairs: Vec<CurrencyPair>,
    rules: TradingRules,
    default_rule: TradingRule,
    simulation: SimulationConfig,
    market: Mutex<Market>,
}

impl SimulatedVenue {
    /// Build from config with an entropy-seeded random walk.
    pub fn from_config(config: &VenueConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Build from config with a reproducible random walk.
    pub fn seeded(config: &VenueConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &VenueConfig, rng: StdRng) -> Result<Self, ConfigError> {
        let simulation = config.simulation.clone();
        let prices = config
            .long_pairs
            .iter()
            .chain(&config.short_pairs)
            .map(|pair| {
                let price = simulation
                    .start_prices
                    .get(pair)
                    .copied()
                    .unwrap_or(simulation.default_price);
                (pair.clone(), price)
            })
            .collect();
        Ok(Self {
            id: config.id(),
            fee: config.fee,
            long_pairs: config.long_pairs.clone(),
            short_pairs: config.short_pairs.clone(),
            rules: config.rules()?,
            default_rule: config.default_rule(),
            simulation,
            market: Mutex::new(Market {
                prices,
                balances: config.balances.clone(),
                orders: HashMap::new(),
                rng,
            }),
        })
    }

    fn unknown_pair(&self, pair: &CurrencyPair) -> VenueError {
        VenueError::Other(format!("{pair} is not traded on {}", self.id))
    }

    fn half_spread(&self, mid: Price, level: usize) -> Price {
        mid * self.simulation.half_spread * Decimal::from(level + 1)
    }
}

#[async_trait]
impl Venue for SimulatedVenue {
    fn id(&self) -> &VenueId {
        &self.id
    }

    fn fee_percentage(&self) -> Ratio {
        self.fee
    }

    fn long_pairs(&self) -> &[CurrencyPair] {
        &self.long_pairs
    }

    fn short_pairs(&self) -> &[CurrencyPair] {
        &self.short_pairs
    }

    fn trading_rule(&self, pair: &CurrencyPair) -> TradingRule {
        self.rules
            .get(pair)
            .cloned()
            .unwrap_or_else(|| self.default_rule.clone())
    }

    async fn fetch_quote(&self, pair: &CurrencyPair) -> VenueResult<Quote> {
        let mut market = self.market.lock();
        let Market { prices, rng, .. } = &mut *market;
        let price = prices.get_mut(pair).ok_or_else(|| self.unknown_pair(pair))?;

        let step = Decimal::from_f64(rng.gen_range(-1.0..=1.0)).unwrap_or_default();
        let next = (*price + *price * self.simulation.volatility * step).round_dp(8);
        if next > Decimal::ZERO {
            *price = next;
        }
        let mid = *price;
        let half = self.half_spread(mid, 0);
        Ok(Quote::new(
            VenueAndPair::new(self.id.clone(), pair.clone()),
            mid - half,
            mid + half,
        ))
    }

    async fn fetch_order_book(&self, pair: &CurrencyPair) -> VenueResult<OrderBook> {
        let mid = *self
            .market
            .lock()
            .prices
            .get(pair)
            .ok_or_else(|| self.unknown_pair(pair))?;
        let levels = 0..self.simulation.book_levels;
        let volume = self.simulation.level_volume;
        Ok(OrderBook::new(
            levels
                .clone()
                .map(|i| BookLevel::new(mid - self.half_spread(mid, i), volume))
                .collect(),
            levels
                .map(|i| BookLevel::new(mid + self.half_spread(mid, i), volume))
                .collect(),
        ))
    }

    async fn fetch_balance(&self, currency: &Currency) -> VenueResult<Decimal> {
        Ok(self
            .market
            .lock()
            .balances
            .get(currency)
            .copied()
            .unwrap_or_default())
    }

    async fn place_order(&self, request: &OrderRequest) -> VenueResult<OrderId> {
        let mut market = self.market.lock();
        let mid = *market
            .prices
            .get(&request.pair)
            .ok_or_else(|| self.unknown_pair(&request.pair))?;
        let side = request.intent.side();
        let price = match request.pricing {
            Pricing::Limit(price) => price,
            Pricing::Market => match side {
                OrderSide::Buy => mid + self.half_spread(mid, 0),
                OrderSide::Sell => mid - self.half_spread(mid, 0),
            },
        };

        let notional = request.quantity * price;
        let fee = notional * self.fee;
        let base = request.pair.base().clone();
        let counter = request.pair.counter().clone();
        let (base_delta, counter_delta) = match side {
            OrderSide::Buy => (request.quantity, -(notional + fee)),
            OrderSide::Sell => (-request.quantity, notional - fee),
        };
        *market.balances.entry(base).or_default() += base_delta;
        *market.balances.entry(counter).or_default() += counter_delta;

        let id = OrderId::new(format!("sim-{}", Uuid::new_v4()));
        market.orders.insert(
            id.clone(),
            OrderSnapshot {
                id: id.clone(),
                status: OrderStatus::Filled,
                original_amount: request.quantity,
                cumulative_amount: request.quantity,
                average_price: Some(price),
                fee: Some(fee),
            },
        );
        debug!(
            venue = %self.id,
            order_id = %id,
            intent = ?request.intent,
            price = %price,
            "Simulated fill"
        );
        Ok(id)
    }

    async fn cancel_order(&self, _pair: &CurrencyPair, order_id: &OrderId) -> VenueResult<bool> {
        let mut market = self.market.lock();
        let Some(order) = market.orders.get_mut(order_id) else {
            return Err(VenueError::UnknownOrder(order_id.clone()));
        };
        if order.status.is_complete() {
            return Ok(false);
        }
        order.status = OrderStatus::Canceled;
        Ok(true)
    }

    async fn fetch_order(
        &self,
        _pair: &CurrencyPair,
        order_id: &OrderId,
    ) -> VenueResult<Option<OrderSnapshot>> {
        Ok(self.market.lock().orders.get(order_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderIntent;
    use rust_decimal_macros::dec;

    fn config() -> VenueConfig {
        let mut config = VenueConfig::simulated("sim");
        config.long_pairs = vec![CurrencyPair::new("BTC", "USD")];
        config.balances.insert(Currency::new("USD"), dec!(1000));
        config
            .simulation
            .start_prices
            .insert(CurrencyPair::new("BTC", "USD"), dec!(100));
        config
    }

    #[tokio::test]
    async fn quotes_stay_within_volatility() {
        let venue = SimulatedVenue::seeded(&config(), 7).unwrap();
        let pair = CurrencyPair::new("BTC", "USD");
        let quote = venue.fetch_quote(&pair).await.unwrap();

        assert!(quote.bid() < quote.ask());
        let mid = (quote.bid() + quote.ask()) / Decimal::TWO;
        assert!(mid >= dec!(99.8) && mid <= dec!(100.2));
    }

    #[tokio::test]
    async fn book_has_configured_depth() {
        let venue = SimulatedVenue::seeded(&config(), 7).unwrap();
        let book = venue
            .fetch_order_book(&CurrencyPair::new("BTC", "USD"))
            .await
            .unwrap();
        assert_eq!(book.side(crate::domain::BookSide::Ask).len(), 5);
        assert_eq!(book.side(crate::domain::BookSide::Ask)[0].price, dec!(100.05));
    }

    #[tokio::test]
    async fn fills_move_the_wallet() {
        let venue = SimulatedVenue::seeded(&config(), 7).unwrap();
        let pair = CurrencyPair::new("BTC", "USD");
        let id = venue
            .place_order(&OrderRequest {
                pair: pair.clone(),
                intent: OrderIntent::OpenLong,
                quantity: dec!(2),
                pricing: Pricing::Limit(dec!(100)),
            })
            .await
            .unwrap();

        let order = venue.fetch_order(&pair, &id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(venue.fetch_balance(&Currency::new("BTC")).await.unwrap(), dec!(2));
        assert_eq!(
            venue.fetch_balance(&Currency::new("USD")).await.unwrap(),
            dec!(1000) - dec!(200) - dec!(0.4)
        );
        assert!(!venue.cancel_order(&pair, &id).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_pairs_are_errors() {
        let venue = SimulatedVenue::seeded(&config(), 7).unwrap();
        assert!(venue.fetch_quote(&CurrencyPair::new("ETH", "USD")).await.is_err());
    }
}
