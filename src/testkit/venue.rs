//! Scripted in-memory venue.
//!
//! [`MockVenue`] quotes a single adjustable mid price, keeps balances in a
//! map and records every order it receives. Orders fill immediately unless
//! told otherwise, and failures can be injected per operation.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{
    BookLevel, Currency, CurrencyPair, OrderBook, OrderId, OrderIntent, OrderRequest, OrderSide,
    OrderSnapshot, OrderStatus, Price, Pricing, Quote, Ratio, TradingRule, VenueAndPair, VenueId,
};
use crate::error::VenueError;
use crate::port::{Venue, VenueResult};

/// Half the quoted bid/ask spread around the mid price.
const HALF_SPREAD: Decimal = dec!(0.01);

/// Volume resting at each side of the mock book.
const BOOK_DEPTH: Decimal = dec!(1000);

#[derive(Debug)]
struct State {
    price: Price,
    balances: HashMap<Currency, Decimal>,
    fill_orders: bool,
    quote_failures: Vec<VenueError>,
    book_failure: Option<VenueError>,
    status_failure: Option<VenueError>,
    failing_intents: HashSet<OrderIntent>,
    orders: HashMap<OrderId, OrderSnapshot>,
    placed: Vec<OrderRequest>,
    cancelled: Vec<OrderId>,
    next_id: u64,
}

/// In-memory [`Venue`] for tests.
#[derive(Debug)]
pub struct MockVenue {
    id: VenueId,
    fee: Ratio,
    long_pairs: Vec<CurrencyPair>,
    short_pairs: Vec<CurrencyPair>,
    rule: TradingRule,
    state: Mutex<State>,
}

impl MockVenue {
    /// Long-only venue trading BTC/USD at 9 with 250 USD available.
    pub fn new(id: &str) -> Self {
        Self {
            id: VenueId::new(id),
            fee: dec!(0.002),
            long_pairs: vec![pair()],
            short_pairs: Vec::new(),
            rule: TradingRule::default(),
            state: Mutex::new(State {
                price: dec!(9),
                balances: [(Currency::new("USD"), dec!(250))].into_iter().collect(),
                fill_orders: true,
                quote_failures: Vec::new(),
                book_failure: None,
                status_failure: None,
                failing_intents: HashSet::new(),
                orders: HashMap::new(),
                placed: Vec::new(),
                cancelled: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Allow shorting BTC/USD.
    #[must_use]
    pub fn with_short(mut self) -> Self {
        self.short_pairs = vec![pair()];
        self
    }

    #[must_use]
    pub fn with_fee(mut self, fee: Ratio) -> Self {
        self.fee = fee;
        self
    }

    #[must_use]
    pub fn with_balance(self, currency: &str, amount: Decimal) -> Self {
        self.set_balance(currency, amount);
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: TradingRule) -> Self {
        self.rule = rule;
        self
    }

    /// Where this venue trades BTC/USD.
    #[must_use]
    pub fn leg(&self) -> VenueAndPair {
        VenueAndPair::new(self.id.clone(), pair())
    }

    pub fn set_balance(&self, currency: &str, amount: Decimal) {
        self.state.lock().balances.insert(Currency::new(currency), amount);
    }

    /// Move the mid price. Quotes are one cent either side of it.
    pub fn set_price(&self, price: Price) {
        self.state.lock().price = price;
    }

    /// Whether new orders fill on placement or stay open.
    pub fn set_fill_orders(&self, fill: bool) {
        self.state.lock().fill_orders = fill;
    }

    /// Fail the next `times` quote fetches with `error`.
    pub fn fail_quotes_times(&self, times: usize, error: VenueError) {
        let mut state = self.state.lock();
        state.quote_failures.extend(std::iter::repeat(error).take(times));
    }

    /// Fail every order book fetch with `error` until cleared with `None`.
    pub fn fail_order_book(&self, error: Option<VenueError>) {
        self.state.lock().book_failure = error;
    }

    /// Fail every order lookup with `error` until cleared with `None`.
    pub fn fail_status(&self, error: Option<VenueError>) {
        self.state.lock().status_failure = error;
    }

    /// Reject orders with `intent`.
    pub fn fail_orders(&self, intent: OrderIntent) {
        self.state.lock().failing_intents.insert(intent);
    }

    /// Every order request received, in order.
    #[must_use]
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().placed.clone()
    }

    /// Ids of orders that were open when cancelled.
    #[must_use]
    pub fn cancelled(&self) -> Vec<OrderId> {
        self.state.lock().cancelled.clone()
    }

    /// Number of orders that are neither filled nor cancelled.
    #[must_use]
    pub fn open_order_count(&self) -> usize {
        self.state
            .lock()
            .orders
            .values()
            .filter(|o| !o.status.is_complete())
            .count()
    }
}

fn pair() -> CurrencyPair {
    CurrencyPair::new("BTC", "USD")
}

#[async_trait]
impl Venue for MockVenue {
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

    fn trading_rule(&self, _pair: &CurrencyPair) -> TradingRule {
        self.rule.clone()
    }

    async fn fetch_quote(&self, pair: &CurrencyPair) -> VenueResult<Quote> {
        let mut state = self.state.lock();
        if !state.quote_failures.is_empty() {
            return Err(state.quote_failures.remove(0));
        }
        Ok(Quote::new(
            VenueAndPair::new(self.id.clone(), pair.clone()),
            state.price - HALF_SPREAD,
            state.price + HALF_SPREAD,
        ))
    }

    async fn fetch_order_book(&self, _pair: &CurrencyPair) -> VenueResult<OrderBook> {
        let state = self.state.lock();
        if let Some(error) = &state.book_failure {
            return Err(error.clone());
        }
        let price = state.price;
        Ok(OrderBook::new(
            vec![BookLevel::new(price - HALF_SPREAD, BOOK_DEPTH)],
            vec![BookLevel::new(price + HALF_SPREAD, BOOK_DEPTH)],
        ))
    }

    async fn fetch_balance(&self, currency: &Currency) -> VenueResult<Decimal> {
        Ok(self
            .state
            .lock()
            .balances
            .get(currency)
            .copied()
            .unwrap_or_default())
    }

    async fn place_order(&self, request: &OrderRequest) -> VenueResult<OrderId> {
        let mut state = self.state.lock();
        state.placed.push(request.clone());
        if state.failing_intents.contains(&request.intent) {
            return Err(VenueError::OrderRejected(format!("{:?} refused", request.intent)));
        }

        state.next_id += 1;
        let id = OrderId::new(format!("mock-{}-{}", self.id, state.next_id));
        let price = match request.pricing {
            Pricing::Limit(price) => price,
            Pricing::Market => match request.intent.side() {
                OrderSide::Buy => state.price + HALF_SPREAD,
                OrderSide::Sell => state.price - HALF_SPREAD,
            },
        };
        let snapshot = if state.fill_orders {
            OrderSnapshot {
                id: id.clone(),
                status: OrderStatus::Filled,
                original_amount: request.quantity,
                cumulative_amount: request.quantity,
                average_price: Some(price),
                fee: Some(request.quantity * price * self.fee),
            }
        } else {
            OrderSnapshot {
                id: id.clone(),
                status: OrderStatus::New,
                original_amount: request.quantity,
                cumulative_amount: Decimal::ZERO,
                average_price: None,
                fee: None,
            }
        };
        state.orders.insert(id.clone(), snapshot);
        Ok(id)
    }

    async fn cancel_order(&self, _pair: &CurrencyPair, order_id: &OrderId) -> VenueResult<bool> {
        let mut state = self.state.lock();
        let Some(order) = state.orders.get_mut(order_id) else {
            return Ok(false);
        };
        if order.status.is_complete() {
            return Ok(false);
        }
        order.status = OrderStatus::Canceled;
        state.cancelled.push(order_id.clone());
        Ok(true)
    }

    async fn fetch_order(
        &self,
        _pair: &CurrencyPair,
        order_id: &OrderId,
    ) -> VenueResult<Option<OrderSnapshot>> {
        let state = self.state.lock();
        if let Some(error) = &state.status_failure {
            return Err(error.clone());
        }
        Ok(state.orders.get(order_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_orders_can_be_cancelled_once() {
        let venue = MockVenue::new("a");
        venue.set_fill_orders(false);
        let id = venue
            .place_order(&OrderRequest {
                pair: pair(),
                intent: OrderIntent::OpenLong,
                quantity: dec!(1),
                pricing: Pricing::Limit(dec!(9)),
            })
            .await
            .unwrap();

        assert!(venue.cancel_order(&pair(), &id).await.unwrap());
        assert!(!venue.cancel_order(&pair(), &id).await.unwrap());
        assert_eq!(venue.cancelled(), vec![id]);
        assert_eq!(venue.open_order_count(), 0);
    }

    #[tokio::test]
    async fn market_orders_cross_the_spread() {
        let venue = MockVenue::new("a").with_short();
        let id = venue
            .place_order(&OrderRequest {
                pair: pair(),
                intent: OrderIntent::OpenShort,
                quantity: dec!(2),
                pricing: Pricing::Market,
            })
            .await
            .unwrap();
        let order = venue.fetch_order(&pair(), &id).await.unwrap().unwrap();
        assert_eq!(order.average_price, Some(dec!(8.99)));
        assert_eq!(order.cumulative_amount, dec!(2));
    }
}
