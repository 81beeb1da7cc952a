//! Guarded access to a venue: circuit breaker, rate limits, retries and
//! wallet caching on top of the raw [`Venue`] port.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::circuit::CircuitBreaker;
use super::rate_limit::{OperationClass, RateLimiterSet, RateLimits};
use super::retry::call_with_retry;
use crate::domain::{
    BookSide, Currency, CurrencyPair, LegSide, OrderId, OrderIntent, OrderRequest, OrderSide,
    OrderSnapshot, OrderStatus, Price, Pricing, Quote, Ratio, RevertOutcome, RollbackMode,
    TradingRule, VenueId, Volume,
};
use crate::error::VenueError;
use crate::port::{Venue, VenueResult};

/// Per-venue gateway settings.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Attempts per call, including the first.
    pub retry_attempts: u32,
    /// How long a tripped circuit stays open.
    pub cooldown: Duration,
    /// Freshness window for cached balances.
    pub wallet_cache: Duration,
    pub rate_limits: RateLimits,
    /// Multiplier on volume when walking the order book.
    pub order_book_factor: Decimal,
    /// Wait before a cancel-or-revert cancels its order.
    pub cancel_revert_delay: Duration,
    /// Simulate orders instead of sending them.
    pub demo_mode: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            cooldown: Duration::from_secs(60),
            wallet_cache: Duration::from_secs(5 * 60),
            rate_limits: RateLimits::default(),
            order_book_factor: Decimal::ONE,
            cancel_revert_delay: Duration::from_secs(30),
            demo_mode: false,
        }
    }
}

#[derive(Debug, Default)]
struct Wallet {
    balances: HashMap<Currency, (Decimal, Instant)>,
    populated: bool,
}

/// A venue wrapped with the behaviour every caller relies on.
pub struct VenueGateway {
    venue: Arc<dyn Venue>,
    settings: GatewaySettings,
    circuit: CircuitBreaker,
    limiters: RateLimiterSet,
    wallet: RwLock<Wallet>,
    demo_orders: Mutex<HashMap<OrderId, OrderSnapshot>>,
}

impl VenueGateway {
    pub fn new(venue: Arc<dyn Venue>, settings: GatewaySettings) -> Self {
        let circuit = CircuitBreaker::new(venue.id().as_str(), settings.cooldown);
        let limiters = RateLimiterSet::new(&settings.rate_limits);
        Self {
            venue,
            settings,
            circuit,
            limiters,
            wallet: RwLock::new(Wallet::default()),
            demo_orders: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> &VenueId {
        self.venue.id()
    }

    #[must_use]
    pub fn venue(&self) -> &Arc<dyn Venue> {
        &self.venue
    }

    #[must_use]
    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    #[must_use]
    pub fn fee_percentage(&self) -> Ratio {
        self.venue.fee_percentage()
    }

    #[must_use]
    pub fn long_pairs(&self) -> &[CurrencyPair] {
        self.venue.long_pairs()
    }

    #[must_use]
    pub fn short_pairs(&self) -> &[CurrencyPair] {
        self.venue.short_pairs()
    }

    /// Every pair this venue trades, long or short, without duplicates.
    #[must_use]
    pub fn traded_pairs(&self) -> Vec<CurrencyPair> {
        let set: BTreeSet<&CurrencyPair> = self
            .long_pairs()
            .iter()
            .chain(self.short_pairs())
            .collect();
        set.into_iter().cloned().collect()
    }

    #[must_use]
    pub fn is_shortable(&self, pair: &CurrencyPair) -> bool {
        self.short_pairs().contains(pair)
    }

    #[must_use]
    pub fn trading_rule(&self, pair: &CurrencyPair) -> TradingRule {
        self.venue.trading_rule(pair)
    }

    #[must_use]
    pub fn is_retryable(&self, error: &VenueError) -> bool {
        self.venue.is_retryable(error)
    }

    // ---- circuit breaker

    /// Whether the venue is cooling down after failures.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.circuit.is_open()
    }

    /// Refuse calls to this venue for the configured cooldown.
    pub fn disable_temporarily(&self) {
        self.circuit.trip();
    }

    // ---- market data

    pub async fn fetch_quote(&self, pair: &CurrencyPair) -> VenueResult<Quote> {
        self.call(OperationClass::Quote, || self.venue.fetch_quote(pair))
            .await
    }

    /// Book-implied price for trading `volume` against `side`.
    ///
    /// The volume is scaled by the order book factor before walking the book.
    pub async fn limit_price(
        &self,
        pair: &CurrencyPair,
        volume: Volume,
        side: BookSide,
    ) -> VenueResult<Price> {
        let book = self
            .call(OperationClass::Quote, || self.venue.fetch_order_book(pair))
            .await?;
        Ok(book.limit_price(side, volume * self.settings.order_book_factor))
    }

    // ---- wallet

    #[must_use]
    pub fn is_wallet_populated(&self) -> bool {
        self.wallet.read().populated
    }

    /// Whether the venue can take part in a decision: its circuit is closed
    /// and its wallet has been loaded at least once since the last reset.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.is_disabled() && self.is_wallet_populated()
    }

    /// Drop all cached balances.
    pub fn clear_wallet(&self) {
        let mut wallet = self.wallet.write();
        wallet.balances.clear();
        wallet.populated = false;
    }

    /// Fetch the balance of every currency this venue trades.
    pub async fn refresh_wallet(&self) -> VenueResult<()> {
        let currencies: BTreeSet<Currency> = self
            .traded_pairs()
            .into_iter()
            .flat_map(|pair| [pair.base().clone(), pair.counter().clone()])
            .collect();
        for currency in currencies {
            self.fetch_balance(&currency).await?;
        }
        self.wallet.write().populated = true;
        Ok(())
    }

    /// Balance of `currency`, served from cache when allowed and fresh.
    pub async fn balance(&self, currency: &Currency, allow_cache: bool) -> VenueResult<Decimal> {
        if allow_cache {
            let wallet = self.wallet.read();
            if let Some((amount, fetched_at)) = wallet.balances.get(currency) {
                if fetched_at.elapsed() <= self.settings.wallet_cache {
                    return Ok(*amount);
                }
            }
        }
        self.fetch_balance(currency).await
    }

    /// Cached balances, sorted by currency.
    #[must_use]
    pub fn cached_balances(&self) -> Vec<(Currency, Decimal)> {
        let mut balances: Vec<_> = self
            .wallet
            .read()
            .balances
            .iter()
            .map(|(currency, (amount, _))| (currency.clone(), *amount))
            .collect();
        balances.sort();
        balances
    }

    async fn fetch_balance(&self, currency: &Currency) -> VenueResult<Decimal> {
        let amount = self
            .call(OperationClass::Wallet, || self.venue.fetch_balance(currency))
            .await?;
        self.wallet
            .write()
            .balances
            .insert(currency.clone(), (amount, Instant::now()));
        Ok(amount)
    }

    // ---- sizing

    #[must_use]
    pub fn round_quantity(
        &self,
        pair: &CurrencyPair,
        quantity: Volume,
        round_down: bool,
    ) -> Volume {
        self.trading_rule(pair).round_quantity(quantity, round_down)
    }

    #[must_use]
    pub fn round_price(&self, pair: &CurrencyPair, price: Price, round_down: bool) -> Price {
        self.trading_rule(pair).round_price(price, round_down)
    }

    /// Largest notional `balance` can carry at the venue's highest leverage.
    #[must_use]
    pub fn max_leveragable_amount(&self, pair: &CurrencyPair, balance: Decimal) -> Decimal {
        match self.trading_rule(pair).max_leverage() {
            Some(leverage) => balance * Decimal::from(leverage),
            None => balance,
        }
    }

    // ---- orders

    pub async fn open_long(
        &self,
        pair: &CurrencyPair,
        quantity: Volume,
        pricing: Pricing,
    ) -> VenueResult<OrderId> {
        self.place(pair, OrderIntent::OpenLong, quantity, pricing).await
    }

    pub async fn close_long(
        &self,
        pair: &CurrencyPair,
        quantity: Volume,
        pricing: Pricing,
    ) -> VenueResult<OrderId> {
        self.place(pair, OrderIntent::CloseLong, quantity, pricing).await
    }

    pub async fn open_short(
        &self,
        pair: &CurrencyPair,
        quantity: Volume,
        pricing: Pricing,
    ) -> VenueResult<OrderId> {
        self.place(pair, OrderIntent::OpenShort, quantity, pricing).await
    }

    pub async fn close_short(
        &self,
        pair: &CurrencyPair,
        quantity: Volume,
        pricing: Pricing,
    ) -> VenueResult<OrderId> {
        self.place(pair, OrderIntent::CloseShort, quantity, pricing).await
    }

    /// Place an order for `intent`.
    pub async fn place(
        &self,
        pair: &CurrencyPair,
        intent: OrderIntent,
        quantity: Volume,
        pricing: Pricing,
    ) -> VenueResult<OrderId> {
        if intent.is_short() && !self.is_shortable(pair) {
            return Err(VenueError::NotShortable {
                venue: self.id().clone(),
                pair: pair.clone(),
            });
        }
        let request = OrderRequest {
            pair: pair.clone(),
            intent,
            quantity,
            pricing,
        };
        info!(
            venue = %self.id(),
            pair = %pair,
            intent = ?intent,
            quantity = %quantity,
            pricing = ?pricing,
            demo = self.settings.demo_mode,
            "Placing order"
        );
        if self.settings.demo_mode {
            return self.place_demo(&request).await;
        }
        self.call(OperationClass::Order, || self.venue.place_order(&request))
            .await
    }

    /// Cancel an order. Returns `false` when it was already closed.
    pub async fn cancel_order(&self, pair: &CurrencyPair, order_id: &OrderId) -> VenueResult<bool> {
        let is_demo = self.demo_orders.lock().contains_key(order_id);
        if is_demo {
            return Ok(false);
        }
        self.call(OperationClass::Order, || self.venue.cancel_order(pair, order_id))
            .await
    }

    /// Aggregate state of an order.
    pub async fn query_order(
        &self,
        pair: &CurrencyPair,
        order_id: &OrderId,
    ) -> VenueResult<Option<OrderSnapshot>> {
        let demo = self.demo_orders.lock().get(order_id).cloned();
        if demo.is_some() {
            return Ok(demo);
        }
        self.call(OperationClass::Query, || self.venue.fetch_order(pair, order_id))
            .await
    }

    pub async fn query_order_status(
        &self,
        pair: &CurrencyPair,
        order_id: &OrderId,
    ) -> VenueResult<OrderStatus> {
        let demo = self.demo_orders.lock().get(order_id).map(|order| order.status);
        if let Some(status) = demo {
            return Ok(status);
        }
        self.call(OperationClass::Query, || {
            self.venue.fetch_order_status(pair, order_id)
        })
        .await
    }

    /// Wait the configured delay, then [`revert`](Self::revert) the order.
    pub async fn cancel_or_revert(
        &self,
        pair: &CurrencyPair,
        order_id: &OrderId,
        leg: LegSide,
        mode: RollbackMode,
    ) -> VenueResult<RevertOutcome> {
        tokio::time::sleep(self.settings.cancel_revert_delay).await;
        self.revert(pair, order_id, leg, mode).await
    }

    /// Cancel an order and close the leg at market for the amount `mode` selects.
    ///
    /// Cancellation errors are ignored since the order may already be closed.
    pub async fn revert(
        &self,
        pair: &CurrencyPair,
        order_id: &OrderId,
        leg: LegSide,
        mode: RollbackMode,
    ) -> VenueResult<RevertOutcome> {
        if let Err(e) = self.cancel_order(pair, order_id).await {
            debug!(
                venue = %self.id(),
                order_id = %order_id,
                error = %e,
                "Cancel before revert failed"
            );
        }

        let order = self.query_order(pair, order_id).await?;
        let amount = match (&order, mode) {
            (Some(o), RollbackMode::Cumulative) => o.cumulative_amount,
            (Some(o), RollbackMode::Remaining) => o.remaining_amount(),
            (None, _) => {
                warn!(
                    venue = %self.id(),
                    order_id = %order_id,
                    "Order unknown to venue, nothing to revert"
                );
                Volume::ZERO
            }
        };

        let revert = if amount > Volume::ZERO {
            let revert_id = self
                .place(pair, OrderIntent::close(leg), amount, Pricing::Market)
                .await?;
            info!(
                venue = %self.id(),
                order_id = %order_id,
                revert_id = %revert_id,
                amount = %amount,
                mode = ?mode,
                "Reverted order"
            );
            self.query_order(pair, &revert_id).await?
        } else {
            None
        };

        Ok(RevertOutcome { order, revert })
    }

    async fn place_demo(&self, request: &OrderRequest) -> VenueResult<OrderId> {
        let price = match request.pricing {
            Pricing::Limit(price) => price,
            Pricing::Market => {
                let quote = self.fetch_quote(&request.pair).await?;
                match request.intent.side() {
                    OrderSide::Buy => quote.ask(),
                    OrderSide::Sell => quote.bid(),
                }
            }
        };
        let id = OrderId::new(format!("demo-{}", Uuid::new_v4()));
        let snapshot = OrderSnapshot {
            id: id.clone(),
            status: OrderStatus::Filled,
            original_amount: request.quantity,
            cumulative_amount: request.quantity,
            average_price: Some(price),
            fee: Some(request.quantity * price * self.fee_percentage()),
        };
        self.demo_orders.lock().insert(id.clone(), snapshot);
        Ok(id)
    }

    /// Rate-limited call with bounded retries.
    async fn call<T, F, Fut>(&self, class: OperationClass, mut op: F) -> VenueResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = VenueResult<T>>,
    {
        let limiters = &self.limiters;
        call_with_retry(
            self.settings.retry_attempts,
            |e| self.venue.is_retryable(e),
            || {
                let fut = op();
                async move {
                    limiters.acquire(class).await;
                    fut.await
                }
            },
        )
        .await
    }
}

impl std::fmt::Debug for VenueGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueGateway")
            .field("venue", self.id())
            .field("disabled", &self.circuit.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::MockVenue;
    use rust_decimal_macros::dec;

    fn pair() -> CurrencyPair {
        CurrencyPair::new("BTC", "USD")
    }

    fn settings() -> GatewaySettings {
        GatewaySettings {
            rate_limits: RateLimits::unlimited(),
            cancel_revert_delay: Duration::ZERO,
            ..GatewaySettings::default()
        }
    }

    fn gateway(venue: &Arc<MockVenue>) -> VenueGateway {
        VenueGateway::new(Arc::clone(venue) as Arc<dyn Venue>, settings())
    }

    #[tokio::test]
    async fn short_on_long_only_pair_is_refused() {
        let venue = Arc::new(MockVenue::new("b"));
        let gw = gateway(&venue);
        let err = gw.open_short(&pair(), dec!(1), Pricing::Market).await.unwrap_err();
        assert!(matches!(err, VenueError::NotShortable { .. }));
        assert!(venue.placed_orders().is_empty());
    }

    #[tokio::test]
    async fn wallet_refresh_populates_cache() {
        let venue = Arc::new(MockVenue::new("a").with_balance("USD", dec!(250)));
        let gw = gateway(&venue);
        assert!(!gw.is_wallet_populated());

        gw.refresh_wallet().await.unwrap();
        assert!(gw.is_wallet_populated());
        assert_eq!(gw.balance(&Currency::new("USD"), true).await.unwrap(), dec!(250));

        venue.set_balance("USD", dec!(100));
        assert_eq!(gw.balance(&Currency::new("USD"), true).await.unwrap(), dec!(250));
        assert_eq!(gw.balance(&Currency::new("USD"), false).await.unwrap(), dec!(100));

        gw.clear_wallet();
        assert!(!gw.is_wallet_populated());
        assert!(gw.cached_balances().is_empty());
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let venue = Arc::new(MockVenue::new("a"));
        venue.fail_quotes_times(2, VenueError::Timeout);
        let gw = gateway(&venue);
        assert!(gw.fetch_quote(&pair()).await.is_ok());
    }

    #[tokio::test]
    async fn revert_closes_cumulative_fill_at_market() {
        let venue = Arc::new(MockVenue::new("a").with_short());
        let gw = gateway(&venue);
        let id = gw
            .open_long(&pair(), dec!(2), Pricing::Limit(dec!(9.01)))
            .await
            .unwrap();

        let outcome = gw
            .cancel_or_revert(&pair(), &id, LegSide::Long, RollbackMode::Cumulative)
            .await
            .unwrap();
        assert!(outcome.revert.is_some());

        let placed = venue.placed_orders();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[1].intent, OrderIntent::CloseLong);
        assert_eq!(placed[1].quantity, dec!(2));
        assert_eq!(placed[1].pricing, Pricing::Market);
    }

    #[tokio::test]
    async fn remaining_revert_skips_filled_orders() {
        let venue = Arc::new(MockVenue::new("a").with_short());
        let gw = gateway(&venue);
        let id = gw
            .open_short(&pair(), dec!(1), Pricing::Limit(dec!(8.99)))
            .await
            .unwrap();
        let outcome = gw
            .revert(&pair(), &id, LegSide::Short, RollbackMode::Remaining)
            .await
            .unwrap();
        assert!(outcome.revert.is_none());
        assert_eq!(venue.placed_orders().len(), 1);
    }

    #[tokio::test]
    async fn demo_orders_fill_without_reaching_venue() {
        let venue = Arc::new(MockVenue::new("a"));
        let gw = VenueGateway::new(
            Arc::clone(&venue) as Arc<dyn Venue>,
            GatewaySettings {
                demo_mode: true,
                ..settings()
            },
        );
        let id = gw.open_long(&pair(), dec!(1), Pricing::Market).await.unwrap();
        assert!(id.as_str().starts_with("demo-"));
        assert!(venue.placed_orders().is_empty());

        let order = gw.query_order(&pair(), &id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.average_price, Some(dec!(9.01)));
        assert_eq!(
            gw.query_order_status(&pair(), &id).await.unwrap(),
            OrderStatus::Filled
        );
    }

    #[tokio::test]
    async fn limit_price_walks_scaled_volume() {
        let venue = Arc::new(MockVenue::new("a"));
        let gw = gateway(&venue);
        assert_eq!(
            gw.limit_price(&pair(), dec!(1), BookSide::Ask).await.unwrap(),
            dec!(9.01)
        );
        assert_eq!(
            gw.limit_price(&pair(), dec!(1), BookSide::Bid).await.unwrap(),
            dec!(8.99)
        );
    }

    #[test]
    fn leverage_multiplies_balance() {
        let venue = Arc::new(MockVenue::new("a").with_rule(TradingRule {
            leverages: [2, 3].into_iter().collect(),
            ..TradingRule::default()
        }));
        let gw = gateway(&venue);
        assert_eq!(gw.max_leveragable_amount(&pair(), dec!(100)), dec!(300));
    }
}
