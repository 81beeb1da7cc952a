//! Venue port for market data and order execution.
//!
//! This is the raw contract a venue adapter implements. Rate limiting,
//! retries, circuit breaking and wallet caching are layered on top by
//! [`VenueGateway`](crate::application::venue::VenueGateway), so adapters
//! only translate calls to the venue's wire protocol.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{
    Currency, CurrencyPair, OrderBook, OrderId, OrderRequest, OrderSnapshot, OrderStatus, Quote,
    Ratio, TradingRule, VenueId,
};
use crate::error::VenueError;

/// Result of a raw venue call.
pub type VenueResult<T> = Result<T, VenueError>;

/// A trading venue.
#[async_trait]
pub trait Venue: Send + Sync {
    /// Venue identifier, unique within a run.
    fn id(&self) -> &VenueId;

    /// Fee charged per trade as a fraction of the traded amount.
    fn fee_percentage(&self) -> Ratio;

    /// Pairs that may be bought (long leg).
    fn long_pairs(&self) -> &[CurrencyPair];

    /// Pairs that may be sold short (short leg).
    fn short_pairs(&self) -> &[CurrencyPair];

    /// Order constraints for `pair`.
    fn trading_rule(&self, _pair: &CurrencyPair) -> TradingRule {
        TradingRule::default()
    }

    /// Whether an error should be retried by the caller.
    fn is_retryable(&self, error: &VenueError) -> bool {
        error.is_transient()
    }

    /// Latest top-of-book quote for `pair`.
    async fn fetch_quote(&self, pair: &CurrencyPair) -> VenueResult<Quote>;

    /// Current order book for `pair`.
    async fn fetch_order_book(&self, pair: &CurrencyPair) -> VenueResult<OrderBook>;

    /// Available balance of `currency`.
    async fn fetch_balance(&self, currency: &Currency) -> VenueResult<Decimal>;

    /// Submit an order and return the venue's order id.
    async fn place_order(&self, request: &OrderRequest) -> VenueResult<OrderId>;

    /// Cancel an order. Returns `false` when the order was already closed.
    async fn cancel_order(&self, pair: &CurrencyPair, order_id: &OrderId) -> VenueResult<bool>;

    /// Aggregate state of an order, or `None` when the venue does not know it.
    async fn fetch_order(
        &self,
        pair: &CurrencyPair,
        order_id: &OrderId,
    ) -> VenueResult<Option<OrderSnapshot>>;

    /// Current status of an order.
    async fn fetch_order_status(
        &self,
        pair: &CurrencyPair,
        order_id: &OrderId,
    ) -> VenueResult<OrderStatus> {
        self.fetch_order(pair, order_id)
            .await?
            .map(|order| order.status)
            .ok_or_else(|| VenueError::UnknownOrder(order_id.clone()))
    }
}
