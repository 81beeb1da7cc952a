//! Venue-agnostic domain logic.

mod book;
mod id;
mod money;
mod order;
mod position;
mod quote;
mod spread_bounds;
mod trading_rule;
mod trailing;

// Identifiers and keys
pub use id::{Currency, CurrencyPair, ObservedPairKey, OrderId, PositionId, VenueAndPair, VenueId};

// Numeric types
pub use money::{round_to_step, weighted_average, Price, Ratio, Volume};

// Market data
pub use book::{BookLevel, BookSide, OrderBook};
pub use quote::{MarketPhase, Quote, QuotePair};
pub use spread_bounds::SpreadBounds;

// Orders and positions
pub use order::{
    CompletionStatus, LegCompletion, LegPair, LegSide, OrderIntent, OrderRequest, OrderSide,
    OrderSnapshot, OrderStatus, Pricing, RevertOutcome, RollbackMode,
};
pub use position::{LegFill, Position};

// Entry gating
pub use trading_rule::{evaluate_trading_rules, TradingRule, TradingRules};
pub use trailing::TrailingDetails;
