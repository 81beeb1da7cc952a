use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{CurrencyPair, OrderId, PositionId, VenueId};

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors raised while talking to a trading venue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VenueError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("nonce rejected: {0}")]
    Nonce(String),

    #[error("http status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("venue unavailable: {0}")]
    Unavailable(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("{pair} cannot be shorted on {venue}")]
    NotShortable { venue: VenueId, pair: CurrencyPair },

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("{0}")]
    Other(String),
}

impl VenueError {
    /// Communication failures that are worth another attempt on any venue.
    ///
    /// Venue-specific conditions such as maintenance windows are classified by
    /// [`Venue::is_retryable`](crate::port::outbound::venue::Venue::is_retryable).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Nonce(_) | Self::Http { .. } | Self::Timeout
        )
    }
}

/// Venue order rules that a candidate entry failed to satisfy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradingRuleViolation {
    #[error("quantity {quantity} {pair} is below the minimum {min} on {venue}")]
    BelowMinQuantity {
        venue: VenueId,
        pair: CurrencyPair,
        quantity: Decimal,
        min: Decimal,
    },

    #[error("price {price} {pair} is below the minimum {min} on {venue}")]
    BelowMinPrice {
        venue: VenueId,
        pair: CurrencyPair,
        price: Decimal,
        min: Decimal,
    },

    #[error("total {total} {pair} is below the minimum {min} on {venue}")]
    BelowMinTotal {
        venue: VenueId,
        pair: CurrencyPair,
        total: Decimal,
        min: Decimal,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{venue}: {source}")]
    Venue {
        venue: VenueId,
        #[source]
        source: VenueError,
    },

    #[error(transparent)]
    TradingRule(#[from] TradingRuleViolation),

    #[error("position {position} has no {leg} order id")]
    MissingOrderId {
        position: PositionId,
        leg: &'static str,
    },

    #[error("unknown venue: {0}")]
    UnknownVenue(VenueId),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attach a venue to a raw venue error.
    #[must_use]
    pub fn venue(venue: &VenueId, source: VenueError) -> Self {
        Self::Venue {
            venue: venue.clone(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
