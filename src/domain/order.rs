//! Order requests, venue-reported order state, and completion outcomes.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CurrencyPair, OrderId};
use super::money::{Price, Volume};

/// Which leg of a cross-venue position an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegSide {
    Long,
    Short,
}

impl LegSide {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

impl fmt::Display for LegSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value for each leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LegPair<T> {
    pub long: T,
    pub short: T,
}

impl<T> LegPair<T> {
    pub const fn new(long: T, short: T) -> Self {
        Self { long, short }
    }

    pub fn get(&self, side: LegSide) -> &T {
        match side {
            LegSide::Long => &self.long,
            LegSide::Short => &self.short,
        }
    }

    pub fn get_mut(&mut self, side: LegSide) -> &mut T {
        match side {
            LegSide::Long => &mut self.long,
            LegSide::Short => &mut self.short,
        }
    }
}

/// Buy or sell on the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// What an order does to a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderIntent {
    OpenLong,
    CloseLong,
    OpenShort,
    CloseShort,
}

impl OrderIntent {
    /// Opening intent for a leg.
    #[must_use]
    pub const fn open(leg: LegSide) -> Self {
        match leg {
            LegSide::Long => Self::OpenLong,
            LegSide::Short => Self::OpenShort,
        }
    }

    /// Closing intent for a leg.
    #[must_use]
    pub const fn close(leg: LegSide) -> Self {
        match leg {
            LegSide::Long => Self::CloseLong,
            LegSide::Short => Self::CloseShort,
        }
    }

    #[must_use]
    pub const fn side(self) -> OrderSide {
        match self {
            Self::OpenLong | Self::CloseShort => OrderSide::Buy,
            Self::CloseLong | Self::OpenShort => OrderSide::Sell,
        }
    }

    #[must_use]
    pub const fn leg(self) -> LegSide {
        match self {
            Self::OpenLong | Self::CloseLong => LegSide::Long,
            Self::OpenShort | Self::CloseShort => LegSide::Short,
        }
    }

    #[must_use]
    pub const fn is_short(self) -> bool {
        matches!(self.leg(), LegSide::Short)
    }
}

/// Limit or market pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pricing {
    Limit(Price),
    Market,
}

/// Order to be sent to a venue.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub pair: CurrencyPair,
    pub intent: OrderIntent,
    pub quantity: Volume,
    pub pricing: Pricing,
}

/// Venue-reported lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    PendingNew,
    New,
    PartiallyFilled,
    Filled,
    PendingCancel,
    Canceled,
    Expired,
    Rejected,
    Replaced,
    Stopped,
}

impl OrderStatus {
    /// Terminal statuses end a completion poll.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(
            self,
            Self::Filled
                | Self::Canceled
                | Self::Expired
                | Self::Rejected
                | Self::Replaced
                | Self::Stopped
        )
    }
}

/// Aggregated view of an order as reported by its venue.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub status: OrderStatus,
    pub original_amount: Volume,
    pub cumulative_amount: Volume,
    pub average_price: Option<Price>,
    pub fee: Option<Decimal>,
}

impl OrderSnapshot {
    /// Unfilled part of the order, never negative.
    #[must_use]
    pub fn remaining_amount(&self) -> Volume {
        (self.original_amount - self.cumulative_amount).max(Volume::ZERO)
    }
}

/// How much of an order a compensating order should unwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackMode {
    /// Everything that was filled.
    Cumulative,
    /// Whatever was left unfilled.
    Remaining,
}

/// Result of cancelling an order and unwinding its fill.
#[derive(Debug, Clone, PartialEq)]
pub struct RevertOutcome {
    /// The original order after cancellation, if the venue still knows it.
    pub order: Option<OrderSnapshot>,
    /// The compensating market order, if one was needed.
    pub revert: Option<OrderSnapshot>,
}

/// Terminal state of one polled leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Venue reported a terminal order status.
    Order(OrderStatus),
    /// The maximum execution time elapsed first.
    TimeExpired,
    /// A non-retryable error stopped the poll.
    UnrecoverableError,
}

impl CompletionStatus {
    #[must_use]
    pub const fn is_filled(self) -> bool {
        matches!(self, Self::Order(OrderStatus::Filled))
    }
}

/// What a leg poller reports when it stops.
#[derive(Debug, Clone)]
pub struct LegCompletion {
    pub status: CompletionStatus,
    /// Aggregate fill data, present once the venue reported a terminal status.
    pub order: Option<OrderSnapshot>,
    /// Cause of an unrecoverable stop.
    pub error: Option<String>,
}

impl LegCompletion {
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.status.is_filled()
    }
}
