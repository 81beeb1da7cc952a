//! Venue quotes and the long/short quote pairing used for spread evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ObservedPairKey, VenueAndPair};
use super::money::{Price, Ratio};

/// Immutable top-of-book snapshot from one venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    source: VenueAndPair,
    bid: Price,
    ask: Price,
    created_at: DateTime<Utc>,
}

impl Quote {
    /// Create a quote stamped with the current time.
    #[must_use]
    pub fn new(source: VenueAndPair, bid: Price, ask: Price) -> Self {
        Self::at(source, bid, ask, Utc::now())
    }

    /// Create a quote with an explicit creation time.
    #[must_use]
    pub fn at(source: VenueAndPair, bid: Price, ask: Price, created_at: DateTime<Utc>) -> Self {
        Self {
            source,
            bid,
            ask,
            created_at,
        }
    }

    #[must_use]
    pub fn source(&self) -> &VenueAndPair {
        &self.source
    }

    #[must_use]
    pub fn bid(&self) -> Price {
        self.bid
    }

    #[must_use]
    pub fn ask(&self) -> Price {
        self.ask
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Which side of the market a spread is being evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketPhase {
    Entry,
    Exit,
}

impl MarketPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }
}

/// Latest quote from a long leg and a short leg.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotePair {
    long: Quote,
    short: Quote,
}

impl QuotePair {
    #[must_use]
    pub fn new(long: Quote, short: Quote) -> Self {
        Self { long, short }
    }

    #[must_use]
    pub fn long(&self) -> &Quote {
        &self.long
    }

    #[must_use]
    pub fn short(&self) -> &Quote {
        &self.short
    }

    /// Directional key for this pairing.
    #[must_use]
    pub fn key(&self) -> ObservedPairKey {
        ObservedPairKey::new(self.long.source.clone(), self.short.source.clone())
    }

    /// `(short bid - long ask) / long ask`; zero when the long ask is zero.
    #[must_use]
    pub fn spread_if_entering(&self) -> Ratio {
        spread(self.short.bid, self.long.ask)
    }

    /// `(short ask - long bid) / long bid`; zero when the long bid is zero.
    #[must_use]
    pub fn spread_if_exiting(&self) -> Ratio {
        spread(self.short.ask, self.long.bid)
    }

    /// Spread for the given phase.
    #[must_use]
    pub fn spread(&self, phase: MarketPhase) -> Ratio {
        match phase {
            MarketPhase::Entry => self.spread_if_entering(),
            MarketPhase::Exit => self.spread_if_exiting(),
        }
    }
}

fn spread(short_price: Price, long_price: Price) -> Ratio {
    if long_price.is_zero() {
        return Ratio::ZERO;
    }
    (short_price - long_price) / long_price
}
