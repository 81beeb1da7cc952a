//! Order book depth used to find liquidity-adjusted limit prices.

use super::money::{Price, Volume};

/// One price level of an order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookLevel {
    pub price: Price,
    pub volume: Volume,
}

impl BookLevel {
    #[must_use]
    pub const fn new(price: Price, volume: Volume) -> Self {
        Self { price, volume }
    }
}

/// Side of the book an order would consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    /// Resting buy orders; consumed when selling.
    Bid,
    /// Resting sell orders; consumed when buying.
    Ask,
}

/// Order book with bids sorted best-first (descending) and asks best-first (ascending).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    bids: Vec<BookLevel>,
    asks: Vec<BookLevel>,
}

impl OrderBook {
    /// Build a book, sorting both sides best-first.
    #[must_use]
    pub fn new(mut bids: Vec<BookLevel>, mut asks: Vec<BookLevel>) -> Self {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self { bids, asks }
    }

    #[must_use]
    pub fn side(&self, side: BookSide) -> &[BookLevel] {
        match side {
            BookSide::Bid => &self.bids,
            BookSide::Ask => &self.asks,
        }
    }

    /// Price of the level at which cumulative volume reaches `volume`.
    ///
    /// Returns the deepest price when the book is too thin and zero when the
    /// side is empty.
    #[must_use]
    pub fn limit_price(&self, side: BookSide, volume: Volume) -> Price {
        let mut cumulative = Volume::ZERO;
        let mut price = Price::ZERO;
        for level in self.side(side) {
            cumulative += level.volume;
            price = level.price;
            if cumulative >= volume {
                break;
            }
        }
        price
    }
}
