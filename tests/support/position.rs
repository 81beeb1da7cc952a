use rust_decimal_macros::dec;
use trailspread::domain::{
    CurrencyPair, LegPair, LegSide, MarketPhase, ObservedPairKey, OrderId, Position, PositionId,
    VenueAndPair, VenueId,
};

pub fn btc_usd() -> CurrencyPair {
    CurrencyPair::new("BTC", "USD")
}

pub fn key(long: &str, short: &str) -> ObservedPairKey {
    ObservedPairKey::new(
        VenueAndPair::new(VenueId::new(long), btc_usd()),
        VenueAndPair::new(VenueId::new(short), btc_usd()),
    )
}

/// Position with both entry legs filled at 10 and 11.
pub fn entered(id: u64, long: &str, short: &str) -> Position {
    let mut position = Position::new(
        PositionId::new(id),
        key(long, short),
        LegPair::new(dec!(0.002), dec!(0.002)),
    );
    position.set_exposure(dec!(20));
    position.set_exit_target(dec!(0.05));
    for (side, price) in [(LegSide::Long, dec!(10)), (LegSide::Short, dec!(11))] {
        position.set_order_id(MarketPhase::Entry, side, OrderId::new(format!("{id}-{side}")));
        position.set_volume(MarketPhase::Entry, side, dec!(2));
        position.set_price(MarketPhase::Entry, side, price);
        position.set_filled(MarketPhase::Entry, side, true);
    }
    position
}
