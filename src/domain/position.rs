//! Open cross-venue arbitrage position.
//!
//! Every mutation goes through a setter that bumps the record's version, so a
//! persistence task can detect dirty state by comparing version sums.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ObservedPairKey, OrderId, PositionId, VenueAndPair};
use super::money::{Price, Ratio, Volume};
use super::order::{LegPair, LegSide};
use super::quote::MarketPhase;

/// Order and fill state of one leg for one phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegFill {
    order_id: Option<OrderId>,
    filled: bool,
    volume: Option<Volume>,
    price: Option<Price>,
}

impl LegFill {
    #[must_use]
    pub fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    #[must_use]
    pub fn is_placed(&self) -> bool {
        self.order_id.is_some()
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.filled
    }

    #[must_use]
    pub fn volume(&self) -> Option<Volume> {
        self.volume
    }

    #[must_use]
    pub fn price(&self) -> Option<Price> {
        self.price
    }

    /// `volume × price` when both are known.
    #[must_use]
    pub fn total(&self) -> Option<Price> {
        Some(self.volume? * self.price?)
    }
}

/// An open long/short position split across two venues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    id: PositionId,
    key: ObservedPairKey,
    exposure: Price,
    fees: LegPair<Ratio>,
    entry_time: Option<DateTime<Utc>>,
    exit_time: Option<DateTime<Utc>>,
    entry: LegPair<LegFill>,
    exit: LegPair<LegFill>,
    exit_target: Ratio,
    #[serde(default)]
    version: u64,
}

impl Position {
    /// Create an empty position for `key` with each venue's fee.
    #[must_use]
    pub fn new(id: PositionId, key: ObservedPairKey, fees: LegPair<Ratio>) -> Self {
        Self {
            id,
            key,
            exposure: Price::ZERO,
            fees,
            entry_time: None,
            exit_time: None,
            entry: LegPair::default(),
            exit: LegPair::default(),
            exit_target: Ratio::ZERO,
            version: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> PositionId {
        self.id
    }

    #[must_use]
    pub fn key(&self) -> &ObservedPairKey {
        &self.key
    }

    #[must_use]
    pub fn long(&self) -> &VenueAndPair {
        self.key.long()
    }

    #[must_use]
    pub fn short(&self) -> &VenueAndPair {
        self.key.short()
    }

    #[must_use]
    pub fn leg_source(&self, side: LegSide) -> &VenueAndPair {
        match side {
            LegSide::Long => self.key.long(),
            LegSide::Short => self.key.short(),
        }
    }

    #[must_use]
    pub fn exposure(&self) -> Price {
        self.exposure
    }

    #[must_use]
    pub fn fee(&self, side: LegSide) -> Ratio {
        *self.fees.get(side)
    }

    #[must_use]
    pub fn entry_time(&self) -> Option<DateTime<Utc>> {
        self.entry_time
    }

    #[must_use]
    pub fn exit_time(&self) -> Option<DateTime<Utc>> {
        self.exit_time
    }

    #[must_use]
    pub fn exit_target(&self) -> Ratio {
        self.exit_target
    }

    /// Per-record change counter.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn leg(&self, phase: MarketPhase, side: LegSide) -> &LegFill {
        match phase {
            MarketPhase::Entry => self.entry.get(side),
            MarketPhase::Exit => self.exit.get(side),
        }
    }

    // ---- mutation (each bumps the version)

    pub fn set_exposure(&mut self, exposure: Price) {
        self.exposure = exposure;
        self.touch();
    }

    pub fn set_entry_time(&mut self, at: DateTime<Utc>) {
        self.entry_time = Some(at);
        self.touch();
    }

    pub fn set_exit_time(&mut self, at: DateTime<Utc>) {
        self.exit_time = Some(at);
        self.touch();
    }

    pub fn set_exit_target(&mut self, target: Ratio) {
        self.exit_target = target;
        self.touch();
    }

    pub fn set_order_id(&mut self, phase: MarketPhase, side: LegSide, order_id: OrderId) {
        self.leg_mut(phase, side).order_id = Some(order_id);
        self.touch();
    }

    pub fn set_filled(&mut self, phase: MarketPhase, side: LegSide, filled: bool) {
        self.leg_mut(phase, side).filled = filled;
        self.touch();
    }

    pub fn set_volume(&mut self, phase: MarketPhase, side: LegSide, volume: Volume) {
        self.leg_mut(phase, side).volume = Some(volume);
        self.touch();
    }

    pub fn set_price(&mut self, phase: MarketPhase, side: LegSide, price: Price) {
        self.leg_mut(phase, side).price = Some(price);
        self.touch();
    }

    pub(crate) fn reset_version(&mut self) {
        self.version = 0;
    }

    fn leg_mut(&mut self, phase: MarketPhase, side: LegSide) -> &mut LegFill {
        match phase {
            MarketPhase::Entry => self.entry.get_mut(side),
            MarketPhase::Exit => self.exit.get_mut(side),
        }
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    // ---- lifecycle predicates

    #[must_use]
    pub fn is_both_entry_orders_placed(&self) -> bool {
        self.entry.long.is_placed() && self.entry.short.is_placed()
    }

    #[must_use]
    pub fn is_both_entry_orders_filled(&self) -> bool {
        self.entry.long.filled && self.entry.short.filled
    }

    #[must_use]
    pub fn is_exit_order_placed(&self, side: LegSide) -> bool {
        self.exit.get(side).is_placed()
    }

    #[must_use]
    pub fn is_both_exit_orders_placed(&self) -> bool {
        self.exit.long.is_placed() && self.exit.short.is_placed()
    }

    #[must_use]
    pub fn is_either_exit_order_placed(&self) -> bool {
        self.exit.long.is_placed() || self.exit.short.is_placed()
    }

    #[must_use]
    pub fn is_both_exit_orders_filled(&self) -> bool {
        self.exit.long.filled && self.exit.short.filled
    }

    /// Whether either leg trades on `leg`'s venue and pair.
    #[must_use]
    pub fn touches(&self, leg: &VenueAndPair) -> bool {
        self.key.long() == leg || self.key.short() == leg
    }

    // ---- derived metrics

    /// `(short entry price - long entry price) / long entry price`.
    #[must_use]
    pub fn entry_spread(&self) -> Option<Ratio> {
        spread(self.entry.short.price?, self.entry.long.price?)
    }

    /// `(short exit price - long exit price) / long exit price`.
    #[must_use]
    pub fn exit_spread(&self) -> Option<Ratio> {
        spread(self.exit.short.price?, self.exit.long.price?)
    }

    /// Return on the long leg net of both of its fees.
    #[must_use]
    pub fn target_perf_long(&self) -> Option<Ratio> {
        let entry = self.entry.long.price?;
        let exit = self.exit.long.price?;
        if entry.is_zero() {
            return None;
        }
        Some((exit - entry) / entry - Decimal::TWO * self.fees.long)
    }

    /// Return on the short leg net of both of its fees.
    #[must_use]
    pub fn target_perf_short(&self) -> Option<Ratio> {
        let entry = self.entry.short.price?;
        let exit = self.exit.short.price?;
        if entry.is_zero() {
            return None;
        }
        Some((entry - exit) / entry - Decimal::TWO * self.fees.short)
    }

    /// Gross profit across all four legs.
    #[must_use]
    pub fn proposed_profit(&self) -> Option<Price> {
        Some(self.entry.short.total()? - self.entry.long.total()? + self.exit.long.total()?
            - self.exit.short.total()?)
    }

    /// Fees charged on all four legs.
    #[must_use]
    pub fn fees(&self) -> Option<Price> {
        Some(
            self.entry.long.total()? * self.fees.long
                + self.exit.long.total()? * self.fees.long
                + self.entry.short.total()? * self.fees.short
                + self.exit.short.total()? * self.fees.short,
        )
    }

    #[must_use]
    pub fn final_profit_after_fees(&self) -> Option<Price> {
        Some(self.proposed_profit()? - self.fees()?)
    }

    #[must_use]
    pub fn trade_length(&self) -> Option<Duration> {
        Some(self.exit_time? - self.entry_time?)
    }

    /// Multi-line summary logged when a position is entered.
    #[must_use]
    pub fn entry_info(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "[ ENTRY {} ]", self.id);
        let _ = writeln!(out, "   Long:  {}", self.key.long());
        let _ = writeln!(out, "   Short: {}", self.key.short());
        let _ = writeln!(
            out,
            "   Long volume {} @ {}, short volume {} @ {}",
            display_opt(self.entry.long.volume),
            display_opt(self.entry.long.price),
            display_opt(self.entry.short.volume),
            display_opt(self.entry.short.price),
        );
        let _ = writeln!(out, "   Exposure: {}", self.exposure);
        let _ = write!(
            out,
            "   Entry spread: {}, exit target: {}",
            display_opt(self.entry_spread()),
            self.exit_target
        );
        out
    }

    /// Multi-line summary logged when a position is closed.
    #[must_use]
    pub fn exit_info(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "[ EXIT {} ]", self.id);
        let _ = writeln!(out, "   Long:  {}", self.key.long());
        let _ = writeln!(out, "   Short: {}", self.key.short());
        let _ = writeln!(
            out,
            "   Exit spread: {}, long perf: {}, short perf: {}",
            display_opt(self.exit_spread()),
            display_opt(self.target_perf_long()),
            display_opt(self.target_perf_short()),
        );
        let _ = write!(
            out,
            "   Profit: {} gross, {} after fees, held {}s",
            display_opt(self.proposed_profit()),
            display_opt(self.final_profit_after_fees()),
            display_opt(self.trade_length().map(|d| d.num_seconds())),
        );
        out
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Position {}

fn spread(short_price: Price, long_price: Price) -> Option<Ratio> {
    if long_price.is_zero() {
        return None;
    }
    Some((short_price - long_price) / long_price)
}

fn display_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::{CurrencyPair, VenueId};
    use rust_decimal_macros::dec;

    fn make_position() -> Position {
        let pair = CurrencyPair::new("BTC", "USD");
        Position::new(
            PositionId::new(1),
            ObservedPairKey::new(
                VenueAndPair::new(VenueId::new("b"), pair.clone()),
                VenueAndPair::new(VenueId::new("a"), pair),
            ),
            LegPair::new(dec!(0.002), dec!(0.002)),
        )
    }

    fn filled_round_trip() -> Position {
        let mut p = make_position();
        p.set_volume(MarketPhase::Entry, LegSide::Long, dec!(1));
        p.set_price(MarketPhase::Entry, LegSide::Long, dec!(100));
        p.set_volume(MarketPhase::Entry, LegSide::Short, dec!(1));
        p.set_price(MarketPhase::Entry, LegSide::Short, dec!(110));
        p.set_volume(MarketPhase::Exit, LegSide::Long, dec!(1));
        p.set_price(MarketPhase::Exit, LegSide::Long, dec!(105));
        p.set_volume(MarketPhase::Exit, LegSide::Short, dec!(1));
        p.set_price(MarketPhase::Exit, LegSide::Short, dec!(106));
        p
    }

    #[test]
    fn every_setter_bumps_version() {
        let mut p = make_position();
        assert_eq!(p.version(), 0);
        p.set_exposure(dec!(100));
        p.set_order_id(MarketPhase::Entry, LegSide::Long, OrderId::new("l1"));
        p.set_filled(MarketPhase::Entry, LegSide::Long, true);
        p.set_exit_target(dec!(0.01));
        assert_eq!(p.version(), 4);
    }

    #[test]
    fn placement_predicates() {
        let mut p = make_position();
        assert!(!p.is_both_entry_orders_placed());
        p.set_order_id(MarketPhase::Entry, LegSide::Long, OrderId::new("l1"));
        p.set_order_id(MarketPhase::Entry, LegSide::Short, OrderId::new("s1"));
        assert!(p.is_both_entry_orders_placed());
        assert!(!p.is_both_entry_orders_filled());

        p.set_order_id(MarketPhase::Exit, LegSide::Short, OrderId::new("s2"));
        assert!(p.is_either_exit_order_placed());
        assert!(p.is_exit_order_placed(LegSide::Short));
        assert!(!p.is_exit_order_placed(LegSide::Long));
        assert!(!p.is_both_exit_orders_placed());
    }

    #[test]
    fn spreads_from_fill_prices() {
        let p = filled_round_trip();
        assert_eq!(p.entry_spread(), Some(dec!(0.1)));
        assert_eq!(p.exit_spread(), Some(dec!(1) / dec!(105)));
        assert_eq!(make_position().exit_spread(), None);
    }

    #[test]
    fn profit_and_fees() {
        let p = filled_round_trip();
        // 110 - 100 + 105 - 106
        assert_eq!(p.proposed_profit(), Some(dec!(9)));
        // (100 + 105 + 110 + 106) * 0.002
        assert_eq!(p.fees(), Some(dec!(0.842)));
        assert_eq!(p.final_profit_after_fees(), Some(dec!(8.158)));
        assert_eq!(p.target_perf_long(), Some(dec!(0.046)));
        assert_eq!(p.target_perf_short(), Some(dec!(4) / dec!(110) - dec!(0.004)));
    }

    #[test]
    fn equality_is_by_id() {
        let a = make_position();
        let mut b = make_position();
        b.set_exposure(dec!(999));
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_with_venue_names() {
        let p = filled_round_trip();
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"BTC/USD\""));
        assert!(json.contains("\"venue\":\"a\""));
        let back: Position = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entry_spread(), p.entry_spread());
    }
}
