//! What happens once both legs of a position phase stop polling.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::params::TradingParams;
use super::quote_service::QuoteService;
use super::registry::PositionRegistry;
use super::venue::VenueGateways;
use crate::domain::{
    weighted_average, LegCompletion, LegPair, LegSide, MarketPhase, OrderSnapshot, Position,
    PositionId, Price, RollbackMode, Volume,
};
use crate::port::{Event, NotifierRegistry};

/// Completion callbacks for entry and exit pollers.
#[derive(Clone)]
pub struct CompletionHandler {
    gateways: Arc<VenueGateways>,
    registry: Arc<PositionRegistry>,
    notifiers: Arc<NotifierRegistry>,
    quotes: Arc<QuoteService>,
    params: Arc<TradingParams>,
}

impl CompletionHandler {
    pub fn new(
        gateways: Arc<VenueGateways>,
        registry: Arc<PositionRegistry>,
        notifiers: Arc<NotifierRegistry>,
        quotes: Arc<QuoteService>,
        params: Arc<TradingParams>,
    ) -> Self {
        Self {
            gateways,
            registry,
            notifiers,
            quotes,
            params,
        }
    }

    /// Record a clean entry, or unwind whatever was filled and drop the position.
    pub async fn on_entry_complete(
        &self,
        id: PositionId,
        long: LegCompletion,
        short: LegCompletion,
    ) {
        let legs = LegPair::new(long, short);
        if legs.long.is_filled() && legs.short.is_filled() {
            let updated = self.registry.update(id, |p| {
                for side in [LegSide::Long, LegSide::Short] {
                    record_fill(p, MarketPhase::Entry, side, legs.get(side).order.as_ref());
                }
                p.clone()
            });
            match updated {
                Some(position) => {
                    info!(position = %id, "{}", position.entry_info());
                    self.notifiers
                        .notify_all(&Event::EntryOrdersFilled(position));
                }
                None => warn!(position = %id, "Entry filled for unknown position"),
            }
            self.quotes.market_pairs_updated();
            return;
        }

        warn!(
            position = %id,
            long = ?legs.long.status,
            short = ?legs.short.status,
            delay = ?self.params.unfilled_entry_cleanup_delay,
            "Entry orders did not fill, cleaning up"
        );
        tokio::time::sleep(self.params.unfilled_entry_cleanup_delay).await;
        self.cleanup_entry(id).await;
        self.quotes.market_pairs_updated();
    }

    /// Cancel both entry legs, unwind their fills and remove the position.
    pub async fn cleanup_entry(&self, id: PositionId) {
        let Some(position) = self.registry.get(id) else {
            warn!(position = %id, "Nothing to clean up");
            return;
        };

        for side in [LegSide::Long, LegSide::Short] {
            let Some(order_id) = position.leg(MarketPhase::Entry, side).order_id() else {
                continue;
            };
            let source = position.leg_source(side);
            let gateway = match self.gateways.for_leg(source) {
                Ok(gateway) => gateway,
                Err(e) => {
                    error!(
                        position = %id,
                        leg = %side,
                        error = %e,
                        "Cannot unwind entry leg, manual intervention required"
                    );
                    continue;
                }
            };
            match gateway
                .revert(source.pair(), order_id, side, RollbackMode::Cumulative)
                .await
            {
                Ok(outcome) => info!(
                    position = %id,
                    leg = %side,
                    reverted = outcome.revert.is_some(),
                    "Entry leg unwound"
                ),
                Err(e) => error!(
                    position = %id,
                    leg = %side,
                    order_id = %order_id,
                    error = %e,
                    "Failed to unwind entry leg, manual intervention required"
                ),
            }
        }

        if let Some(removed) = self.registry.remove(id) {
            self.notifiers.notify_all(&Event::PositionRemoved(removed));
        }
    }

    /// Settle both exit legs and close the position.
    pub async fn on_exit_complete(
        &self,
        id: PositionId,
        long: LegCompletion,
        short: LegCompletion,
    ) {
        let Some(position) = self.registry.get(id) else {
            warn!(position = %id, "Exit completed for unknown position");
            return;
        };

        let legs = LegPair::new(long, short);
        let (long_settled, short_settled) = tokio::join!(
            self.settle_exit_leg(&position, LegSide::Long, &legs.long),
            self.settle_exit_leg(&position, LegSide::Short, &legs.short),
        );
        self.registry.update(id, |p| {
            let settled = [(LegSide::Long, long_settled), (LegSide::Short, short_settled)];
            for (side, settled) in settled {
                match settled {
                    Some((volume, price)) => {
                        p.set_volume(MarketPhase::Exit, side, volume);
                        p.set_price(MarketPhase::Exit, side, price);
                        p.set_filled(MarketPhase::Exit, side, true);
                    }
                    None => p.set_filled(MarketPhase::Exit, side, false),
                }
            }
        });

        self.finalize(id);
    }

    /// Volume and price a leg finally exited at, or `None` if it could not be closed.
    async fn settle_exit_leg(
        &self,
        position: &Position,
        side: LegSide,
        completion: &LegCompletion,
    ) -> Option<(Volume, Price)> {
        let leg = position.leg(MarketPhase::Exit, side);
        if completion.is_filled() {
            let order = completion.order.as_ref();
            let volume = order
                .map(|o| o.cumulative_amount)
                .or(leg.volume())
                .unwrap_or_default();
            let price = order
                .and_then(|o| o.average_price)
                .or(leg.price())
                .unwrap_or_default();
            return Some((volume, price));
        }

        let order_id = leg.order_id()?;
        let source = position.leg_source(side);
        let gateway = match self.gateways.for_leg(source) {
            Ok(gateway) => gateway,
            Err(e) => {
                error!(position = %position.id(), leg = %side, error = %e, "Cannot close exit leg");
                return None;
            }
        };
        match gateway
            .cancel_or_revert(source.pair(), order_id, side, RollbackMode::Remaining)
            .await
        {
            Ok(outcome) => {
                let partial = fill_of(outcome.order.as_ref());
                let revert = fill_of(outcome.revert.as_ref());
                let volume = partial.0 + revert.0;
                let price = weighted_average(partial, revert)
                    .or(leg.price())
                    .unwrap_or_default();
                info!(
                    position = %position.id(),
                    leg = %side,
                    volume = %volume,
                    price = %price,
                    "Exit leg closed at market"
                );
                Some((volume, price))
            }
            Err(e) => {
                error!(
                    position = %position.id(),
                    leg = %side,
                    order_id = %order_id,
                    error = %e,
                    "Failed to close exit leg, manual intervention required"
                );
                None
            }
        }
    }

    /// Stamp the exit time, remove the position and announce it closed.
    pub fn finalize(&self, id: PositionId) {
        self.registry.update(id, |p| {
            if p.exit_time().is_none() {
                p.set_exit_time(Utc::now());
            }
        });
        let Some(position) = self.registry.remove(id) else {
            error!(position = %id, "Position vanished before it could be finalized");
            return;
        };
        info!(position = %id, "{}", position.exit_info());
        self.notifiers
            .notify_all(&Event::PositionRemoved(position.clone()));
        self.notifiers.notify_all(&Event::PositionClosed(position));
        self.quotes.market_pairs_updated();
    }
}

fn record_fill(
    position: &mut Position,
    phase: MarketPhase,
    side: LegSide,
    order: Option<&OrderSnapshot>,
) {
    position.set_filled(phase, side, true);
    if let Some(order) = order {
        position.set_volume(phase, side, order.cumulative_amount);
        if let Some(price) = order.average_price {
            position.set_price(phase, side, price);
        }
    }
}

fn fill_of(order: Option<&OrderSnapshot>) -> (Volume, Price) {
    order.map_or((Volume::ZERO, Price::ZERO), |o| {
        (o.cumulative_amount, o.average_price.unwrap_or_default())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::venue::VenueGateway;
    use crate::domain::{
        CompletionStatus, CurrencyPair, ObservedPairKey, OrderId, OrderStatus, VenueAndPair,
        VenueId,
    };
    use crate::port::{Notifier, NotifierRegistry, Venue};
    use crate::testkit::{gateway_settings, test_params, MockVenue};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<&'static str>>);

    impl Notifier for Recorder {
        fn notify(&self, event: &Event) {
            self.0.lock().push(event.name());
        }
    }

    struct Fixture {
        handler: CompletionHandler,
        registry: Arc<PositionRegistry>,
        events: Arc<Recorder>,
        short_venue: Arc<MockVenue>,
    }

    fn pair() -> CurrencyPair {
        CurrencyPair::new("BTC", "USD")
    }

    fn fixture() -> Fixture {
        let long_venue = Arc::new(MockVenue::new("b"));
        let short_venue = Arc::new(MockVenue::new("a").with_short());
        let gateways: VenueGateways = [
            VenueGateway::new(long_venue, gateway_settings()),
            VenueGateway::new(short_venue.clone(), gateway_settings()),
        ]
        .into_iter()
        .collect();

        let events = Arc::new(Recorder::default());
        let mut notifiers = NotifierRegistry::new();
        notifiers.register(Box::new(Arc::clone(&events)));

        let registry = Arc::new(PositionRegistry::new());
        let handler = CompletionHandler::new(
            Arc::new(gateways),
            Arc::clone(&registry),
            Arc::new(notifiers),
            Arc::new(QuoteService::new(std::time::Duration::from_secs(5))),
            Arc::new(test_params()),
        );
        Fixture {
            handler,
            registry,
            events,
            short_venue,
        }
    }

    fn position(id: u64) -> Position {
        let mut position = Position::new(
            PositionId::new(id),
            ObservedPairKey::new(
                VenueAndPair::new(VenueId::new("b"), pair()),
                VenueAndPair::new(VenueId::new("a"), pair()),
            ),
            LegPair::new(dec!(0.002), dec!(0.002)),
        );
        for side in [LegSide::Long, LegSide::Short] {
            position.set_volume(MarketPhase::Entry, side, dec!(1));
            position.set_price(MarketPhase::Entry, side, dec!(10));
        }
        position
    }

    fn filled(volume: Volume, price: Price) -> LegCompletion {
        LegCompletion {
            status: CompletionStatus::Order(OrderStatus::Filled),
            order: Some(OrderSnapshot {
                id: OrderId::new("x"),
                status: OrderStatus::Filled,
                original_amount: volume,
                cumulative_amount: volume,
                average_price: Some(price),
                fee: None,
            }),
            error: None,
        }
    }

    fn expired() -> LegCompletion {
        LegCompletion {
            status: CompletionStatus::TimeExpired,
            order: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn filled_entry_records_fill_data() {
        let f = fixture();
        f.registry.insert(position(1));

        f.handler
            .on_entry_complete(
                PositionId::new(1),
                filled(dec!(0.9), dec!(10.5)),
                filled(dec!(1), dec!(11)),
            )
            .await;

        let position = f.registry.get(PositionId::new(1)).unwrap();
        assert!(position.is_both_entry_orders_filled());
        assert_eq!(position.leg(MarketPhase::Entry, LegSide::Long).volume(), Some(dec!(0.9)));
        assert_eq!(position.leg(MarketPhase::Entry, LegSide::Long).price(), Some(dec!(10.5)));
        assert_eq!(*f.events.0.lock(), vec!["entry_orders_filled"]);
    }

    #[tokio::test]
    async fn unfilled_entry_is_unwound_and_removed() {
        let f = fixture();
        let mut entry = position(1);
        entry.set_order_id(MarketPhase::Entry, LegSide::Long, OrderId::new("never-placed"));
        f.registry.insert(entry);

        f.handler
            .on_entry_complete(PositionId::new(1), expired(), expired())
            .await;

        assert!(f.registry.is_empty());
        assert_eq!(*f.events.0.lock(), vec!["position_removed"]);
    }

    #[tokio::test]
    async fn exit_finalizes_and_removes() {
        let f = fixture();
        f.registry.insert(position(1));

        f.handler
            .on_exit_complete(
                PositionId::new(1),
                filled(dec!(1), dec!(9)),
                filled(dec!(1), dec!(8)),
            )
            .await;

        assert!(f.registry.is_empty());
        assert_eq!(*f.events.0.lock(), vec!["position_removed", "position_closed"]);
    }

    #[tokio::test]
    async fn unfilled_exit_leg_is_closed_at_market() {
        let f = fixture();
        f.short_venue.set_fill_orders(false);
        let order_id = f
            .short_venue
            .place_order(&crate::domain::OrderRequest {
                pair: pair(),
                intent: crate::domain::OrderIntent::CloseShort,
                quantity: dec!(1),
                pricing: crate::domain::Pricing::Limit(dec!(8)),
            })
            .await
            .unwrap();
        f.short_venue.set_fill_orders(true);

        let mut exiting = position(1);
        exiting.set_order_id(MarketPhase::Exit, LegSide::Short, order_id);
        f.registry.insert(exiting);

        let recorder = Arc::clone(&f.events);
        f.handler
            .on_exit_complete(PositionId::new(1), filled(dec!(1), dec!(9)), expired())
            .await;

        assert!(f.registry.is_empty());
        assert_eq!(recorder.0.lock().len(), 2);
        // cancelled, then closed at market for the full remaining amount
        assert_eq!(f.short_venue.cancelled().len(), 1);
        let last = f.short_venue.placed_orders().pop().unwrap();
        assert_eq!(last.quantity, dec!(1));
        assert_eq!(last.pricing, crate::domain::Pricing::Market);
    }
}
