//! Market exit: close positions whose spread has converged.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::params::TradingParams;
use super::quote_service::QuoteService;
use super::registry::PositionRegistry;
use super::trailing_filter::TrailingStopFilter;
use super::venue::{VenueGateway, VenueGateways};
use crate::domain::{
    BookSide, LegPair, LegSide, MarketPhase, OrderIntent, Position, PositionId, Pricing,
};
use crate::error::{Error, Result};
use crate::port::{Event, NotifierRegistry};

/// What an exit scan produced.
#[derive(Debug)]
pub enum ExitDecision {
    /// Both exit orders exist; completion polling takes over.
    Placed(Position),
    /// An exit leg failed to place; evaluate again before any entry.
    Restart,
    /// No position is ready to exit.
    None,
}

/// Scans open positions and places exit orders for at most one per scan.
pub struct MarketExitService {
    gateways: Arc<VenueGateways>,
    quotes: Arc<QuoteService>,
    registry: Arc<PositionRegistry>,
    notifiers: Arc<NotifierRegistry>,
    params: Arc<TradingParams>,
    filter: TrailingStopFilter,
}

impl MarketExitService {
    pub fn new(
        gateways: Arc<VenueGateways>,
        quotes: Arc<QuoteService>,
        registry: Arc<PositionRegistry>,
        notifiers: Arc<NotifierRegistry>,
        params: Arc<TradingParams>,
    ) -> Self {
        let filter = TrailingStopFilter::new(
            MarketPhase::Exit,
            params.trailing_offset,
            params.trailing_confirmations,
        );
        Self {
            gateways,
            quotes,
            registry,
            notifiers,
            params,
            filter,
        }
    }

    #[must_use]
    pub fn filter(&self) -> &TrailingStopFilter {
        &self.filter
    }

    /// Find one position to exit and place its exit orders.
    ///
    /// A placement failure leaves the position registered with whichever leg
    /// succeeded and ends the scan, so the missing leg is retried first on
    /// the next call. A venue error while evaluating a position skips only
    /// that position.
    pub async fn find_exit(&self) -> ExitDecision {
        for position in self.registry.snapshot() {
            if !position.is_both_entry_orders_filled() || position.is_either_exit_order_placed() {
                continue;
            }
            let Some((long, short)) = self.ready_gateways(&position) else {
                continue;
            };
            match self.approve(&position, long, short).await {
                Ok(true) => return self.place_exit_orders(position.id(), long, short).await,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        position = %position.id(),
                        error = %e,
                        "Exit evaluation failed, skipping position"
                    );
                    self.gateways.disable_if_retryable(&e);
                }
            }
        }

        for position in self.registry.snapshot() {
            if !position.is_either_exit_order_placed() || position.is_both_exit_orders_placed() {
                continue;
            }
            let Some((long, short)) = self.ready_gateways(&position) else {
                continue;
            };
            info!(position = %position.id(), "Retrying missing exit leg");
            return self.place_exit_orders(position.id(), long, short).await;
        }

        ExitDecision::None
    }

    /// Both gateways of `position`, if both venues are configured and ready.
    fn ready_gateways(
        &self,
        position: &Position,
    ) -> Option<(&Arc<VenueGateway>, &Arc<VenueGateway>)> {
        let long = self.gateways.for_leg(position.long());
        let short = self.gateways.for_leg(position.short());
        match (long, short) {
            (Ok(long), Ok(short)) => (long.is_ready() && short.is_ready()).then_some((long, short)),
            (Err(e), _) | (_, Err(e)) => {
                warn!(position = %position.id(), error = %e, "Position venue unavailable");
                None
            }
        }
    }

    /// Run the exit filter and liquidity check, recording exit volumes and prices.
    async fn approve(
        &self,
        position: &Position,
        long: &VenueGateway,
        short: &VenueGateway,
    ) -> Result<bool> {
        let Some(quotes) = self
            .quotes
            .comparable_pair(position.long(), position.short())
        else {
            return Ok(false);
        };
        self.notifiers.notify_all(&Event::QuotePairEvaluated {
            pair: quotes.clone(),
            phase: MarketPhase::Exit,
        });

        let key = position.key();
        let spread = quotes.spread_if_exiting();
        if !self.filter.evaluate(key, spread, position.exit_target()) {
            return Ok(false);
        }
        info!(
            position = %position.id(),
            spread = %spread,
            target = %position.exit_target(),
            "Exit approved by trailing stop"
        );

        let (Some(long_volume), Some(short_volume)) = (
            position.leg(MarketPhase::Entry, LegSide::Long).volume(),
            position.leg(MarketPhase::Entry, LegSide::Short).volume(),
        ) else {
            warn!(position = %position.id(), "Entry volumes unknown, cannot exit");
            return Ok(false);
        };
        let long_pair = position.long().pair();
        let short_pair = position.short().pair();
        let volumes = LegPair::new(
            long.round_quantity(long_pair, long_volume, true),
            short.round_quantity(short_pair, short_volume, true),
        );

        let long_limit = long
            .limit_price(long_pair, volumes.long, BookSide::Bid)
            .await
            .map_err(|e| Error::venue(long.id(), e))?;
        let short_limit = short
            .limit_price(short_pair, volumes.short, BookSide::Ask)
            .await
            .map_err(|e| Error::venue(short.id(), e))?;
        if long_limit.is_zero() || short_limit.is_zero() {
            warn!(position = %position.id(), "Empty order book, resetting trailing stop");
            self.filter.reset(key);
            return Ok(false);
        }
        let limits = LegPair::new(
            long.round_price(long_pair, long_limit, true),
            short.round_price(short_pair, short_limit, true),
        );

        let max_difference = self.params.max_limit_price_difference;
        if quotes.long().bid() - limits.long > max_difference
            || limits.short - quotes.short().ask() > max_difference
        {
            info!(
                position = %position.id(),
                long_limit = %limits.long,
                long_market = %quotes.long().bid(),
                short_limit = %limits.short,
                short_market = %quotes.short().ask(),
                "Insufficient liquidity for exit, resetting trailing stop"
            );
            // Stale book data may have caused the bad read.
            self.filter.reset(key);
            return Ok(false);
        }

        self.filter.reset(key);
        self.registry.update(position.id(), |p| {
            for side in [LegSide::Long, LegSide::Short] {
                p.set_volume(MarketPhase::Exit, side, *volumes.get(side));
                p.set_price(MarketPhase::Exit, side, *limits.get(side));
            }
        });
        Ok(true)
    }

    /// Place whichever exit legs are still missing.
    ///
    /// When exactly one leg is already out, the other goes at market so an
    /// asymmetric position does not wait for a favourable limit.
    async fn place_exit_orders(
        &self,
        id: PositionId,
        long: &VenueGateway,
        short: &VenueGateway,
    ) -> ExitDecision {
        let Some(position) = self.registry.get(id) else {
            return ExitDecision::None;
        };
        let long_placed = position.is_exit_order_placed(LegSide::Long);
        let short_placed = position.is_exit_order_placed(LegSide::Short);
        let use_market = long_placed ^ short_placed;

        let leg_order = |side: LegSide| {
            let leg = position.leg(MarketPhase::Exit, side);
            let pricing = match (use_market, leg.price()) {
                (false, Some(price)) => Pricing::Limit(price),
                _ => Pricing::Market,
            };
            (
                position.leg_source(side).pair().clone(),
                leg.volume().unwrap_or_default(),
                pricing,
            )
        };

        let (long_result, short_result) = tokio::join!(
            async {
                if long_placed {
                    return None;
                }
                let (pair, quantity, pricing) = leg_order(LegSide::Long);
                Some(long.place(&pair, OrderIntent::CloseLong, quantity, pricing).await)
            },
            async {
                if short_placed {
                    return None;
                }
                let (pair, quantity, pricing) = leg_order(LegSide::Short);
                Some(short.place(&pair, OrderIntent::CloseShort, quantity, pricing).await)
            },
        );

        let mut failed = false;
        for (side, result) in [(LegSide::Long, long_result), (LegSide::Short, short_result)] {
            match result {
                None => {}
                Some(Ok(order_id)) => {
                    self.registry
                        .update(id, |p| p.set_order_id(MarketPhase::Exit, side, order_id));
                }
                Some(Err(e)) => {
                    warn!(position = %id, leg = %side, error = %e, "Exit order failed");
                    let venue = match side {
                        LegSide::Long => long.id(),
                        LegSide::Short => short.id(),
                    };
                    self.gateways.disable_if_retryable(&Error::venue(venue, e));
                    failed = true;
                }
            }
        }

        if failed {
            return ExitDecision::Restart;
        }
        let Some(position) = self.registry.get(id) else {
            return ExitDecision::None;
        };
        debug!(position = %id, "Exit orders placed");
        self.notifiers
            .notify_all(&Event::ExitOrdersPlaced(position.clone()));
        ExitDecision::Placed(position)
    }
}
