//! Market entry: find one approved long/short candidate, size it, place both legs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::params::TradingParams;
use super::quote_service::QuoteService;
use super::registry::PositionRegistry;
use super::spread_monitor::SpreadMonitor;
use super::trailing_filter::TrailingStopFilter;
use super::venue::{VenueGateway, VenueGateways};
use crate::domain::{
    evaluate_trading_rules, BookSide, CurrencyPair, LegPair, LegSide, MarketPhase,
    ObservedPairKey, OrderId, Position, PositionId, Price, Pricing, QuotePair, Ratio,
    RollbackMode, VenueAndPair, Volume,
};
use crate::error::{Error, Result};
use crate::port::{Event, NotifierRegistry};

/// What an entry scan produced.
#[derive(Debug)]
pub enum EntryDecision {
    /// Both entry orders were placed; the position should be registered.
    Entered(Position),
    /// A leg failed and the other was unwound; evaluate again from scratch.
    Restart,
    /// No candidate was approved.
    None,
}

/// A sized entry ready for placement.
#[derive(Debug)]
struct EntryPlan {
    position: Position,
    quantities: LegPair<Volume>,
    limit_prices: LegPair<Price>,
}

/// Scans candidate venue pairs and opens at most one position per scan.
pub struct MarketEntryService {
    gateways: Arc<VenueGateways>,
    quotes: Arc<QuoteService>,
    registry: Arc<PositionRegistry>,
    monitor: Arc<SpreadMonitor>,
    notifiers: Arc<NotifierRegistry>,
    params: Arc<TradingParams>,
    filter: TrailingStopFilter,
    next_id: AtomicU64,
    unwinds: Mutex<Vec<JoinHandle<()>>>,
    token: CancellationToken,
}

impl MarketEntryService {
    /// Position ids continue after the highest id already in `registry`.
    pub fn new(
        gateways: Arc<VenueGateways>,
        quotes: Arc<QuoteService>,
        registry: Arc<PositionRegistry>,
        monitor: Arc<SpreadMonitor>,
        notifiers: Arc<NotifierRegistry>,
        params: Arc<TradingParams>,
        token: CancellationToken,
    ) -> Self {
        let filter = TrailingStopFilter::new(
            MarketPhase::Entry,
            params.trailing_offset,
            params.trailing_confirmations,
        );
        let next_id = AtomicU64::new(registry.max_id() + 1);
        Self {
            gateways,
            quotes,
            registry,
            monitor,
            notifiers,
            params,
            filter,
            next_id,
            unwinds: Mutex::new(Vec::new()),
            token,
        }
    }

    #[must_use]
    pub fn filter(&self) -> &TrailingStopFilter {
        &self.filter
    }

    /// Number of one-legged entries still waiting to be unwound.
    #[must_use]
    pub fn pending_unwinds(&self) -> usize {
        let mut unwinds = self.unwinds.lock();
        unwinds.retain(|task| !task.is_finished());
        unwinds.len()
    }

    /// Wait for every pending unwind. Once the token is cancelled they skip
    /// their delay and revert straight away.
    pub async fn wait_for_unwinds(&self) {
        let tasks: Vec<_> = std::mem::take(&mut *self.unwinds.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Unwind task failed");
            }
        }
    }

    /// Evaluate every candidate and act on the first approved one.
    ///
    /// A venue error skips only the candidate that raised it.
    pub async fn find_entry(&self) -> EntryDecision {
        for (long, short) in self.candidates() {
            let Some(quotes) = self.quotes.comparable_pair(long.source(), short.source()) else {
                continue;
            };
            self.notifiers.notify_all(&Event::QuotePairEvaluated {
                pair: quotes.clone(),
                phase: MarketPhase::Entry,
            });

            let key = quotes.key();
            let Some(target) = self.target_spread(&key, &long.gateway, &short.gateway) else {
                continue;
            };
            let spread = quotes.spread_if_entering();
            if !self.filter.evaluate(&key, spread, target) {
                continue;
            }
            info!(
                key = %key,
                spread = %spread,
                target = %target,
                "Entry approved by trailing stop"
            );

            let plan = match self.plan(&key, &quotes, &long.gateway, &short.gateway).await {
                Ok(Some(plan)) => plan,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "Entry evaluation failed, skipping candidate");
                    self.gateways.disable_if_retryable(&e);
                    continue;
                }
            };
            self.filter.reset(&key);
            return self.place(plan, &long.gateway, &short.gateway).await;
        }
        EntryDecision::None
    }

    /// Venue/pair combinations eligible for a new position.
    fn candidates(&self) -> Vec<(Candidate, Candidate)> {
        let mut out = Vec::new();
        for short_gw in self.gateways.iter() {
            for short_pair in short_gw.short_pairs() {
                for long_gw in self.gateways.iter() {
                    if long_gw.id() == short_gw.id() {
                        continue;
                    }
                    for long_pair in long_gw.long_pairs() {
                        if !self.params.pairs_equivalent(long_pair, short_pair)
                            || !short_gw.is_shortable(short_pair)
                            || !short_gw.is_ready()
                            || !long_gw.is_ready()
                        {
                            continue;
                        }
                        let long = Candidate::new(
                            long_gw,
                            VenueAndPair::new(long_gw.id().clone(), long_pair.clone()),
                        );
                        let short = Candidate::new(
                            short_gw,
                            VenueAndPair::new(short_gw.id().clone(), short_pair.clone()),
                        );
                        if self.registry.is_in_market(long.source())
                            || self.registry.is_in_market(short.source())
                        {
                            continue;
                        }
                        out.push((long, short));
                    }
                }
            }
        }
        out
    }

    /// `(window average | 0) + both fees + half the target profit`.
    ///
    /// `None` until the spread window has enough history.
    fn target_spread(
        &self,
        key: &ObservedPairKey,
        long: &VenueGateway,
        short: &VenueGateway,
    ) -> Option<Ratio> {
        let Some(average) = self.monitor.window_average(key) else {
            debug!(key = %key, "Spread window not established yet");
            return None;
        };
        let base = if self.params.adapt_to_window_average {
            average
        } else {
            Decimal::ZERO
        };
        Some(
            base + long.fee_percentage()
                + short.fee_percentage()
                + self.params.target_profit / Decimal::TWO,
        )
    }

    /// Validate balances, exposure, liquidity and trading rules; size both legs.
    async fn plan(
        &self,
        key: &ObservedPairKey,
        quotes: &QuotePair,
        long: &VenueGateway,
        short: &VenueGateway,
    ) -> Result<Option<EntryPlan>> {
        let long_pair = key.long().pair();
        let short_pair = key.short().pair();

        let long_balance = long
            .balance(long_pair.counter(), false)
            .await
            .map_err(|e| Error::venue(long.id(), e))?;
        let short_balance = short
            .balance(short_pair.counter(), false)
            .await
            .map_err(|e| Error::venue(short.id(), e))?;
        if long_balance.is_zero() || short_balance.is_zero() {
            info!(
                key = %key,
                long_balance = %long_balance,
                short_balance = %short_balance,
                "No balance for entry"
            );
            return Ok(None);
        }

        let max_exposure = match (
            self.params.max_exposure(long_pair.counter()),
            self.params.max_exposure(short_pair.counter()),
        ) {
            (Some(l), Some(s)) => l.min(s),
            _ => {
                warn!(key = %key, "No max exposure configured, skipping entry");
                return Ok(None);
            }
        };
        let current = self
            .registry
            .total_exposure(long_pair)
            .max(self.registry.total_exposure(short_pair));
        let remaining = max_exposure - current;
        if remaining <= Decimal::ZERO {
            info!(
                key = %key,
                max_exposure = %max_exposure,
                current = %current,
                "Exposure limit reached"
            );
            return Ok(None);
        }

        let mut amount = match (
            self.params.max_transaction_amount(long_pair),
            self.params.max_transaction_amount(short_pair),
        ) {
            (Some(l), Some(s)) => l.min(s),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => remaining,
        };
        amount = amount
            .min(remaining)
            .min(long.max_leveragable_amount(long_pair, long_balance))
            .min(short.max_leveragable_amount(short_pair, short_balance));

        let market = LegPair::new(quotes.long().ask(), quotes.short().bid());
        if market.long.is_zero() || market.short.is_zero() {
            return Ok(None);
        }
        let quantities = LegPair::new(
            long.round_quantity(long_pair, amount / market.long, true),
            short.round_quantity(short_pair, amount / market.short, true),
        );

        let long_limit = long
            .limit_price(long_pair, quantities.long, BookSide::Ask)
            .await
            .map_err(|e| Error::venue(long.id(), e))?;
        let short_limit = short
            .limit_price(short_pair, quantities.short, BookSide::Bid)
            .await
            .map_err(|e| Error::venue(short.id(), e))?;
        if long_limit.is_zero() || short_limit.is_zero() {
            warn!(key = %key, "Empty order book, resetting trailing stop");
            self.filter.reset(key);
            return Ok(None);
        }
        let limit_prices = LegPair::new(
            long.round_price(long_pair, long_limit, true),
            short.round_price(short_pair, short_limit, true),
        );

        // Liquidity may recover before the spread retreats, so the stop is kept.
        let max_difference = self.params.max_limit_price_difference;
        if limit_prices.long - market.long > max_difference
            || market.short - limit_prices.short > max_difference
        {
            info!(
                key = %key,
                long_limit = %limit_prices.long,
                long_market = %market.long,
                short_limit = %limit_prices.short,
                short_market = %market.short,
                "Insufficient liquidity for entry"
            );
            return Ok(None);
        }

        let rules = LegPair::new(long.trading_rule(long_pair), short.trading_rule(short_pair));
        if let Err(violation) = evaluate_trading_rules(key, limit_prices, quantities, &rules) {
            warn!(key = %key, error = %violation, "Entry violates trading rules");
            return Ok(None);
        }

        let mut position = Position::new(
            PositionId::new(self.next_id.fetch_add(1, Ordering::Relaxed)),
            key.clone(),
            LegPair::new(long.fee_percentage(), short.fee_percentage()),
        );
        position.set_entry_time(Utc::now());
        for side in [LegSide::Long, LegSide::Short] {
            position.set_volume(MarketPhase::Entry, side, *quantities.get(side));
            position.set_price(MarketPhase::Entry, side, *limit_prices.get(side));
        }
        position.set_exposure(
            (quantities.long * limit_prices.long).max(quantities.short * limit_prices.short),
        );
        let fees = long.fee_percentage() + short.fee_percentage();
        position.set_exit_target(
            quotes.spread_if_entering() - (self.params.target_profit + Decimal::TWO * fees),
        );

        Ok(Some(EntryPlan {
            position,
            quantities,
            limit_prices,
        }))
    }

    /// Place both legs concurrently, unwinding one if the other fails.
    async fn place(
        &self,
        plan: EntryPlan,
        long: &Arc<VenueGateway>,
        short: &Arc<VenueGateway>,
    ) -> EntryDecision {
        let EntryPlan {
            mut position,
            quantities,
            limit_prices,
        } = plan;
        let long_pair = position.long().pair().clone();
        let short_pair = position.short().pair().clone();

        let (long_result, short_result) = tokio::join!(
            long.open_long(&long_pair, quantities.long, Pricing::Limit(limit_prices.long)),
            short.open_short(&short_pair, quantities.short, Pricing::Limit(limit_prices.short)),
        );

        match (long_result, short_result) {
            (Ok(long_id), Ok(short_id)) => {
                position.set_order_id(MarketPhase::Entry, LegSide::Long, long_id);
                position.set_order_id(MarketPhase::Entry, LegSide::Short, short_id);
                info!(position = %position.id(), "Entry orders placed\n{}", position.entry_info());
                self.notifiers
                    .notify_all(&Event::EntryOrdersPlaced(position.clone()));
                EntryDecision::Entered(position)
            }
            (Ok(long_id), Err(e)) => {
                error!(
                    position = %position.id(),
                    venue = %short.id(),
                    error = %e,
                    "Short entry order failed, unwinding long leg"
                );
                self.unwind(long, long_pair, long_id, LegSide::Long);
                EntryDecision::Restart
            }
            (Err(e), Ok(short_id)) => {
                error!(
                    position = %position.id(),
                    venue = %long.id(),
                    error = %e,
                    "Long entry order failed, unwinding short leg"
                );
                self.unwind(short, short_pair, short_id, LegSide::Short);
                EntryDecision::Restart
            }
            (Err(long_err), Err(short_err)) => {
                error!(
                    position = %position.id(),
                    long_error = %long_err,
                    short_error = %short_err,
                    "Both entry orders failed"
                );
                EntryDecision::Restart
            }
        }
    }

    /// Revert a lone entry leg in the background so the loop keeps running
    /// through the revert delay.
    fn unwind(
        &self,
        gateway: &Arc<VenueGateway>,
        pair: CurrencyPair,
        order_id: OrderId,
        leg: LegSide,
    ) {
        let task = tokio::spawn(unwind_leg(
            Arc::clone(gateway),
            pair,
            order_id,
            leg,
            self.token.clone(),
        ));
        let mut unwinds = self.unwinds.lock();
        unwinds.retain(|task| !task.is_finished());
        unwinds.push(task);
    }
}

async fn unwind_leg(
    gateway: Arc<VenueGateway>,
    pair: CurrencyPair,
    order_id: OrderId,
    leg: LegSide,
    token: CancellationToken,
) {
    tokio::select! {
        () = token.cancelled() => {
            debug!(venue = %gateway.id(), order_id = %order_id, "Shutting down, unwinding now");
        }
        () = tokio::time::sleep(gateway.settings().cancel_revert_delay) => {}
    }
    match gateway
        .revert(&pair, &order_id, leg, RollbackMode::Cumulative)
        .await
    {
        Ok(outcome) => {
            info!(
                venue = %gateway.id(),
                order_id = %order_id,
                reverted = outcome.revert.is_some(),
                "Entry leg unwound"
            );
        }
        Err(e) => {
            error!(
                venue = %gateway.id(),
                order_id = %order_id,
                leg = %leg,
                error = %e,
                "Failed to unwind entry leg, manual intervention required"
            );
        }
    }
}

/// One side of a candidate pairing.
struct Candidate {
    gateway: Arc<VenueGateway>,
    source: VenueAndPair,
}

impl Candidate {
    fn new(gateway: &Arc<VenueGateway>, source: VenueAndPair) -> Self {
        Self {
            gateway: Arc::clone(gateway),
            source,
        }
    }

    fn source(&self) -> &VenueAndPair {
        &self.source
    }
}
