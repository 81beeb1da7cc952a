//! Dual-leg order completion polling.
//!
//! Each leg is polled by its own task. Both tasks are joined and the caller's
//! callback runs once with the two results. At most one pair of pollers is
//! active per position.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::venue::{VenueGateway, VenueGateways};
use crate::domain::{
    CompletionStatus, CurrencyPair, LegCompletion, LegPair, LegSide, MarketPhase, OrderId,
    OrderStatus, Position, PositionId,
};
use crate::error::{Error, Result};

/// One order to watch.
#[derive(Debug, Clone)]
pub struct LegTarget {
    pub gateway: Arc<VenueGateway>,
    pub pair: CurrencyPair,
    pub order_id: OrderId,
}

/// Both orders of a position phase plus the time they are given to complete.
#[derive(Debug, Clone)]
pub struct PollRequest {
    pub position: PositionId,
    pub legs: LegPair<LegTarget>,
    pub max_duration: Duration,
}

impl PollRequest {
    /// Build a request from a position's order ids for `phase`.
    pub fn from_position(
        position: &Position,
        phase: MarketPhase,
        gateways: &VenueGateways,
        max_duration: Duration,
    ) -> Result<Self> {
        let leg = |side: LegSide| -> Result<LegTarget> {
            let source = position.leg_source(side);
            let order_id = position
                .leg(phase, side)
                .order_id()
                .cloned()
                .ok_or(Error::MissingOrderId {
                    position: position.id(),
                    leg: side.as_str(),
                })?;
            Ok(LegTarget {
                gateway: Arc::clone(gateways.for_leg(source)?),
                pair: source.pair().clone(),
                order_id,
            })
        };
        Ok(Self {
            position: position.id(),
            legs: LegPair::new(leg(LegSide::Long)?, leg(LegSide::Short)?),
            max_duration,
        })
    }
}

/// Releases a position id when the poller pair finishes, even on panic.
struct ActiveGuard {
    active: Arc<Mutex<HashSet<PositionId>>>,
    id: PositionId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.id);
    }
}

/// Starts and tracks leg pollers.
#[derive(Debug, Clone)]
pub struct OrderCompletionPoller {
    active: Arc<Mutex<HashSet<PositionId>>>,
    interval: Duration,
    token: CancellationToken,
}

impl OrderCompletionPoller {
    #[must_use]
    pub fn new(interval: Duration, token: CancellationToken) -> Self {
        Self {
            active: Arc::new(Mutex::new(HashSet::new())),
            interval,
            token,
        }
    }

    /// Whether pollers are running for `id`.
    #[must_use]
    pub fn is_active(&self, id: PositionId) -> bool {
        self.active.lock().contains(&id)
    }

    /// Number of positions being polled.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Start polling both legs of `request`.
    ///
    /// Returns `None` without spawning anything when the position is already
    /// being polled. The callback does not run if polling is cancelled.
    pub fn start<F, Fut>(&self, request: PollRequest, callback: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(LegCompletion, LegCompletion) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !self.active.lock().insert(request.position) {
            debug!(position = %request.position, "Pollers already active");
            return None;
        }
        let guard = ActiveGuard {
            active: Arc::clone(&self.active),
            id: request.position,
        };

        let deadline = Instant::now() + request.max_duration;
        let interval = self.interval;
        let token = self.token.clone();
        let position = request.position;

        info!(
            position = %position,
            long_order = %request.legs.long.order_id,
            short_order = %request.legs.short.order_id,
            "Starting order completion pollers"
        );

        Some(tokio::spawn(async move {
            let _guard = guard;
            let long = tokio::spawn(poll_leg(request.legs.long, interval, deadline, token.clone()));
            let short = tokio::spawn(poll_leg(request.legs.short, interval, deadline, token));
            let (long, short) = tokio::join!(long, short);

            let (Some(long), Some(short)) = (joined(long), joined(short)) else {
                debug!(position = %position, "Pollers cancelled");
                return;
            };
            info!(
                position = %position,
                long = ?long.status,
                short = ?short.status,
                "Order completion polling finished"
            );
            callback(long, short).await;
        }))
    }
}

/// Flatten a leg task result; a panicked task counts as unrecoverable.
fn joined(
    result: std::result::Result<Option<LegCompletion>, tokio::task::JoinError>,
) -> Option<LegCompletion> {
    match result {
        Ok(completion) => completion,
        Err(e) if e.is_cancelled() => None,
        Err(e) => Some(LegCompletion {
            status: CompletionStatus::UnrecoverableError,
            order: None,
            error: Some(format!("leg poller failed: {e}")),
        }),
    }
}

/// Poll one order until it completes, the deadline passes or the token fires.
async fn poll_leg(
    leg: LegTarget,
    interval: Duration,
    deadline: Instant,
    token: CancellationToken,
) -> Option<LegCompletion> {
    let venue = leg.gateway.id().clone();
    loop {
        tokio::select! {
            () = token.cancelled() => return None,
            () = tokio::time::sleep(interval) => {}
        }

        if Instant::now() >= deadline {
            warn!(venue = %venue, order_id = %leg.order_id, "Order did not complete in time");
            return Some(LegCompletion {
                status: CompletionStatus::TimeExpired,
                order: None,
                error: None,
            });
        }

        if !leg.gateway.is_ready() {
            continue;
        }

        let outcome = match leg.gateway.query_order_status(&leg.pair, &leg.order_id).await {
            Ok(status) if status.is_complete() => {
                complete(&leg, status).await
            }
            Ok(_) => continue,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(completion) => return Some(completion),
            Err(e) if leg.gateway.is_retryable(&e) => {
                warn!(
                    venue = %venue,
                    order_id = %leg.order_id,
                    error = %e,
                    "Retryable error while polling"
                );
                leg.gateway.disable_temporarily();
            }
            Err(e) => {
                warn!(
                    venue = %venue,
                    order_id = %leg.order_id,
                    error = %e,
                    "Unrecoverable error while polling"
                );
                return Some(LegCompletion {
                    status: CompletionStatus::UnrecoverableError,
                    order: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }
}

async fn complete(
    leg: &LegTarget,
    status: OrderStatus,
) -> std::result::Result<LegCompletion, crate::error::VenueError> {
    let order = if status == OrderStatus::Filled {
        leg.gateway.query_order(&leg.pair, &leg.order_id).await?
    } else {
        None
    };
    Ok(LegCompletion {
        status: CompletionStatus::Order(status),
        order,
        error: None,
    })
}
