//! Master decision loop.
//!
//! Quote generators and the wallet poller run as background tasks. The loop
//! itself is single-threaded: each iteration waits for fresh quotes, tries
//! one exit, otherwise one entry, and restarts so the next decision sees the
//! state the previous one left behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::balance::WalletPoller;
use super::completion::CompletionHandler;
use super::entry::{EntryDecision, MarketEntryService};
use super::exit::{ExitDecision, MarketExitService};
use super::params::TradingParams;
use super::poller::{OrderCompletionPoller, PollRequest};
use super::quote_service::QuoteService;
use super::registry::PositionRegistry;
use super::spread_monitor::SpreadMonitor;
use super::venue::{VenueGateway, VenueGateways};
use crate::domain::{CurrencyPair, MarketPhase, Position};
use crate::error::Result;
use crate::port::{Event, NotifierRegistry};

/// Loop and background task timings.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Sleep between master loop iterations.
    pub loop_interval: Duration,
    /// Sleep between quote fetches per venue and pair.
    pub quote_interval: Duration,
    /// Sleep between wallet refreshes.
    pub wallet_poll_interval: Duration,
    /// Stop after this long, if set.
    pub max_runtime: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            loop_interval: Duration::from_millis(100),
            quote_interval: Duration::from_secs(5),
            wallet_poll_interval: Duration::from_secs(5 * 60),
            max_runtime: None,
        }
    }
}

/// Owns the decision services and drives them from quote updates.
pub struct Engine {
    gateways: Arc<VenueGateways>,
    registry: Arc<PositionRegistry>,
    params: Arc<TradingParams>,
    settings: EngineSettings,
    quotes: Arc<QuoteService>,
    monitor: Arc<SpreadMonitor>,
    notifiers: Arc<NotifierRegistry>,
    entry: MarketEntryService,
    exit: MarketExitService,
    completion: CompletionHandler,
    poller: OrderCompletionPoller,
    wallets: Arc<WalletPoller>,
    token: CancellationToken,
}

impl Engine {
    /// Wire the services together.
    ///
    /// The spread monitor is registered ahead of `notifiers` so it sees every
    /// quote-pair evaluation before other listeners.
    pub fn new(
        gateways: Arc<VenueGateways>,
        registry: Arc<PositionRegistry>,
        params: Arc<TradingParams>,
        settings: EngineSettings,
        notifiers: NotifierRegistry,
        token: CancellationToken,
    ) -> Result<Self> {
        let monitor = Arc::new(SpreadMonitor::new(
            params.spread_window,
            params.spread_valid_after,
        )?);
        let mut all = NotifierRegistry::new();
        all.register(Box::new(Arc::clone(&monitor)));
        all.extend(notifiers);
        let notifiers = Arc::new(all);

        let quotes = Arc::new(QuoteService::new(params.max_quote_skew));
        let entry = MarketEntryService::new(
            Arc::clone(&gateways),
            Arc::clone(&quotes),
            Arc::clone(&registry),
            Arc::clone(&monitor),
            Arc::clone(&notifiers),
            Arc::clone(&params),
            token.clone(),
        );
        let exit = MarketExitService::new(
            Arc::clone(&gateways),
            Arc::clone(&quotes),
            Arc::clone(&registry),
            Arc::clone(&notifiers),
            Arc::clone(&params),
        );
        let completion = CompletionHandler::new(
            Arc::clone(&gateways),
            Arc::clone(&registry),
            Arc::clone(&notifiers),
            Arc::clone(&quotes),
            Arc::clone(&params),
        );
        let poller = OrderCompletionPoller::new(params.poll_interval, token.clone());
        let wallets = Arc::new(WalletPoller::new(
            Arc::clone(&gateways),
            Arc::clone(&registry),
            Arc::clone(&params),
            settings.wallet_poll_interval,
        ));

        Ok(Self {
            gateways,
            registry,
            params,
            settings,
            quotes,
            monitor,
            notifiers,
            entry,
            exit,
            completion,
            poller,
            wallets,
            token,
        })
    }

    #[must_use]
    pub fn quotes(&self) -> &Arc<QuoteService> {
        &self.quotes
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PositionRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<SpreadMonitor> {
        &self.monitor
    }

    #[must_use]
    pub fn gateways(&self) -> &Arc<VenueGateways> {
        &self.gateways
    }

    #[must_use]
    pub fn entry(&self) -> &MarketEntryService {
        &self.entry
    }

    #[must_use]
    pub fn poller(&self) -> &OrderCompletionPoller {
        &self.poller
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fetch one quote for every enabled venue and pair.
    pub async fn poll_quotes(&self) {
        for gateway in self.gateways.iter() {
            for pair in gateway.traded_pairs() {
                fetch_quote(gateway, &pair, &self.quotes, &self.notifiers).await;
            }
        }
    }

    /// Refresh and validate every wallet once.
    pub async fn refresh_wallets(&self) {
        self.wallets.refresh_all().await;
    }

    /// Restart pollers for positions left mid-flight by a previous run.
    pub fn resume_pollers(&self) {
        for position in self.registry.positions_with_unfilled_entry_orders() {
            info!(position = %position.id(), "Resuming entry pollers");
            self.start_entry_pollers(&position);
        }
        for position in self.registry.positions_with_unfilled_exit_orders() {
            info!(position = %position.id(), "Resuming exit pollers");
            self.start_exit_pollers(&position);
        }
        for position in self.registry.snapshot() {
            if position.is_both_exit_orders_filled() {
                self.completion.finalize(position.id());
            }
        }
    }

    /// One decision: exit first, otherwise entry.
    ///
    /// Venue errors are absorbed by the scans, so a failing venue or pair
    /// never keeps the others from being evaluated.
    pub async fn process_new_quotes(&self) {
        match self.exit.find_exit().await {
            ExitDecision::Placed(position) => {
                self.start_exit_pollers(&position);
                self.quotes.market_pairs_updated();
                return;
            }
            ExitDecision::Restart => {
                self.quotes.market_pairs_updated();
                return;
            }
            ExitDecision::None => {}
        }

        match self.entry.find_entry().await {
            EntryDecision::Entered(position) => {
                if !self.registry.insert(position.clone()) {
                    warn!(position = %position.id(), "Position id already registered");
                }
                self.start_entry_pollers(&position);
                self.quotes.market_pairs_updated();
            }
            EntryDecision::Restart => self.quotes.market_pairs_updated(),
            EntryDecision::None => self.quotes.all_quotes_processed(),
        }
    }

    /// Run until the token is cancelled or the maximum runtime passes.
    pub async fn run(&self) -> Result<()> {
        info!(
            venues = self.gateways.len(),
            positions = self.registry.len(),
            demo = self.params.demo_mode,
            "Starting engine"
        );
        self.refresh_wallets().await;

        let mut tasks = self.spawn_quote_generators();
        tasks.push(tokio::spawn(
            Arc::clone(&self.wallets).run(self.token.clone()),
        ));
        self.resume_pollers();

        let started = Instant::now();
        loop {
            tokio::select! {
                () = self.token.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                () = tokio::time::sleep(self.settings.loop_interval) => {}
            }
            if let Some(max) = self.settings.max_runtime {
                if started.elapsed() >= max {
                    info!(runtime = ?max, "Maximum runtime reached");
                    self.token.cancel();
                    break;
                }
            }
            if !self.quotes.has_new_quote() {
                continue;
            }
            self.process_new_quotes().await;
        }

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task failed");
            }
        }
        self.entry.wait_for_unwinds().await;
        self.notifiers.notify_all(&Event::ProcessExit);
        info!(positions = self.registry.len(), "Engine stopped");
        Ok(())
    }

    fn spawn_quote_generators(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        for gateway in self.gateways.iter() {
            for pair in gateway.traded_pairs() {
                tasks.push(tokio::spawn(run_quote_generator(
                    Arc::clone(gateway),
                    pair,
                    Arc::clone(&self.quotes),
                    Arc::clone(&self.notifiers),
                    self.settings.quote_interval,
                    self.token.clone(),
                )));
            }
        }
        debug!(generators = tasks.len(), "Quote generators started");
        tasks
    }

    fn start_entry_pollers(&self, position: &Position) {
        let request = match PollRequest::from_position(
            position,
            MarketPhase::Entry,
            &self.gateways,
            self.params.order_completion_max,
        ) {
            Ok(request) => request,
            Err(e) => {
                warn!(position = %position.id(), error = %e, "Cannot poll entry orders");
                return;
            }
        };
        let handler = self.completion.clone();
        let id = position.id();
        let started = self.poller.start(request, move |long, short| async move {
            handler.on_entry_complete(id, long, short).await;
        });
        if started.is_none() {
            warn!(position = %id, "Entry pollers not started, position already being polled");
        }
    }

    fn start_exit_pollers(&self, position: &Position) {
        if position.is_both_exit_orders_filled() {
            self.completion.finalize(position.id());
            return;
        }
        let request = match PollRequest::from_position(
            position,
            MarketPhase::Exit,
            &self.gateways,
            self.params.order_completion_max,
        ) {
            Ok(request) => request,
            Err(e) => {
                warn!(position = %position.id(), error = %e, "Cannot poll exit orders");
                return;
            }
        };
        let handler = self.completion.clone();
        let id = position.id();
        let started = self.poller.start(request, move |long, short| async move {
            handler.on_exit_complete(id, long, short).await;
        });
        if started.is_none() {
            debug!(position = %id, "Exit pollers already running");
        }
    }
}

async fn fetch_quote(
    gateway: &VenueGateway,
    pair: &CurrencyPair,
    quotes: &QuoteService,
    notifiers: &NotifierRegistry,
) {
    if gateway.is_disabled() {
        return;
    }
    match gateway.fetch_quote(pair).await {
        Ok(quote) => {
            quotes.update_quote(quote.clone());
            notifiers.notify_all(&Event::QuoteReceived(quote));
        }
        Err(e) if gateway.is_retryable(&e) => {
            warn!(
                venue = %gateway.id(),
                pair = %pair,
                error = %e,
                "Quote fetch failed, disabling venue"
            );
            gateway.disable_temporarily();
        }
        Err(e) => warn!(venue = %gateway.id(), pair = %pair, error = %e, "Quote fetch failed"),
    }
}

async fn run_quote_generator(
    gateway: Arc<VenueGateway>,
    pair: CurrencyPair,
    quotes: Arc<QuoteService>,
    notifiers: Arc<NotifierRegistry>,
    interval: Duration,
    token: CancellationToken,
) {
    loop {
        fetch_quote(&gateway, &pair, &quotes, &notifiers).await;
        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    debug!(venue = %gateway.id(), pair = %pair, "Quote generator stopped");
}
