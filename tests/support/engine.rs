use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use trailspread::application::venue::{GatewaySettings, VenueGateway, VenueGateways};
use trailspread::application::{Engine, PositionRegistry, TradingParams};
use trailspread::port::NotifierRegistry;
use trailspread::testkit::{engine_settings, gateway_settings, test_params, MockVenue};

use super::notifier::RecordingNotifier;

/// Engine over two mock venues: `alpha` may short BTC/USD, `beta` only buys it.
pub struct Harness {
    pub engine: Engine,
    pub alpha: Arc<MockVenue>,
    pub beta: Arc<MockVenue>,
    pub recorder: RecordingNotifier,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(test_params(), false, PositionRegistry::new())
    }

    pub fn with(params: TradingParams, demo_mode: bool, registry: PositionRegistry) -> Self {
        let mut settings = gateway_settings();
        settings.demo_mode = demo_mode;
        Self::build(params, settings, registry, Vec::new())
    }

    /// Harness with custom gateway settings and `extra` venues next to alpha and beta.
    pub fn build(
        params: TradingParams,
        settings: GatewaySettings,
        registry: PositionRegistry,
        extra: Vec<Arc<MockVenue>>,
    ) -> Self {
        let alpha = Arc::new(MockVenue::new("alpha").with_short());
        let beta = Arc::new(MockVenue::new("beta"));

        let mut gateways = VenueGateways::new();
        gateways.insert(VenueGateway::new(alpha.clone(), settings.clone()));
        gateways.insert(VenueGateway::new(beta.clone(), settings.clone()));
        for venue in extra {
            gateways.insert(VenueGateway::new(venue, settings.clone()));
        }

        let recorder = RecordingNotifier::new();
        let mut notifiers = NotifierRegistry::new();
        notifiers.register(Box::new(recorder.clone()));

        let engine = Engine::new(
            Arc::new(gateways),
            Arc::new(registry),
            Arc::new(params),
            engine_settings(),
            notifiers,
            CancellationToken::new(),
        )
        .expect("engine");

        Self {
            engine,
            alpha,
            beta,
            recorder,
        }
    }

    /// Move alpha's mid price, fetch fresh quotes everywhere and run one decision.
    pub async fn step(&self, alpha_price: Decimal) {
        self.alpha.set_price(alpha_price);
        self.engine.poll_quotes().await;
        self.engine.process_new_quotes().await;
    }

    pub fn registry(&self) -> &Arc<PositionRegistry> {
        self.engine.registry()
    }
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Await `future` with a one-second limit.
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(1), future)
        .await
        .expect("timed out")
}
