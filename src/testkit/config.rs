//! Canonical test parameters.
//!
//! Single source of truth for the trading and gateway settings used across
//! tests. Every delay is zero and every interval is a few milliseconds, so
//! nothing waits on wall-clock time longer than it must.

use std::time::Duration;

use rust_decimal_macros::dec;

use crate::application::venue::{GatewaySettings, RateLimits};
use crate::application::{EngineSettings, TradingParams};
use crate::domain::Currency;

/// Trading parameters with a 5% trailing offset and one confirmation.
///
/// Exposure is capped at 100 USD; the spread average is valid immediately.
pub fn test_params() -> TradingParams {
    TradingParams {
        target_profit: dec!(0.02),
        trailing_offset: dec!(0.05),
        trailing_confirmations: 1,
        spread_window: Duration::from_secs(60),
        spread_valid_after: Duration::ZERO,
        max_quote_skew: Duration::from_secs(5),
        max_limit_price_difference: dec!(0.05),
        max_exposure: [(Currency::new("USD"), dec!(100))].into_iter().collect(),
        order_completion_max: Duration::from_secs(5),
        poll_interval: Duration::from_millis(5),
        unfilled_entry_cleanup_delay: Duration::ZERO,
        cancel_revert_delay: Duration::ZERO,
        ..TradingParams::default()
    }
}

/// Gateway settings without rate limits or revert delay.
pub fn gateway_settings() -> GatewaySettings {
    GatewaySettings {
        retry_attempts: 2,
        rate_limits: RateLimits::unlimited(),
        cancel_revert_delay: Duration::ZERO,
        ..GatewaySettings::default()
    }
}

/// Engine timings fast enough for end-to-end tests.
pub fn engine_settings() -> EngineSettings {
    EngineSettings {
        loop_interval: Duration::from_millis(2),
        quote_interval: Duration::from_millis(5),
        wallet_poll_interval: Duration::from_millis(50),
        max_runtime: None,
    }
}
