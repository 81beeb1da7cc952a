mod support;

use std::sync::Arc;

use rust_decimal_macros::dec;
use trailspread::application::PositionRegistry;
use trailspread::domain::{
    LegSide, MarketPhase, OrderIntent, PositionId, Pricing, TradingRule, VenueId,
};
use trailspread::error::VenueError;
use trailspread::testkit::{gateway_settings, test_params, MockVenue};

use support::engine::{eventually, Harness};
use support::position::entered;

#[tokio::test]
async fn trailing_entry_then_trailing_exit_round_trip() {
    let h = Harness::new();
    h.engine.refresh_wallets().await;

    // The spread widens past the target, keeps widening, then retreats
    // through the trailing stop.
    h.step(dec!(10)).await;
    h.step(dec!(20)).await;
    assert!(h.registry().is_empty(), "entry must wait for the stop");
    h.step(dec!(19)).await;

    assert_eq!(h.registry().len(), 1);
    let position = h.registry().snapshot().remove(0);
    assert_eq!(position.long().venue().as_str(), "beta");
    assert_eq!(position.short().venue().as_str(), "alpha");

    let placed = h.alpha.placed_orders();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].intent, OrderIntent::OpenShort);
    assert_eq!(placed[0].pricing, Pricing::Limit(dec!(18.99)));
    assert_eq!(h.beta.placed_orders()[0].intent, OrderIntent::OpenLong);

    let id = position.id();
    assert!(
        eventually(|| h
            .registry()
            .get(id)
            .is_some_and(|p| p.is_both_entry_orders_filled()))
        .await
    );

    // The spread collapses below the exit target, overshoots, then bounces
    // back through the exit stop.
    h.step(dec!(9)).await;
    h.step(dec!(8)).await;
    assert!(!h.registry().get(id).unwrap().is_either_exit_order_placed());
    h.step(dec!(8.5)).await;

    let closing = h.alpha.placed_orders();
    assert_eq!(closing.len(), 2);
    assert_eq!(closing[1].intent, OrderIntent::CloseShort);
    assert_eq!(
        closing[1].quantity,
        position.leg(MarketPhase::Entry, LegSide::Short).volume().unwrap()
    );
    assert_eq!(h.beta.placed_orders()[1].intent, OrderIntent::CloseLong);

    assert!(eventually(|| h.registry().is_empty()).await);
    assert_eq!(
        h.recorder.lifecycle(),
        vec![
            "entry_orders_placed",
            "entry_orders_filled",
            "exit_orders_placed",
            "position_removed",
            "position_closed",
        ]
    );
}

#[tokio::test]
async fn narrow_spread_never_enters() {
    let h = Harness::new();
    h.engine.refresh_wallets().await;

    for price in [dec!(9), dec!(9.05), dec!(9.02), dec!(9)] {
        h.step(price).await;
    }

    assert!(h.registry().is_empty());
    assert!(h.alpha.placed_orders().is_empty());
    assert!(h.beta.placed_orders().is_empty());
}

#[tokio::test]
async fn demo_mode_keeps_orders_off_the_venue() {
    let h = Harness::with(
        test_params(),
        true,
        PositionRegistry::new(),
    );
    h.engine.refresh_wallets().await;

    h.step(dec!(10)).await;
    h.step(dec!(20)).await;
    h.step(dec!(19)).await;

    assert_eq!(h.registry().len(), 1);
    assert!(h.alpha.placed_orders().is_empty());
    assert!(h.beta.placed_orders().is_empty());
    let id = h.registry().snapshot()[0].id();
    assert!(
        eventually(|| h
            .registry()
            .get(id)
            .is_some_and(|p| p.is_both_entry_orders_filled()))
        .await
    );
}

#[tokio::test]
async fn missing_exposure_limit_skips_entry() {
    let mut params = test_params();
    params.max_exposure.clear();
    let h = Harness::with(params, false, PositionRegistry::new());
    h.engine.refresh_wallets().await;

    h.step(dec!(10)).await;
    h.step(dec!(20)).await;
    h.step(dec!(19)).await;

    assert!(h.registry().is_empty());
    assert!(h.alpha.placed_orders().is_empty());
}

#[tokio::test]
async fn engine_run_stops_on_cancel() {
    let h = Harness::new();
    let token = h.engine.token().clone();
    let stop = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        token.cancel();
    });

    support::engine::within(h.engine.run()).await.unwrap();
    stop.await.unwrap();
    assert_eq!(h.recorder.count("process_exit"), 1);
    assert!(h.recorder.count("quote_received") > 0);
}

#[tokio::test]
async fn failing_venue_does_not_block_healthy_pair() {
    let aardvark = Arc::new(MockVenue::new("aardvark"));
    aardvark.fail_order_book(Some(VenueError::Other("market delisted".into())));
    let h = Harness::build(
        test_params(),
        gateway_settings(),
        PositionRegistry::new(),
        vec![Arc::clone(&aardvark)],
    );
    h.engine.refresh_wallets().await;

    h.step(dec!(10)).await;
    h.step(dec!(20)).await;
    h.step(dec!(19)).await;

    assert_eq!(h.registry().len(), 1);
    let position = h.registry().snapshot().remove(0);
    assert_eq!(position.long().venue().as_str(), "beta");
    assert_eq!(position.short().venue().as_str(), "alpha");
    assert!(aardvark.placed_orders().is_empty());
}

#[tokio::test]
async fn retryable_book_error_disables_only_that_venue() {
    let aardvark = Arc::new(MockVenue::new("aardvark"));
    aardvark.fail_order_book(Some(VenueError::Timeout));
    let h = Harness::build(
        test_params(),
        gateway_settings(),
        PositionRegistry::new(),
        vec![Arc::clone(&aardvark)],
    );
    h.engine.refresh_wallets().await;

    h.step(dec!(10)).await;
    h.step(dec!(20)).await;
    h.step(dec!(19)).await;

    assert_eq!(h.registry().len(), 1);
    let gateways = h.engine.gateways();
    assert!(!gateways.get(&VenueId::new("alpha")).unwrap().is_disabled());
    assert!(!gateways.get(&VenueId::new("beta")).unwrap().is_disabled());
    assert!(gateways.get(&VenueId::new("aardvark")).unwrap().is_disabled());
}

#[tokio::test]
async fn unready_wallet_blocks_entry() {
    let h = Harness::new();

    h.step(dec!(10)).await;
    h.step(dec!(20)).await;
    h.step(dec!(19)).await;
    assert!(h.registry().is_empty());
    assert!(h.alpha.placed_orders().is_empty());
    assert!(h.beta.placed_orders().is_empty());

    h.engine.refresh_wallets().await;
    h.step(dec!(10)).await;
    h.step(dec!(20)).await;
    h.step(dec!(19)).await;
    assert_eq!(h.registry().len(), 1);
}

#[tokio::test]
async fn unready_wallet_blocks_exit() {
    let h = Harness::with(
        test_params(),
        false,
        PositionRegistry::from_positions([entered(1, "beta", "alpha")]),
    );

    for price in [dec!(9), dec!(8), dec!(8.5)] {
        h.step(price).await;
    }
    assert!(h.alpha.placed_orders().is_empty());
    assert!(h.beta.placed_orders().is_empty());

    h.engine.refresh_wallets().await;
    for price in [dec!(9), dec!(8), dec!(8.5)] {
        h.step(price).await;
    }
    assert_eq!(h.alpha.placed_orders()[0].intent, OrderIntent::CloseShort);
    assert_eq!(h.beta.placed_orders()[0].intent, OrderIntent::CloseLong);
}

#[tokio::test]
async fn position_ids_are_not_reused_after_close() {
    let h = Harness::new();
    h.engine.refresh_wallets().await;

    for price in [dec!(10), dec!(20), dec!(19)] {
        h.step(price).await;
    }
    let first = h.registry().snapshot()[0].id();
    assert!(
        eventually(|| h
            .registry()
            .get(first)
            .is_some_and(|p| p.is_both_entry_orders_filled()))
        .await
    );
    for price in [dec!(9), dec!(8), dec!(8.5)] {
        h.step(price).await;
    }
    assert!(eventually(|| h.registry().is_empty()).await);

    for price in [dec!(10), dec!(20), dec!(19)] {
        h.step(price).await;
    }
    assert_eq!(h.registry().len(), 1);
    assert_ne!(h.registry().snapshot()[0].id(), first);
}

#[tokio::test]
async fn failed_exit_leg_restarts_before_entry() {
    let h = Harness::with(
        test_params(),
        false,
        PositionRegistry::from_positions([entered(1, "beta", "alpha")]),
    );
    h.alpha.fail_orders(OrderIntent::CloseShort);
    h.engine.refresh_wallets().await;

    for price in [dec!(9), dec!(8), dec!(8.5)] {
        h.step(price).await;
    }

    // The long leg went out and the rejected short leg forces another pass.
    assert_eq!(h.beta.placed_orders().len(), 1);
    assert_eq!(h.beta.placed_orders()[0].intent, OrderIntent::CloseLong);
    assert_eq!(h.alpha.placed_orders().len(), 1);
    let position = h.registry().get(PositionId::new(1)).unwrap();
    assert!(position.is_either_exit_order_placed());
    assert!(!position.is_both_exit_orders_placed());
    assert_eq!(h.recorder.count("exit_orders_placed"), 0);
    assert!(h.engine.quotes().has_new_quote());

    // Without new quotes the missing leg is retried at market.
    h.engine.process_new_quotes().await;
    let short_orders = h.alpha.placed_orders();
    assert_eq!(short_orders.len(), 2);
    assert_eq!(short_orders[1].intent, OrderIntent::CloseShort);
    assert_eq!(short_orders[1].pricing, Pricing::Market);
    assert_eq!(h.beta.placed_orders().len(), 1);
}

#[tokio::test]
async fn entry_limit_prices_round_down_to_the_price_step() {
    // Sorts before beta, so its pairing with alpha is placed first.
    let aardvark = Arc::new(MockVenue::new("aardvark").with_rule(TradingRule {
        price_step: Some(dec!(0.1)),
        ..TradingRule::default()
    }));
    let h = Harness::build(
        test_params(),
        gateway_settings(),
        PositionRegistry::new(),
        vec![Arc::clone(&aardvark)],
    );
    h.engine.refresh_wallets().await;

    h.step(dec!(10)).await;
    h.step(dec!(20)).await;
    h.step(dec!(19)).await;

    let placed = aardvark.placed_orders();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].intent, OrderIntent::OpenLong);
    // The ask is 9.01.
    assert_eq!(placed[0].pricing, Pricing::Limit(dec!(9.0)));
    assert!(h.beta.placed_orders().is_empty());
}
