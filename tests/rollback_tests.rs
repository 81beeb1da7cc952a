mod support;

use std::time::Duration;

use rust_decimal_macros::dec;
use trailspread::application::PositionRegistry;
use trailspread::domain::{LegSide, MarketPhase, OrderIntent, Pricing};
use trailspread::testkit::{gateway_settings, test_params};

use support::engine::{eventually, within, Harness};
use support::position::entered;

#[tokio::test]
async fn rejected_short_unwinds_long_and_restarts() {
    let h = Harness::new();
    h.alpha.fail_orders(OrderIntent::OpenShort);
    h.engine.refresh_wallets().await;

    h.step(dec!(10)).await;
    h.step(dec!(20)).await;
    h.step(dec!(19)).await;
    h.engine.entry().wait_for_unwinds().await;

    assert!(h.registry().is_empty());
    let long_orders = h.beta.placed_orders();
    assert_eq!(long_orders.len(), 2);
    assert_eq!(long_orders[0].intent, OrderIntent::OpenLong);
    assert_eq!(long_orders[1].intent, OrderIntent::CloseLong);
    assert_eq!(long_orders[1].pricing, Pricing::Market);
    assert_eq!(long_orders[1].quantity, long_orders[0].quantity);
    assert_eq!(h.recorder.lifecycle(), Vec::<&str>::new());

    // The stop was cleared on approval, so the same spread has to trail again.
    h.step(dec!(19)).await;
    assert_eq!(h.alpha.placed_orders().len(), 1);
}

#[tokio::test]
async fn unwind_delay_does_not_block_the_loop() {
    let mut settings = gateway_settings();
    settings.cancel_revert_delay = Duration::from_secs(10);
    let h = Harness::build(test_params(), settings, PositionRegistry::new(), Vec::new());
    h.alpha.fail_orders(OrderIntent::OpenShort);
    h.engine.refresh_wallets().await;

    h.step(dec!(10)).await;
    h.step(dec!(20)).await;
    within(h.step(dec!(19))).await;

    assert!(h.registry().is_empty());
    assert_eq!(h.beta.placed_orders().len(), 1);
    assert_eq!(h.engine.entry().pending_unwinds(), 1);

    // Quotes keep being evaluated while the unwind waits.
    within(h.step(dec!(18))).await;
    assert_eq!(h.beta.placed_orders().len(), 1);

    // Shutdown cuts the delay short.
    h.engine.token().cancel();
    within(h.engine.entry().wait_for_unwinds()).await;

    let long_orders = h.beta.placed_orders();
    assert_eq!(long_orders.len(), 2);
    assert_eq!(long_orders[1].intent, OrderIntent::CloseLong);
    assert_eq!(long_orders[1].pricing, Pricing::Market);
    assert_eq!(h.engine.entry().pending_unwinds(), 0);
}

#[tokio::test]
async fn half_filled_entry_is_cleaned_up_after_timeout() {
    let mut params = test_params();
    params.order_completion_max = Duration::from_millis(50);
    let h = Harness::with(params, false, PositionRegistry::new());
    h.beta.set_fill_orders(false);
    h.engine.refresh_wallets().await;

    h.step(dec!(10)).await;
    h.step(dec!(20)).await;
    h.step(dec!(19)).await;
    assert_eq!(h.registry().len(), 1);

    assert!(eventually(|| h.registry().is_empty()).await);
    assert_eq!(h.beta.cancelled().len(), 1);
    assert_eq!(h.beta.open_order_count(), 0);

    let short_orders = h.alpha.placed_orders();
    assert_eq!(short_orders.len(), 2);
    assert_eq!(short_orders[1].intent, OrderIntent::CloseShort);
    assert_eq!(short_orders[1].pricing, Pricing::Market);
    assert_eq!(
        h.recorder.lifecycle(),
        vec!["entry_orders_placed", "position_removed"]
    );
}

#[tokio::test]
async fn restored_position_with_unknown_entry_orders_is_dropped() {
    let mut position = entered(7, "beta", "alpha");
    for side in [LegSide::Long, LegSide::Short] {
        position.set_filled(MarketPhase::Entry, side, false);
    }
    let h = Harness::with(
        test_params(),
        false,
        PositionRegistry::from_positions([position]),
    );
    h.engine.refresh_wallets().await;

    h.engine.resume_pollers();
    assert!(h.engine.poller().is_active(trailspread::domain::PositionId::new(7)));

    assert!(eventually(|| h.registry().is_empty()).await);
    assert_eq!(h.recorder.lifecycle(), vec!["position_removed"]);
    assert!(h.alpha.placed_orders().is_empty());
}

#[tokio::test]
async fn restored_position_with_filled_exit_is_finalized() {
    let mut position = entered(3, "beta", "alpha");
    for (side, price) in [(LegSide::Long, dec!(10.5)), (LegSide::Short, dec!(10.6))] {
        position.set_order_id(
            MarketPhase::Exit,
            side,
            trailspread::domain::OrderId::new(format!("exit-{side}")),
        );
        position.set_volume(MarketPhase::Exit, side, dec!(2));
        position.set_price(MarketPhase::Exit, side, price);
        position.set_filled(MarketPhase::Exit, side, true);
    }
    let h = Harness::with(
        test_params(),
        false,
        PositionRegistry::from_positions([position]),
    );

    h.engine.resume_pollers();

    assert!(h.registry().is_empty());
    assert_eq!(
        h.recorder.lifecycle(),
        vec!["position_removed", "position_closed"]
    );
}
