/*
[INPUT]:  Scripted fills from the mock exchange
[OUTPUT]: Coverage of round classification, compensation and fatal errors
[POS]:    Integration tests for the pair execution engine
[UPDATE]: When round flow or classification rules change
*/

mod common;

use std::sync::Arc;
use std::time::Duration;

use aster_spot_adapter::{OrderStatus, Side, SymbolFilters};
use aster_volume_runner::config::EngineTuning;
use aster_volume_runner::engine::{EngineError, EngineSettings, PairEngine};
use aster_volume_runner::stop::StopController;

use common::{decimal, FillMode, MockExchange, BASE, QUOTE, SYMBOL};

fn fast_tuning() -> EngineTuning {
    EngineTuning {
        stagger_ms: 1,
        monitor_window_ms: 50,
        poll_interval_ms: 5,
        safety_margin: decimal("1"),
        drift_tolerance: decimal("0.1"),
        max_reconcile_attempts: 5,
        settle_delay_ms: 1,
    }
}

fn settings(rounds: u64) -> EngineSettings {
    EngineSettings {
        symbol: SYMBOL.to_string(),
        base_asset: BASE.to_string(),
        quote_asset: QUOTE.to_string(),
        quantity: decimal("10"),
        rounds,
        interval: Duration::ZERO,
        sell_first: true,
        tuning: fast_tuning(),
    }
}

async fn engine_for(mock: &Arc<MockExchange>, rounds: u64) -> PairEngine {
    PairEngine::new(mock.clone(), settings(rounds), StopController::new())
        .await
        .expect("engine init")
}

#[tokio::test]
async fn five_rounds_with_full_fills_complete_cleanly() {
    let mock = Arc::new(MockExchange::new());
    let mut engine = engine_for(&mock, 5).await;

    engine.run().await.expect("run");
    let stats = engine.into_stats();

    assert_eq!(stats.completed_rounds, 5);
    assert_eq!(stats.failed_rounds, 0);
    assert_eq!(stats.supplement_orders, 0);
    assert!(mock.market_orders().is_empty());

    // Both legs fill in full every round, so the volumes match exactly
    // and sit around 5 rounds x 10 units x ~0.70.
    assert_eq!(stats.buy_volume_quote, stats.sell_volume_quote);
    assert!(stats.buy_volume_quote > decimal("34"));
    assert!(stats.buy_volume_quote < decimal("36"));
    assert!(stats.total_fees_quote > decimal("0"));
}

#[tokio::test]
async fn partial_buy_is_cancelled_and_compensated() {
    let mock = Arc::new(MockExchange::new());
    mock.set_filters(SymbolFilters {
        tick_size: decimal("0.0001"),
        step_size: decimal("0.1"),
        min_notional: decimal("1"),
    });
    mock.set_fill_modes(FillMode::Full, FillMode::Partial(decimal("7")));

    let mut engine = engine_for(&mock, 1).await;
    engine.run().await.expect("run");
    let stats = engine.into_stats();

    assert_eq!(stats.completed_rounds, 1);
    assert_eq!(stats.failed_rounds, 0);
    assert_eq!(stats.supplement_orders, 1);

    // The resting 3 units were bought back with one market order.
    assert_eq!(mock.market_orders(), vec![(Side::Buy, decimal("3"))]);

    let orders = mock.orders();
    let buy = orders
        .iter()
        .find(|order| order.side == Side::Buy)
        .expect("buy leg");
    assert_eq!(buy.status, OrderStatus::Canceled);
    assert_eq!(buy.executed_qty, decimal("7"));
}

#[tokio::test]
async fn both_partial_legs_are_both_compensated() {
    let mock = Arc::new(MockExchange::new());
    mock.set_filters(SymbolFilters {
        tick_size: decimal("0.0001"),
        step_size: decimal("0.1"),
        min_notional: decimal("1"),
    });
    mock.set_fill_modes(
        FillMode::Partial(decimal("4")),
        FillMode::Partial(decimal("6")),
    );

    let mut engine = engine_for(&mock, 1).await;
    engine.run().await.expect("run");
    let stats = engine.into_stats();

    assert_eq!(stats.completed_rounds, 1);
    assert_eq!(stats.supplement_orders, 2);

    let market = mock.market_orders();
    assert_eq!(market.len(), 2);
    assert!(market.contains(&(Side::Buy, decimal("4"))));
    assert!(market.contains(&(Side::Sell, decimal("6"))));
}

#[tokio::test]
async fn resting_buy_against_a_filled_sell_is_cancelled_and_bought_back() {
    let mock = Arc::new(MockExchange::new());
    // The sell fills in full while the buy never trades.
    mock.set_fill_modes(FillMode::Full, FillMode::None);

    let mut engine = engine_for(&mock, 1).await;
    engine.run().await.expect("run");
    let stats = engine.into_stats();

    assert_eq!(stats.completed_rounds, 1);
    assert_eq!(stats.failed_rounds, 0);
    assert_eq!(stats.supplement_orders, 1);

    // The whole round quantity is restored with one market buy.
    assert_eq!(mock.market_orders(), vec![(Side::Buy, decimal("10"))]);

    let orders = mock.orders();
    let buy = orders
        .iter()
        .find(|order| order.side == Side::Buy)
        .expect("buy leg");
    assert_eq!(buy.status, OrderStatus::Canceled);
    assert_eq!(buy.executed_qty, decimal("0"));
}

#[tokio::test]
async fn exchange_cancelled_leg_is_compensated_like_an_unfilled_one() {
    let mock = Arc::new(MockExchange::new());
    mock.set_filters(SymbolFilters {
        tick_size: decimal("0.0001"),
        step_size: decimal("0.1"),
        min_notional: decimal("1"),
    });
    // The sell is cancelled by the exchange with nothing executed.
    mock.set_fill_modes(FillMode::Dead(decimal("0")), FillMode::Full);

    let mut engine = engine_for(&mock, 1).await;
    engine.run().await.expect("run");
    let stats = engine.into_stats();

    assert_eq!(stats.completed_rounds, 1);
    assert_eq!(stats.supplement_orders, 1);
    // The full sell quantity is sold off at market.
    assert_eq!(mock.market_orders(), vec![(Side::Sell, decimal("10"))]);
}

#[tokio::test]
async fn untraded_round_cancels_both_without_compensation() {
    let mock = Arc::new(MockExchange::new());
    mock.set_fill_modes(FillMode::None, FillMode::None);

    let mut engine = engine_for(&mock, 1).await;
    engine.run().await.expect("run");
    let stats = engine.into_stats();

    assert_eq!(stats.completed_rounds, 0);
    assert_eq!(stats.failed_rounds, 1);
    assert!(mock.market_orders().is_empty());

    for order in mock.orders() {
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.executed_qty, decimal("0"));
    }
}

#[tokio::test]
async fn sell_submission_failure_is_fatal_and_cancels_the_buy() {
    let mock = Arc::new(MockExchange::new());
    mock.fail_limit_submissions(Side::Sell);
    // Keep the buy resting so the abort path has something to withdraw.
    mock.set_fill_modes(FillMode::None, FillMode::None);

    let mut engine = engine_for(&mock, 5).await;
    let err = engine.run().await.expect_err("must fail");
    assert!(matches!(err, EngineError::Submission(_)));

    let stats = engine.into_stats();
    assert_eq!(stats.completed_rounds, 0);

    // The accepted buy leg was withdrawn before aborting.
    let orders = mock.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, Side::Buy);
    assert_eq!(orders[0].status, OrderStatus::Canceled);
}

#[tokio::test]
async fn insufficient_balance_fails_the_round_without_orders() {
    let mock = Arc::new(MockExchange::new());
    mock.set_balance(BASE, decimal("0.5"));

    let mut engine = engine_for(&mock, 1).await;
    engine.run().await.expect("run");
    let stats = engine.into_stats();

    assert_eq!(stats.completed_rounds, 0);
    assert_eq!(stats.failed_rounds, 1);
    assert!(mock.orders().is_empty());
    assert!(mock.market_orders().is_empty());
}

#[tokio::test]
async fn unavailable_statuses_fall_back_to_balance_inference() {
    let mock = Arc::new(MockExchange::new());
    mock.fail_order_queries();

    let mut engine = engine_for(&mock, 1).await;
    engine.run().await.expect("run");
    let stats = engine.into_stats();

    // The balance never moved, so the round is a failure with no
    // compensation order.
    assert_eq!(stats.completed_rounds, 0);
    assert_eq!(stats.failed_rounds, 1);
    assert!(mock.market_orders().is_empty());
}

#[tokio::test]
async fn tripped_stop_ends_the_run_after_the_current_round() {
    let mock = Arc::new(MockExchange::new());
    let stop = StopController::new();
    stop.trip();

    let mut engine = PairEngine::new(mock.clone(), settings(5), stop)
        .await
        .expect("engine init");
    engine.run().await.expect("run");
    let stats = engine.into_stats();

    assert_eq!(stats.completed_rounds + stats.failed_rounds, 0);
    assert!(mock.orders().is_empty());
}
