/*
[INPUT]:  A task record and a wiremock exchange rejecting order placement
[OUTPUT]: Coverage of the worker's error taxonomy end to end
[POS]:    Integration test for the worker entry point
[UPDATE]: When the run phases or final status rules change
*/

use rust_decimal::Decimal;
use std::str::FromStr;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aster_volume_runner::config::{AccountConfig, EngineTuning, RunnerConfig};
use aster_volume_runner::store::{TaskRecord, TaskStatus, TaskStore};
use aster_volume_runner::worker;

fn decimal(value: &str) -> Decimal {
    Decimal::from_str(value).expect("valid decimal")
}

async fn mount_market_data(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/openOrders"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("[]", "application/json"))
        .mount(server)
        .await;

    let account = r#"{
        "balances": [
            {"asset": "ASTER", "free": "1000", "locked": "0"},
            {"asset": "USDT", "free": "1000", "locked": "0"}
        ]
    }"#;
    Mock::given(method("GET"))
        .and(path("/api/v1/account"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(account, "application/json"))
        .mount(server)
        .await;

    let exchange_info = r#"{
        "symbols": [
            {
                "symbol": "ASTERUSDT",
                "filters": [
                    {"filterType": "PRICE_FILTER", "tickSize": "0.0001"},
                    {"filterType": "LOT_SIZE", "stepSize": "0.1"},
                    {"filterType": "MIN_NOTIONAL", "minNotional": "5"}
                ]
            }
        ]
    }"#;
    Mock::given(method("GET"))
        .and(path("/api/v1/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(exchange_info, "application/json"))
        .mount(server)
        .await;

    let commission = r#"{
        "symbol": "ASTERUSDT",
        "makerCommissionRate": "0.001",
        "takerCommissionRate": "0.002"
    }"#;
    Mock::given(method("GET"))
        .and(path("/api/v1/commissionRate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(commission, "application/json"))
        .mount(server)
        .await;

    let ticker = r#"{
        "symbol": "ASTERUSDT",
        "bidPrice": "0.7000",
        "bidQty": "10000",
        "askPrice": "0.7010",
        "askQty": "10000"
    }"#;
    Mock::given(method("GET"))
        .and(path("/api/v1/ticker/bookTicker"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ticker, "application/json"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn rejected_order_submission_marks_the_task_as_error() {
    let server = MockServer::start().await;
    mount_market_data(&server).await;

    // Every order placement is rejected with a credentials failure.
    let rejection = r#"{"code": -2015, "msg": "Invalid API-key, IP, or permissions for action."}"#;
    Mock::given(method("POST"))
        .and(path("/api/v1/order"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(rejection, "application/json"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let config = RunnerConfig {
        account: AccountConfig {
            api_key: "bad-key".to_string(),
            api_secret: "bad-secret".to_string(),
        },
        base_url: Some(server.uri()),
        data_dir: Some(dir.path().to_path_buf()),
        log_dir: Some(dir.path().join("logs")),
        engine: EngineTuning {
            stagger_ms: 1,
            monitor_window_ms: 50,
            poll_interval_ms: 5,
            settle_delay_ms: 1,
            ..EngineTuning::default()
        },
    };

    {
        let store = TaskStore::open(dir.path()).await.expect("open store");
        let task = TaskRecord::new(
            "t1".to_string(),
            "ASTERUSDT".to_string(),
            decimal("10"),
            5,
            1,
        );
        store.create(task).await.expect("create task");
    }

    let result = worker::run_worker("t1", config, "info").await;
    assert!(result.is_err(), "submission rejection must fail the run");

    let store = TaskStore::open(dir.path()).await.expect("reopen store");
    let task = store.get("t1").await.expect("task");
    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.worker_pid.is_none());
    assert!(task.last_error.is_some());
    // The fatal submission aborted the run before any round completed.
    assert_eq!(task.stats.completed_rounds, 0);
}
