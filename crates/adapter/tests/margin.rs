use std::time::Duration;

use adapter::{ExchangeAccountAdapter, DEFAULT_MARGIN_COOLDOWN, RATE_LIMIT_CODE};
use common::{Diagnostic, Holding, MarginDirection, MarginMode};
use paper::PaperExchange;
use tokio::sync::mpsc;
use tokio::time::Instant;

fn exchange_with_isolated_short() -> PaperExchange {
    let exchange = PaperExchange::with_btc_market();
    exchange.open_position(Holding {
        instrument_id: "BTC-USDT-SWAP".into(),
        margin_mode: MarginMode::Isolated,
        size: -2.0,
        margin: 100.0,
    });
    exchange
}

#[tokio::test]
async fn non_positive_amounts_never_reach_the_exchange() {
    let exchange = exchange_with_isolated_short();
    let adapter = ExchangeAccountAdapter::new(Some("BTC"), 3, &exchange)
        .unwrap()
        .await;

    assert!(!adapter.add_margin(0.0).await);
    assert!(!adapter.add_margin(-5.0).await);
    assert!(!adapter.reduce_margin(0.0).await);
    assert!(!adapter.add_margin(f64::NAN).await);
    assert_eq!(exchange.margin_calls(), 0);
}

#[tokio::test]
async fn successful_transfers_report_amount() {
    let exchange = exchange_with_isolated_short();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let adapter = ExchangeAccountAdapter::builder(3)
        .coin("BTC")
        .diagnostics(tx)
        .connect(&exchange)
        .unwrap()
        .await;

    assert!(adapter.add_margin(25.0).await);
    assert!(adapter.reduce_margin(5.0).await);
    assert_eq!(adapter.swap_balance().await.unwrap(), 120.0);

    assert_eq!(
        rx.try_recv().unwrap(),
        Diagnostic::MarginTransferred {
            direction: MarginDirection::Add,
            amount: 25.0
        }
    );
    assert_eq!(
        rx.try_recv().unwrap(),
        Diagnostic::MarginTransferred {
            direction: MarginDirection::Reduce,
            amount: 5.0
        }
    );
}

#[tokio::test]
async fn exchange_refusal_returns_false() {
    let exchange = exchange_with_isolated_short();
    let adapter = ExchangeAccountAdapter::new(Some("BTC"), 3, &exchange)
        .unwrap()
        .await;

    assert!(!adapter.reduce_margin(1_000.0).await);
    assert_eq!(exchange.margin_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_error_holds_caller_for_cooldown() {
    let exchange = exchange_with_isolated_short();
    exchange.fail_next_margin(RATE_LIMIT_CODE, "Margin adjustment too frequent");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let adapter = ExchangeAccountAdapter::builder(3)
        .coin("BTC")
        .diagnostics(tx)
        .connect(&exchange)
        .unwrap()
        .await;

    let started = Instant::now();
    assert!(!adapter.add_margin(10.0).await);
    assert!(started.elapsed() >= DEFAULT_MARGIN_COOLDOWN);
    assert_eq!(exchange.margin_calls(), 1);

    match rx.try_recv().unwrap() {
        Diagnostic::TransferFailed { code, .. } => {
            assert_eq!(code.as_deref(), Some(RATE_LIMIT_CODE))
        }
        other => panic!("expected TransferFailed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn configured_cooldown_is_used() {
    let exchange = exchange_with_isolated_short();
    exchange.fail_next_margin(RATE_LIMIT_CODE, "Margin adjustment too frequent");
    let adapter = ExchangeAccountAdapter::builder(3)
        .coin("BTC")
        .margin_cooldown(Duration::from_secs(30))
        .connect(&exchange)
        .unwrap()
        .await;

    let started = Instant::now();
    assert!(!adapter.reduce_margin(10.0).await);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(30));
    assert!(elapsed < DEFAULT_MARGIN_COOLDOWN);
}

#[tokio::test(start_paused = true)]
async fn other_errors_return_immediately() {
    let exchange = exchange_with_isolated_short();
    exchange.fail_next_margin("51000", "Parameter amt error");
    let adapter = ExchangeAccountAdapter::new(Some("BTC"), 3, &exchange)
        .unwrap()
        .await;

    let started = Instant::now();
    assert!(!adapter.add_margin(10.0).await);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn no_automatic_retry_after_failure() {
    let exchange = exchange_with_isolated_short();
    exchange.fail_next_margin("51000", "Parameter amt error");
    let adapter = ExchangeAccountAdapter::new(Some("BTC"), 3, &exchange)
        .unwrap()
        .await;

    assert!(!adapter.add_margin(10.0).await);
    assert_eq!(exchange.margin_calls(), 1);
    // The caller decides to try again.
    assert!(adapter.add_margin(10.0).await);
    assert_eq!(exchange.margin_calls(), 2);
}
