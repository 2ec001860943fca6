//! Integration tests for the trade flow.
//!
//! Most tests drive [`TradeOrchestrator`] through the in-memory market,
//! balance and venue implementations. Tests marked `#[ignore]` talk to the
//! real services and need `POLY402_POLYGON_KEY`.
//! Run them with: cargo test --test integration -- --ignored

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use poly402::chain::{BalanceSource, ChainBalanceChecker, MockBalanceSource, Network};
use poly402::config::{ConfigFile, EnvOverrides, Settings};
use poly402::error::{MarketError, Poly402Error, TradingError};
use poly402::market::{GammaClient, MarketSource, MockMarketBuilder, MockMarketSource};
use poly402::orchestrator::{TradeOrchestrator, TradeRequest};
use poly402::trading::{MockVenue, SubmissionLedger, TradeStatus, VenueResponse};

const BASE_KEY: &str = "0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
const POLYGON_KEY: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

fn settings() -> Settings {
    let mut file = ConfigFile::default();
    file.networks.base.wallet_private_key = BASE_KEY.to_string();
    file.networks.polygon.wallet_private_key = POLYGON_KEY.to_string();
    Settings::resolve(file, &EnvOverrides::default())
}

fn markets() -> MockMarketSource {
    MockMarketSource::new()
        .with_market(
            MockMarketBuilder::new("binary-market")
                .title("Binary market")
                .outcome("Yes", dec!(0.6))
                .outcome("No", dec!(0.4))
                .build(),
        )
        .with_market(
            MockMarketBuilder::new("three-way")
                .outcome("A", dec!(0.2))
                .outcome("B", dec!(0.3))
                .outcome("C", dec!(0.5))
                .build(),
        )
}

fn funded() -> MockBalanceSource {
    MockBalanceSource::new()
        .with_usdc(Network::Polygon, dec!(500))
        .with_usdc(Network::Base, dec!(500))
}

fn orchestrator(
    markets: MockMarketSource,
    balances: MockBalanceSource,
    venue: &MockVenue,
) -> TradeOrchestrator {
    TradeOrchestrator::with_components(
        &settings(),
        Arc::new(markets),
        Arc::new(balances),
        Arc::new(venue.clone()),
    )
    .unwrap()
}

/// End-to-end: 12 USDC on the 0.4 outcome buys 30 shares at 0.4.
#[tokio::test]
async fn trade_buys_expected_shares() {
    let venue = MockVenue::new();
    let orch = orchestrator(markets(), funded(), &venue);

    let result = assert_ok!(
        orch.execute_trade(&TradeRequest::new(
            "https://polymarket.com/event/binary-market?tid=7",
            1,
            dec!(12),
        ))
        .await
    );

    assert_eq!(result.status, TradeStatus::Completed);
    assert_eq!(result.market_slug, "binary-market");
    assert_eq!(result.outcome, "No");
    assert_eq!(result.shares_purchased, dec!(30));
    assert_eq!(result.price_per_share, dec!(0.4));
    assert_eq!(result.amount, dec!(12));
    assert_eq!(result.payment.status, TradeStatus::Completed);
    assert_eq!(result.error, None);

    let orders = venue.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].token_id, "1001");
    assert_eq!(orders[0].size, dec!(30));
}

#[tokio::test]
async fn out_of_range_outcome_never_reaches_venue() {
    let venue = MockVenue::new();
    let balances = funded();
    let orch = orchestrator(markets(), balances.clone(), &venue);

    let err = assert_err!(
        orch.execute_trade(&TradeRequest::new("three-way", 5, dec!(10)))
            .await
    );

    assert!(matches!(
        err,
        Poly402Error::Trading(TradingError::InvalidOutcome { index: 5, count: 3 })
    ));
    assert_eq!(venue.auth_count(), 0);
    assert_eq!(venue.place_count(), 0);
    assert_eq!(balances.query_count(), 0);
}

#[tokio::test]
async fn insufficient_settlement_balance_stops_before_any_order() {
    let venue = MockVenue::new();
    let balances = MockBalanceSource::new()
        .with_usdc(Network::Polygon, dec!(5))
        .with_usdc(Network::Base, dec!(500));
    let orch = orchestrator(markets(), balances.clone(), &venue);

    let err = orch
        .execute_trade(&TradeRequest::new("binary-market", 0, dec!(12)))
        .await
        .unwrap_err();

    match err {
        Poly402Error::Trading(TradingError::InsufficientFunds {
            network,
            required,
            available,
        }) => {
            assert_eq!(network, "Polygon");
            assert_eq!(required, dec!(12));
            assert_eq!(available, dec!(5));
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
    assert_eq!(venue.place_count(), 0);
    // Only the settlement network was queried.
    assert_eq!(balances.queries().len(), 1);
    assert_eq!(balances.queries()[0].0, Network::Polygon);
}

#[tokio::test]
async fn unresolvable_reference_is_not_found() {
    let venue = MockVenue::new();
    let orch = orchestrator(markets(), funded(), &venue);

    let err = orch
        .execute_trade(&TradeRequest::new("https://example.com/a/b", 0, dec!(1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Poly402Error::Market(MarketError::NotFound { .. })
    ));

    let err = orch
        .execute_trade(&TradeRequest::new("missing-market", 0, dec!(1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Poly402Error::Market(MarketError::Network { .. })
    ));
    assert_eq!(venue.place_count(), 0);
}

#[tokio::test]
async fn venue_rejection_is_a_failed_result() {
    let venue = MockVenue::new().with_response(VenueResponse {
        success: false,
        order_id: String::new(),
        status: String::new(),
        error_msg: Some("not enough balance / allowance".to_string()),
    });
    let orch = orchestrator(markets(), funded(), &venue);

    let result = orch
        .execute_trade(&TradeRequest::new("binary-market", 0, dec!(6)))
        .await
        .unwrap();

    assert_eq!(result.status, TradeStatus::Failed);
    assert_eq!(
        result.error.as_deref(),
        Some("not enough balance / allowance")
    );
    assert!(result.order_id.is_empty());
    assert_eq!(result.market_slug, "binary-market");
    assert_eq!(result.payment.status, TradeStatus::Failed);
}

#[tokio::test]
async fn resting_order_reports_trading() {
    let venue = MockVenue::new().with_response(VenueResponse {
        success: true,
        order_id: "0xlive".to_string(),
        status: "live".to_string(),
        error_msg: None,
    });
    let orch = orchestrator(markets(), funded(), &venue);

    let request =
        TradeRequest::new("binary-market", 0, dec!(6)).with_max_price(Some(dec!(0.5)));
    let result = orch.execute_trade(&request).await.unwrap();

    assert_eq!(result.status, TradeStatus::Trading);
    assert_eq!(result.order_id, "0xlive");
    assert_eq!(result.price_per_share, dec!(0.5));
    assert_eq!(result.shares_purchased, dec!(12));
}

#[tokio::test]
async fn repeated_idempotency_key_sends_one_order() {
    let venue = MockVenue::new();
    let orch = orchestrator(markets(), funded(), &venue);
    let key = Uuid::new_v4();
    let request = TradeRequest::new("binary-market", 1, dec!(12)).with_idempotency_key(key);

    let first = orch.execute_trade(&request).await.unwrap();
    let second = orch.execute_trade(&request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.idempotency_key, key);
    assert_eq!(venue.place_count(), 1);
}

#[tokio::test]
async fn concurrent_in_flight_key_is_refused() {
    let venue = MockVenue::new().with_latency(Duration::from_millis(100));
    let orch = Arc::new(orchestrator(markets(), funded(), &venue));
    let request = TradeRequest::new("binary-market", 1, dec!(12));

    let (a, b) = tokio::join!(orch.execute_trade(&request), orch.execute_trade(&request));
    let (a, b) = (a.unwrap(), b.unwrap());

    let statuses = [a.status, b.status];
    assert!(statuses.contains(&TradeStatus::Completed));
    assert!(statuses.contains(&TradeStatus::Failed));
    let refused = if a.status == TradeStatus::Failed { a } else { b };
    assert!(refused.error.unwrap().contains("in flight"));
    assert_eq!(venue.place_count(), 1);
}

#[tokio::test]
async fn concurrent_first_trades_authenticate_once() {
    let venue = MockVenue::new().with_latency(Duration::from_millis(50));
    let orch = orchestrator(markets(), funded(), &venue);

    let first = TradeRequest::new("binary-market", 0, dec!(6));
    let second = TradeRequest::new("three-way", 2, dec!(5));
    let (a, b) = tokio::join!(orch.execute_trade(&first), orch.execute_trade(&second));

    assert_eq!(a.unwrap().status, TradeStatus::Completed);
    assert_eq!(b.unwrap().status, TradeStatus::Completed);
    assert_eq!(venue.auth_count(), 1);
    assert_eq!(venue.place_count(), 2);
}

#[tokio::test]
async fn timed_out_submission_blocks_retry_with_same_key() {
    let venue = MockVenue::new().failing_network();
    let orch = orchestrator(markets(), funded(), &venue);
    let request = TradeRequest::new("binary-market", 0, dec!(6));

    let first = orch.execute_trade(&request).await.unwrap();
    assert_eq!(first.status, TradeStatus::Failed);

    let retry = orch.execute_trade(&request).await.unwrap();
    assert_eq!(retry.status, TradeStatus::Failed);
    assert!(retry.error.unwrap().contains("may have reached the venue"));
    assert_eq!(venue.place_count(), 1);
}

/// Each orchestrator stands in for one CLI invocation sharing the ledger file.
#[tokio::test]
async fn retry_in_a_new_invocation_does_not_resubmit() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("submissions.json");
    let venue = MockVenue::new().failing_network();
    let request = TradeRequest::new("binary-market", 0, dec!(6));

    let first_run = orchestrator(markets(), funded(), &venue)
        .with_ledger(SubmissionLedger::open(&ledger_path).unwrap());
    let first = first_run.execute_trade(&request).await.unwrap();
    assert_eq!(first.status, TradeStatus::Failed);
    drop(first_run);

    let second_run = orchestrator(markets(), funded(), &venue)
        .with_ledger(SubmissionLedger::open(&ledger_path).unwrap());
    let retry = second_run.execute_trade(&request).await.unwrap();

    assert_eq!(retry.status, TradeStatus::Failed);
    assert!(retry.error.unwrap().contains("duplicate submission"));
    assert_eq!(venue.place_count(), 1);
}

#[tokio::test]
async fn completed_trade_is_replayed_in_a_new_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("submissions.json");
    let venue = MockVenue::new();
    let request = TradeRequest::new("binary-market", 1, dec!(12));

    let first = orchestrator(markets(), funded(), &venue)
        .with_ledger(SubmissionLedger::open(&ledger_path).unwrap())
        .execute_trade(&request)
        .await
        .unwrap();
    let replayed = orchestrator(markets(), funded(), &venue)
        .with_ledger(SubmissionLedger::open(&ledger_path).unwrap())
        .execute_trade(&request)
        .await
        .unwrap();

    assert_eq!(replayed.status, TradeStatus::Completed);
    assert_eq!(replayed.order_id, first.order_id);
    assert_eq!(replayed.market_slug, "binary-market");
    assert_eq!(venue.place_count(), 1);
}

#[tokio::test]
async fn market_source_failure_is_a_network_error() {
    let venue = MockVenue::new();
    let orch = orchestrator(markets().failing(), funded(), &venue);

    let err = orch
        .execute_trade(&TradeRequest::new("binary-market", 0, dec!(6)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Poly402Error::Market(MarketError::Network { .. })
    ));
}

#[tokio::test]
async fn unreachable_rpc_reports_zero_balance() {
    let mut file = ConfigFile::default();
    file.networks.polygon.rpc_url = "http://127.0.0.1:1".to_string();
    file.http_timeout_ms = 2_000;
    let settings = Settings::resolve(file, &EnvOverrides::default());

    let checker = ChainBalanceChecker::new(&settings).unwrap();
    let balance = checker
        .balance(Network::Polygon, alloy::primitives::Address::ZERO, false)
        .await;
    assert_eq!(balance.usdc, Decimal::ZERO);
}

/// Live key from the environment, if configured.
fn live_settings() -> Option<Settings> {
    dotenvy::dotenv().ok();
    let overrides = EnvOverrides::from_env().ok()?;
    let key = overrides.polygon_key.clone()?;

    // Skip if using placeholder key
    if key.starts_with("0x1234") || key.len() < 64 {
        return None;
    }

    let mut file = ConfigFile::default();
    file.networks.base.wallet_private_key = overrides.base_key.clone().unwrap_or(key.clone());
    file.networks.polygon.wallet_private_key = key;
    Some(Settings::resolve(file, &overrides))
}

/// Test that live market data parses.
#[tokio::test]
#[ignore = "requires network access"]
async fn live_active_markets() {
    let settings = settings();
    let client = GammaClient::new(&settings).unwrap();
    let markets = client.active_markets(5, 0).await.unwrap();
    assert!(!markets.is_empty());
    for market in markets {
        for outcome in &market.outcomes {
            assert_eq!(outcome.probability, outcome.price * dec!(100));
        }
    }
}

/// Test that live balances can be read.
#[tokio::test]
#[ignore = "requires POLY402_POLYGON_KEY"]
async fn live_balances() {
    let settings = match live_settings() {
        Some(s) => s,
        None => {
            println!("Skipping: POLY402_POLYGON_KEY not set or invalid");
            return;
        }
    };

    let orch = TradeOrchestrator::new(&settings).unwrap();
    let balances = orch.balances(None).await;
    assert_eq!(balances.len(), 2);
    for balance in balances {
        println!("{}: {} USDC", balance.network.display_name(), balance.usdc);
        assert!(balance.usdc >= Decimal::ZERO);
    }
}
