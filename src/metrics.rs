//! Latency and outcome metrics.
//!
//! Metrics go through the `metrics` facade. No exporter is installed by the
//! CLI, so these are no-ops unless an embedding application installs a recorder.
//!
//! This module covers:
//! - Market-data fetch latency
//! - Balance query latency and failures
//! - Order submission latency and outcomes

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// Market-data fetch latency metric name.
pub const METRIC_MARKET_FETCH_LATENCY: &str = "market_fetch_latency_ms";
/// Balance query latency metric name.
pub const METRIC_BALANCE_QUERY_LATENCY: &str = "balance_query_latency_ms";
/// Order submission latency metric name.
pub const METRIC_ORDER_SUBMIT_LATENCY: &str = "order_submit_latency_ms";
/// Markets fetched counter metric name.
pub const METRIC_MARKETS_FETCHED: &str = "markets_fetched_total";
/// Balance query failures counter metric name.
pub const METRIC_BALANCE_QUERY_FAILURES: &str = "balance_query_failures_total";
/// Orders submitted counter metric name.
pub const METRIC_ORDERS_SUBMITTED: &str = "orders_submitted_total";
/// Orders completed counter metric name.
pub const METRIC_ORDERS_COMPLETED: &str = "orders_completed_total";
/// Orders failed counter metric name.
pub const METRIC_ORDERS_FAILED: &str = "orders_failed_total";
/// Duplicate submissions counter metric name.
pub const METRIC_DUPLICATE_SUBMISSIONS: &str = "duplicate_submissions_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_MARKET_FETCH_LATENCY,
        "Market-data request latency in milliseconds"
    );
    describe_histogram!(
        METRIC_BALANCE_QUERY_LATENCY,
        "USDC balance query latency in milliseconds"
    );
    describe_histogram!(
        METRIC_ORDER_SUBMIT_LATENCY,
        "Order submission latency in milliseconds"
    );

    describe_counter!(METRIC_MARKETS_FETCHED, "Total number of markets fetched");
    describe_counter!(
        METRIC_BALANCE_QUERY_FAILURES,
        "Total number of balance queries that failed open"
    );
    describe_counter!(METRIC_ORDERS_SUBMITTED, "Total number of orders submitted");
    describe_counter!(
        METRIC_ORDERS_COMPLETED,
        "Total number of orders reported as matched"
    );
    describe_counter!(METRIC_ORDERS_FAILED, "Total number of orders that failed");
    describe_counter!(
        METRIC_DUPLICATE_SUBMISSIONS,
        "Total number of submissions refused by the idempotency ledger"
    );

    debug!("Metrics initialized");
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Record a market-data request latency.
pub fn record_market_fetch_latency(start: Instant, endpoint: &'static str) {
    histogram!(METRIC_MARKET_FETCH_LATENCY, "endpoint" => endpoint).record(elapsed_ms(start));
}

/// Record a balance query latency.
pub fn record_balance_query_latency(start: Instant) {
    histogram!(METRIC_BALANCE_QUERY_LATENCY).record(elapsed_ms(start));
}

/// Record order submission latency.
pub fn record_order_submit_latency(start: Instant) {
    histogram!(METRIC_ORDER_SUBMIT_LATENCY).record(elapsed_ms(start));
}

/// Add to the markets fetched counter.
pub fn inc_markets_fetched(count: usize) {
    counter!(METRIC_MARKETS_FETCHED).increment(count as u64);
}

/// Increment balance query failures counter.
pub fn inc_balance_query_failures() {
    counter!(METRIC_BALANCE_QUERY_FAILURES).increment(1);
}

/// Increment orders submitted counter.
pub fn inc_orders_submitted() {
    counter!(METRIC_ORDERS_SUBMITTED).increment(1);
}

/// Increment orders completed counter.
pub fn inc_orders_completed() {
    counter!(METRIC_ORDERS_COMPLETED).increment(1);
}

/// Increment orders failed counter.
pub fn inc_orders_failed() {
    counter!(METRIC_ORDERS_FAILED).increment(1);
}

/// Increment duplicate submissions counter.
pub fn inc_duplicate_submissions() {
    counter!(METRIC_DUPLICATE_SUBMISSIONS).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn elapsed_ms_measures_time() {
        let start = Instant::now();
        sleep(Duration::from_millis(10));
        assert!(elapsed_ms(start) >= 9.0); // Allow some tolerance
    }

    #[test]
    fn recording_without_a_recorder_is_a_noop() {
        init_metrics();
        record_market_fetch_latency(Instant::now(), "events");
        inc_markets_fetched(3);
        inc_duplicate_submissions();
    }
}
