//! Mock market source for unit testing.
//!
//! This module provides an in-memory [`MarketSource`] that can be used in
//! tests without making real network requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::MarketError;

use super::client::MarketSource;
use super::slug::extract_slug;
use super::types::{Market, Outcome};

/// In-memory markets keyed by slug.
#[derive(Debug, Clone, Default)]
pub struct MockMarketSource {
    markets: Arc<Mutex<HashMap<String, Market>>>,
    fetch_count: Arc<AtomicUsize>,
    /// Simulated latency in milliseconds.
    latency_ms: u64,
    /// Whether every request fails with a network error.
    fail: bool,
}

impl MockMarketSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a market.
    pub fn with_market(self, market: Market) -> Self {
        self.insert(market);
        self
    }

    /// Delay every request.
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Fail every request with a network error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Add or replace a market.
    pub fn insert(&self, market: Market) {
        self.markets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(market.slug.clone(), market);
    }

    /// Number of `fetch_market` calls served.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    async fn simulate(&self, context: &str) -> Result<(), MarketError> {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
        if self.fail {
            return Err(MarketError::Network {
                context: context.to_string(),
                reason: "mock network failure".to_string(),
            });
        }
        Ok(())
    }

    fn sorted(&self) -> Vec<Market> {
        let mut markets: Vec<Market> = self
            .markets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        markets.sort_by(|a, b| a.slug.cmp(&b.slug));
        markets
    }
}

#[async_trait]
impl MarketSource for MockMarketSource {
    async fn fetch_market(&self, reference: &str) -> Result<Market, MarketError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let slug = extract_slug(reference)?;
        self.simulate(&slug).await?;

        self.markets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&slug)
            .cloned()
            .ok_or_else(|| MarketError::Network {
                context: format!("/events/slug/{}", slug),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }

    async fn search_markets(&self, query: &str, limit: usize) -> Result<Vec<Market>, MarketError> {
        self.simulate("search").await?;
        let needle = query.to_lowercase();
        Ok(self
            .sorted()
            .into_iter()
            .filter(|m| m.title.to_lowercase().contains(&needle) || m.slug.contains(&needle))
            .take(limit)
            .collect())
    }

    async fn active_markets(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Market>, MarketError> {
        self.simulate("events").await?;
        Ok(self
            .sorted()
            .into_iter()
            .filter(|m| m.active)
            .skip(offset)
            .take(limit)
            .collect())
    }
}

/// Builder for test markets.
#[derive(Debug, Clone)]
pub struct MockMarketBuilder {
    market: Market,
}

impl MockMarketBuilder {
    /// Start an active market with no outcomes.
    pub fn new(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            market: Market {
                title: format!("Market {}", slug),
                slug,
                description: String::new(),
                outcomes: Vec::new(),
                active: true,
                end_date: None,
                condition_id: String::new(),
                question_id: None,
                volume: None,
                liquidity: None,
            },
        }
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.market.title = title.into();
        self
    }

    /// Append an outcome; its token ID is `1000 + index`.
    pub fn outcome(mut self, name: impl Into<String>, price: Decimal) -> Self {
        let index = self.market.outcomes.len();
        let token_id = format!("{}", 1000 + index);
        self.market
            .outcomes
            .push(Outcome::new(index, name, token_id, price));
        self
    }

    /// Mark the market closed.
    pub fn closed(mut self) -> Self {
        self.market.active = false;
        self
    }

    /// Set the volume.
    pub fn volume(mut self, volume: Decimal) -> Self {
        self.market.volume = Some(volume);
        self
    }

    /// Build the market.
    pub fn build(self) -> Market {
        self.market
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn source() -> MockMarketSource {
        MockMarketSource::new()
            .with_market(
                MockMarketBuilder::new("fed-decision")
                    .title("Fed decision")
                    .outcome("Yes", dec!(0.6))
                    .outcome("No", dec!(0.4))
                    .build(),
            )
            .with_market(
                MockMarketBuilder::new("old-election")
                    .outcome("Yes", dec!(1))
                    .closed()
                    .build(),
            )
    }

    #[tokio::test]
    async fn fetch_resolves_urls() {
        let source = source();
        let market = source
            .fetch_market("https://polymarket.com/event/fed-decision?tid=1")
            .await
            .unwrap();
        assert_eq!(market.outcomes.len(), 2);
        assert_eq!(market.outcomes[1].token_id, "1001");
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn unknown_slug_behaves_like_a_404() {
        let err = source().fetch_market("nope").await.unwrap_err();
        assert!(matches!(err, MarketError::Network { .. }));

        let err = source().fetch_market("https://example.com/x/y").await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound { .. }));
    }

    #[tokio::test]
    async fn active_listing_skips_closed_markets() {
        let markets = source().active_markets(10, 0).await.unwrap();
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].slug, "fed-decision");
    }

    #[tokio::test]
    async fn failing_source_reports_network_errors() {
        let err = source().failing().search_markets("fed", 5).await.unwrap_err();
        assert!(matches!(err, MarketError::Network { .. }));
    }
}
