//! Mock venue for unit testing.
//!
//! Records every call and answers with a configurable response, so tests can
//! drive the submitter and orchestrator without a network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ApiCredentials;
use crate::error::TradingError;

use super::order::OrderParams;
use super::venue::{Authentication, Venue, VenueResponse};

/// Configuration for mock venue behavior.
#[derive(Debug, Clone)]
pub struct MockVenueConfig {
    /// Response to every order.
    pub response: VenueResponse,
    /// Whether authentication fails.
    pub fail_auth: bool,
    /// Whether authentication reuses configured credentials instead of deriving.
    pub cached_credentials: bool,
    /// Whether order posting fails with an unknown outcome.
    pub fail_network: bool,
    /// Simulated latency of each call.
    pub latency: Duration,
}

impl Default for MockVenueConfig {
    fn default() -> Self {
        Self {
            response: VenueResponse {
                success: true,
                order_id: "0xmock-order".to_string(),
                status: "matched".to_string(),
                error_msg: None,
            },
            fail_auth: false,
            cached_credentials: false,
            fail_network: false,
            latency: Duration::ZERO,
        }
    }
}

/// In-memory venue.
#[derive(Debug, Clone, Default)]
pub struct MockVenue {
    config: MockVenueConfig,
    auth_count: Arc<AtomicUsize>,
    place_count: Arc<AtomicUsize>,
    orders: Arc<Mutex<Vec<OrderParams>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
}

impl MockVenue {
    /// Venue that matches every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Venue with custom configuration.
    pub fn with_config(config: MockVenueConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Answer every order with `response`.
    pub fn with_response(mut self, response: VenueResponse) -> Self {
        self.config.response = response;
        self
    }

    /// Delay every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.config.latency = latency;
        self
    }

    /// Fail authentication.
    pub fn failing_auth(mut self) -> Self {
        self.config.fail_auth = true;
        self
    }

    /// Authenticate with configured credentials; nothing is derived.
    pub fn with_cached_credentials(mut self) -> Self {
        self.config.cached_credentials = true;
        self
    }

    /// Credentials reported after a derivation.
    pub fn derived_credentials() -> ApiCredentials {
        ApiCredentials {
            key: "mock-api-key".to_string(),
            secret: "mock-secret".to_string(),
            passphrase: "mock-passphrase".to_string(),
        }
    }

    /// Fail order posting with a transport error.
    pub fn failing_network(mut self) -> Self {
        self.config.fail_network = true;
        self
    }

    /// Number of `authenticate` calls.
    pub fn auth_count(&self) -> usize {
        self.auth_count.load(Ordering::SeqCst)
    }

    /// Number of `place_order` calls.
    pub fn place_count(&self) -> usize {
        self.place_count.load(Ordering::SeqCst)
    }

    /// Orders received, in order.
    pub fn orders(&self) -> Vec<OrderParams> {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Order IDs cancelled, in order.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn delay(&self) {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
    }
}

#[async_trait]
impl Venue for MockVenue {
    async fn authenticate(&self) -> Result<Authentication, TradingError> {
        self.auth_count.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if self.config.fail_auth {
            return Err(TradingError::Credential("mock auth failure".to_string()));
        }
        if self.config.cached_credentials {
            return Ok(Authentication::Cached);
        }
        Ok(Authentication::Derived(Self::derived_credentials()))
    }

    async fn place_order(&self, order: &OrderParams) -> Result<VenueResponse, TradingError> {
        self.place_count.fetch_add(1, Ordering::SeqCst);
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(order.clone());
        self.delay().await;

        order.validate()?;

        if self.config.fail_network {
            return Err(TradingError::Network {
                context: "post_order".to_string(),
                reason: "mock connection reset".to_string(),
            });
        }
        Ok(self.config.response.clone())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<bool, TradingError> {
        self.delay().await;
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(order_id.to_string());
        Ok(true)
    }
}
