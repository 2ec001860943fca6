//! Trading venue seam.

use async_trait::async_trait;

use crate::config::ApiCredentials;
use crate::error::TradingError;

use super::order::OrderParams;

/// Venue status for an order that matched on submission.
pub const STATUS_MATCHED: &str = "matched";

/// Venue's answer to an order submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueResponse {
    /// Whether the venue accepted the order.
    pub success: bool,
    /// Venue order ID.
    pub order_id: String,
    /// Lowercase order status, e.g. `matched` or `live`.
    pub status: String,
    /// Venue-supplied error message.
    pub error_msg: Option<String>,
}

impl VenueResponse {
    /// Definite rejection carrying the venue's message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            order_id: String::new(),
            status: String::new(),
            error_msg: Some(message.into()),
        }
    }

    /// Whether the order matched on submission.
    pub fn is_matched(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_MATCHED)
    }
}

/// How the venue obtained API credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    /// Configured credentials were used as-is.
    Cached,
    /// Credentials were created or derived and should be persisted.
    Derived(ApiCredentials),
}

/// An order book that accepts signed orders.
///
/// `place_order` returns [`TradingError::Network`] only when the order may
/// have been transmitted; every other error means nothing was sent.
#[async_trait]
pub trait Venue: Send + Sync {
    /// Use configured API credentials, or create or derive them.
    async fn authenticate(&self) -> Result<Authentication, TradingError>;

    /// Build, sign and submit a limit order.
    async fn place_order(&self, order: &OrderParams) -> Result<VenueResponse, TradingError>;

    /// Cancel an open order; `true` when the venue confirmed it.
    async fn cancel_order(&self, order_id: &str) -> Result<bool, TradingError>;
}
