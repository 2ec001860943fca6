//! Trade result records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle status of a trade attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TradeStatus {
    /// Not started.
    Pending,
    /// Payment step in progress.
    Paying,
    /// Order accepted and resting on the book.
    Trading,
    /// Order matched.
    Completed,
    /// Attempt failed.
    Failed,
}

impl TradeStatus {
    /// Whether the venue accepted the order.
    pub fn is_success(&self) -> bool {
        matches!(self, TradeStatus::Trading | TradeStatus::Completed)
    }
}

/// Payment-side record attached to every trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    /// Amount in USDC.
    pub amount: Decimal,
    /// Network the trade settles on.
    pub network: String,
    /// Token symbol.
    pub token: String,
    /// Payment transaction hash; never set, no payment is made.
    pub tx_hash: Option<String>,
    /// `completed` or `failed`.
    pub status: TradeStatus,
}

impl PaymentInfo {
    /// USDC on Polygon.
    pub fn usdc_on_polygon(amount: Decimal, accepted: bool) -> Self {
        Self {
            amount,
            network: "polygon".to_string(),
            token: "USDC".to_string(),
            tx_hash: None,
            status: if accepted {
                TradeStatus::Completed
            } else {
                TradeStatus::Failed
            },
        }
    }
}

/// Outcome of one order-submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    /// Venue order ID; empty on failure.
    pub order_id: String,
    /// Slug of the traded market.
    pub market_slug: String,
    /// Outcome name.
    pub outcome: String,
    /// USDC amount.
    pub amount: Decimal,
    /// Shares submitted.
    pub shares_purchased: Decimal,
    /// Limit price.
    pub price_per_share: Decimal,
    /// Final status.
    pub status: TradeStatus,
    /// Settlement transaction hash, when known.
    pub tx_hash: Option<String>,
    /// Payment descriptor.
    pub payment: PaymentInfo,
    /// When the result was produced.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Failure reason.
    pub error: Option<String>,
    /// Client-generated key identifying this attempt.
    pub idempotency_key: Uuid,
}

/// Order fields shared by success and failure results.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeDetails {
    /// Outcome name.
    pub outcome: String,
    /// USDC amount.
    pub amount: Decimal,
    /// Shares.
    pub shares: Decimal,
    /// Limit price.
    pub price: Decimal,
    /// Idempotency key.
    pub idempotency_key: Uuid,
}

impl TradeResult {
    /// Result for an order the venue accepted.
    pub fn accepted(
        details: TradeDetails,
        order_id: impl Into<String>,
        status: TradeStatus,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            market_slug: String::new(),
            outcome: details.outcome,
            amount: details.amount,
            shares_purchased: details.shares,
            price_per_share: details.price,
            status,
            tx_hash: None,
            payment: PaymentInfo::usdc_on_polygon(details.amount, true),
            timestamp: OffsetDateTime::now_utc(),
            error: None,
            idempotency_key: details.idempotency_key,
        }
    }

    /// Result for a failed attempt.
    pub fn failed(details: TradeDetails, error: impl Into<String>) -> Self {
        Self {
            order_id: String::new(),
            market_slug: String::new(),
            outcome: details.outcome,
            amount: details.amount,
            shares_purchased: Decimal::ZERO,
            price_per_share: details.price,
            status: TradeStatus::Failed,
            tx_hash: None,
            payment: PaymentInfo::usdc_on_polygon(details.amount, false),
            timestamp: OffsetDateTime::now_utc(),
            error: Some(error.into()),
            idempotency_key: details.idempotency_key,
        }
    }

    /// Attach the market slug.
    pub fn with_market_slug(mut self, slug: impl Into<String>) -> Self {
        self.market_slug = slug.into();
        self
    }

    /// Whether the venue accepted the order.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn details() -> TradeDetails {
        TradeDetails {
            outcome: "Yes".to_string(),
            amount: dec!(12),
            shares: dec!(30),
            price: dec!(0.4),
            idempotency_key: Uuid::new_v4(),
        }
    }

    #[test]
    fn accepted_result_has_no_error() {
        let result = TradeResult::accepted(details(), "0xorder", TradeStatus::Completed)
            .with_market_slug("fed");
        assert!(result.is_success());
        assert_eq!(result.order_id, "0xorder");
        assert_eq!(result.market_slug, "fed");
        assert_eq!(result.shares_purchased, dec!(30));
        assert_eq!(result.error, None);
        assert_eq!(result.payment.status, TradeStatus::Completed);
        assert_eq!(result.payment.network, "polygon");
        assert_eq!(result.payment.tx_hash, None);
    }

    #[test]
    fn failed_result_has_error_and_no_order() {
        let result = TradeResult::failed(details(), "boom");
        assert!(!result.is_success());
        assert!(result.order_id.is_empty());
        assert_eq!(result.shares_purchased, Decimal::ZERO);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.payment.status, TradeStatus::Failed);
    }

    #[test]
    fn status_renders_lowercase() {
        assert_eq!(TradeStatus::Completed.to_string(), "completed");
        assert_eq!(
            serde_json::to_value(TradeStatus::Paying).unwrap(),
            serde_json::json!("paying")
        );
    }

    #[test]
    fn result_serializes_with_rfc3339_timestamp() {
        let result = TradeResult::accepted(details(), "id", TradeStatus::Trading);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "trading");
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }
}
