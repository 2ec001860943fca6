//! Order types and pricing policy.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::TradingError;

/// Decimal places of order size accepted by the venue.
pub const SIZE_DECIMALS: u32 = 2;

/// Buy limit order parameters for submission.
///
/// Orders rest on the book until filled or cancelled (good-til-cancelled).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderParams {
    /// Token ID to trade.
    pub token_id: String,
    /// Limit price.
    pub price: Decimal,
    /// Order size in shares.
    pub size: Decimal,
}

impl OrderParams {
    /// Create a new buy order.
    pub fn buy(token_id: impl Into<String>, price: Decimal, size: Decimal) -> Self {
        Self {
            token_id: token_id.into(),
            price,
            size,
        }
    }

    /// Buy order spending `amount` USDC at `price`, size truncated to the venue's precision.
    pub fn for_amount(token_id: impl Into<String>, amount: Decimal, price: Decimal) -> Self {
        Self::buy(token_id, price, order_size(amount, price))
    }

    /// Validate order parameters.
    pub fn validate(&self) -> Result<(), TradingError> {
        if self.token_id.trim().is_empty() {
            return Err(TradingError::InvalidParams(
                "token_id is required".to_string(),
            ));
        }
        if self.price <= Decimal::ZERO || self.price > Decimal::ONE {
            return Err(TradingError::InvalidParams(format!(
                "price must be in (0, 1], got {}",
                self.price
            )));
        }
        if self.size <= Decimal::ZERO {
            return Err(TradingError::InvalidParams(format!(
                "size must be positive, got {}",
                self.size
            )));
        }
        Ok(())
    }
}

/// Price the order is placed at: the outcome price, capped by `max_price`.
pub fn effective_price(outcome_price: Decimal, max_price: Option<Decimal>) -> Decimal {
    match max_price {
        Some(cap) => outcome_price.min(cap),
        None => outcome_price,
    }
}

/// Shares bought by spending `amount` at `price`; zero when `price <= 0`.
pub fn share_size(amount: Decimal, price: Decimal) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    amount.checked_div(price).unwrap_or(Decimal::ZERO)
}

/// [`share_size`] truncated to [`SIZE_DECIMALS`] places.
pub fn order_size(amount: Decimal, price: Decimal) -> Decimal {
    share_size(amount, price).round_dp_with_strategy(SIZE_DECIMALS, RoundingStrategy::ToZero)
}
