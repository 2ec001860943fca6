//! Payment-network readiness check.
//!
//! This is a balance threshold, not a payment. Nothing is signed, transferred
//! or verified with the facilitator; the check only compares the Base USDC
//! balance with the configured ceiling.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::chain::{BalanceSource, Network};

/// Result of the payment-network balance threshold check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReadiness {
    /// USDC balance on the payment network.
    pub balance: Decimal,
    /// Configured payment ceiling.
    pub ceiling: Decimal,
    /// Facilitator the payment would go through.
    pub facilitator: String,
}

impl PaymentReadiness {
    /// Whether the balance covers the ceiling.
    pub fn is_sufficient(&self) -> bool {
        self.balance >= self.ceiling
    }

    /// Shortfall against the ceiling.
    pub fn shortfall(&self) -> Decimal {
        (self.ceiling - self.balance).max(Decimal::ZERO)
    }
}

/// Compare the payment-network USDC balance of `payer` with `ceiling`.
///
/// Logs a warning when the balance is short; never fails.
pub async fn check_payment_capacity(
    balances: &dyn BalanceSource,
    payer: Address,
    ceiling: Decimal,
    facilitator: &str,
) -> PaymentReadiness {
    let balance = balances.usdc_balance(Network::Base, payer).await;
    let readiness = PaymentReadiness {
        balance,
        ceiling,
        facilitator: facilitator.to_string(),
    };

    if readiness.is_sufficient() {
        debug!(balance = %balance, ceiling = %ceiling, "Payment network balance covers ceiling");
    } else {
        warn!(
            balance = %balance,
            ceiling = %ceiling,
            "Low USDC balance on Base, payment capacity below configured maximum"
        );
    }

    readiness
}
