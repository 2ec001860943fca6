//! Order submission with idempotency keys and single-flight credential setup.
//!
//! Every submission carries a client-generated key, tracked in a
//! [`SubmissionLedger`]:
//!
//! - accepted: the recorded result is returned again and nothing is sent;
//! - in flight, or last attempt ended with an unknown outcome (transport
//!   failure or timeout after the order may have been posted): the attempt
//!   is refused with [`TradingError::DuplicateSubmission`];
//! - anything that failed before an order could reach the venue releases the
//!   key so the caller may retry with it.
//!
//! The default ledger lives in memory. Open one on a file to protect keys
//! across separate invocations.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{ApiCredentials, ConfigStore, Policy};
use crate::error::TradingError;
use crate::market::Outcome;
use crate::metrics;

use super::ledger::{Claim, KeyState, SubmissionLedger};
use super::order::{effective_price, OrderParams};
use super::result::{TradeDetails, TradeResult, TradeStatus};
use super::venue::{Authentication, Venue, VenueResponse};

/// Submits orders to a [`Venue`] and normalizes the outcome into a [`TradeResult`].
pub struct OrderSubmitter {
    venue: Arc<dyn Venue>,
    policy: Policy,
    credentials: OnceCell<()>,
    ledger: SubmissionLedger,
    credential_store: Option<ConfigStore>,
}

impl OrderSubmitter {
    /// Create a submitter for `venue` with an in-memory ledger.
    pub fn new(venue: Arc<dyn Venue>, policy: Policy) -> Self {
        Self {
            venue,
            policy,
            credentials: OnceCell::new(),
            ledger: SubmissionLedger::in_memory(),
            credential_store: None,
        }
    }

    /// Track keys in `ledger`.
    pub fn with_ledger(mut self, ledger: SubmissionLedger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Persist newly derived API credentials to `store`.
    pub fn with_credential_store(mut self, store: ConfigStore) -> Self {
        self.credential_store = Some(store);
        self
    }

    /// Key ledger in use.
    pub fn ledger(&self) -> &SubmissionLedger {
        &self.ledger
    }

    /// Set up venue credentials once; concurrent callers share one attempt.
    ///
    /// A failed attempt is not cached.
    pub async fn ensure_credentials(&self) -> Result<(), TradingError> {
        self.credentials
            .get_or_try_init(|| async {
                debug!("Authenticating with venue");
                match self.venue.authenticate().await? {
                    Authentication::Cached => debug!("Using configured API credentials"),
                    Authentication::Derived(credentials) => self.save_credentials(&credentials),
                }
                Ok::<(), TradingError>(())
            })
            .await
            .map(|_| ())
    }

    /// Buy `outcome` with `amount` USDC, capped at `max_price`.
    ///
    /// Never fails: every error is captured in the returned result.
    #[instrument(skip(self, outcome), fields(outcome = %outcome.name, key = %idempotency_key))]
    pub async fn submit(
        &self,
        outcome: &Outcome,
        amount: Decimal,
        max_price: Option<Decimal>,
        idempotency_key: Uuid,
    ) -> TradeResult {
        let price = effective_price(outcome.price, max_price);
        let order = OrderParams::for_amount(outcome.token_id.clone(), amount, price);
        let details = TradeDetails {
            outcome: outcome.name.clone(),
            amount,
            shares: order.size,
            price,
            idempotency_key,
        };

        if let Err(result) = self.claim(idempotency_key, &details) {
            return *result;
        }

        if self.policy.strict_pricing && price <= Decimal::ZERO {
            self.ledger.release(idempotency_key);
            let err = TradingError::InvalidParams(format!(
                "effective price {} is not positive",
                price
            ));
            return self.fail(details, err.to_string());
        }

        if let Err(e) = self.ensure_credentials().await {
            self.ledger.release(idempotency_key);
            error!(error = %e, "Credential setup failed");
            return self.fail(details, e.to_string());
        }

        debug!(price = %order.price, size = %order.size, "Placing order");
        metrics::inc_orders_submitted();

        match self.venue.place_order(&order).await {
            Ok(response) => self.finish(idempotency_key, details, response),
            Err(e) if e.outcome_unknown() => {
                self.ledger.record(idempotency_key, KeyState::OutcomeUnknown);
                warn!(
                    error = %e,
                    "Order outcome unknown; key is blocked until the order is checked on the venue"
                );
                self.fail(details, e.to_string())
            }
            Err(e) => {
                self.ledger.release(idempotency_key);
                error!(error = %e, "Order not sent");
                self.fail(details, e.to_string())
            }
        }
    }

    /// Cancel an open order.
    pub async fn cancel(&self, order_id: &str) -> Result<bool, TradingError> {
        self.ensure_credentials().await?;
        self.venue.cancel_order(order_id).await
    }

    fn save_credentials(&self, credentials: &ApiCredentials) {
        let Some(store) = &self.credential_store else {
            return;
        };
        match store.update_credentials(
            &credentials.key,
            &credentials.secret,
            &credentials.passphrase,
        ) {
            Ok(()) => info!(path = %store.path().display(), "API credentials saved"),
            Err(e) => warn!(error = %e, "Could not save API credentials; they will be derived again"),
        }
    }

    /// Map a venue response onto a result and record accepted keys.
    fn finish(&self, key: Uuid, details: TradeDetails, response: VenueResponse) -> TradeResult {
        if !response.success {
            self.ledger.release(key);
            let message = response
                .error_msg
                .unwrap_or_else(|| "order rejected by venue".to_string());
            warn!(error = %message, "Venue rejected order");
            return self.fail(details, message);
        }

        let status = if response.is_matched() {
            metrics::inc_orders_completed();
            TradeStatus::Completed
        } else {
            TradeStatus::Trading
        };

        info!(order_id = %response.order_id, status = %status, "Order accepted");

        let result = TradeResult::accepted(details, response.order_id, status);
        self.ledger.record(key, KeyState::Accepted(result.clone()));
        result
    }

    fn fail(&self, details: TradeDetails, message: String) -> TradeResult {
        metrics::inc_orders_failed();
        TradeResult::failed(details, message)
    }

    /// Mark `key` in flight, or return the result for an already-used key.
    fn claim(&self, key: Uuid, details: &TradeDetails) -> Result<(), Box<TradeResult>> {
        let reason = match self.ledger.claim(key) {
            Ok(Claim::Fresh) => return Ok(()),
            Ok(Claim::Recorded(result)) => {
                info!("Returning recorded result for idempotency key");
                return Err(Box::new(result));
            }
            Ok(Claim::Refused(reason)) => reason,
            Err(e) => {
                error!(error = %e, "Could not claim idempotency key; nothing sent");
                return Err(Box::new(self.fail(details.clone(), e.to_string())));
            }
        };

        metrics::inc_duplicate_submissions();
        let err = TradingError::DuplicateSubmission {
            key,
            reason: reason.to_string(),
        };
        warn!(error = %err, "Refusing duplicate submission");
        Err(Box::new(TradeResult::failed(details.clone(), err.to_string())))
    }
}
