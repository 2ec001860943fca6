//! Polymarket CLOB venue backed by the official SDK.

use std::future::Future;
use std::str::FromStr;
use std::time::{Duration, Instant};

use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use polymarket_client_sdk::auth::state::Authenticated;
use polymarket_client_sdk::auth::{Credentials, ExposeSecret, Normal, Uuid as ApiKey};
use polymarket_client_sdk::clob::types::Side as ClobSide;
use polymarket_client_sdk::clob::{Client, Config as ClobConfig};
use polymarket_client_sdk::error::{Error as SdkError, Status, StatusCode};
use polymarket_client_sdk::types::U256;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::config::{ApiCredentials, Settings};
use crate::error::TradingError;
use crate::metrics;
use crate::signing;

use super::order::OrderParams;
use super::venue::{Authentication, Venue, VenueResponse};

/// Type alias for the authenticated CLOB client.
type AuthenticatedClient = Client<Authenticated<Normal>>;

/// Order venue for the Polymarket CLOB.
///
/// Authentication is lazy and happens at most once; concurrent callers wait
/// on the same attempt. Configured API credentials are used as-is; without
/// them the SDK creates or derives a set.
pub struct ClobVenue {
    /// CLOB base URL.
    clob_url: String,
    /// Local signer for order signatures.
    signer: PrivateKeySigner,
    /// Signature type (0=EOA, 1=Magic.link, 2=Gnosis).
    signature_type: u8,
    /// Per-call timeout.
    timeout: Duration,
    /// Configured API credentials.
    credentials: Option<Credentials>,
    /// Authenticated client, set on first use.
    client: OnceCell<AuthenticatedClient>,
}

impl std::fmt::Debug for ClobVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClobVenue")
            .field("clob_url", &self.clob_url)
            .field("address", &self.signer.address())
            .field("signature_type", &self.signature_type)
            .field("cached_credentials", &self.credentials.is_some())
            .field("authenticated", &self.client.initialized())
            .finish()
    }
}

impl ClobVenue {
    /// Create a venue trading with the settlement-network key.
    pub fn new(settings: &Settings) -> Result<Self, TradingError> {
        let signer =
            signing::create_chain_signer(&settings.polygon.private_key, settings.polygon.chain_id)?;

        Ok(Self {
            clob_url: settings.clob_endpoint.clone(),
            signer,
            signature_type: settings.signature_type,
            timeout: settings.http_timeout,
            credentials: settings.credentials.as_ref().and_then(sdk_credentials),
            client: OnceCell::new(),
        })
    }

    /// Run `fut` under the venue timeout.
    async fn timed<T, E, F>(&self, context: &str, fut: F) -> Result<T, TradingError>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(TradingError::Network {
                context: context.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(self.timeout_error(context)),
        }
    }

    fn timeout_error(&self, context: &str) -> TradingError {
        TradingError::Network {
            context: context.to_string(),
            reason: format!("timed out after {}ms", self.timeout.as_millis()),
        }
    }

    /// Authenticated client, set up on first use.
    async fn client(&self) -> Result<&AuthenticatedClient, TradingError> {
        self.client
            .get_or_try_init(|| async {
                info!(
                    address = %self.signer.address(),
                    cached = self.credentials.is_some(),
                    "Setting up API credentials"
                );

                let unauthenticated = Client::new(&self.clob_url, ClobConfig::default())
                    .map_err(|e| {
                        TradingError::Credential(format!("failed to create CLOB client: {}", e))
                    })?;

                let mut builder = unauthenticated
                    .authentication_builder(&self.signer)
                    .signature_type(signing::signature_type_from_u8(self.signature_type));
                if let Some(credentials) = &self.credentials {
                    builder = builder.credentials(credentials.clone());
                }

                let client = self
                    .timed("authenticate", builder.authenticate())
                    .await
                    .map_err(|e| TradingError::Credential(e.to_string()))?;

                info!("CLOB client authenticated");
                Ok(client)
            })
            .await
    }
}

#[async_trait]
impl Venue for ClobVenue {
    async fn authenticate(&self) -> Result<Authentication, TradingError> {
        let client = self.client().await?;
        if self.credentials.is_some() {
            return Ok(Authentication::Cached);
        }

        let derived = client.credentials();
        Ok(Authentication::Derived(ApiCredentials {
            key: derived.key().to_string(),
            secret: derived.secret().expose_secret().to_string(),
            passphrase: derived.passphrase().expose_secret().to_string(),
        }))
    }

    #[instrument(skip(self, order), fields(token = %order.token_id))]
    async fn place_order(&self, order: &OrderParams) -> Result<VenueResponse, TradingError> {
        order.validate()?;

        let token_id = U256::from_str(&order.token_id).map_err(|e| {
            TradingError::InvalidParams(format!("invalid token id {}: {}", order.token_id, e))
        })?;

        let client = self.client().await?;

        debug!(price = %order.price, size = %order.size, "Building limit order");

        // Building reads tick size and fee rate; nothing is posted yet.
        let build = client
            .limit_order()
            .token_id(token_id)
            .side(ClobSide::Buy)
            .price(order.price)
            .size(order.size)
            .build();
        let unsigned = self
            .timed("build_order", build)
            .await
            .map_err(|e| TradingError::VenueRejected(format!("order build failed: {}", e)))?;

        let signed = client
            .sign(&self.signer, unsigned)
            .await
            .map_err(|e| TradingError::Signing(e.to_string()))?;

        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, client.post_order(signed)).await;
        metrics::record_order_submit_latency(start);

        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return post_error(&e),
            Err(_) => return Err(self.timeout_error("post_order")),
        };

        let status = format!("{:?}", response.status)
            .trim_matches('"')
            .to_lowercase();

        info!(
            order_id = %response.order_id,
            success = response.success,
            status = %status,
            "Order submitted"
        );

        Ok(VenueResponse {
            success: response.success,
            order_id: response.order_id.clone(),
            status,
            error_msg: response.error_msg.clone().filter(|m| !m.is_empty()),
        })
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, order_id: &str) -> Result<bool, TradingError> {
        let client = self.client().await?;
        let response = self
            .timed("cancel_order", client.cancel_order(order_id))
            .await?;

        if let Some(reason) = response.not_canceled.get(order_id) {
            warn!(order_id, reason = %reason, "Order not cancelled");
            return Ok(false);
        }

        info!(order_id, "Order cancelled");
        Ok(true)
    }
}

/// SDK credentials from the configured triple; `None` when the key is not a UUID.
fn sdk_credentials(credentials: &ApiCredentials) -> Option<Credentials> {
    match ApiKey::parse_str(credentials.key.trim()) {
        Ok(key) => Some(Credentials::new(
            key,
            credentials.secret.clone(),
            credentials.passphrase.clone(),
        )),
        Err(e) => {
            warn!(error = %e, "Configured API key is not a UUID; credentials will be derived");
            None
        }
    }
}

/// Classify a failed order post.
///
/// A 4xx answer is a definite rejection and carries the venue's message.
/// Transport failures, 5xx and 404 leave the outcome unknown; the SDK also
/// reports 404 for an empty 2xx body.
fn post_error(err: &SdkError) -> Result<VenueResponse, TradingError> {
    match err.downcast_ref::<Status>() {
        Some(status)
            if status.status_code.is_client_error()
                && status.status_code != StatusCode::NOT_FOUND =>
        {
            let message = rejection_message(&status.message);
            warn!(status = %status.status_code, error = %message, "Venue rejected order");
            Ok(VenueResponse::rejected(message))
        }
        _ => Err(TradingError::Network {
            context: "post_order".to_string(),
            reason: err.to_string(),
        }),
    }
}

/// `errorMsg` or `error` from a rejection body, else the trimmed body.
fn rejection_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let field = parsed.as_ref().and_then(|value| {
        ["errorMsg", "error"]
            .iter()
            .find_map(|name| value.get(*name).and_then(|v| v.as_str()))
            .filter(|msg| !msg.is_empty())
    });

    match field {
        Some(message) => message.to_string(),
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => "order rejected by venue".to_string(),
    }
}
