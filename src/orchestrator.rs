//! Trade orchestration.
//!
//! [`TradeOrchestrator`] is the composition root: it resolves the market,
//! checks both balances and hands the order to the [`OrderSubmitter`],
//! stopping at the first failed precondition. Nothing is retried.

use std::sync::Arc;

use alloy::primitives::Address;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::chain::{Balance, BalanceSource, ChainBalanceChecker, Network};
use crate::config::{ConfigStore, Settings};
use crate::error::{MarketError, Poly402Error, Result, TradingError};
use crate::market::{GammaClient, Market, MarketSource};
use crate::payment::{check_payment_capacity, PaymentReadiness};
use crate::signing;
use crate::trading::{ClobVenue, OrderSubmitter, SubmissionLedger, TradeResult, Venue};

/// Wallet addresses derived from the configured keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wallets {
    /// Payment-network wallet.
    pub base: Address,
    /// Settlement-network wallet.
    pub polygon: Address,
}

impl Wallets {
    /// Derive both addresses from settings.
    pub fn from_settings(settings: &Settings) -> std::result::Result<Self, TradingError> {
        Ok(Self {
            base: signing::address_from_private_key(&settings.base.private_key)?,
            polygon: signing::address_from_private_key(&settings.polygon.private_key)?,
        })
    }

    /// Address used on `network`.
    pub fn address(&self, network: Network) -> Address {
        match network {
            Network::Base => self.base,
            Network::Polygon => self.polygon,
        }
    }
}

/// One trade to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRequest {
    /// Market URL or slug.
    pub market_ref: String,
    /// Outcome position within the market.
    pub outcome_index: usize,
    /// USDC to spend.
    pub amount: Decimal,
    /// Optional price cap.
    pub max_price: Option<Decimal>,
    /// Key identifying this attempt across retries.
    pub idempotency_key: Uuid,
}

impl TradeRequest {
    /// Request with a freshly generated idempotency key.
    pub fn new(market_ref: impl Into<String>, outcome_index: usize, amount: Decimal) -> Self {
        Self {
            market_ref: market_ref.into(),
            outcome_index,
            amount,
            max_price: None,
            idempotency_key: Uuid::new_v4(),
        }
    }

    /// Cap the price paid per share.
    pub fn with_max_price(mut self, max_price: Option<Decimal>) -> Self {
        self.max_price = max_price;
        self
    }

    /// Reuse a caller-supplied idempotency key.
    pub fn with_idempotency_key(mut self, key: Uuid) -> Self {
        self.idempotency_key = key;
        self
    }
}

/// Sequences market resolution, balance checks and order submission.
pub struct TradeOrchestrator {
    markets: Arc<dyn MarketSource>,
    balances: Arc<dyn BalanceSource>,
    submitter: OrderSubmitter,
    wallets: Wallets,
    max_payment: Decimal,
    facilitator: String,
}

impl TradeOrchestrator {
    /// Wire the production market, balance and venue clients.
    pub fn new(settings: &Settings) -> Result<Self> {
        let markets = Arc::new(GammaClient::new(settings)?);
        let balances = Arc::new(ChainBalanceChecker::new(settings)?);
        let venue = Arc::new(ClobVenue::new(settings)?);
        Self::with_components(settings, markets, balances, venue)
    }

    /// Wire arbitrary implementations of each seam.
    pub fn with_components(
        settings: &Settings,
        markets: Arc<dyn MarketSource>,
        balances: Arc<dyn BalanceSource>,
        venue: Arc<dyn Venue>,
    ) -> Result<Self> {
        let wallets = Wallets::from_settings(settings)?;
        Ok(Self {
            markets,
            balances,
            submitter: OrderSubmitter::new(venue, settings.policy),
            wallets,
            max_payment: settings.max_payment,
            facilitator: settings.facilitator.clone(),
        })
    }

    /// Track idempotency keys in `ledger` instead of process memory.
    pub fn with_ledger(mut self, ledger: SubmissionLedger) -> Self {
        self.submitter = self.submitter.with_ledger(ledger);
        self
    }

    /// Save newly derived API credentials to `store`.
    pub fn with_credential_store(mut self, store: ConfigStore) -> Self {
        self.submitter = self.submitter.with_credential_store(store);
        self
    }

    /// Wallet addresses in use.
    pub fn wallets(&self) -> Wallets {
        self.wallets
    }

    /// Resolve and fetch a market.
    pub async fn get_market(&self, reference: &str) -> std::result::Result<Market, MarketError> {
        self.markets.fetch_market(reference).await
    }

    /// Execute one trade.
    ///
    /// Precondition failures are returned as errors. Once the order step is
    /// reached the outcome is always a [`TradeResult`], failed or not.
    #[instrument(skip(self, request), fields(market = %request.market_ref, outcome = request.outcome_index, amount = %request.amount, key = %request.idempotency_key))]
    pub async fn execute_trade(&self, request: &TradeRequest) -> Result<TradeResult> {
        if request.amount <= Decimal::ZERO {
            return Err(TradingError::InvalidParams(format!(
                "amount must be positive, got {}",
                request.amount
            ))
            .into());
        }

        let market = self.markets.fetch_market(&request.market_ref).await?;
        if !market.active {
            return Err(TradingError::MarketInactive {
                slug: market.slug,
                title: market.title,
            }
            .into());
        }

        let outcome = market
            .outcome(request.outcome_index)
            .ok_or(TradingError::InvalidOutcome {
                index: request.outcome_index,
                count: market.outcomes.len(),
            })?;

        let available = self
            .balances
            .usdc_balance(Network::Polygon, self.wallets.polygon)
            .await;
        if available < request.amount {
            return Err(TradingError::InsufficientFunds {
                network: Network::Polygon.display_name().to_string(),
                required: request.amount,
                available,
            }
            .into());
        }

        // Threshold only; a short balance does not stop the trade.
        let readiness = self.payment_readiness().await;
        if !readiness.is_sufficient() {
            warn!(
                shortfall = %readiness.shortfall(),
                "Proceeding without payment-network capacity"
            );
        }

        info!(
            market = %market.slug,
            outcome = %outcome.name,
            price = %outcome.price,
            "Submitting trade"
        );

        let result = self
            .submitter
            .submit(
                outcome,
                request.amount,
                request.max_price,
                request.idempotency_key,
            )
            .await
            .with_market_slug(market.slug.clone());

        Ok(result)
    }

    /// Payment-network balance against the configured ceiling.
    pub async fn payment_readiness(&self) -> PaymentReadiness {
        check_payment_capacity(
            self.balances.as_ref(),
            self.wallets.base,
            self.max_payment,
            &self.facilitator,
        )
        .await
    }

    /// USDC and native balances on one network, or both when `None`.
    pub async fn balances(&self, network: Option<Network>) -> Vec<Balance> {
        let networks: Vec<Network> = match network {
            Some(network) => vec![network],
            None => Network::ALL.to_vec(),
        };

        let mut balances = Vec::with_capacity(networks.len());
        for network in networks {
            balances.push(
                self.balances
                    .balance(network, self.wallets.address(network), true)
                    .await,
            );
        }
        balances
    }

    /// Markets matching `query`.
    pub async fn search_markets(
        &self,
        query: &str,
        limit: usize,
    ) -> std::result::Result<Vec<Market>, MarketError> {
        let mut markets = self.markets.search_markets(query, limit).await?;
        markets.truncate(limit);
        Ok(markets)
    }

    /// Open markets, newest first.
    pub async fn active_markets(
        &self,
        limit: usize,
        offset: usize,
    ) -> std::result::Result<Vec<Market>, MarketError> {
        let mut markets = self.markets.active_markets(limit, offset).await?;
        markets.truncate(limit);
        Ok(markets)
    }

    /// Cancel an open order; `true` when the venue confirmed it.
    pub async fn cancel_order(&self, order_id: &str) -> Result<bool> {
        if order_id.trim().is_empty() {
            return Err(Poly402Error::Trading(TradingError::InvalidParams(
                "order id is required".to_string(),
            )));
        }
        Ok(self.submitter.cancel(order_id.trim()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockBalanceSource;
    use crate::config::{ConfigFile, EnvOverrides};
    use crate::market::{MockMarketBuilder, MockMarketSource};
    use crate::trading::{MockVenue, TradeStatus};
    use rust_decimal_macros::dec;

    const BASE_KEY: &str = "0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
    const POLYGON_KEY: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

    fn settings() -> Settings {
        let mut file = ConfigFile::default();
        file.networks.base.wallet_private_key = BASE_KEY.to_string();
        file.networks.polygon.wallet_private_key = POLYGON_KEY.to_string();
        Settings::resolve(file, &EnvOverrides::default())
    }

    fn orchestrator(
        balances: MockBalanceSource,
        venue: &MockVenue,
    ) -> TradeOrchestrator {
        let markets = MockMarketSource::new()
            .with_market(
                MockMarketBuilder::new("three-way")
                    .outcome("A", dec!(0.2))
                    .outcome("B", dec!(0.3))
                    .outcome("C", dec!(0.5))
                    .build(),
            )
            .with_market(
                MockMarketBuilder::new("closed-market")
                    .outcome("Yes", dec!(1))
                    .closed()
                    .build(),
            );
        TradeOrchestrator::with_components(
            &settings(),
            Arc::new(markets),
            Arc::new(balances),
            Arc::new(venue.clone()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn inactive_market_is_rejected() {
        let venue = MockVenue::new();
        let orch = orchestrator(MockBalanceSource::new(), &venue);
        let err = orch
            .execute_trade(&TradeRequest::new("closed-market", 0, dec!(5)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Poly402Error::Trading(TradingError::MarketInactive { .. })
        ));
        assert_eq!(venue.auth_count(), 0);
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected_up_front() {
        let venue = MockVenue::new();
        let orch = orchestrator(MockBalanceSource::new(), &venue);
        let err = orch
            .execute_trade(&TradeRequest::new("three-way", 0, Decimal::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Poly402Error::Trading(TradingError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn short_payment_balance_only_warns() {
        let balances = MockBalanceSource::new()
            .with_usdc(Network::Polygon, dec!(50))
            .with_usdc(Network::Base, dec!(1));
        let venue = MockVenue::new();
        let orch = orchestrator(balances, &venue);

        let result = orch
            .execute_trade(&TradeRequest::new("three-way", 2, dec!(10)))
            .await
            .unwrap();
        assert_eq!(result.status, TradeStatus::Completed);
        assert_eq!(result.market_slug, "three-way");
        assert_eq!(result.shares_purchased, dec!(20));
    }

    #[tokio::test]
    async fn balances_cover_requested_networks() {
        let balances = MockBalanceSource::new()
            .with_usdc(Network::Base, dec!(3))
            .with_native(Network::Base, dec!(0.01));
        let orch = orchestrator(balances, &MockVenue::new());

        let both = orch.balances(None).await;
        assert_eq!(both.len(), 2);
        assert_eq!(both[0].network, Network::Base);
        assert_eq!(both[0].usdc, dec!(3));
        assert_eq!(both[0].native, Some(dec!(0.01)));
        assert_eq!(both[1].network, Network::Polygon);
        assert_eq!(both[1].address, orch.wallets().polygon.to_checksum(None));

        let one = orch.balances(Some(Network::Polygon)).await;
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn listing_respects_limit() {
        let orch = orchestrator(MockBalanceSource::new(), &MockVenue::new());
        assert_eq!(orch.active_markets(1, 0).await.unwrap().len(), 1);
        assert_eq!(orch.search_markets("three", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancel_requires_an_order_id() {
        let venue = MockVenue::new();
        let orch = orchestrator(MockBalanceSource::new(), &venue);
        assert!(orch.cancel_order("  ").await.is_err());
        assert!(orch.cancel_order("0xabc").await.unwrap());
        assert_eq!(venue.cancelled(), vec!["0xabc".to_string()]);
    }

    #[test]
    fn wallets_differ_per_network() {
        let wallets = Wallets::from_settings(&settings()).unwrap();
        assert_ne!(wallets.base, wallets.polygon);
        assert_eq!(wallets.address(Network::Polygon), wallets.polygon);
    }
}
