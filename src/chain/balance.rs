//! USDC and native balance queries.
//!
//! Balance reads fail open: any transport or contract-call error is logged and
//! reported as a zero USDC balance (or a missing native balance) instead of an
//! error, so the read path stays available when an RPC endpoint is down.

use std::str::FromStr;
use std::time::{Duration, Instant};

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::error::ConfigError;
use crate::metrics;

/// Number of decimals for the USDC token.
pub const USDC_DECIMALS: u32 = 6;

/// Number of decimals for ETH and MATIC.
pub const NATIVE_DECIMALS: u32 = 18;

/// Native USDC on Base mainnet.
const USDC_BASE: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

/// Bridged USDC (USDC.e) on Polygon mainnet, the collateral the CLOB settles in.
const USDC_POLYGON: &str = "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174";

// ERC-20 interface (balance only)
sol! {
    #[sol(rpc)]
    contract IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

/// Networks the client reads balances from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Network {
    /// Payment network.
    Base,
    /// Settlement network, where the CLOB executes.
    Polygon,
}

impl Network {
    /// Both networks, payment network first.
    pub const ALL: [Network; 2] = [Network::Base, Network::Polygon];

    /// Human-readable network name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Base => "Base",
            Network::Polygon => "Polygon",
        }
    }

    /// Symbol of the gas token.
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Network::Base => "ETH",
            Network::Polygon => "MATIC",
        }
    }

    /// Default USDC contract on this network.
    pub fn default_usdc_address(&self) -> &'static str {
        match self {
            Network::Base => USDC_BASE,
            Network::Polygon => USDC_POLYGON,
        }
    }
}

/// A wallet's holdings on one network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    /// Network queried.
    pub network: Network,
    /// Checksummed wallet address.
    pub address: String,
    /// USDC balance.
    pub usdc: Decimal,
    /// Gas-token balance, when requested and available.
    pub native: Option<Decimal>,
}

/// Source of on-chain balances.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// USDC balance of `address`; zero when the query fails.
    async fn usdc_balance(&self, network: Network, address: Address) -> Decimal;

    /// Native balance of `address`; `None` when the query fails.
    async fn native_balance(&self, network: Network, address: Address) -> Option<Decimal>;

    /// Full balance record for `address`.
    async fn balance(&self, network: Network, address: Address, include_native: bool) -> Balance {
        let usdc = self.usdc_balance(network, address).await;
        let native = if include_native {
            self.native_balance(network, address).await
        } else {
            None
        };

        Balance {
            network,
            address: address.to_checksum(None),
            usdc,
            native,
        }
    }
}

/// Convert integer base units into a decimal amount.
///
/// Returns `None` when the value does not fit a `Decimal`.
pub fn from_base_units(raw: U256, decimals: u32) -> Option<Decimal> {
    let raw: u128 = raw.try_into().ok()?;
    let raw = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(raw, decimals).ok()
}

/// One network's RPC endpoint and USDC contract.
#[derive(Debug, Clone)]
struct ChainEndpoint {
    rpc_url: url::Url,
    usdc: Address,
}

impl ChainEndpoint {
    fn new(network: Network, settings: &Settings) -> Result<Self, ConfigError> {
        let net = settings.network(network);
        let rpc_url = url::Url::parse(&net.rpc_url).map_err(|e| ConfigError::InvalidValue {
            field: "rpc_url",
            reason: format!("{}: {}", network, e),
        })?;
        let usdc_str = net
            .usdc_address
            .as_deref()
            .unwrap_or_else(|| network.default_usdc_address());
        let usdc = Address::from_str(usdc_str).map_err(|e| ConfigError::InvalidValue {
            field: "usdc_address",
            reason: format!("{}: {}", network, e),
        })?;
        Ok(Self { rpc_url, usdc })
    }
}

/// Balance checker backed by JSON-RPC read calls.
#[derive(Debug, Clone)]
pub struct ChainBalanceChecker {
    base: ChainEndpoint,
    polygon: ChainEndpoint,
    timeout: Duration,
}

impl ChainBalanceChecker {
    /// Create a checker for the endpoints in `settings`.
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            base: ChainEndpoint::new(Network::Base, settings)?,
            polygon: ChainEndpoint::new(Network::Polygon, settings)?,
            timeout: settings.http_timeout,
        })
    }

    fn endpoint(&self, network: Network) -> &ChainEndpoint {
        match network {
            Network::Base => &self.base,
            Network::Polygon => &self.polygon,
        }
    }

    async fn read_usdc(&self, network: Network, owner: Address) -> Result<U256, String> {
        let endpoint = self.endpoint(network);
        let provider = ProviderBuilder::new().connect_http(endpoint.rpc_url.clone());
        let usdc = IERC20::new(endpoint.usdc, &provider);

        tokio::time::timeout(self.timeout, usdc.balanceOf(owner).call())
            .await
            .map_err(|_| format!("timed out after {}ms", self.timeout.as_millis()))?
            .map_err(|e| e.to_string())
    }

    async fn read_native(&self, network: Network, owner: Address) -> Result<U256, String> {
        let endpoint = self.endpoint(network);
        let provider = ProviderBuilder::new().connect_http(endpoint.rpc_url.clone());

        tokio::time::timeout(self.timeout, provider.get_balance(owner))
            .await
            .map_err(|_| format!("timed out after {}ms", self.timeout.as_millis()))?
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl BalanceSource for ChainBalanceChecker {
    #[instrument(skip(self), fields(network = %network, address = %address))]
    async fn usdc_balance(&self, network: Network, address: Address) -> Decimal {
        let start = Instant::now();
        let result = self.read_usdc(network, address).await;
        metrics::record_balance_query_latency(start);

        let raw = match result {
            Ok(raw) => raw,
            Err(reason) => {
                warn!(error = %reason, "Could not fetch USDC balance, reporting zero");
                metrics::inc_balance_query_failures();
                return Decimal::ZERO;
            }
        };

        match from_base_units(raw, USDC_DECIMALS) {
            Some(balance) => {
                debug!(balance = %balance, "Retrieved USDC balance");
                balance
            }
            None => {
                warn!(raw = %raw, "USDC balance out of range, reporting zero");
                metrics::inc_balance_query_failures();
                Decimal::ZERO
            }
        }
    }

    #[instrument(skip(self), fields(network = %network, address = %address))]
    async fn native_balance(&self, network: Network, address: Address) -> Option<Decimal> {
        match self.read_native(network, address).await {
            Ok(wei) => {
                let balance = from_base_units(wei, NATIVE_DECIMALS);
                if balance.is_none() {
                    warn!(raw = %wei, "Native balance out of range");
                }
                balance
            }
            Err(reason) => {
                warn!(error = %reason, "Could not fetch native balance");
                metrics::inc_balance_query_failures();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFile, EnvOverrides};
    use rust_decimal_macros::dec;

    fn unreachable_settings() -> Settings {
        let mut file = ConfigFile::default();
        // Port 1 refuses connections immediately
        file.networks.base.rpc_url = "http://127.0.0.1:1".to_string();
        file.networks.polygon.rpc_url = "http://127.0.0.1:1".to_string();
        file.http_timeout_ms = 2_000;
        Settings::resolve(file, &EnvOverrides::default())
    }

    #[test]
    fn usdc_units_convert_with_six_decimals() {
        let raw = U256::from(12_345_678u64);
        assert_eq!(from_base_units(raw, USDC_DECIMALS), Some(dec!(12.345678)));
    }

    #[test]
    fn native_units_convert_with_eighteen_decimals() {
        let wei = U256::from(1_000_000_000_000_000_000u128);
        assert_eq!(from_base_units(wei, NATIVE_DECIMALS), Some(dec!(1)));
    }

    #[test]
    fn oversized_values_do_not_convert() {
        assert_eq!(from_base_units(U256::MAX, USDC_DECIMALS), None);
    }

    #[test]
    fn network_parsing_and_names() {
        use std::str::FromStr;
        assert_eq!(Network::from_str("base").unwrap(), Network::Base);
        assert_eq!(Network::from_str("Polygon").unwrap(), Network::Polygon);
        assert!(Network::from_str("solana").is_err());
        assert_eq!(Network::Base.to_string(), "base");
        assert_eq!(Network::Polygon.display_name(), "Polygon");
        assert_eq!(Network::Base.native_symbol(), "ETH");
    }

    #[test]
    fn checker_rejects_bad_usdc_override() {
        let mut file = ConfigFile::default();
        file.networks.polygon.usdc_address = Some("not-an-address".to_string());
        let settings = Settings::resolve(file, &EnvOverrides::default());
        assert!(ChainBalanceChecker::new(&settings).is_err());
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_zero_usdc() {
        let checker = ChainBalanceChecker::new(&unreachable_settings()).unwrap();
        let balance = checker.usdc_balance(Network::Polygon, Address::ZERO).await;
        assert_eq!(balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_no_native_balance() {
        let checker = ChainBalanceChecker::new(&unreachable_settings()).unwrap();
        let balance = checker.balance(Network::Base, Address::ZERO, true).await;
        assert_eq!(balance.network, Network::Base);
        assert_eq!(balance.usdc, Decimal::ZERO);
        assert_eq!(balance.native, None);
        assert_eq!(balance.address, Address::ZERO.to_checksum(None));
    }
}
