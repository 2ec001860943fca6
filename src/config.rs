//! Configuration loaded from the persisted JSON store plus environment overrides.
//!
//! [`ConfigStore`] owns file I/O, [`ConfigFile`] mirrors the persisted JSON, and
//! [`Settings`] is the resolved, validated view handed to every component.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::Network;
use crate::error::ConfigError;
use crate::signing;

/// Directory under the home directory holding the config file.
const CONFIG_DIR: &str = ".poly402";

/// Config file name.
const CONFIG_FILE: &str = "config.json";

/// Submission ledger file name, next to the config file.
const LEDGER_FILE: &str = "submissions.json";

/// Environment variable prefix for key overrides.
const ENV_PREFIX: &str = "POLY402_";

/// Persisted configuration, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Per-network RPC and key material.
    pub networks: NetworksFile,

    /// Market-data and order-book endpoints.
    #[serde(alias = "polymarket")]
    pub market_data: MarketDataFile,

    /// Payment-protocol settings.
    #[serde(alias = "x402")]
    pub payment: PaymentFile,

    /// Signature type: 0=EOA, 1=Magic.link, 2=browser wallet (Gnosis Safe).
    #[serde(default = "default_signature_type")]
    pub signature_type: u8,

    /// Timeout for every network round trip, in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Fallback behavior for ambiguous data.
    #[serde(default)]
    pub policy: Policy,
}

/// The two networks the client talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworksFile {
    /// Payment network.
    pub base: NetworkFile,
    /// Settlement network.
    pub polygon: NetworkFile,
}

/// One network's persisted settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkFile {
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// EVM chain ID.
    pub chain_id: u64,
    /// Hex private key, with or without 0x.
    #[serde(default)]
    pub wallet_private_key: String,
    /// USDC contract override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usdc_address: Option<String>,
}

impl fmt::Debug for NetworkFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkFile")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("wallet_private_key", &redact(&self.wallet_private_key))
            .field("usdc_address", &self.usdc_address)
            .finish()
    }
}

/// Persisted market-data settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataFile {
    /// CLOB (order book) endpoint.
    pub clob_endpoint: String,
    /// Gamma (market data) endpoint.
    pub gamma_endpoint: String,
    /// API key, empty until derived.
    #[serde(default)]
    pub api_key: String,
    /// API secret, empty until derived.
    #[serde(default)]
    pub api_secret: String,
    /// API passphrase, empty until derived.
    #[serde(default)]
    pub api_passphrase: String,
}

impl fmt::Debug for MarketDataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketDataFile")
            .field("clob_endpoint", &self.clob_endpoint)
            .field("gamma_endpoint", &self.gamma_endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .field("api_passphrase", &redact(&self.api_passphrase))
            .finish()
    }
}

/// Persisted payment-protocol settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFile {
    /// Facilitator URL.
    pub facilitator: String,
    /// Payment ceiling in USDC.
    pub max_payment_amount: Decimal,
}

/// Strictness switches for fallbacks that would otherwise be silent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Fail on an unparsable close date instead of dropping it.
    #[serde(default)]
    pub strict_dates: bool,
    /// Fail on a missing outcome price instead of defaulting to 0.5.
    #[serde(default)]
    pub strict_prices: bool,
    /// Refuse orders whose effective price is not positive.
    #[serde(default)]
    pub strict_pricing: bool,
}

fn default_signature_type() -> u8 {
    2
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            networks: NetworksFile {
                base: NetworkFile {
                    rpc_url: "https://mainnet.base.org".to_string(),
                    chain_id: 8453,
                    wallet_private_key: String::new(),
                    usdc_address: None,
                },
                polygon: NetworkFile {
                    rpc_url: "https://polygon-rpc.com".to_string(),
                    chain_id: 137,
                    wallet_private_key: String::new(),
                    usdc_address: None,
                },
            },
            market_data: MarketDataFile {
                clob_endpoint: "https://clob.polymarket.com".to_string(),
                gamma_endpoint: "https://gamma-api.polymarket.com".to_string(),
                api_key: String::new(),
                api_secret: String::new(),
                api_passphrase: String::new(),
            },
            payment: PaymentFile {
                facilitator: "https://x402.coinbase.com".to_string(),
                max_payment_amount: Decimal::new(10000, 2), // 100.00
            },
            signature_type: default_signature_type(),
            http_timeout_ms: default_http_timeout_ms(),
            policy: Policy::default(),
        }
    }
}

/// Key overrides read from `POLY402_*` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvOverrides {
    /// `POLY402_BASE_KEY`.
    #[serde(default)]
    pub base_key: Option<String>,
    /// `POLY402_POLYGON_KEY`.
    #[serde(default)]
    pub polygon_key: Option<String>,
}

impl EnvOverrides {
    /// Read overrides from the environment, loading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Self>()?)
    }
}

/// API credential triple for the order book.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    /// API key.
    pub key: String,
    /// API secret.
    pub secret: String,
    /// API passphrase.
    pub passphrase: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("key", &redact(&self.key))
            .field("secret", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// Resolved settings for one network.
#[derive(Clone)]
pub struct NetworkSettings {
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// EVM chain ID.
    pub chain_id: u64,
    /// Hex private key.
    pub private_key: String,
    /// USDC contract override.
    pub usdc_address: Option<String>,
}

impl fmt::Debug for NetworkSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkSettings")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("private_key", &redact(&self.private_key))
            .field("usdc_address", &self.usdc_address)
            .finish()
    }
}

/// Immutable process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Payment network (Base).
    pub base: NetworkSettings,
    /// Settlement network (Polygon).
    pub polygon: NetworkSettings,
    /// CLOB endpoint.
    pub clob_endpoint: String,
    /// Gamma endpoint.
    pub gamma_endpoint: String,
    /// Credential triple, absent until first derived.
    pub credentials: Option<ApiCredentials>,
    /// Payment-protocol facilitator URL.
    pub facilitator: String,
    /// Payment ceiling in USDC.
    pub max_payment: Decimal,
    /// Signature type for the order book account.
    pub signature_type: u8,
    /// Timeout for every network round trip.
    pub http_timeout: Duration,
    /// Fallback strictness.
    pub policy: Policy,
}

impl Settings {
    /// Resolve persisted values and environment overrides into settings.
    ///
    /// Non-empty overrides take precedence over file values.
    pub fn resolve(file: ConfigFile, overrides: &EnvOverrides) -> Self {
        let pick = |over: &Option<String>, file_value: String| {
            over.as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or(file_value)
        };

        let ConfigFile {
            networks,
            market_data,
            payment,
            signature_type,
            http_timeout_ms,
            policy,
        } = file;

        let credentials = if market_data.api_key.is_empty()
            || market_data.api_secret.is_empty()
            || market_data.api_passphrase.is_empty()
        {
            None
        } else {
            Some(ApiCredentials {
                key: market_data.api_key,
                secret: market_data.api_secret,
                passphrase: market_data.api_passphrase,
            })
        };

        Self {
            base: NetworkSettings {
                private_key: pick(&overrides.base_key, networks.base.wallet_private_key),
                rpc_url: networks.base.rpc_url,
                chain_id: networks.base.chain_id,
                usdc_address: networks.base.usdc_address,
            },
            polygon: NetworkSettings {
                private_key: pick(&overrides.polygon_key, networks.polygon.wallet_private_key),
                rpc_url: networks.polygon.rpc_url,
                chain_id: networks.polygon.chain_id,
                usdc_address: networks.polygon.usdc_address,
            },
            clob_endpoint: market_data.clob_endpoint,
            gamma_endpoint: market_data.gamma_endpoint,
            credentials,
            facilitator: payment.facilitator,
            max_payment: payment.max_payment_amount,
            signature_type,
            http_timeout: Duration::from_millis(http_timeout_ms),
            policy,
        }
    }

    /// Settings for one network.
    pub fn network(&self, network: Network) -> &NetworkSettings {
        match network {
            Network::Base => &self.base,
            Network::Polygon => &self.polygon,
        }
    }

    /// Check that every required field is present and well-formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_network(&self.base, Network::Base)?;
        validate_network(&self.polygon, Network::Polygon)?;

        require_url(&self.clob_endpoint, "market_data.clob_endpoint")?;
        require_url(&self.gamma_endpoint, "market_data.gamma_endpoint")?;
        require_url(&self.facilitator, "payment.facilitator")?;

        if self.max_payment <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "payment.max_payment_amount",
                reason: format!("must be positive, got {}", self.max_payment),
            });
        }

        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "http_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

fn validate_network(network: &NetworkSettings, which: Network) -> Result<(), ConfigError> {
    let (rpc_field, key_field, usdc_field) = match which {
        Network::Base => (
            "networks.base.rpc_url",
            "networks.base.wallet_private_key",
            "networks.base.usdc_address",
        ),
        Network::Polygon => (
            "networks.polygon.rpc_url",
            "networks.polygon.wallet_private_key",
            "networks.polygon.usdc_address",
        ),
    };

    require_url(&network.rpc_url, rpc_field)?;

    if network.private_key.trim().is_empty() {
        return Err(ConfigError::MissingField { field: key_field });
    }
    signing::create_signer(&network.private_key).map_err(|e| ConfigError::InvalidValue {
        field: key_field,
        reason: e.to_string(),
    })?;

    if let Some(usdc) = &network.usdc_address {
        Address::from_str(usdc).map_err(|e| ConfigError::InvalidValue {
            field: usdc_field,
            reason: e.to_string(),
        })?;
    }

    Ok(())
}

fn require_url(value: &str, field: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    url::Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: e.to_string(),
    })?;
    Ok(())
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "[REDACTED]"
    }
}

/// Location and I/O for the persisted configuration.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at `path`, or at the default location when `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: path.unwrap_or_else(Self::default_path),
        }
    }

    /// `~/.poly402/config.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR)
            .join(CONFIG_FILE)
    }

    /// Resolved file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Submission ledger in the same directory as the config file.
    pub fn ledger_path(&self) -> PathBuf {
        self.path
            .parent()
            .map(|dir| dir.join(LEDGER_FILE))
            .unwrap_or_else(|| PathBuf::from(LEDGER_FILE))
    }

    /// Whether the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the persisted file.
    pub fn load_file(&self) -> Result<ConfigFile, ConfigError> {
        if !self.exists() {
            return Err(ConfigError::NotFound {
                path: self.path.clone(),
            });
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load, apply environment overrides and validate.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let overrides = EnvOverrides::from_env()?;
        self.load_with(&overrides)
    }

    /// Load with explicit overrides.
    pub fn load_with(&self, overrides: &EnvOverrides) -> Result<Settings, ConfigError> {
        let file = self.load_file()?;
        let settings = Settings::resolve(file, overrides);
        settings.validate()?;
        debug!(path = %self.path.display(), "Configuration loaded");
        Ok(settings)
    }

    /// Write `file`, creating parent directories.
    pub fn save(&self, file: &ConfigFile) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(file)?;
        fs::write(&self.path, json)?;
        restrict_permissions(&self.path)?;
        debug!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }

    /// Write the default configuration.
    pub fn create_default(&self) -> Result<PathBuf, ConfigError> {
        self.save(&ConfigFile::default())?;
        Ok(self.path.clone())
    }

    /// Write the default configuration with both wallet keys filled in.
    pub fn init_with_keys(&self, base_key: &str, polygon_key: &str) -> Result<PathBuf, ConfigError> {
        let mut file = ConfigFile::default();
        file.networks.base.wallet_private_key = base_key.trim().to_string();
        file.networks.polygon.wallet_private_key = polygon_key.trim().to_string();
        self.save(&file)?;
        Ok(self.path.clone())
    }

    /// Replace the persisted API credential triple.
    pub fn update_credentials(
        &self,
        api_key: &str,
        api_secret: &str,
        api_passphrase: &str,
    ) -> Result<(), ConfigError> {
        let mut file = self.load_file()?;
        file.market_data.api_key = api_key.to_string();
        file.market_data.api_secret = api_secret.to_string();
        file.market_data.api_passphrase = api_passphrase.to_string();
        self.save(&file)
    }
}

#[cfg(unix)]
pub(crate) fn restrict_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn restrict_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
