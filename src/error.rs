//! Unified error types for poly402.

use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for poly402.
#[derive(Error, Debug)]
pub enum Poly402Error {
    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Market resolution error.
    #[error("market error: {0}")]
    Market(#[from] MarketError),

    /// Trading/order error.
    #[error("trading error: {0}")]
    Trading(#[from] TradingError),
}

/// Configuration store errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration file at the resolved path.
    #[error("configuration file not found at {}. Run 'poly402 init' to create it.", path.display())]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// A required field is empty or absent.
    #[error("missing required field: {field}")]
    MissingField {
        /// Dotted field name.
        field: &'static str,
    },

    /// A field holds an unusable value.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Environment override parsing failed.
    #[error("environment error: {0}")]
    Env(#[from] envy::Error),

    /// File system error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Market resolution and fetch errors.
#[derive(Error, Debug)]
pub enum MarketError {
    /// No canonical identifier could be extracted from the reference.
    #[error("market not found: {reference}")]
    NotFound {
        /// The reference that failed to resolve.
        reference: String,
    },

    /// Transport failure or non-2xx response from the market-data service.
    #[error("failed to fetch {context}: {reason}")]
    Network {
        /// What was being fetched.
        context: String,
        /// Underlying cause.
        reason: String,
    },

    /// Structurally invalid response.
    #[error("failed to parse market data: {0}")]
    Parse(String),
}

/// Trading and order execution errors.
#[derive(Error, Debug)]
pub enum TradingError {
    /// The resolved market is closed.
    #[error("market '{title}' ({slug}) is not active")]
    MarketInactive {
        /// Market slug.
        slug: String,
        /// Market title.
        title: String,
    },

    /// Outcome index out of range.
    #[error("invalid outcome index {index}. Market has {count} outcomes.")]
    InvalidOutcome {
        /// Requested index.
        index: usize,
        /// Number of outcomes in the market.
        count: usize,
    },

    /// Settlement-network balance too low for the order.
    #[error("insufficient USDC balance on {network}. Required: {required}, Available: {available}")]
    InsufficientFunds {
        /// Network that was checked.
        network: String,
        /// Amount required.
        required: Decimal,
        /// Amount available.
        available: Decimal,
    },

    /// The venue reported a failure.
    #[error("order rejected by venue: {0}")]
    VenueRejected(String),

    /// API credential creation or derivation failed.
    #[error("failed to setup API credentials: {0}")]
    Credential(String),

    /// Transport failure or timeout talking to the venue.
    #[error("venue request {context} failed: {reason}")]
    Network {
        /// Which venue call failed.
        context: String,
        /// Underlying cause.
        reason: String,
    },

    /// Invalid order parameters.
    #[error("invalid order parameters: {0}")]
    InvalidParams(String),

    /// Key handling or order signing error.
    #[error("signing error: {0}")]
    Signing(String),

    /// The submission ledger could not be read or written.
    #[error("submission ledger error: {0}")]
    Ledger(String),

    /// An order with the same idempotency key was already sent or is in flight.
    #[error("duplicate submission for idempotency key {key}: {reason}")]
    DuplicateSubmission {
        /// The reused key.
        key: uuid::Uuid,
        /// State of the earlier attempt.
        reason: String,
    },
}

impl TradingError {
    /// Whether the order may have reached the venue before this error surfaced.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, TradingError::Network { .. })
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Poly402Error>;
