//! Polymarket trading client with USDC balance checks on Base and Polygon.
//!
//! A trade runs as one linear chain that stops at the first failure:
//!
//! ```text
//! resolve market ─▶ check Polygon USDC ─▶ check Base USDC ─▶ sign + post order
//!   (Gamma API)      (must cover amount)    (warning only)      (CLOB venue)
//! ```
//!
//! The Base check is a balance threshold against the configured payment
//! ceiling. No payment is made.
//!
//! # Modules
//!
//! - [`config`]: Configuration file store and environment overrides
//! - [`error`]: Unified error types
//! - [`market`]: Market resolution and the Gamma client
//! - [`chain`]: On-chain USDC and native balances
//! - [`signing`]: Key handling
//! - [`trading`]: Orders, results and idempotent submission
//! - [`payment`]: Payment-network balance threshold
//! - [`orchestrator`]: The trade flow
//! - [`metrics`]: Latency and outcome metrics

pub mod chain;
pub mod config;
pub mod error;
pub mod market;
pub mod metrics;
pub mod orchestrator;
pub mod payment;
pub mod signing;
pub mod trading;

pub use config::{ConfigStore, Settings};
pub use error::{Poly402Error, Result};
pub use orchestrator::{TradeOrchestrator, TradeRequest};
