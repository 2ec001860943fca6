//! On-chain balance reads for the payment (Base) and settlement (Polygon) networks.
//!
//! This module handles:
//! - Network identifiers and per-network constants
//! - USDC and native balance queries over JSON-RPC
//! - Mock balance source for testing

pub mod balance;
pub mod mock;

pub use balance::{Balance, BalanceSource, ChainBalanceChecker, Network};
pub use mock::MockBalanceSource;
