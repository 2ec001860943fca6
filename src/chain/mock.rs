//! Mock balance source for unit testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;

use super::balance::{BalanceSource, Network};

/// In-memory balances keyed by network.
#[derive(Debug, Clone, Default)]
pub struct MockBalanceSource {
    usdc: Arc<Mutex<HashMap<Network, Decimal>>>,
    native: Arc<Mutex<HashMap<Network, Decimal>>>,
    queries: Arc<Mutex<Vec<(Network, Address)>>>,
    query_count: Arc<AtomicUsize>,
}

impl MockBalanceSource {
    /// Create a source where every balance is zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the USDC balance for a network.
    pub fn with_usdc(self, network: Network, amount: Decimal) -> Self {
        self.usdc
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(network, amount);
        self
    }

    /// Set the native balance for a network.
    pub fn with_native(self, network: Network, amount: Decimal) -> Self {
        self.native
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(network, amount);
        self
    }

    /// Number of USDC queries served.
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// USDC queries served, in order.
    pub fn queries(&self) -> Vec<(Network, Address)> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl BalanceSource for MockBalanceSource {
    async fn usdc_balance(&self, network: Network, address: Address) -> Decimal {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((network, address));
        self.usdc
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&network)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    async fn native_balance(&self, network: Network, _address: Address) -> Option<Decimal> {
        self.native
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&network)
            .copied()
    }
}
