//! Key handling for both wallets.
//!
//! This module provides utilities for:
//! - Converting config signature types to SDK types
//! - Creating signers from private keys
//! - Computing wallet addresses

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use polymarket_client_sdk::clob::types::SignatureType;

use crate::error::TradingError;

/// Convert a u8 signature type from config to SDK SignatureType.
///
/// Signature types:
/// - 0: EOA (Externally Owned Account) - standard wallet
/// - 1: Magic.link - proxy wallet
/// - 2: Browser wallet - Gnosis Safe proxy
pub fn signature_type_from_u8(sig_type: u8) -> SignatureType {
    match sig_type {
        1 => SignatureType::Proxy,
        2 => SignatureType::GnosisSafe,
        _ => SignatureType::Eoa,
    }
}

/// Human-readable label for a signature type.
pub fn signature_type_label(sig_type: u8) -> &'static str {
    match sig_type {
        0 => "EOA - Standard wallet",
        1 => "Magic.link - Proxy wallet",
        2 => "Browser wallet - Gnosis Safe",
        _ => "Unknown (treated as EOA)",
    }
}

/// Create a LocalSigner from a hex-encoded private key.
///
/// The private key can be with or without the "0x" prefix.
pub fn create_signer(private_key: &str) -> Result<PrivateKeySigner, TradingError> {
    let trimmed = private_key.trim();
    let key = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(key)
        .map_err(|e| TradingError::Signing(format!("Invalid private key hex: {}", e)))?;

    if bytes.len() != 32 {
        return Err(TradingError::Signing(format!(
            "Private key must be 32 bytes, got {}",
            bytes.len()
        )));
    }

    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&bytes);

    PrivateKeySigner::from_bytes(&key_bytes.into())
        .map_err(|e| TradingError::Signing(format!("Failed to create signer: {}", e)))
}

/// Create a signer bound to a chain ID.
pub fn create_chain_signer(
    private_key: &str,
    chain_id: u64,
) -> Result<PrivateKeySigner, TradingError> {
    Ok(create_signer(private_key)?.with_chain_id(Some(chain_id)))
}

/// Get the wallet address from a private key.
pub fn address_from_private_key(private_key: &str) -> Result<Address, TradingError> {
    Ok(create_signer(private_key)?.address())
}
