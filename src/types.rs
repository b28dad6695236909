//! Shared types for the signing pipeline
//!
//! Data structures that cross module boundaries are defined here
//! for consistent serialization and FFI compatibility.

use crate::wallet::OwnedAddresses;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Network Types
// =============================================================================

const MAINNET_GENESIS_HASH: [u8; 32] = [
    0xc0, 0x61, 0xc4, 0xd8, 0xfc, 0x1d, 0xbd, 0xde, 0xd2, 0xd7, 0x60, 0x4b, 0xe4, 0x56, 0x8e, 0x3f,
    0x6d, 0x04, 0x19, 0x87, 0xac, 0x37, 0xbd, 0xe4, 0xb6, 0x20, 0xb5, 0xab, 0x39, 0x24, 0x8a, 0xdf,
];

const TESTNET_GENESIS_HASH: [u8; 32] = [
    0x48, 0x63, 0xb5, 0x18, 0xa4, 0xb3, 0xc8, 0x4e, 0xc8, 0x10, 0xf2, 0x2d, 0x4f, 0x10, 0x81, 0xcb,
    0x0f, 0x71, 0xf0, 0x59, 0xa7, 0xac, 0x20, 0xde, 0xc6, 0x2f, 0x7f, 0x70, 0xe5, 0x09, 0x3a, 0x22,
];

const BETANET_GENESIS_HASH: [u8; 32] = [
    0x98, 0x58, 0x1a, 0xcc, 0x5f, 0xb6, 0xb9, 0x14, 0xb5, 0xb4, 0xc8, 0x8b, 0xf5, 0xdb, 0x23, 0xd3,
    0x58, 0x49, 0x1b, 0x24, 0x84, 0x98, 0xf3, 0x76, 0xf0, 0x1f, 0xd3, 0x8e, 0x3b, 0xe9, 0x55, 0x6d,
];

/// Ledger network a transaction is valid on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Network {
    pub genesis_id: String,
    #[serde(with = "crate::serde_bytes::base64_32")]
    pub genesis_hash: [u8; 32],
}

impl Network {
    pub fn new(genesis_id: impl Into<String>, genesis_hash: [u8; 32]) -> Self {
        Self {
            genesis_id: genesis_id.into(),
            genesis_hash,
        }
    }

    pub fn mainnet() -> Self {
        Self::new("mainnet-v1.0", MAINNET_GENESIS_HASH)
    }

    pub fn testnet() -> Self {
        Self::new("testnet-v1.0", TESTNET_GENESIS_HASH)
    }

    pub fn betanet() -> Self {
        Self::new("betanet-v1.0", BETANET_GENESIS_HASH)
    }

    /// Resolve a well-known network by short name or genesis ID
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "mainnet" | "mainnet-v1.0" => Some(Self::mainnet()),
            "testnet" | "testnet-v1.0" => Some(Self::testnet()),
            "betanet" | "betanet-v1.0" => Some(Self::betanet()),
            _ => None,
        }
    }

    /// Whether a transaction's genesis fields bind it to this network.
    /// The genesis hash is mandatory; the genesis ID is checked when present.
    pub fn matches(&self, genesis_id: Option<&str>, genesis_hash: Option<&[u8; 32]>) -> bool {
        let hash_matches = genesis_hash.is_some_and(|gh| *gh == self.genesis_hash);
        let id_matches = genesis_id.map_or(true, |gen| gen == self.genesis_id);
        hash_matches && id_matches
    }

    /// Best-effort name for a transaction's genesis fields (for error messages)
    pub fn describe(genesis_id: Option<&str>, genesis_hash: Option<&[u8; 32]>) -> String {
        if let Some(gen) = genesis_id {
            return gen.to_string();
        }
        match genesis_hash {
            Some(gh) => [Self::mainnet(), Self::testnet(), Self::betanet()]
                .into_iter()
                .find(|n| n.genesis_hash == *gh)
                .map(|n| n.genesis_id)
                .unwrap_or_else(|| format!("unknown ({})", hex::encode(&gh[..8]))),
            None => "unspecified".to_string(),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.genesis_id)
    }
}

// =============================================================================
// Session Types
// =============================================================================

/// Everything a call site supplies about the session besides the proposals
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Network the session is connected to
    pub network: Network,
    /// Addresses the wallet controls and how each is backed
    pub wallet: OwnedAddresses,
}

impl SessionContext {
    pub fn new(network: Network, wallet: OwnedAddresses) -> Self {
        Self { network, wallet }
    }
}

// =============================================================================
// API Response Types
// =============================================================================

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<crate::error::ErrorReport>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: crate::error::ErrorReport) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":{"code":"internal","message":"Serialization failed"}}"#.to_string()
        })
    }
}
