//! Algorand Addresses
//!
//! An address is a 32-byte ed25519 public key. Its text form is Base32
//! (no padding) of `public_key || checksum`, where the checksum is the last
//! four bytes of SHA-512/256 over the public key.

use data_encoding::BASE32_NOPAD;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512_256};
use std::fmt;
use std::str::FromStr;

/// Length of the text form of an address
pub const ADDRESS_TEXT_LEN: usize = 58;

const CHECKSUM_LEN: usize = 4;

/// Address parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Invalid address length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid address encoding: {0}")]
    InvalidEncoding(String),

    #[error("Address checksum mismatch")]
    ChecksumMismatch,
}

/// Algorand account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// The all-zero address
    pub const ZERO: Address = Address([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build an address from a raw public key slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let key: [u8; 32] = bytes.try_into().map_err(|_| AddressError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Encode to the 58-character Base32 text form
    pub fn encode(&self) -> String {
        let mut address_bytes = Vec::with_capacity(32 + CHECKSUM_LEN);
        address_bytes.extend_from_slice(&self.0);
        address_bytes.extend_from_slice(&checksum(&self.0));
        BASE32_NOPAD.encode(&address_bytes)
    }

    /// Verify an ed25519 signature made by this address over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        key.verify(message, &Signature::from_bytes(signature)).is_ok()
    }
}

fn checksum(public_key: &[u8; 32]) -> [u8; CHECKSUM_LEN] {
    let hash = Sha512_256::digest(public_key);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash[32 - CHECKSUM_LEN..]);
    out
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != ADDRESS_TEXT_LEN {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_TEXT_LEN,
                actual: trimmed.len(),
            });
        }

        let decoded = BASE32_NOPAD
            .decode(trimmed.as_bytes())
            .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;
        if decoded.len() != 32 + CHECKSUM_LEN {
            return Err(AddressError::InvalidEncoding(format!(
                "decoded {} bytes",
                decoded.len()
            )));
        }

        let address = Self::from_slice(&decoded[..32])?;
        if checksum(&address.0)[..] != decoded[32..] {
            return Err(AddressError::ChecksumMismatch);
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.encode())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_ADDRESS: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ";

    #[test]
    fn test_zero_address_encoding() {
        assert_eq!(Address::ZERO.encode(), ZERO_ADDRESS);
        assert_eq!(ZERO_ADDRESS.parse::<Address>().unwrap(), Address::ZERO);
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn test_roundtrip_text_form() {
        let address = Address::from_bytes([7u8; 32]);
        let text = address.to_string();
        assert_eq!(text.len(), ADDRESS_TEXT_LEN);
        assert_eq!(text.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut text = Address::from_bytes([7u8; 32]).to_string();
        // Flip a character inside the public key portion
        let replacement = if text.starts_with('A') { "B" } else { "A" };
        text.replace_range(0..1, replacement);
        assert!(matches!(
            text.parse::<Address>(),
            Err(AddressError::ChecksumMismatch) | Err(AddressError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_invalid_length() {
        assert!(matches!(
            "ABC".parse::<Address>(),
            Err(AddressError::InvalidLength { actual: 3, .. })
        ));
        assert!(matches!(
            Address::from_slice(&[1u8; 31]),
            Err(AddressError::InvalidLength { expected: 32, actual: 31 })
        ));
    }

    #[test]
    fn test_serde_as_text() {
        let address = Address::from_bytes([9u8; 32]);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", address));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
