//! Key Vault
//!
//! The vault is the only component that touches private key material. The
//! pipeline only ever asks it to "sign these bytes for address X".
//!
//! `InMemoryVault` is an ed25519 vault used by tests and demos. Keys are
//! zeroized when dropped.

use super::address::Address;
use ed25519_dalek::{Signer, SigningKey};
use rand::{rngs::OsRng, RngCore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use zeroize::Zeroize;

/// Vault failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("Key vault unavailable: {0}")]
    Unavailable(String),

    #[error("No key for address {0}")]
    KeyNotFound(Address),
}

/// Signs bytes on behalf of an address without revealing key material
pub trait KeyVault: Send + Sync {
    fn sign(&self, address: &Address, message: &[u8]) -> Result<[u8; 64], VaultError>;
}

/// Ed25519 vault held in process memory
#[derive(Default)]
pub struct InMemoryVault {
    keys: RwLock<HashMap<Address, SigningKey>>,
    locked: AtomicBool,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import a 32-byte ed25519 secret and return its address
    pub fn import(&self, mut secret: [u8; 32]) -> Result<Address, VaultError> {
        let signing_key = SigningKey::from_bytes(&secret);
        secret.zeroize();

        let address = Address::from_bytes(signing_key.verifying_key().to_bytes());
        let mut keys = self
            .keys
            .write()
            .map_err(|_| VaultError::Unavailable("vault lock poisoned".to_string()))?;
        keys.insert(address, signing_key);
        Ok(address)
    }

    /// Generate a fresh account from the OS RNG
    pub fn generate(&self) -> Result<Address, VaultError> {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        self.import(secret)
    }

    /// Simulate the vault becoming unavailable (e.g. device locked)
    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.keys
            .read()
            .map(|keys| keys.contains_key(address))
            .unwrap_or(false)
    }
}

impl KeyVault for InMemoryVault {
    fn sign(&self, address: &Address, message: &[u8]) -> Result<[u8; 64], VaultError> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(VaultError::Unavailable("vault is locked".to_string()));
        }

        let keys = self
            .keys
            .read()
            .map_err(|_| VaultError::Unavailable("vault lock poisoned".to_string()))?;
        let key = keys.get(address).ok_or(VaultError::KeyNotFound(*address))?;
        Ok(key.sign(message).to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let vault = InMemoryVault::new();
        let address = vault.import([42u8; 32]).unwrap();

        let signature = vault.sign(&address, b"TXpayload").unwrap();
        assert!(address.verify(b"TXpayload", &signature));
        assert!(!address.verify(b"TXother", &signature));
    }

    #[test]
    fn test_missing_key() {
        let vault = InMemoryVault::new();
        let stranger = Address::from_bytes([1u8; 32]);
        assert_eq!(vault.sign(&stranger, b"x"), Err(VaultError::KeyNotFound(stranger)));
    }

    #[test]
    fn test_locked_vault() {
        let vault = InMemoryVault::new();
        let address = vault.generate().unwrap();
        vault.lock();
        assert!(matches!(vault.sign(&address, b"x"), Err(VaultError::Unavailable(_))));
        vault.unlock();
        assert!(vault.sign(&address, b"x").is_ok());
    }
}
