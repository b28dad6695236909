//! Software Signer
//!
//! Signs with key material held in the local vault. Synchronous; failures
//! are surfaced as-is and never retried.

use super::compiler::signed_envelope;
use crate::tx::DecodedTransaction;
use crate::wallet::{Address, KeyVault, VaultError};
use std::sync::Arc;

/// Software signing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignError {
    #[error("Key vault unavailable: {0}")]
    VaultUnavailable(String),

    #[error("No signing key for {0}")]
    KeyNotFound(Address),

    #[error("Vault produced a signature that does not verify for {0}")]
    KeyMismatch(Address),
}

impl From<VaultError> for SignError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::Unavailable(reason) => SignError::VaultUnavailable(reason),
            VaultError::KeyNotFound(address) => SignError::KeyNotFound(address),
        }
    }
}

#[derive(Clone)]
pub struct SoftwareSigner {
    vault: Arc<dyn KeyVault>,
    verify_signatures: bool,
}

impl SoftwareSigner {
    pub fn new(vault: Arc<dyn KeyVault>) -> Self {
        Self {
            vault,
            verify_signatures: true,
        }
    }

    pub fn with_verification(mut self, verify_signatures: bool) -> Self {
        self.verify_signatures = verify_signatures;
        self
    }

    /// Raw signature by `authority` over `message`
    pub fn sign_bytes(&self, authority: &Address, message: &[u8]) -> Result<[u8; 64], SignError> {
        let signature = self.vault.sign(authority, message)?;
        if self.verify_signatures && !authority.verify(message, &signature) {
            return Err(SignError::KeyMismatch(*authority));
        }
        Ok(signature)
    }

    /// Sign `tx` as `authority` and return the signed envelope
    pub fn sign(&self, authority: &Address, tx: &DecodedTransaction) -> Result<Vec<u8>, SignError> {
        let signature = self.sign_bytes(authority, &tx.signing_bytes())?;
        Ok(signed_envelope(tx, authority, &signature))
    }
}
