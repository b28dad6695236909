//! Payload Compiler
//!
//! Compiles collected signatures back into broadcast-ready signed
//! transactions, in the original proposal order.

use super::hardware::HardwareSignError;
use super::router::{RoutedTransaction, SignerAssignment};
use super::software::SignError;
use crate::security::PolicyWarning;
use crate::tx::{codec, DecodedTransaction};
use crate::wallet::Address;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use std::collections::BTreeMap;

/// Session-level signing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("Group {group} cannot be fully signed: transaction {index} needs a signer this wallet does not have")]
    IncompleteGroup { group: String, index: usize },

    #[error("Signing transaction {index} failed: {source}")]
    Software {
        index: usize,
        #[source]
        source: SignError,
    },

    #[error("Hardware signing of transaction {index} failed: {source}")]
    Hardware {
        index: usize,
        #[source]
        source: HardwareSignError,
    },

    #[error("Signing was cancelled")]
    Cancelled,

    #[error("No signature was produced for transaction {index}")]
    MissingSignature { index: usize },

    #[error("Internal signing error: {0}")]
    Internal(String),
}

impl SigningError {
    pub fn index(&self) -> Option<usize> {
        match self {
            SigningError::IncompleteGroup { index, .. }
            | SigningError::Software { index, .. }
            | SigningError::Hardware { index, .. }
            | SigningError::MissingSignature { index } => Some(*index),
            SigningError::Cancelled | SigningError::Internal(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SigningError::Hardware { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Where a signature in the payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureOrigin {
    Software,
    Hardware,
    Presigned,
}

/// One broadcast-ready signed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedTransaction {
    pub index: usize,
    pub tx_id: String,
    #[serde(with = "crate::serde_bytes::base64_vec")]
    pub bytes: Vec<u8>,
    pub origin: SignatureOrigin,
}

/// Final result of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedPayload {
    /// In original proposal order
    pub transactions: Vec<SignedTransaction>,
    /// Dangerous fields the user accepted
    pub warnings: Vec<PolicyWarning>,
}

impl SignedPayload {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// All signed transactions as one submission blob
    pub fn concatenated(&self) -> Vec<u8> {
        self.transactions
            .iter()
            .flat_map(|t| t.bytes.iter().copied())
            .collect()
    }

    /// Per-transaction base64, as WalletConnect returns signed transactions
    pub fn to_base64(&self) -> Vec<String> {
        self.transactions.iter().map(|t| STANDARD.encode(&t.bytes)).collect()
    }
}

/// Signed envelope for `tx`. `sgnr` is included only when the authority
/// is not the sender.
pub fn signed_envelope(tx: &DecodedTransaction, authority: &Address, signature: &[u8; 64]) -> Vec<u8> {
    let sgnr = (*authority != tx.sender).then_some(authority);
    codec::encode_signed(tx.txn(), signature, sgnr)
}

/// Merge routed transactions and their signatures into the final payload.
///
/// Every transaction must end up with bytes: pre-signed ones pass through,
/// wallet-signed ones need an entry in `signatures`. Signer failures stop
/// the session before compilation, so a gap here fails the whole payload.
pub fn compile_payload(
    decoded: &[DecodedTransaction],
    routed: &[RoutedTransaction],
    mut signatures: BTreeMap<usize, Vec<u8>>,
    warnings: Vec<PolicyWarning>,
) -> Result<SignedPayload, SigningError> {
    let mut by_index: BTreeMap<usize, &RoutedTransaction> = BTreeMap::new();
    for route in routed {
        by_index.insert(route.index, route);
    }

    let mut transactions = Vec::with_capacity(decoded.len());
    for tx in decoded {
        let route = by_index
            .get(&tx.index)
            .ok_or(SigningError::MissingSignature { index: tx.index })?;

        let (bytes, origin) = match &route.assignment {
            SignerAssignment::AlreadySigned(bytes) => (bytes.clone(), SignatureOrigin::Presigned),
            SignerAssignment::NotOurs => {
                return Err(SigningError::IncompleteGroup {
                    group: tx.group.map(|g| codec::encode_id(&g)).unwrap_or_else(|| format!("#{}", tx.index)),
                    index: tx.index,
                })
            }
            assignment => {
                let origin = match assignment {
                    SignerAssignment::Hardware(..) => SignatureOrigin::Hardware,
                    _ => SignatureOrigin::Software,
                };
                let bytes = signatures
                    .remove(&tx.index)
                    .ok_or(SigningError::MissingSignature { index: tx.index })?;
                (bytes, origin)
            }
        };

        transactions.push(SignedTransaction {
            index: tx.index,
            tx_id: tx.tx_id_string(),
            bytes,
            origin,
        });
    }

    Ok(SignedPayload { transactions, warnings })
}
