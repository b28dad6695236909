//! Signer Router
//!
//! Decides, per transaction, who produces its signature. Pure lookup
//! against the wallet's account table.

use crate::tx::{DecodedTransaction, ExistingSignature, TransactionGroup};
use crate::wallet::{Address, KeyHolder, OwnedAddresses};

/// Signer backend chosen for one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerAssignment {
    /// Key material in the local vault
    Software(Address),
    /// Key on the hardware device at the given account index
    Hardware(Address, u32),
    /// No local authority holds the key
    NotOurs,
    /// Already carries a signature; passed through as received
    AlreadySigned(Vec<u8>),
}

impl SignerAssignment {
    pub fn needs_signature(&self) -> bool {
        matches!(self, SignerAssignment::Software(_) | SignerAssignment::Hardware(..))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignerAssignment::Software(_) => "software",
            SignerAssignment::Hardware(..) => "hardware",
            SignerAssignment::NotOurs => "not_ours",
            SignerAssignment::AlreadySigned(_) => "already_signed",
        }
    }
}

/// A transaction index with its resolved authority and assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedTransaction {
    pub index: usize,
    pub authority: Address,
    pub assignment: SignerAssignment,
}

/// Address whose key must sign `tx`.
///
/// Resolution order: the envelope's `sgnr`, then the peer-declared auth
/// address, then the auth address the wallet records for a rekeyed
/// sender, then the sender itself.
pub fn signing_authority(tx: &DecodedTransaction, wallet: &OwnedAddresses) -> Address {
    if let Some(sgnr) = tx.auth_address {
        return sgnr;
    }
    if let Some(declared) = tx
        .declared_auth_address
        .as_deref()
        .and_then(|hint| hint.parse::<Address>().ok())
    {
        return declared;
    }
    wallet.recorded_auth(&tx.sender).unwrap_or(tx.sender)
}

/// Whether the wallet holds the key that authorizes `tx`
pub fn is_wallet_signable(tx: &DecodedTransaction, wallet: &OwnedAddresses) -> bool {
    !tx.is_multisig() && wallet.key_holder(&signing_authority(tx, wallet)).is_some()
}

pub struct SignerRouter;

impl SignerRouter {
    /// Assignments for every member of `group`, in member order
    pub fn route(
        group: &TransactionGroup,
        decoded: &[DecodedTransaction],
        wallet: &OwnedAddresses,
    ) -> Vec<RoutedTransaction> {
        group
            .members
            .iter()
            .map(|&position| Self::assign(&decoded[position], wallet))
            .collect()
    }

    /// A logic-signed envelope keeps its logic signature even when a wallet
    /// key could sign the transaction; a bare `sig` from the dApp is replaced
    /// by the wallet's own.
    pub fn assign(tx: &DecodedTransaction, wallet: &OwnedAddresses) -> RoutedTransaction {
        let authority = signing_authority(tx, wallet);
        let logic_signed = matches!(tx.signature, Some(ExistingSignature::Logic));
        let assignment = match wallet.key_holder(&authority) {
            _ if logic_signed => SignerAssignment::AlreadySigned(tx.raw_bytes().to_vec()),
            Some(KeyHolder::Software) => SignerAssignment::Software(authority),
            Some(KeyHolder::Hardware { device_index }) => SignerAssignment::Hardware(authority, device_index),
            None if tx.is_presigned() => SignerAssignment::AlreadySigned(tx.raw_bytes().to_vec()),
            None => SignerAssignment::NotOurs,
        };
        RoutedTransaction {
            index: tx.index,
            authority,
            assignment,
        }
    }
}
