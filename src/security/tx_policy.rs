//! Transaction Policy Gate
//!
//! Applies the signing policy to a decoded, grouped batch. Rules run in a
//! fixed order and the first failing rule decides the rejection:
//! 1. Batch size
//! 2. Network binding
//! 3. Address validity and auth address consistency
//! 4. Multisig
//! 5. Rekey and close-to (reject or warn, per session config)
//! 6. Unsignable transactions outside any signable group
//! 7. Groups with no wallet-signable member
//!
//! Validation never touches key material and is deterministic.

use crate::log_warn;
use crate::signing::router::is_wallet_signable;
use crate::tx::{DecodedTransaction, TransactionGroup};
use crate::types::{Network, SessionContext};
use crate::utils::pipeline_config::{DangerousFieldPolicy, PipelineConfig};
use crate::wallet::Address;
use serde::Serialize;
use std::fmt;

/// Address-bearing field of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressField {
    Sender,
    Receiver,
    CloseTo,
    RekeyTo,
    AuthAddress,
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressField::Sender => "sender",
            AddressField::Receiver => "receiver",
            AddressField::CloseTo => "close-to",
            AddressField::RekeyTo => "rekey-to",
            AddressField::AuthAddress => "auth address",
        };
        f.write_str(name)
    }
}

/// Why a batch was refused. Terminal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    #[error("No transactions to sign")]
    EmptyBatch,

    #[error("Request contains {size} transactions (maximum {max})")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Transaction {index} is for {found}, but the wallet is connected to {expected}")]
    NetworkMismatch { index: usize, expected: String, found: String },

    #[error("Transaction {index} has an invalid {field}")]
    InvalidAddress { index: usize, field: AddressField },

    #[error("Transaction {index} declares an auth address that does not match the account's signer")]
    AuthAddressMismatch { index: usize },

    #[error("Transaction {index} is a multisig transaction, which this wallet does not support")]
    MultisigUnsupported { index: usize },

    #[error("Transaction {index} would rekey the account to a different signer")]
    RekeyNotAllowed { index: usize },

    #[error("Transaction {index} would close the account and send its remaining balance elsewhere")]
    CloseToNotAllowed { index: usize },

    #[error("Transaction {index} cannot be signed by this wallet and is not grouped with one that can")]
    UnsignableTransaction { index: usize },

    #[error("Group {group} contains no transaction this wallet can sign")]
    NoSignableMember { group: String },
}

impl RejectionReason {
    /// Transaction index the rejection points at, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            RejectionReason::NetworkMismatch { index, .. }
            | RejectionReason::InvalidAddress { index, .. }
            | RejectionReason::AuthAddressMismatch { index }
            | RejectionReason::MultisigUnsupported { index }
            | RejectionReason::RekeyNotAllowed { index }
            | RejectionReason::CloseToNotAllowed { index }
            | RejectionReason::UnsignableTransaction { index } => Some(*index),
            RejectionReason::EmptyBatch
            | RejectionReason::BatchTooLarge { .. }
            | RejectionReason::NoSignableMember { .. } => None,
        }
    }
}

/// Dangerous field accepted under a `Warn` policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyWarning {
    Rekey { index: usize, to: Address },
    CloseTo { index: usize, to: Address },
}

impl fmt::Display for PolicyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyWarning::Rekey { index, to } => {
                write!(f, "Transaction {} rekeys the account to {}", index, to)
            }
            PolicyWarning::CloseTo { index, to } => {
                write!(f, "Transaction {} closes the account to {}", index, to)
            }
        }
    }
}

/// A batch that passed every rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted {
    pub groups: Vec<TransactionGroup>,
    pub warnings: Vec<PolicyWarning>,
}

/// The policy gate, configured per session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyValidator {
    pub max_batch_size: usize,
    pub rekey_policy: DangerousFieldPolicy,
    pub close_to_policy: DangerousFieldPolicy,
}

impl Default for PolicyValidator {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl PolicyValidator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            rekey_policy: config.rekey_policy,
            close_to_policy: config.close_to_policy,
        }
    }

    /// Run every rule over the batch
    pub fn validate(
        &self,
        decoded: &[DecodedTransaction],
        groups: &[TransactionGroup],
        context: &SessionContext,
    ) -> Result<Accepted, RejectionReason> {
        let result = self.check(decoded, groups, context);
        if let Err(ref reason) = result {
            log_warn!("policy", "Batch rejected", reason = reason, batch_size = decoded.len());
        }
        result
    }

    fn check(
        &self,
        decoded: &[DecodedTransaction],
        groups: &[TransactionGroup],
        context: &SessionContext,
    ) -> Result<Accepted, RejectionReason> {
        self.check_batch_size(decoded.len())?;

        for tx in decoded {
            check_network(tx, &context.network)?;
        }
        for tx in decoded {
            check_addresses(tx, context)?;
        }
        if let Some(tx) = decoded.iter().find(|tx| tx.is_multisig()) {
            return Err(RejectionReason::MultisigUnsupported { index: tx.index });
        }

        let mut warnings = Vec::new();
        for tx in decoded {
            self.check_dangerous_fields(tx, &mut warnings)?;
        }

        let wallet = &context.wallet;
        let group_signable: Vec<bool> = groups
            .iter()
            .map(|g| g.members.iter().any(|&p| is_wallet_signable(&decoded[p], wallet)))
            .collect();

        for (group, signable) in groups.iter().zip(&group_signable) {
            if *signable {
                continue;
            }
            if let Some(tx) = group
                .members
                .iter()
                .map(|&p| &decoded[p])
                .find(|tx| !tx.is_presigned() && !is_wallet_signable(tx, wallet))
            {
                return Err(RejectionReason::UnsignableTransaction { index: tx.index });
            }
        }

        for (group, signable) in groups.iter().zip(&group_signable) {
            if !*signable {
                return Err(RejectionReason::NoSignableMember { group: group.label() });
            }
        }

        Ok(Accepted {
            groups: groups.to_vec(),
            warnings,
        })
    }

    pub fn check_batch_size(&self, size: usize) -> Result<(), RejectionReason> {
        if size == 0 {
            return Err(RejectionReason::EmptyBatch);
        }
        if size > self.max_batch_size {
            return Err(RejectionReason::BatchTooLarge {
                size,
                max: self.max_batch_size,
            });
        }
        Ok(())
    }

    fn check_dangerous_fields(
        &self,
        tx: &DecodedTransaction,
        warnings: &mut Vec<PolicyWarning>,
    ) -> Result<(), RejectionReason> {
        if let Some(to) = tx.rekey_to {
            match self.rekey_policy {
                DangerousFieldPolicy::Reject => {
                    return Err(RejectionReason::RekeyNotAllowed { index: tx.index })
                }
                DangerousFieldPolicy::Warn => warnings.push(PolicyWarning::Rekey { index: tx.index, to }),
            }
        }
        if let Some(to) = tx.close_to {
            match self.close_to_policy {
                DangerousFieldPolicy::Reject => {
                    return Err(RejectionReason::CloseToNotAllowed { index: tx.index })
                }
                DangerousFieldPolicy::Warn => warnings.push(PolicyWarning::CloseTo { index: tx.index, to }),
            }
        }
        Ok(())
    }
}

fn check_network(tx: &DecodedTransaction, network: &Network) -> Result<(), RejectionReason> {
    if network.matches(tx.genesis_id.as_deref(), tx.genesis_hash.as_ref()) {
        return Ok(());
    }
    Err(RejectionReason::NetworkMismatch {
        index: tx.index,
        expected: network.genesis_id.clone(),
        found: Network::describe(tx.genesis_id.as_deref(), tx.genesis_hash.as_ref()),
    })
}

fn check_addresses(tx: &DecodedTransaction, context: &SessionContext) -> Result<(), RejectionReason> {
    let invalid = |field| RejectionReason::InvalidAddress { index: tx.index, field };

    // Binary address fields are length-checked by the decoder. A zero
    // destination for a close or rekey burns the balance or locks the account.
    if tx.close_to.is_some_and(|a| a.is_zero()) {
        return Err(invalid(AddressField::CloseTo));
    }
    if tx.rekey_to.is_some_and(|a| a.is_zero()) {
        return Err(invalid(AddressField::RekeyTo));
    }
    if tx.sender.is_zero() {
        return Err(invalid(AddressField::Sender));
    }

    let Some(hint) = tx.declared_auth_address.as_deref() else {
        return Ok(());
    };
    let declared: Address = hint.parse().map_err(|_| invalid(AddressField::AuthAddress))?;

    if let Some(sgnr) = tx.auth_address {
        if sgnr != declared {
            return Err(RejectionReason::AuthAddressMismatch { index: tx.index });
        }
    }
    if let Some(recorded) = context.wallet.recorded_auth(&tx.sender) {
        if recorded != declared {
            return Err(RejectionReason::AuthAddressMismatch { index: tx.index });
        }
    }
    Ok(())
}
