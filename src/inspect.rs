//! Batch inspection
//!
//! Runs decoding, grouping, validation and routing over a batch without
//! signing anything. Shared by the C ABI and the `txn-inspect` binary.

use crate::error::{ErrorCode, ErrorReport, PipelineError};
use crate::security::{PolicyValidator, PolicyWarning};
use crate::signing::{SignerAssignment, SignerRouter};
use crate::tx::{decode_batch, DecodeError, GroupAssembler, RawProposal, TransactionGroup, TransactionSummary};
use crate::types::{Network, SessionContext};
use crate::utils::pipeline_config::PipelineConfig;
use crate::wallet::{Address, OwnedAddresses, WalletAccount};
use serde::{Deserialize, Serialize};

/// Network given by well-known name or in full
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NetworkSpec {
    Named(String),
    Custom(Network),
}

impl NetworkSpec {
    pub fn resolve(&self) -> Result<Network, ErrorReport> {
        match self {
            NetworkSpec::Named(name) => Network::from_name(name).ok_or_else(|| {
                ErrorReport::new(ErrorCode::InvalidInput, format!("Unknown network '{}'", name))
            }),
            NetworkSpec::Custom(network) => Ok(network.clone()),
        }
    }
}

/// One transaction as WalletConnect carries it
#[derive(Debug, Clone, Deserialize)]
pub struct ProposalInput {
    /// Base64 MessagePack
    pub txn: String,
    #[serde(default, rename = "authAddr", alias = "auth_address")]
    pub auth_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectRequest {
    pub network: NetworkSpec,
    pub transactions: Vec<ProposalInput>,
    #[serde(default)]
    pub accounts: Vec<WalletAccount>,
    #[serde(default)]
    pub config: Option<PipelineConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentSummary {
    pub index: usize,
    pub authority: Address,
    pub signer: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_index: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub network: String,
    pub transactions: Vec<TransactionSummary>,
    pub groups: Vec<TransactionGroup>,
    pub accepted: bool,
    pub warnings: Vec<PolicyWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<ErrorReport>,
    pub assignments: Vec<AssignmentSummary>,
}

/// Inspect a batch. Decode and grouping failures are errors; a policy
/// rejection is part of the report.
pub fn inspect(request: &InspectRequest) -> Result<InspectReport, ErrorReport> {
    let network = request.network.resolve()?;
    let config = request.config.clone().unwrap_or_default();
    config
        .validate()
        .map_err(|e| PipelineError::InvalidConfig(e).report())?;

    let proposals = request
        .transactions
        .iter()
        .enumerate()
        .map(|(index, input)| -> Result<RawProposal, DecodeError> {
            let proposal = RawProposal::from_base64(index, &input.txn)?;
            Ok(match &input.auth_address {
                Some(hint) => proposal.with_auth_address(hint.clone()),
                None => proposal,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::from(e).report())?;

    let wallet: OwnedAddresses = request.accounts.iter().cloned().collect();
    let context = SessionContext::new(network, wallet);
    let validator = PolicyValidator::from_config(&config);

    if let Err(reason) = validator.check_batch_size(proposals.len()) {
        return Err(PipelineError::from(reason).report());
    }
    let decoded = decode_batch(proposals).map_err(|e| PipelineError::from(e).report())?;
    let groups = GroupAssembler::assemble(&decoded).map_err(|e| PipelineError::from(e).report())?;
    let verdict = validator.validate(&decoded, &groups, &context);

    let assignments = decoded
        .iter()
        .map(|tx| {
            let routed = SignerRouter::assign(tx, &context.wallet);
            AssignmentSummary {
                index: routed.index,
                authority: routed.authority,
                signer: routed.assignment.label(),
                device_index: match routed.assignment {
                    SignerAssignment::Hardware(_, device_index) => Some(device_index),
                    _ => None,
                },
            }
        })
        .collect();

    let (accepted, warnings, rejection) = match verdict {
        Ok(accepted) => (true, accepted.warnings, None),
        Err(reason) => (false, Vec::new(), Some(PipelineError::from(reason).report())),
    };

    Ok(InspectReport {
        network: context.network.genesis_id.clone(),
        transactions: decoded.iter().map(TransactionSummary::from).collect(),
        groups,
        accepted,
        warnings,
        rejection,
        assignments,
    })
}

/// JSON in, JSON envelope out
pub fn inspect_json(request_json: &str) -> Result<InspectReport, ErrorReport> {
    let request: InspectRequest = serde_json::from_str(request_json)?;
    inspect(&request)
}
