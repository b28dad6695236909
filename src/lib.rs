//! Algorand Signing Pipeline
//!
//! Turns transaction proposals received from a dApp (WalletConnect) or
//! built by the wallet itself (swaps, rekeys) into a signed payload.
//!
//! # Architecture
//!
//! This crate provides:
//! - **tx**: Canonical MessagePack decoding, transaction IDs, atomic groups
//! - **security**: The policy gate every batch passes before signing
//! - **signing**: Signer routing, software and hardware signers, the
//!   session orchestrator and payload compilation
//! - **wallet**: Addresses, the account table and the key vault
//! - **inspect**: Read-only batch inspection shared by the CLI and FFI
//! - **ffi**: C-ABI exports
//!
//! # FFI Usage
//!
//! All public FFI functions are in the `ffi` module and follow this pattern:
//! - Input: JSON string (null-terminated C string)
//! - Output: JSON string (must be freed with `algo_free_string`)
//!
//! # Example
//!
//! ```rust,ignore
//! use algo_signing_pipeline::*;
//!
//! let orchestrator = SigningOrchestrator::new(vault, SharedDevice::new(ledger), PipelineConfig::dapp())?;
//! let context = SessionContext::new(Network::mainnet(), wallet);
//! let payload = orchestrator.sign(proposals, &context).await?;
//! println!("{}", payload.len());
//! ```

pub mod error;
pub mod ffi;
pub mod inspect;
pub mod security;
pub mod serde_bytes;
pub mod signing;
pub mod tx;
pub mod types;
pub mod utils;
pub mod wallet;

pub use error::{ErrorCode, ErrorReport, PipelineError, PipelineResult};
pub use types::{ApiResponse, Network, SessionContext};

pub use security::{Accepted, PolicyValidator, PolicyWarning, RejectionReason};
pub use signing::{
    CancelHandle, DeviceTransport, HardwareSignState, SessionState, SharedDevice, SignedPayload, SignedTransaction,
    SigningError, SigningOrchestrator, SigningSession,
};
pub use tx::{DecodedTransaction, RawProposal, TransactionGroup};
pub use utils::pipeline_config::{CallSite, DangerousFieldPolicy, PipelineConfig};
pub use wallet::{Address, InMemoryVault, KeyVault, OwnedAddresses, WalletAccount};

pub use ffi::{algo_free_string, algo_inspect_batch};
