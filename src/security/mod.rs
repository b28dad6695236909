//! Security Module
//!
//! The policy gate every batch passes before any key material is touched:
//! - Network binding
//! - Address and auth address consistency
//! - Multisig rejection
//! - Rekey and close-to detection
//! - Signable-member checks per atomic group

pub mod tx_policy;

pub use tx_policy::*;
