//! Wallet Module
//!
//! Addresses, the wallet's account table and the key vault collaborator.

pub mod accounts;
pub mod address;
pub mod vault;

pub use accounts::*;
pub use address::*;
pub use vault::*;
