//! Transaction Module
//!
//! Decoding, canonical encoding and atomic grouping of proposed
//! transactions.

pub mod codec;
pub mod decoder;
pub mod group;

pub use decoder::{
    decode, decode_batch, decode_proposal, DecodeError, DecodedTransaction, ExistingSignature,
    RawProposal, TransactionKind, TransactionSummary,
};
pub use group::{assign_group_id, compute_group_id, GroupAssembler, GroupError, TransactionGroup, MAX_GROUP_SIZE};
