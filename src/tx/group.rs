//! Group Assembler
//!
//! Partitions a decoded batch into atomic groups and verifies every
//! declared group identifier against the one recomputed from its members.

use super::codec;
use super::decoder::DecodedTransaction;
use rmpv::Value;
use serde::Serialize;
use std::collections::HashMap;

/// Ledger limit on transactions per atomic group
pub const MAX_GROUP_SIZE: usize = 16;

/// Grouping failures. Fatal to the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    #[error("Inconsistent grouping for group {group_id}: members {members:?} do not hash to the declared identifier")]
    InconsistentGrouping { group_id: String, members: Vec<usize> },

    #[error("Group {group_id} has {size} transactions (maximum {max})")]
    GroupTooLarge { group_id: String, size: usize, max: usize },
}

/// Batch indices that share one group identifier, in batch order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionGroup {
    #[serde(with = "crate::serde_bytes::base64_32_option")]
    pub id: Option<[u8; 32]>,
    pub members: Vec<usize>,
}

impl TransactionGroup {
    pub fn singleton(index: usize) -> Self {
        Self {
            id: None,
            members: vec![index],
        }
    }

    pub fn is_atomic(&self) -> bool {
        self.id.is_some()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.contains(&index)
    }

    /// Short label for logs and error messages
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => codec::encode_id(id),
            None => format!("#{}", self.members.first().copied().unwrap_or_default()),
        }
    }
}

pub struct GroupAssembler;

impl GroupAssembler {
    /// Partition `decoded` into groups, ordered by first member position.
    ///
    /// Transactions without a group identifier become singleton groups.
    /// Every declared identifier, including one carried by a lone member,
    /// must equal the hash of its members' IDs in batch order.
    pub fn assemble(decoded: &[DecodedTransaction]) -> Result<Vec<TransactionGroup>, GroupError> {
        let mut groups: Vec<TransactionGroup> = Vec::new();
        let mut by_id: HashMap<[u8; 32], usize> = HashMap::new();

        for (position, tx) in decoded.iter().enumerate() {
            match tx.group {
                None => groups.push(TransactionGroup::singleton(position)),
                Some(id) => match by_id.get(&id) {
                    Some(&slot) => groups[slot].members.push(position),
                    None => {
                        by_id.insert(id, groups.len());
                        groups.push(TransactionGroup {
                            id: Some(id),
                            members: vec![position],
                        });
                    }
                },
            }
        }

        for group in groups.iter().filter(|g| g.is_atomic()) {
            Self::verify(group, decoded)?;
        }

        Ok(groups)
    }

    fn verify(group: &TransactionGroup, decoded: &[DecodedTransaction]) -> Result<(), GroupError> {
        let Some(declared) = group.id else {
            return Ok(());
        };

        if group.len() > MAX_GROUP_SIZE {
            return Err(GroupError::GroupTooLarge {
                group_id: group.label(),
                size: group.len(),
                max: MAX_GROUP_SIZE,
            });
        }

        let member_ids: Vec<[u8; 32]> = group
            .members
            .iter()
            .map(|&position| decoded[position].group_member_id())
            .collect();

        if codec::group_id(&member_ids) != declared {
            return Err(GroupError::InconsistentGrouping {
                group_id: group.label(),
                members: group.members.iter().map(|&p| decoded[p].index).collect(),
            });
        }
        Ok(())
    }
}

/// Group identifier for transactions in the given order
pub fn compute_group_id(txns: &[Value]) -> [u8; 32] {
    let ids: Vec<[u8; 32]> = txns
        .iter()
        .map(|txn| codec::transaction_id(&codec::without_key(txn, "grp")))
        .collect();
    codec::group_id(&ids)
}

/// Stamp every transaction with the group identifier of the whole slice.
/// Used by internal builders (swap legs, rekey flows) and tests.
pub fn assign_group_id(txns: &mut [Value]) -> [u8; 32] {
    let id = compute_group_id(txns);
    for txn in txns.iter_mut() {
        let stripped = codec::without_key(txn, "grp");
        if let Value::Map(mut entries) = stripped {
            entries.push((Value::from("grp"), Value::Binary(id.to_vec())));
            *txn = Value::Map(entries);
        }
    }
    id
}
