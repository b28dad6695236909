//! Transaction Decoder
//!
//! Parses raw proposal bytes (a bare transaction map or a signed
//! transaction envelope) into a structured, immutable view.

use super::codec;
use crate::wallet::Address;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rmpv::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decoding failures. Always fatal to the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed transaction at index {index}: {reason}")]
    Malformed { index: usize, reason: String },

    #[error("Unsupported transaction type '{kind}' at index {index}")]
    UnsupportedKind { index: usize, kind: String },
}

impl DecodeError {
    fn malformed(index: usize, reason: impl Into<String>) -> Self {
        DecodeError::Malformed {
            index,
            reason: reason.into(),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            DecodeError::Malformed { index, .. } | DecodeError::UnsupportedKind { index, .. } => *index,
        }
    }
}

/// A proposed transaction as handed over by the call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProposal {
    /// Position in the originally requested batch
    pub index: usize,
    /// Raw MessagePack bytes
    pub bytes: Vec<u8>,
    /// Auth address declared by the peer (WalletConnect `authAddr`)
    pub auth_address: Option<String>,
}

impl RawProposal {
    pub fn new(index: usize, bytes: Vec<u8>) -> Self {
        Self {
            index,
            bytes,
            auth_address: None,
        }
    }

    /// Proposal from the base64 text carried by WalletConnect and deep links
    pub fn from_base64(index: usize, encoded: &str) -> Result<Self, DecodeError> {
        let bytes = STANDARD
            .decode(encoded.trim().as_bytes())
            .map_err(|e| DecodeError::malformed(index, format!("invalid base64: {}", e)))?;
        Ok(Self::new(index, bytes))
    }

    pub fn with_auth_address(mut self, auth_address: impl Into<String>) -> Self {
        self.auth_address = Some(auth_address.into());
        self
    }
}

/// Transaction types the wallet understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Payment,
    AssetTransfer,
    ApplicationCall,
    AssetConfig,
    AssetFreeze,
    KeyRegistration,
}

impl TransactionKind {
    pub fn from_type(type_str: &str) -> Option<Self> {
        match type_str {
            "pay" => Some(Self::Payment),
            "axfer" => Some(Self::AssetTransfer),
            "appl" => Some(Self::ApplicationCall),
            "acfg" => Some(Self::AssetConfig),
            "afrz" => Some(Self::AssetFreeze),
            "keyreg" => Some(Self::KeyRegistration),
            _ => None,
        }
    }

    pub fn type_str(&self) -> &'static str {
        match self {
            Self::Payment => "pay",
            Self::AssetTransfer => "axfer",
            Self::ApplicationCall => "appl",
            Self::AssetConfig => "acfg",
            Self::AssetFreeze => "afrz",
            Self::KeyRegistration => "keyreg",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.type_str())
    }
}

/// Signature already attached to a proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistingSignature {
    Single([u8; 64]),
    Logic,
    Multisig,
}

/// Structured, immutable view of one proposal
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTransaction {
    pub index: usize,
    pub kind: TransactionKind,
    pub sender: Address,
    pub receiver: Option<Address>,
    /// Authorizing address from the envelope (`sgnr`)
    pub auth_address: Option<Address>,
    /// Auth address declared by the peer, not yet validated
    pub declared_auth_address: Option<String>,
    pub close_to: Option<Address>,
    pub rekey_to: Option<Address>,
    /// Clawback target of an asset transfer
    pub asset_sender: Option<Address>,
    pub asset_id: Option<u64>,
    pub app_id: Option<u64>,
    pub amount: u64,
    pub fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: Option<String>,
    pub genesis_hash: Option<[u8; 32]>,
    pub group: Option<[u8; 32]>,
    pub note: Option<Vec<u8>>,
    pub signature: Option<ExistingSignature>,
    txn: Value,
    raw: Vec<u8>,
    tx_id: [u8; 32],
}

impl DecodedTransaction {
    pub fn tx_id(&self) -> &[u8; 32] {
        &self.tx_id
    }

    pub fn tx_id_string(&self) -> String {
        codec::encode_id(&self.tx_id)
    }

    /// The transaction map as decoded
    pub fn txn(&self) -> &Value {
        &self.txn
    }

    /// Proposal bytes exactly as received
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Canonical encoding of the transaction map (what a device signs)
    pub fn txn_bytes(&self) -> Vec<u8> {
        codec::encode_canonical(&self.txn)
    }

    /// `"TX" || canonical(txn)`
    pub fn signing_bytes(&self) -> Vec<u8> {
        codec::signing_bytes(&self.txn_bytes())
    }

    /// Transaction ID with the group field cleared, as used for group IDs
    pub fn group_member_id(&self) -> [u8; 32] {
        codec::transaction_id(&codec::without_key(&self.txn, "grp"))
    }

    pub fn is_presigned(&self) -> bool {
        matches!(
            self.signature,
            Some(ExistingSignature::Single(_)) | Some(ExistingSignature::Logic)
        )
    }

    pub fn is_multisig(&self) -> bool {
        matches!(self.signature, Some(ExistingSignature::Multisig))
    }

    pub fn is_rekey(&self) -> bool {
        self.rekey_to.is_some()
    }

    pub fn is_close(&self) -> bool {
        self.close_to.is_some()
    }

    /// Zero-amount asset transfer to self
    pub fn is_asset_opt_in(&self) -> bool {
        self.kind == TransactionKind::AssetTransfer
            && self.amount == 0
            && self.receiver == Some(self.sender)
            && self.close_to.is_none()
    }
}

/// Summary of a decoded transaction for JSON surfaces
#[derive(Debug, Clone, Serialize)]
pub struct TransactionSummary {
    pub index: usize,
    pub tx_id: String,
    pub kind: TransactionKind,
    pub sender: Address,
    pub receiver: Option<Address>,
    pub amount: u64,
    pub fee: u64,
    pub asset_id: Option<u64>,
    pub app_id: Option<u64>,
    pub close_to: Option<Address>,
    pub rekey_to: Option<Address>,
    #[serde(with = "crate::serde_bytes::base64_32_option")]
    pub group: Option<[u8; 32]>,
    pub network: String,
    pub presigned: bool,
    pub multisig: bool,
}

impl From<&DecodedTransaction> for TransactionSummary {
    fn from(tx: &DecodedTransaction) -> Self {
        Self {
            index: tx.index,
            tx_id: tx.tx_id_string(),
            kind: tx.kind,
            sender: tx.sender,
            receiver: tx.receiver,
            amount: tx.amount,
            fee: tx.fee,
            asset_id: tx.asset_id,
            app_id: tx.app_id,
            close_to: tx.close_to,
            rekey_to: tx.rekey_to,
            group: tx.group,
            network: crate::types::Network::describe(tx.genesis_id.as_deref(), tx.genesis_hash.as_ref()),
            presigned: tx.is_presigned(),
            multisig: tx.is_multisig(),
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a standalone transaction blob (index 0)
pub fn decode(bytes: &[u8]) -> Result<DecodedTransaction, DecodeError> {
    decode_at(0, bytes, None)
}

/// Decode one proposal, keeping its index and declared auth address
pub fn decode_proposal(proposal: &RawProposal) -> Result<DecodedTransaction, DecodeError> {
    decode_at(proposal.index, &proposal.bytes, proposal.auth_address.clone())
}

/// Decode a whole batch. Proposals are ordered by index; indices must be
/// exactly `0..n` so that batch position and proposal index coincide.
pub fn decode_batch(mut proposals: Vec<RawProposal>) -> Result<Vec<DecodedTransaction>, DecodeError> {
    proposals.sort_by_key(|p| p.index);
    for (position, proposal) in proposals.iter().enumerate() {
        if proposal.index != position {
            let reason = if position > 0 && proposals[position - 1].index == proposal.index {
                "duplicate proposal index"
            } else {
                "proposal indices must be contiguous from 0"
            };
            return Err(DecodeError::malformed(proposal.index, reason));
        }
    }
    proposals.iter().map(decode_proposal).collect()
}

fn decode_at(
    index: usize,
    bytes: &[u8],
    declared_auth_address: Option<String>,
) -> Result<DecodedTransaction, DecodeError> {
    let top = codec::read_single(bytes).map_err(|e| DecodeError::malformed(index, e))?;
    if !matches!(top, Value::Map(_)) {
        return Err(DecodeError::malformed(index, "top-level value is not a map"));
    }
    if let Some(key) = codec::duplicate_key(&top) {
        return Err(DecodeError::malformed(index, format!("duplicate key '{}'", key)));
    }

    let (txn, signature, auth_address) = if codec::map_get(&top, "txn").is_some() {
        let envelope = Fields::new(index, &top);
        let txn = codec::map_get(&top, "txn").cloned().unwrap_or(Value::Nil);
        if !matches!(txn, Value::Map(_)) {
            return Err(DecodeError::malformed(index, "field 'txn' is not a map"));
        }
        (txn, envelope.signature()?, envelope.address("sgnr")?)
    } else {
        (top, None, None)
    };

    let fields = Fields::new(index, &txn);
    let type_str = fields
        .string("type")?
        .ok_or_else(|| DecodeError::malformed(index, "missing field 'type'"))?;
    let kind = TransactionKind::from_type(&type_str).ok_or(DecodeError::UnsupportedKind {
        index,
        kind: type_str.clone(),
    })?;
    let sender = fields
        .address("snd")?
        .ok_or_else(|| DecodeError::malformed(index, "missing field 'snd'"))?;

    let (receiver, close_to, amount, asset_id, asset_sender) = match kind {
        TransactionKind::Payment => (
            fields.address("rcv")?,
            fields.address("close")?,
            fields.uint("amt")?.unwrap_or(0),
            None,
            None,
        ),
        TransactionKind::AssetTransfer => (
            fields.address("arcv")?,
            fields.address("aclose")?,
            fields.uint("aamt")?.unwrap_or(0),
            fields.uint("xaid")?,
            fields.address("asnd")?,
        ),
        TransactionKind::AssetConfig => (None, None, 0, fields.uint("caid")?, None),
        TransactionKind::AssetFreeze => (fields.address("fadd")?, None, 0, fields.uint("faid")?, None),
        TransactionKind::ApplicationCall | TransactionKind::KeyRegistration => (None, None, 0, None, None),
    };

    let app_id = match kind {
        TransactionKind::ApplicationCall => fields.uint("apid")?,
        _ => None,
    };

    let tx_id = codec::transaction_id(&txn);

    Ok(DecodedTransaction {
        index,
        kind,
        sender,
        receiver,
        auth_address,
        declared_auth_address,
        close_to,
        rekey_to: fields.address("rekey")?,
        asset_sender,
        asset_id,
        app_id,
        amount,
        fee: fields.uint("fee")?.unwrap_or(0),
        first_valid: fields.uint("fv")?.unwrap_or(0),
        last_valid: fields.uint("lv")?.unwrap_or(0),
        genesis_id: fields.string("gen")?,
        genesis_hash: fields.bytes32("gh")?,
        group: fields.bytes32("grp")?,
        note: fields.bytes("note")?,
        signature,
        txn,
        raw: bytes.to_vec(),
        tx_id,
    })
}

/// Typed access to the fields of a MessagePack map
struct Fields<'a> {
    index: usize,
    map: &'a Value,
}

impl<'a> Fields<'a> {
    fn new(index: usize, map: &'a Value) -> Self {
        Self { index, map }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        codec::map_get(self.map, key)
    }

    fn wrong_type(&self, key: &str, expected: &str) -> DecodeError {
        DecodeError::malformed(self.index, format!("field '{}' is not {}", key, expected))
    }

    fn string(&self, key: &str) -> Result<Option<String>, DecodeError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| self.wrong_type(key, "a string")),
        }
    }

    fn uint(&self, key: &str) -> Result<Option<u64>, DecodeError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "an unsigned integer")),
        }
    }

    fn bytes(&self, key: &str) -> Result<Option<Vec<u8>>, DecodeError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Binary(b)) => Ok(Some(b.clone())),
            Some(_) => Err(self.wrong_type(key, "binary")),
        }
    }

    fn bytes32(&self, key: &str) -> Result<Option<[u8; 32]>, DecodeError> {
        match self.bytes(key)? {
            None => Ok(None),
            Some(b) => b
                .try_into()
                .map(Some)
                .map_err(|_| self.wrong_type(key, "32 bytes")),
        }
    }

    fn address(&self, key: &str) -> Result<Option<Address>, DecodeError> {
        Ok(self.bytes32(key)?.map(Address::from_bytes))
    }

    fn signature(&self) -> Result<Option<ExistingSignature>, DecodeError> {
        if self.get("msig").is_some() {
            return Ok(Some(ExistingSignature::Multisig));
        }
        if self.get("lsig").is_some() {
            return Ok(Some(ExistingSignature::Logic));
        }
        match self.bytes("sig")? {
            None => Ok(None),
            Some(sig) => {
                let sig: [u8; 64] = sig
                    .try_into()
                    .map_err(|_| self.wrong_type("sig", "64 bytes"))?;
                Ok(Some(ExistingSignature::Single(sig)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Network;

    fn addr(byte: u8) -> Vec<u8> {
        vec![byte; 32]
    }

    fn payment() -> Value {
        Value::Map(vec![
            (Value::from("type"), Value::from("pay")),
            (Value::from("snd"), Value::Binary(addr(1))),
            (Value::from("rcv"), Value::Binary(addr(2))),
            (Value::from("amt"), Value::from(1_000_000u64)),
            (Value::from("fee"), Value::from(1_000u64)),
            (Value::from("fv"), Value::from(100u64)),
            (Value::from("lv"), Value::from(1_100u64)),
            (Value::from("gen"), Value::from("mainnet-v1.0")),
            (Value::from("gh"), Value::Binary(Network::mainnet().genesis_hash.to_vec())),
        ])
    }

    fn with_field(map: Value, key: &str, value: Value) -> Value {
        let Value::Map(mut entries) = map else { unreachable!() };
        entries.push((Value::from(key), value));
        Value::Map(entries)
    }

    #[test]
    fn test_decode_payment() {
        let bytes = codec::encode_canonical(&payment());
        let tx = decode(&bytes).unwrap();
        assert_eq!(tx.kind, TransactionKind::Payment);
        assert_eq!(tx.sender, Address::from_bytes([1u8; 32]));
        assert_eq!(tx.receiver, Some(Address::from_bytes([2u8; 32])));
        assert_eq!(tx.amount, 1_000_000);
        assert_eq!(tx.fee, 1_000);
        assert_eq!(tx.genesis_id.as_deref(), Some("mainnet-v1.0"));
        assert!(tx.signature.is_none());
        assert!(tx.group.is_none());
        assert_eq!(tx.raw_bytes(), bytes.as_slice());
        assert_eq!(tx.tx_id_string().len(), 52);
        assert!(tx.signing_bytes().starts_with(b"TX"));
    }

    #[test]
    fn test_decode_signed_envelope() {
        let envelope = Value::Map(vec![
            (Value::from("sig"), Value::Binary(vec![7u8; 64])),
            (Value::from("sgnr"), Value::Binary(addr(9))),
            (Value::from("txn"), payment()),
        ]);
        let tx = decode(&codec::encode_canonical(&envelope)).unwrap();
        assert_eq!(tx.signature, Some(ExistingSignature::Single([7u8; 64])));
        assert_eq!(tx.auth_address, Some(Address::from_bytes([9u8; 32])));
        assert!(tx.is_presigned());
        // ID is computed over the inner transaction only
        assert_eq!(tx.tx_id(), &codec::transaction_id(&payment()));
    }

    #[test]
    fn test_decode_multisig_envelope() {
        let envelope = Value::Map(vec![
            (Value::from("msig"), Value::Map(vec![(Value::from("thr"), Value::from(2u64))])),
            (Value::from("txn"), payment()),
        ]);
        let tx = decode(&codec::encode_canonical(&envelope)).unwrap();
        assert!(tx.is_multisig());
        assert!(!tx.is_presigned());
    }

    #[test]
    fn test_decode_asset_transfer_fields() {
        let axfer = Value::Map(vec![
            (Value::from("type"), Value::from("axfer")),
            (Value::from("snd"), Value::Binary(addr(1))),
            (Value::from("arcv"), Value::Binary(addr(1))),
            (Value::from("xaid"), Value::from(31566704u64)),
            (Value::from("aclose"), Value::Binary(addr(4))),
        ]);
        let tx = decode(&codec::encode_canonical(&axfer)).unwrap();
        assert_eq!(tx.kind, TransactionKind::AssetTransfer);
        assert_eq!(tx.asset_id, Some(31566704));
        assert_eq!(tx.close_to, Some(Address::from_bytes([4u8; 32])));
        assert!(tx.is_close());
        assert!(!tx.is_asset_opt_in());
    }

    #[test]
    fn test_asset_opt_in() {
        let optin = Value::Map(vec![
            (Value::from("type"), Value::from("axfer")),
            (Value::from("snd"), Value::Binary(addr(1))),
            (Value::from("arcv"), Value::Binary(addr(1))),
            (Value::from("xaid"), Value::from(10u64)),
        ]);
        assert!(decode(&codec::encode_canonical(&optin)).unwrap().is_asset_opt_in());
    }

    #[test]
    fn test_rekey_field() {
        let rekey = with_field(payment(), "rekey", Value::Binary(addr(5)));
        let tx = decode(&codec::encode_canonical(&rekey)).unwrap();
        assert_eq!(tx.rekey_to, Some(Address::from_bytes([5u8; 32])));
        assert!(tx.is_rekey());
    }

    #[test]
    fn test_unsupported_kind() {
        let stpf = Value::Map(vec![
            (Value::from("type"), Value::from("stpf")),
            (Value::from("snd"), Value::Binary(addr(1))),
        ]);
        assert_eq!(
            decode(&codec::encode_canonical(&stpf)),
            Err(DecodeError::UnsupportedKind { index: 0, kind: "stpf".to_string() })
        );
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(decode(&[]), Err(DecodeError::Malformed { .. })));
        assert!(matches!(decode(&[0xc1]), Err(DecodeError::Malformed { .. })));

        let not_a_map = codec::encode_canonical(&Value::from(5u64));
        assert!(matches!(decode(&not_a_map), Err(DecodeError::Malformed { .. })));

        let short_sender = with_field(
            Value::Map(vec![(Value::from("type"), Value::from("pay"))]),
            "snd",
            Value::Binary(vec![1u8; 31]),
        );
        let err = decode(&codec::encode_canonical(&short_sender)).unwrap_err();
        assert!(err.to_string().contains("snd"));

        let missing_sender = Value::Map(vec![(Value::from("type"), Value::from("pay"))]);
        assert!(matches!(
            decode(&codec::encode_canonical(&missing_sender)),
            Err(DecodeError::Malformed { .. })
        ));

        let bad_amount = with_field(
            Value::Map(vec![
                (Value::from("type"), Value::from("pay")),
                (Value::from("snd"), Value::Binary(addr(1))),
            ]),
            "amt",
            Value::from("lots"),
        );
        assert!(matches!(
            decode(&codec::encode_canonical(&bad_amount)),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_repeated_keys_are_malformed() {
        let repeated_amount = with_field(payment(), "amt", Value::from(5_000_000u64));
        let err = decode(&codec::encode_canonical(&repeated_amount)).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { index: 0, .. }));
        assert!(err.to_string().contains("duplicate key 'amt'"));

        let envelope = Value::Map(vec![
            (Value::from("sig"), Value::Binary(vec![7u8; 64])),
            (Value::from("txn"), payment()),
            (Value::from("sig"), Value::Binary(vec![8u8; 64])),
        ]);
        let err = decode(&codec::encode_canonical(&envelope)).unwrap_err();
        assert!(err.to_string().contains("duplicate key 'sig'"));

        let nested = Value::Map(vec![
            (
                Value::from("msig"),
                Value::Map(vec![
                    (Value::from("thr"), Value::from(1u64)),
                    (Value::from("thr"), Value::from(2u64)),
                ]),
            ),
            (Value::from("txn"), payment()),
        ]);
        assert!(matches!(
            decode(&codec::encode_canonical(&nested)),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_decode_batch_indices() {
        let bytes = codec::encode_canonical(&payment());
        let batch = vec![
            RawProposal::new(1, bytes.clone()),
            RawProposal::new(0, bytes.clone()),
        ];
        let decoded = decode_batch(batch).unwrap();
        assert_eq!(decoded[0].index, 0);
        assert_eq!(decoded[1].index, 1);

        let duplicate = vec![RawProposal::new(0, bytes.clone()), RawProposal::new(0, bytes.clone())];
        let err = decode_batch(duplicate).unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        let gap = vec![RawProposal::new(0, bytes.clone()), RawProposal::new(2, bytes)];
        assert!(matches!(decode_batch(gap), Err(DecodeError::Malformed { index: 2, .. })));
    }

    #[test]
    fn test_from_base64() {
        let bytes = codec::encode_canonical(&payment());
        let encoded = STANDARD.encode(&bytes);
        let proposal = RawProposal::from_base64(3, &encoded).unwrap().with_auth_address("AUTH");
        assert_eq!(proposal.bytes, bytes);
        assert_eq!(proposal.index, 3);
        assert_eq!(proposal.auth_address.as_deref(), Some("AUTH"));

        assert!(RawProposal::from_base64(0, "***").is_err());
    }
}
