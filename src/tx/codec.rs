//! Canonical MessagePack
//!
//! Transactions are hashed and signed over their canonical encoding: map
//! keys sorted, minimal-width integers and lengths. `rmpv` already emits
//! minimal widths, so canonicalizing is a matter of sorting map keys.

use crate::wallet::Address;
use data_encoding::BASE32_NOPAD;
use rmpv::Value;
use sha2::{Digest, Sha512_256};

/// Domain separator for transaction IDs and signatures
pub const TX_TAG: &[u8] = b"TX";
/// Domain separator for group IDs
pub const GROUP_TAG: &[u8] = b"TG";

/// Read exactly one MessagePack value, rejecting trailing bytes
pub fn read_single(bytes: &[u8]) -> Result<Value, String> {
    let mut cursor = bytes;
    let value = rmpv::decode::read_value(&mut cursor).map_err(|e| e.to_string())?;
    if !cursor.is_empty() {
        return Err(format!("{} trailing bytes", cursor.len()));
    }
    Ok(value)
}

/// Return a copy of `value` with every map sorted by key
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Map(entries) => {
            let mut sorted: Vec<(Value, Value)> = entries
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            sorted.sort_by(|a, b| key_bytes(&a.0).cmp(key_bytes(&b.0)));
            Value::Map(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn key_bytes(key: &Value) -> &[u8] {
    match key {
        Value::String(s) => s.as_bytes(),
        Value::Binary(b) => b.as_slice(),
        _ => &[],
    }
}

/// Canonical encoding of `value`
pub fn encode_canonical(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    rmpv::encode::write_value(&mut out, &canonicalize(value))
        .expect("writing MessagePack into a Vec cannot fail");
    out
}

/// Look up a string key in a map value
pub fn map_get<'a>(map: &'a Value, key: &str) -> Option<&'a Value> {
    match map {
        Value::Map(entries) => entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v),
        _ => None,
    }
}

/// First key that appears twice in any map nested within `value`
pub fn duplicate_key(value: &Value) -> Option<String> {
    match value {
        Value::Map(entries) => {
            for (position, (key, _)) in entries.iter().enumerate() {
                if entries[..position].iter().any(|(seen, _)| seen == key) {
                    return Some(key.as_str().map(str::to_string).unwrap_or_else(|| key.to_string()));
                }
            }
            entries.iter().find_map(|(_, v)| duplicate_key(v))
        }
        Value::Array(items) => items.iter().find_map(duplicate_key),
        _ => None,
    }
}

/// Copy of a map value without `key`
pub fn without_key(map: &Value, key: &str) -> Value {
    match map {
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .filter(|(k, _)| k.as_str() != Some(key))
                .cloned()
                .collect(),
        ),
        other => other.clone(),
    }
}

/// SHA-512/256 over the concatenation of `parts`
pub fn sha512_256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Bytes an account signs for a transaction: `"TX" || canonical(txn)`
pub fn signing_bytes(txn_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(TX_TAG.len() + txn_bytes.len());
    out.extend_from_slice(TX_TAG);
    out.extend_from_slice(txn_bytes);
    out
}

/// Raw transaction ID of a transaction map
pub fn transaction_id(txn: &Value) -> [u8; 32] {
    sha512_256(&[TX_TAG, &encode_canonical(txn)])
}

/// Group ID over an ordered list of raw transaction IDs
pub fn group_id(tx_ids: &[[u8; 32]]) -> [u8; 32] {
    let txlist = Value::Array(tx_ids.iter().map(|id| Value::Binary(id.to_vec())).collect());
    let body = Value::Map(vec![(Value::from("txlist"), txlist)]);
    sha512_256(&[GROUP_TAG, &encode_canonical(&body)])
}

/// Text form of a transaction ID (Base32, no padding)
pub fn encode_id(id: &[u8; 32]) -> String {
    BASE32_NOPAD.encode(id)
}

/// Encode a signed transaction envelope.
/// `sgnr` is only written when the authority differs from the sender.
pub fn encode_signed(txn: &Value, signature: &[u8; 64], sgnr: Option<&Address>) -> Vec<u8> {
    let mut entries = Vec::with_capacity(3);
    if let Some(authority) = sgnr {
        entries.push((Value::from("sgnr"), Value::Binary(authority.as_bytes().to_vec())));
    }
    entries.push((Value::from("sig"), Value::Binary(signature.to_vec())));
    entries.push((Value::from("txn"), txn.clone()));
    encode_canonical(&Value::Map(entries))
}
