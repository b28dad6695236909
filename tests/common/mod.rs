//! Shared fixtures for integration tests: transaction builders, an
//! emulated Ledger Algorand app and a vault with per-key latency.

#![allow(dead_code)]

use algo_signing_pipeline::signing::hardware::apdu;
use algo_signing_pipeline::tx::codec;
use algo_signing_pipeline::wallet::VaultError;
use algo_signing_pipeline::{Address, DeviceTransport, InMemoryVault, KeyVault, Network, RawProposal};
use algo_signing_pipeline::signing::TransportError;
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rmpv::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Transaction builders
// =============================================================================

pub fn payment(sender: &Address, receiver: &Address, amount: u64, network: &Network) -> Value {
    Value::Map(vec![
        (Value::from("type"), Value::from("pay")),
        (Value::from("snd"), Value::Binary(sender.as_bytes().to_vec())),
        (Value::from("rcv"), Value::Binary(receiver.as_bytes().to_vec())),
        (Value::from("amt"), Value::from(amount)),
        (Value::from("fee"), Value::from(1000u64)),
        (Value::from("fv"), Value::from(30_000_000u64)),
        (Value::from("lv"), Value::from(30_001_000u64)),
        (Value::from("gen"), Value::from(network.genesis_id.as_str())),
        (Value::from("gh"), Value::Binary(network.genesis_hash.to_vec())),
    ])
}

/// Copy of `txn` with `key` set to `value`
pub fn with_field(txn: Value, key: &str, value: Value) -> Value {
    match codec::without_key(&txn, key) {
        Value::Map(mut entries) => {
            entries.push((Value::from(key), value));
            Value::Map(entries)
        }
        other => other,
    }
}

pub fn with_address(txn: Value, key: &str, address: &Address) -> Value {
    with_field(txn, key, Value::Binary(address.as_bytes().to_vec()))
}

/// Envelope carrying an existing single signature
pub fn presigned(txn: &Value, key: &SigningKey) -> Value {
    let message = codec::signing_bytes(&codec::encode_canonical(txn));
    Value::Map(vec![
        (Value::from("sig"), Value::Binary(key.sign(&message).to_bytes().to_vec())),
        (Value::from("txn"), txn.clone()),
    ])
}

/// Envelope carrying a multisig
pub fn multisig(txn: &Value) -> Value {
    Value::Map(vec![
        (
            Value::from("msig"),
            Value::Map(vec![
                (Value::from("thr"), Value::from(2u64)),
                (Value::from("v"), Value::from(1u64)),
            ]),
        ),
        (Value::from("txn"), txn.clone()),
    ])
}

pub fn proposals(values: &[Value]) -> Vec<RawProposal> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| RawProposal::new(index, codec::encode_canonical(value)))
        .collect()
}

pub fn key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn address_of(key: &SigningKey) -> Address {
    Address::from_bytes(key.verifying_key().to_bytes())
}

/// Signature carried by a signed envelope
pub fn envelope_signature(bytes: &[u8]) -> [u8; 64] {
    let envelope = codec::read_single(bytes).expect("envelope decodes");
    match codec::map_get(&envelope, "sig") {
        Some(Value::Binary(sig)) => sig.as_slice().try_into().expect("64-byte signature"),
        other => panic!("missing sig: {:?}", other),
    }
}

pub fn envelope_txn(bytes: &[u8]) -> Value {
    let envelope = codec::read_single(bytes).expect("envelope decodes");
    codec::map_get(&envelope, "txn").cloned().expect("txn present")
}

// =============================================================================
// Emulated Ledger
// =============================================================================

/// Knobs and counters shared between a test and its `MockLedger`
#[derive(Default)]
pub struct LedgerControl {
    pub hang: AtomicBool,
    pub reject: AtomicBool,
    pub drop_connection: AtomicBool,
    pub connected: AtomicBool,
    pub connects: AtomicUsize,
    pub signed: AtomicUsize,
}

impl LedgerControl {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn signed(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }
}

/// Speaks the Algorand app's msgpack signing protocol with one key per
/// account index
pub struct MockLedger {
    accounts: HashMap<u32, SigningKey>,
    control: Arc<LedgerControl>,
    buffer: Vec<u8>,
    pending: Option<Vec<u8>>,
}

impl MockLedger {
    pub fn new(accounts: Vec<(u32, SigningKey)>) -> (Self, Arc<LedgerControl>) {
        let control = Arc::new(LedgerControl::default());
        let ledger = Self {
            accounts: accounts.into_iter().collect(),
            control: Arc::clone(&control),
            buffer: Vec::new(),
            pending: None,
        };
        (ledger, control)
    }

    fn finish(&mut self) -> Vec<u8> {
        if self.control.reject.load(Ordering::SeqCst) {
            return SW_USER_REJECTED.to_vec();
        }
        let account = u32::from_be_bytes([self.buffer[0], self.buffer[1], self.buffer[2], self.buffer[3]]);
        let Some(key) = self.accounts.get(&account) else {
            return vec![0x6a, 0x80];
        };
        let message = codec::signing_bytes(&self.buffer[4..]);
        let mut response = key.sign(&message).to_bytes().to_vec();
        response.extend_from_slice(&SW_OK);
        self.control.signed.fetch_add(1, Ordering::SeqCst);
        response
    }
}

const SW_OK: [u8; 2] = [0x90, 0x00];
const SW_USER_REJECTED: [u8; 2] = [0x69, 0x85];

#[async_trait]
impl DeviceTransport for MockLedger {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.control.connects.fetch_add(1, Ordering::SeqCst);
        self.control.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.control.drop_connection.load(Ordering::SeqCst) {
            self.control.connected.store(false, Ordering::SeqCst);
            return Err(TransportError::Disconnected("link lost".to_string()));
        }
        assert_eq!(frame[0], apdu::CLA);
        assert_eq!(frame[1], apdu::INS_SIGN_MSGPACK);
        assert_eq!(frame[4] as usize, frame.len() - 5);

        if frame[2] == apdu::P1_FIRST {
            self.buffer.clear();
        }
        self.buffer.extend_from_slice(&frame[5..]);
        self.pending = Some(if frame[3] == apdu::P2_MORE {
            SW_OK.to_vec()
        } else {
            self.finish()
        });
        Ok(())
    }

    async fn receive_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.control.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.pending
            .take()
            .ok_or_else(|| TransportError::Io("no response pending".to_string()))
    }

    async fn disconnect(&mut self) {
        self.control.connected.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Vaults
// =============================================================================

/// In-memory vault where some keys take longer to sign with
pub struct DelayedVault {
    inner: InMemoryVault,
    delays: HashMap<Address, Duration>,
}

impl DelayedVault {
    pub fn new(inner: InMemoryVault) -> Self {
        Self {
            inner,
            delays: HashMap::new(),
        }
    }

    pub fn with_delay(mut self, address: Address, delay: Duration) -> Self {
        self.delays.insert(address, delay);
        self
    }
}

impl KeyVault for DelayedVault {
    fn sign(&self, address: &Address, message: &[u8]) -> Result<[u8; 64], VaultError> {
        if let Some(delay) = self.delays.get(address) {
            std::thread::sleep(*delay);
        }
        self.inner.sign(address, message)
    }
}
