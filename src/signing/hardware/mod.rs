//! Hardware Signer
//!
//! Drives one signing conversation with the external device:
//! `Idle -> Connecting -> AwaitingDeviceConfirmation -> Signed | Failed | TimedOut | Cancelled`.
//!
//! - A watchdog bounds the attempt from the start of `Connecting`
//! - The caller's `CancelSignal` interrupts any non-terminal state
//! - The transport is disconnected after every attempt, whatever the outcome
//! - State is published on a watch channel for the approval screen

pub mod apdu;
pub mod device;

pub use device::{DeviceLease, DeviceTransport, SharedDevice, TransportError};

use crate::signing::cancel::CancelSignal;
use crate::signing::compiler::signed_envelope;
use crate::tx::DecodedTransaction;
use crate::wallet::Address;
use crate::{log_debug, log_info, log_warn};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;

/// Per-transaction hardware signing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareSignError {
    #[error("Signature rejected on the device")]
    UserRejected,

    #[error("Could not connect to the hardware device: {0}")]
    ConnectionFailed(String),

    #[error("Connection to the hardware device was lost: {0}")]
    ConnectionLost(String),

    #[error("Hardware device did not respond in time")]
    TimedOut,

    #[error("Hardware signing was cancelled")]
    Cancelled,

    #[error("Hardware device returned status 0x{0:04x}")]
    DeviceError(u16),

    #[error("Invalid response from hardware device: {0}")]
    InvalidResponse(String),

    #[error("Hardware device returned a signature that does not verify for the signing account")]
    InvalidSignature,
}

impl HardwareSignError {
    /// Transient transport conditions; the user may start a new session
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HardwareSignError::ConnectionFailed(_)
                | HardwareSignError::ConnectionLost(_)
                | HardwareSignError::TimedOut
        )
    }
}

/// Observable state of the current hardware attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HardwareSignState {
    Idle,
    Connecting { index: usize },
    AwaitingDeviceConfirmation { index: usize },
    Signed { index: usize },
    Failed { index: usize, reason: String },
    TimedOut { index: usize },
    Cancelled { index: usize },
}

impl HardwareSignState {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            HardwareSignState::Idle
                | HardwareSignState::Connecting { .. }
                | HardwareSignState::AwaitingDeviceConfirmation { .. }
        )
    }
}

pub struct HardwareSigner {
    timeout: Duration,
    verify_signatures: bool,
    state: watch::Sender<HardwareSignState>,
}

impl HardwareSigner {
    pub fn new(timeout: Duration) -> Self {
        let (state, _rx) = watch::channel(HardwareSignState::Idle);
        Self {
            timeout,
            verify_signatures: true,
            state,
        }
    }

    pub fn with_verification(mut self, verify_signatures: bool) -> Self {
        self.verify_signatures = verify_signatures;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<HardwareSignState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> HardwareSignState {
        self.state.borrow().clone()
    }

    /// Sign `tx` on the device account `device_index`, which must hold the
    /// key for `authority`. Returns the signed transaction envelope.
    pub async fn sign<T: DeviceTransport>(
        &self,
        lease: &mut DeviceLease<T>,
        authority: &Address,
        device_index: u32,
        tx: &DecodedTransaction,
        cancel: &CancelSignal,
    ) -> Result<Vec<u8>, HardwareSignError> {
        let index = tx.index;
        self.state.send_replace(HardwareSignState::Connecting { index });
        let guard = AttemptGuard::new(&self.state, index);
        log_debug!("hardware", "Connecting to device", index = index, device_index = device_index);

        let outcome = {
            let attempt = self.converse(lease.transport(), authority, device_index, tx);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(HardwareSignError::Cancelled),
                result = tokio::time::timeout(self.timeout, attempt) => {
                    result.unwrap_or(Err(HardwareSignError::TimedOut))
                }
            }
        };

        lease.transport().disconnect().await;

        let terminal = match &outcome {
            Ok(_) => HardwareSignState::Signed { index },
            Err(HardwareSignError::TimedOut) => HardwareSignState::TimedOut { index },
            Err(HardwareSignError::Cancelled) => HardwareSignState::Cancelled { index },
            Err(e) => HardwareSignState::Failed {
                index,
                reason: e.to_string(),
            },
        };
        guard.settle(terminal);

        match &outcome {
            Ok(_) => log_info!("hardware", "Device signed transaction", index = index, tx_id = tx.tx_id_string()),
            Err(e) => log_warn!("hardware", "Device signing failed", index = index, error = e),
        }
        outcome
    }

    async fn converse<T: DeviceTransport>(
        &self,
        transport: &mut T,
        authority: &Address,
        device_index: u32,
        tx: &DecodedTransaction,
    ) -> Result<Vec<u8>, HardwareSignError> {
        transport
            .connect()
            .await
            .map_err(|e| HardwareSignError::ConnectionFailed(e.to_string()))?;

        self.state
            .send_replace(HardwareSignState::AwaitingDeviceConfirmation { index: tx.index });

        let frames = apdu::sign_frames(device_index, &tx.txn_bytes());
        let mut last_response = Vec::new();
        for frame in &frames {
            transport.send_frame(frame).await.map_err(connection_lost)?;
            last_response = transport.receive_frame().await.map_err(connection_lost)?;
            apdu::parse_response(&last_response)?;
        }

        let signature = apdu::parse_signature(&last_response)?;
        if self.verify_signatures && !authority.verify(&tx.signing_bytes(), &signature) {
            return Err(HardwareSignError::InvalidSignature);
        }
        Ok(signed_envelope(tx, authority, &signature))
    }
}

/// Ends an attempt in `Cancelled` when its future is dropped before it
/// publishes a terminal state, e.g. when a sibling signing task fails.
struct AttemptGuard<'a> {
    state: &'a watch::Sender<HardwareSignState>,
    index: usize,
    settled: bool,
}

impl<'a> AttemptGuard<'a> {
    fn new(state: &'a watch::Sender<HardwareSignState>, index: usize) -> Self {
        Self {
            state,
            index,
            settled: false,
        }
    }

    fn settle(mut self, terminal: HardwareSignState) {
        self.settled = true;
        self.state.send_replace(terminal);
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.state.send_replace(HardwareSignState::Cancelled { index: self.index });
            log_debug!("hardware", "Device attempt abandoned", index = self.index);
        }
    }
}

fn connection_lost(error: TransportError) -> HardwareSignError {
    HardwareSignError::ConnectionLost(error.to_string())
}
