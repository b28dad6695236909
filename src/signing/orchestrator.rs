//! Signing Orchestrator
//!
//! Runs one batch of proposals through the whole pipeline:
//! `Received -> Decoded -> Grouped -> Validated -> Signing -> PartiallySigned -> FullySigned`,
//! with `Rejected` and `Failed` as the other terminal states.
//!
//! Software signatures are computed on the blocking pool while the hardware
//! device works through its queue one transaction at a time. Results are
//! merged by index, so completion order never affects the payload.

use super::cancel::{CancelHandle, CancelSignal};
use super::compiler::{compile_payload, SignedPayload, SigningError};
use super::hardware::{DeviceLease, DeviceTransport, HardwareSignError, HardwareSignState, HardwareSigner, SharedDevice};
use super::router::{RoutedTransaction, SignerAssignment, SignerRouter};
use super::software::SoftwareSigner;
use crate::error::{PipelineError, PipelineResult};
use crate::security::PolicyValidator;
use crate::tx::{decode_batch, DecodedTransaction, GroupAssembler, RawProposal};
use crate::types::SessionContext;
use crate::utils::pipeline_config::PipelineConfig;
use crate::wallet::{Address, KeyVault};
use crate::{log_debug, log_info, log_warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Observable state of a signing session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Received,
    Decoded,
    Grouped,
    Validated,
    Rejected,
    Signing,
    PartiallySigned { signed: usize, required: usize },
    FullySigned,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Rejected | SessionState::FullySigned | SessionState::Failed
        )
    }
}

/// Long-lived entry point shared by the dApp, swap and rekey flows
pub struct SigningOrchestrator<T> {
    vault: Arc<dyn KeyVault>,
    device: SharedDevice<T>,
    config: PipelineConfig,
}

impl<T> Clone for SigningOrchestrator<T> {
    fn clone(&self) -> Self {
        Self {
            vault: Arc::clone(&self.vault),
            device: self.device.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: DeviceTransport> SigningOrchestrator<T> {
    pub fn new(vault: Arc<dyn KeyVault>, device: SharedDevice<T>, config: PipelineConfig) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::InvalidConfig)?;
        Ok(Self { vault, device, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Same vault and device, different session settings
    pub fn with_config(&self, config: PipelineConfig) -> PipelineResult<Self> {
        Self::new(Arc::clone(&self.vault), self.device.clone(), config)
    }

    /// A fresh session. Each call to `run` needs its own.
    pub fn session(&self) -> SigningSession<T> {
        let (state, _rx) = watch::channel(SessionState::Received);
        SigningSession {
            software: SoftwareSigner::new(Arc::clone(&self.vault)).with_verification(self.config.verify_signatures),
            hardware: HardwareSigner::new(self.config.hardware_timeout())
                .with_verification(self.config.verify_signatures),
            device: self.device.clone(),
            validator: PolicyValidator::from_config(&self.config),
            cancel: CancelHandle::new(),
            state,
        }
    }

    /// Run a batch in a new session without observing it
    pub async fn sign(&self, proposals: Vec<RawProposal>, context: &SessionContext) -> PipelineResult<SignedPayload> {
        self.session().run(proposals, context).await
    }
}

struct SoftwareJob {
    authority: Address,
    tx: DecodedTransaction,
}

struct HardwareJob<'a> {
    authority: Address,
    device_index: u32,
    tx: &'a DecodedTransaction,
}

/// One signing session over one batch
pub struct SigningSession<T> {
    software: SoftwareSigner,
    hardware: HardwareSigner,
    device: SharedDevice<T>,
    validator: PolicyValidator,
    cancel: CancelHandle,
    state: watch::Sender<SessionState>,
}

impl<T: DeviceTransport> SigningSession<T> {
    /// Handle the approval screen keeps to withdraw the request
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn hardware_state(&self) -> watch::Receiver<HardwareSignState> {
        self.hardware.subscribe()
    }

    fn enter(&self, state: SessionState) {
        log_debug!("orchestrator", "Session state", state = format!("{:?}", state));
        self.state.send_replace(state);
    }

    fn reject<E: Into<PipelineError>>(&self, error: E) -> PipelineError {
        let error = error.into();
        log_warn!("orchestrator", "Batch rejected", reason = error);
        self.enter(SessionState::Rejected);
        error
    }

    fn fail(&self, error: SigningError) -> PipelineError {
        log_warn!("orchestrator", "Signing failed; collected signatures discarded", error = error);
        self.enter(SessionState::Failed);
        error.into()
    }

    /// Decode, group, validate and sign `proposals`. Consumes the session;
    /// nothing from a failed or cancelled run is kept.
    pub async fn run(self, proposals: Vec<RawProposal>, context: &SessionContext) -> PipelineResult<SignedPayload> {
        self.enter(SessionState::Received);
        log_info!("orchestrator", "Signing session started", batch_size = proposals.len(), network = context.network);

        // Size is checked before decoding so a hostile batch is never parsed
        if let Err(reason) = self.validator.check_batch_size(proposals.len()) {
            return Err(self.reject(reason));
        }

        let decoded = decode_batch(proposals).map_err(|e| self.reject(e))?;
        self.enter(SessionState::Decoded);

        let groups = GroupAssembler::assemble(&decoded).map_err(|e| self.reject(e))?;
        self.enter(SessionState::Grouped);

        let accepted = self
            .validator
            .validate(&decoded, &groups, context)
            .map_err(|e| self.reject(e))?;
        self.enter(SessionState::Validated);

        let mut routed: Vec<RoutedTransaction> = Vec::with_capacity(decoded.len());
        for group in &accepted.groups {
            for route in SignerRouter::route(group, &decoded, &context.wallet) {
                if route.assignment == SignerAssignment::NotOurs {
                    return Err(self.fail(SigningError::IncompleteGroup {
                        group: group.label(),
                        index: route.index,
                    }));
                }
                routed.push(route);
            }
        }
        routed.sort_by_key(|r| r.index);

        let signatures = self.collect_signatures(&decoded, &routed).await.map_err(|e| self.fail(e))?;

        let payload =
            compile_payload(&decoded, &routed, signatures, accepted.warnings).map_err(|e| self.fail(e))?;
        self.enter(SessionState::FullySigned);
        log_info!("orchestrator", "Batch fully signed", transactions = payload.len());
        Ok(payload)
    }

    async fn collect_signatures(
        &self,
        decoded: &[DecodedTransaction],
        routed: &[RoutedTransaction],
    ) -> Result<BTreeMap<usize, Vec<u8>>, SigningError> {
        let signal = self.cancel.signal();
        if signal.is_cancelled() {
            return Err(SigningError::Cancelled);
        }

        let mut software_jobs = Vec::new();
        let mut hardware_jobs = Vec::new();
        for route in routed {
            let tx = &decoded[route.index];
            match route.assignment {
                SignerAssignment::Software(authority) => software_jobs.push(SoftwareJob { authority, tx: tx.clone() }),
                SignerAssignment::Hardware(authority, device_index) => hardware_jobs.push(HardwareJob {
                    authority,
                    device_index,
                    tx,
                }),
                SignerAssignment::NotOurs | SignerAssignment::AlreadySigned(_) => {}
            }
        }

        let required = software_jobs.len() + hardware_jobs.len();
        let progress = AtomicUsize::new(0);
        let record = |index: usize| {
            let signed = progress.fetch_add(1, Ordering::SeqCst) + 1;
            log_debug!("orchestrator", "Signature collected", index = index, signed = signed, required = required);
            if signed < required {
                self.state.send_replace(SessionState::PartiallySigned { signed, required });
            }
        };

        self.enter(SessionState::Signing);

        let mut lease = if hardware_jobs.is_empty() {
            None
        } else {
            tokio::select! {
                biased;
                _ = signal.cancelled() => return Err(SigningError::Cancelled),
                lease = self.device.acquire() => Some(lease),
            }
        };

        let outcome = tokio::try_join!(
            self.sign_software(software_jobs, &signal, &record),
            self.sign_hardware(&hardware_jobs, lease.as_mut(), &signal, &record),
        );

        if let Some(lease) = lease {
            lease.release().await;
        }

        let (software, hardware) = outcome?;
        Ok(software.into_iter().chain(hardware).collect())
    }

    async fn sign_software(
        &self,
        jobs: Vec<SoftwareJob>,
        signal: &CancelSignal,
        record: &(dyn Fn(usize) + Sync),
    ) -> Result<Vec<(usize, Vec<u8>)>, SigningError> {
        let mut set = JoinSet::new();
        for job in jobs {
            let signer = self.software.clone();
            set.spawn_blocking(move || (job.tx.index, signer.sign(&job.authority, &job.tx)));
        }

        let mut signed = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = signal.cancelled() => return Err(SigningError::Cancelled),
                next = set.join_next() => match next {
                    None => break,
                    Some(Ok((index, Ok(bytes)))) => {
                        record(index);
                        signed.push((index, bytes));
                    }
                    Some(Ok((index, Err(source)))) => return Err(SigningError::Software { index, source }),
                    Some(Err(join_error)) => return Err(SigningError::Internal(join_error.to_string())),
                },
            }
        }
        Ok(signed)
    }

    async fn sign_hardware(
        &self,
        jobs: &[HardwareJob<'_>],
        lease: Option<&mut DeviceLease<T>>,
        signal: &CancelSignal,
        record: &(dyn Fn(usize) + Sync),
    ) -> Result<Vec<(usize, Vec<u8>)>, SigningError> {
        let mut signed = Vec::with_capacity(jobs.len());
        let Some(lease) = lease else {
            return Ok(signed);
        };

        for job in jobs {
            let index = job.tx.index;
            let bytes = self
                .hardware
                .sign(lease, &job.authority, job.device_index, job.tx, signal)
                .await
                .map_err(|source| match source {
                    HardwareSignError::Cancelled => SigningError::Cancelled,
                    source => SigningError::Hardware { index, source },
                })?;
            record(index);
            signed.push((index, bytes));
        }
        Ok(signed)
    }
}
