//! Signing Module
//!
//! Everything after the policy gate:
//! 1. Route each transaction to a signer backend
//! 2. Sign locally (software) or on the external device (hardware)
//! 3. Compile signatures back into the original proposal order
//!
//! The orchestrator sequences the whole pipeline for one session.

pub mod cancel;
pub mod compiler;
pub mod hardware;
pub mod orchestrator;
pub mod router;
pub mod software;

pub use cancel::{CancelHandle, CancelSignal};
pub use compiler::{
    compile_payload, signed_envelope, SignatureOrigin, SignedPayload, SignedTransaction,
    SigningError,
};
pub use hardware::{
    DeviceLease, DeviceTransport, HardwareSignError, HardwareSignState, HardwareSigner, SharedDevice,
    TransportError,
};
pub use orchestrator::{SessionState, SigningOrchestrator, SigningSession};
pub use router::{is_wallet_signable, signing_authority, RoutedTransaction, SignerAssignment, SignerRouter};
pub use software::{SignError, SoftwareSigner};
