//! Unified error types for the signing pipeline
//!
//! Every stage has its own error enum; they all flow into `PipelineError`
//! for consistent handling and FFI-safe error reporting.

use crate::security::RejectionReason;
use crate::signing::{HardwareSignError, SignError, SigningError};
use crate::tx::{DecodeError, GroupError};
use serde::{Deserialize, Serialize};

/// Terminal outcome of a session that did not produce a payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Rejected(#[from] RejectionReason),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PipelineError::Decode(DecodeError::Malformed { .. }) => ErrorCode::MalformedTransaction,
            PipelineError::Decode(DecodeError::UnsupportedKind { .. }) => ErrorCode::UnsupportedTransaction,

            PipelineError::Group(GroupError::InconsistentGrouping { .. }) => ErrorCode::InconsistentGroup,
            PipelineError::Group(GroupError::GroupTooLarge { .. }) => ErrorCode::GroupTooLarge,

            PipelineError::Rejected(reason) => match reason {
                RejectionReason::EmptyBatch => ErrorCode::EmptyBatch,
                RejectionReason::BatchTooLarge { .. } => ErrorCode::BatchTooLarge,
                RejectionReason::NetworkMismatch { .. } => ErrorCode::NetworkMismatch,
                RejectionReason::InvalidAddress { .. } => ErrorCode::InvalidAddress,
                RejectionReason::AuthAddressMismatch { .. } => ErrorCode::AuthAddressMismatch,
                RejectionReason::MultisigUnsupported { .. } => ErrorCode::MultisigUnsupported,
                RejectionReason::RekeyNotAllowed { .. } => ErrorCode::RekeyNotAllowed,
                RejectionReason::CloseToNotAllowed { .. } => ErrorCode::CloseToNotAllowed,
                RejectionReason::UnsignableTransaction { .. } => ErrorCode::UnsignableTransaction,
                RejectionReason::NoSignableMember { .. } => ErrorCode::NoSignableMember,
            },

            PipelineError::Signing(error) => match error {
                SigningError::IncompleteGroup { .. } => ErrorCode::IncompleteGroup,
                SigningError::Software { source, .. } => match source {
                    SignError::VaultUnavailable(_) => ErrorCode::VaultUnavailable,
                    SignError::KeyNotFound(_) => ErrorCode::KeyNotFound,
                    SignError::KeyMismatch(_) => ErrorCode::KeyMismatch,
                },
                SigningError::Hardware { source, .. } => match source {
                    HardwareSignError::UserRejected => ErrorCode::UserRejected,
                    HardwareSignError::ConnectionFailed(_) => ErrorCode::ConnectionFailed,
                    HardwareSignError::ConnectionLost(_) => ErrorCode::ConnectionLost,
                    HardwareSignError::TimedOut => ErrorCode::Timeout,
                    HardwareSignError::Cancelled => ErrorCode::Cancelled,
                    HardwareSignError::DeviceError(_)
                    | HardwareSignError::InvalidResponse(_)
                    | HardwareSignError::InvalidSignature => ErrorCode::DeviceError,
                },
                SigningError::Cancelled => ErrorCode::Cancelled,
                SigningError::MissingSignature { .. } | SigningError::Internal(_) => ErrorCode::Internal,
            },

            PipelineError::InvalidConfig(_) => ErrorCode::InvalidConfig,
        }
    }

    /// Only transient hardware transport failures qualify. A retry always
    /// starts a new session from the raw proposals.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Signing(error) => error.is_retryable(),
            _ => false,
        }
    }

    /// Index of the transaction the error points at, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            PipelineError::Decode(e) => Some(e.index()),
            PipelineError::Group(_) | PipelineError::InvalidConfig(_) => None,
            PipelineError::Rejected(reason) => reason.index(),
            PipelineError::Signing(error) => error.index(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            retryable: self.is_retryable(),
            index: self.index(),
        }
    }
}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Input errors
    MalformedTransaction,
    UnsupportedTransaction,
    InconsistentGroup,
    GroupTooLarge,
    InvalidInput,

    // Policy rejections
    EmptyBatch,
    BatchTooLarge,
    NetworkMismatch,
    InvalidAddress,
    AuthAddressMismatch,
    MultisigUnsupported,
    RekeyNotAllowed,
    CloseToNotAllowed,
    UnsignableTransaction,
    NoSignableMember,

    // Signing errors
    IncompleteGroup,
    VaultUnavailable,
    KeyNotFound,
    KeyMismatch,
    UserRejected,
    ConnectionFailed,
    ConnectionLost,
    Timeout,
    Cancelled,
    DeviceError,

    // Internal
    InvalidConfig,
    JsonError,
    Internal,
}

/// Serializable error body for JSON surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: false,
            index: None,
        }
    }
}

impl From<&PipelineError> for ErrorReport {
    fn from(e: &PipelineError) -> Self {
        e.report()
    }
}

impl From<serde_json::Error> for ErrorReport {
    fn from(e: serde_json::Error) -> Self {
        ErrorReport::new(ErrorCode::JsonError, e.to_string())
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
