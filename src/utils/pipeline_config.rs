//! Pipeline Configuration
//!
//! Per-call-site settings for a signing session:
//! - Presets for dApp approval, swap execution and rekey execution
//! - Dangerous field policies (reject or warn)
//! - Batch and hardware watchdog limits
//! - Validation of nonsensical values

use crate::tx::MAX_GROUP_SIZE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which flow the session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSite {
    DappApproval,
    Swap,
    Rekey,
    Custom,
}

/// What the policy gate does with a dangerous field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerousFieldPolicy {
    /// Reject the whole batch
    Reject,
    /// Accept, attaching a warning the caller must show
    Warn,
}

/// Settings for one signing session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub call_site: CallSite,

    /// Largest batch accepted from a peer
    pub max_batch_size: usize,

    /// Watchdog for one hardware signing attempt, connect through confirmation
    pub hardware_timeout_secs: u64,

    pub rekey_policy: DangerousFieldPolicy,
    pub close_to_policy: DangerousFieldPolicy,

    /// Check every produced signature against the authority's public key
    pub verify_signatures: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::dapp()
    }
}

impl PipelineConfig {
    /// dApp request approval
    pub fn dapp() -> Self {
        Self {
            call_site: CallSite::DappApproval,
            max_batch_size: 64,
            hardware_timeout_secs: 60,
            rekey_policy: DangerousFieldPolicy::Reject,
            close_to_policy: DangerousFieldPolicy::Reject,
            verify_signatures: true,
        }
    }

    /// Swap quote execution
    pub fn swap() -> Self {
        Self {
            call_site: CallSite::Swap,
            max_batch_size: MAX_GROUP_SIZE,
            ..Self::dapp()
        }
    }

    /// Rekey execution. The rekey itself is the point of the flow, so it
    /// only warns.
    pub fn rekey() -> Self {
        Self {
            call_site: CallSite::Rekey,
            max_batch_size: MAX_GROUP_SIZE,
            rekey_policy: DangerousFieldPolicy::Warn,
            ..Self::dapp()
        }
    }

    pub fn for_call_site(call_site: CallSite) -> Self {
        match call_site {
            CallSite::DappApproval => Self::dapp(),
            CallSite::Swap => Self::swap(),
            CallSite::Rekey => Self::rekey(),
            CallSite::Custom => Self {
                call_site: CallSite::Custom,
                ..Self::dapp()
            },
        }
    }

    pub fn hardware_timeout(&self) -> Duration {
        Duration::from_secs(self.hardware_timeout_secs)
    }

    pub fn with_hardware_timeout(mut self, timeout: Duration) -> Self {
        self.hardware_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_rekey_policy(mut self, policy: DangerousFieldPolicy) -> Self {
        self.rekey_policy = policy;
        self
    }

    pub fn with_close_to_policy(mut self, policy: DangerousFieldPolicy) -> Self {
        self.close_to_policy = policy;
        self
    }

    /// Reject settings that cannot describe a working session
    pub fn validate(&self) -> Result<(), String> {
        if self.max_batch_size == 0 {
            return Err("max_batch_size must be at least 1".to_string());
        }
        if self.hardware_timeout_secs == 0 {
            return Err("hardware_timeout_secs must be at least 1".to_string());
        }
        if self.hardware_timeout_secs > 10 * 60 {
            return Err(format!(
                "hardware_timeout_secs of {} exceeds the 600 second limit",
                self.hardware_timeout_secs
            ));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(json).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }
}
