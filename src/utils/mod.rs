//! Utilities Module
//!
//! Logging and session configuration shared across the crate.

pub mod logging;
pub mod pipeline_config;

pub use pipeline_config::*;
