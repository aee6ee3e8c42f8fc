//! # Configuration
//!
//! Controller-level settings loaded from environment variables.

mod controller;

pub use controller::{ControllerConfig, LogFormat, SensitivityPolicyKind};
