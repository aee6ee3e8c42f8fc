//! # Custom Resource Definitions
//!
//! CRD types for the Terraform outputs controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `TerraformOutputs` specification, target and default values
//! - `backend.rs` - Backend wire form and the typed `BackendDescriptor`
//! - `status.rs` - Status types for tracking sync state

mod backend;
mod spec;
mod status;

pub use backend::{BackendDescriptor, BackendSpec, BackendSpecError, S3Spec};
pub use spec::{
    default_sync_interval, default_target_namespace, TargetSpec, TerraformOutputs,
    TerraformOutputsSpec,
};
pub use status::{Condition, SyncPhase, TerraformOutputsStatus, READY_CONDITION};
