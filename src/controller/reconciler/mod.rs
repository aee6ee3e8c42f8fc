//! # Reconciler
//!
//! Core reconciliation logic for `TerraformOutputs` resources.
//!
//! The reconciler:
//! - Detects backend changes through S3 ETags stored as annotations
//! - Fetches and merges Terraform outputs from every backend
//! - Splits outputs into a ConfigMap and a Secret by sensitivity
//! - Keeps the resource status up to date with conflict-safe writes
//!
//! See [`reconcile`] for the pass itself.

pub mod artifacts;
pub mod changes;
pub mod classify;
pub mod interval;
pub mod merge;
pub mod reconcile;
pub mod status;
pub mod types;

pub use classify::{DeclaredSensitivity, SensitiveKeyAllowList, SensitivityPolicy};
pub use reconcile::reconcile;
pub use types::{ReconcileOutcome, Reconciler, ReconcilerError, SyncError};
