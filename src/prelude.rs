//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use tfout_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (`TerraformOutputs`, `BackendSpec`, etc.)
//! - The backend and cluster store seams
//! - Reconciler types (`Reconciler`, `ReconcilerError`, etc.)
//! - Controller configuration

// CRD types - most commonly used
pub use crate::crd::*;

// Seams - needed for alternative backends and test doubles
pub use crate::backend::{BackendFetcher, FetchError, OutputEntry, S3Fetcher, Snapshot};
pub use crate::store::{ClusterStore, KubeStore, ObjectKey, StoreError};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, DeclaredSensitivity, ReconcileOutcome, Reconciler, ReconcilerError,
    SensitiveKeyAllowList, SensitivityPolicy, SyncError,
};

// Config types
pub use crate::config::{ControllerConfig, LogFormat, SensitivityPolicyKind};

pub use crate::observability::SyncMetrics;
