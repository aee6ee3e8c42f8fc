//! # Types
//!
//! Core types for the reconciler.

use super::artifacts::ArtifactKind;
use super::classify::{policy_from_config, SensitivityPolicy};
use crate::backend::{BackendFetcher, FetchError, S3Fetcher};
use crate::config::ControllerConfig;
use crate::crd::BackendSpecError;
use crate::observability::SyncMetrics;
use crate::store::{ClusterStore, KubeStore, ObjectKey, StoreError};
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure of one synchronization pass
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The resource was deleted; ends the pass silently
    #[error("resource not found")]
    NotFound,
    #[error("backend {index} unavailable: {message}")]
    BackendUnavailable { index: usize, message: String },
    #[error("backend {index} returned a malformed snapshot: {message}")]
    MalformedSnapshot { index: usize, message: String },
    #[error("backend {index}: {source}")]
    UnsupportedBackendKind {
        index: usize,
        #[source]
        source: BackendSpecError,
    },
    #[error("no backends configured")]
    NoBackends,
    #[error("write conflict persisted after {attempts} attempts")]
    WriteConflict { attempts: u32 },
    #[error("failed to sync {kind} {key}: {message}")]
    ArtifactSyncFailure {
        kind: ArtifactKind,
        key: ObjectKey,
        message: String,
    },
    #[error("store error: {0}")]
    Store(String),
    #[error("reconciliation cancelled")]
    Cancelled,
    #[error("reconciliation exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

impl SyncError {
    /// Tag a backend failure with the index of the offending backend
    #[must_use]
    pub fn from_fetch(index: usize, error: FetchError) -> Self {
        match error {
            FetchError::Unavailable(message) => SyncError::BackendUnavailable { index, message },
            FetchError::Malformed(message) => SyncError::MalformedSnapshot { index, message },
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => SyncError::NotFound,
            StoreError::Conflict(message) | StoreError::Other(message) => SyncError::Store(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// A pass failed; the controller requeues after `requeue_after`
    #[error("Reconciliation failed: {source}")]
    ReconciliationFailed {
        #[source]
        source: SyncError,
        requeue_after: Duration,
    },
}

impl ReconcilerError {
    #[must_use]
    pub fn requeue_after(&self) -> Duration {
        match self {
            ReconcilerError::ReconciliationFailed { requeue_after, .. } => *requeue_after,
        }
    }

    #[must_use]
    pub fn sync_error(&self) -> &SyncError {
        match self {
            ReconcilerError::ReconciliationFailed { source, .. } => source,
        }
    }
}

/// How a pass that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The resource no longer exists
    Deleted,
    /// The sync interval has not elapsed yet; requeue for the remainder
    SkipWait(Duration),
    /// No backend fingerprint changed
    SkipNoChange(Duration),
    /// Outputs were written to the target ConfigMap/Secret
    Synced {
        outputs: usize,
        forced: bool,
        requeue_after: Duration,
    },
}

impl ReconcileOutcome {
    /// Delay before the next pass, if one should be scheduled
    #[must_use]
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            ReconcileOutcome::Deleted => None,
            ReconcileOutcome::SkipWait(d) | ReconcileOutcome::SkipNoChange(d) => Some(*d),
            ReconcileOutcome::Synced { requeue_after, .. } => Some(*requeue_after),
        }
    }
}

/// Shared reconciler context
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ClusterStore>,
    pub fetcher: Arc<dyn BackendFetcher>,
    pub policy: Arc<dyn SensitivityPolicy>,
    pub metrics: Arc<SyncMetrics>,
    pub config: ControllerConfig,
    /// Cancelled on shutdown; aborts the in-flight pass
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("policy", &self.policy.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        fetcher: Arc<dyn BackendFetcher>,
        metrics: Arc<SyncMetrics>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            policy: policy_from_config(&config),
            metrics,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Reconciler wired to the cluster and to S3
    pub fn for_cluster(client: Client, config: ControllerConfig) -> Result<Self> {
        let metrics = Arc::new(SyncMetrics::new().context("Failed to register metrics")?);
        Ok(Self::new(
            Arc::new(KubeStore::new(client)),
            Arc::new(S3Fetcher::new(Arc::clone(&metrics))),
            metrics,
            config,
        ))
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn SensitivityPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
