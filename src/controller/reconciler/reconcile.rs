//! # Reconciliation Logic
//!
//! One pass over a `TerraformOutputs` resource:
//!
//! 1. Load the resource; a deleted resource ends the pass
//! 2. Resolve the sync interval (5m when missing or invalid)
//! 3. Force a sync when a configured ConfigMap/Secret is missing or foreign-owned
//! 4. Otherwise skip while the interval has not elapsed, or when no backend ETag changed
//! 5. Mark the resource `InProgress`
//! 6. Fetch and merge all backends
//! 7. Classify outputs and upsert the ConfigMap and Secret
//! 8. Mark the resource `Success` and persist fresh ETags (unless forced)
//! 9. Requeue after the sync interval
//!
//! Every failure after step 2 is written to the status as `Failed` before the
//! error is returned.

use super::artifacts::{should_force_sync, upsert_artifact, ArtifactKind};
use super::changes::{apply_fingerprints, has_changed, measure};
use super::classify::classify;
use super::interval::sync_interval;
use super::merge::merge_all;
use super::status::{update_with_retry, RetryPolicy, UpdateScope};
use super::types::{ReconcileOutcome, Reconciler, ReconcilerError, SyncError};
use crate::constants::KIND;
use crate::crd::{BackendDescriptor, SyncPhase, TerraformOutputs};
use crate::observability::metrics::{RESULT_ERROR, RESULT_SUCCESS};
use crate::store::ObjectKey;
use chrono::Utc;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn, Instrument};

/// Entry point for the kube-runtime controller
pub async fn reconcile(
    resource: Arc<TerraformOutputs>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::new(
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
    );
    match ctx.reconcile_once(&key).await? {
        ReconcileOutcome::Deleted => Ok(Action::await_change()),
        outcome => Ok(outcome
            .requeue_after()
            .map_or_else(Action::await_change, Action::requeue)),
    }
}

impl Reconciler {
    /// Run one pass under the cancellation token and the configured deadline
    pub async fn reconcile_once(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcilerError> {
        let span = info_span!(
            "reconcile",
            resource.name = %key.name,
            resource.namespace = %key.namespace,
            resource.kind = KIND
        );

        let started = Instant::now();
        let deadline = self.config.reconcile_timeout();
        let interrupted = |source| ReconcilerError::ReconciliationFailed {
            source,
            requeue_after: self.config.reconciliation_error_requeue_duration(),
        };

        let result = tokio::select! {
            () = self.cancel.cancelled() => Err(interrupted(SyncError::Cancelled)),
            timed = tokio::time::timeout(deadline, self.run_pass(key).instrument(span.clone())) => {
                timed.unwrap_or_else(|_| Err(interrupted(SyncError::DeadlineExceeded(deadline))))
            }
        };

        // The aborted pass may have left InProgress behind
        if let Err(e) = &result {
            if matches!(
                e.sync_error(),
                SyncError::Cancelled | SyncError::DeadlineExceeded(_)
            ) {
                let message = format!("Reconciliation interrupted: {}", e.sync_error());
                let marked =
                    tokio::time::timeout(deadline, self.mark_failed(key, message)).instrument(span.clone());
                if marked.await.is_err() {
                    warn!(resource = %key, "Timed out marking interrupted reconciliation as Failed");
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        let _guard = span.enter();
        match &result {
            Ok(outcome) => {
                self.metrics
                    .record_reconcile(&key.namespace, &key.name, RESULT_SUCCESS, elapsed);
                info!(outcome = ?outcome, duration_secs = elapsed, "Reconciliation finished");
            }
            Err(e) => {
                self.metrics
                    .record_reconcile(&key.namespace, &key.name, RESULT_ERROR, elapsed);
                warn!(error = %e, duration_secs = elapsed, "Reconciliation failed");
            }
        }
        result
    }

    async fn run_pass(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcilerError> {
        let resource = match self.store.get_outputs(key).await {
            Ok(resource) => resource,
            Err(crate::store::StoreError::NotFound) => {
                info!("TerraformOutputs resource not found, ignoring since it must have been deleted");
                return Ok(ReconcileOutcome::Deleted);
            }
            Err(e) => {
                return Err(ReconcilerError::ReconciliationFailed {
                    source: e.into(),
                    requeue_after: self.config.reconciliation_error_requeue_duration(),
                });
            }
        };

        let interval = sync_interval(&resource.spec.sync_interval);
        match self.sync(key, &resource, interval).await {
            Ok(outcome) => Ok(outcome),
            Err(SyncError::NotFound) => {
                info!("TerraformOutputs resource deleted during reconciliation");
                Ok(ReconcileOutcome::Deleted)
            }
            Err(source) => Err(ReconcilerError::ReconciliationFailed {
                source,
                requeue_after: interval,
            }),
        }
    }

    async fn sync(
        &self,
        key: &ObjectKey,
        resource: &TerraformOutputs,
        interval: Duration,
    ) -> Result<ReconcileOutcome, SyncError> {
        let backends = match resolve_backends(resource) {
            Ok(backends) => backends,
            Err(e) => {
                self.mark_failed(key, format!("Invalid backend configuration: {e}"))
                    .await;
                return Err(e);
            }
        };

        let forced = should_force_sync(self.store.as_ref(), resource).await;

        if forced {
            info!("Force sync triggered due to missing ConfigMap/Secret resources");
        } else {
            if let Some(last_sync) = resource.status.as_ref().and_then(|s| s.last_sync()) {
                let elapsed = (Utc::now() - last_sync).to_std().unwrap_or(Duration::ZERO);
                if elapsed < interval {
                    let wait = interval - elapsed;
                    info!(
                        since_last_sync_secs = elapsed.as_secs(),
                        sync_interval_secs = interval.as_secs(),
                        "Sync interval not reached, skipping"
                    );
                    return Ok(ReconcileOutcome::SkipWait(wait));
                }
            }

            let annotations = resource.annotations();
            match has_changed(self.fetcher.as_ref(), annotations, &backends).await {
                Ok((false, _)) => {
                    info!("No backend changes detected, skipping sync");
                    return Ok(ReconcileOutcome::SkipNoChange(interval));
                }
                Ok((true, _)) => info!("Backend changes detected, processing updates"),
                Err(e) => {
                    self.mark_failed(key, format!("Failed to check backend changes: {e}"))
                        .await;
                    return Err(e);
                }
            }
        }

        let in_progress = if forced {
            "Recreating missing resources"
        } else {
            "Fetching Terraform outputs"
        };
        if let Err(e) = self
            .set_phase(key, SyncPhase::InProgress, in_progress.to_string())
            .await
        {
            return Err(self.fail_with(key, "Failed to update status", e).await);
        }

        let merged = match merge_all(
            self.fetcher.as_ref(),
            &self.metrics,
            key,
            &backends,
        )
        .await
        {
            Ok(merged) => merged,
            Err(e) => {
                self.mark_failed(key, format!("Failed to fetch outputs: {e}"))
                    .await;
                return Err(e);
            }
        };

        let classified = classify(&merged, self.policy.as_ref());
        info!(
            sensitive = classified.sensitive.len(),
            non_sensitive = classified.non_sensitive.len(),
            "Categorized outputs"
        );

        if let Err(e) = self.write_artifacts(resource, &classified).await {
            self.mark_failed(key, format!("Failed to sync resources: {e}"))
                .await;
            return Err(e);
        }

        // ETags may have moved while fetching; a failed re-measure only skips the annotation update
        let fingerprints = if forced {
            None
        } else {
            match measure(self.fetcher.as_ref(), &backends).await {
                Ok(fingerprints) => Some(fingerprints),
                Err(e) => {
                    warn!(error = %e, "Failed to re-measure backend ETags, leaving annotations unchanged");
                    None
                }
            }
        };

        let outputs = merged.len();
        let message = if forced {
            format!("Successfully recreated missing resources with {outputs} outputs")
        } else {
            format!("Successfully synced {outputs} outputs")
        };
        let scope = if fingerprints.is_some() {
            UpdateScope::StatusAndAnnotations
        } else {
            UpdateScope::Status
        };
        let backend_count = backends.len();
        let now = Utc::now();

        let finalized = update_with_retry(
            self.store.as_ref(),
            key,
            scope,
            self.retry_policy(),
            |latest| {
                let status = latest.status.get_or_insert_with(Default::default);
                status.last_sync_time = Some(now.to_rfc3339());
                status.output_count = i32::try_from(outputs).unwrap_or(i32::MAX);
                status.set_phase(SyncPhase::Success, message.clone(), now);
                if let Some(fingerprints) = &fingerprints {
                    apply_fingerprints(latest.annotations_mut(), fingerprints, backend_count);
                }
            },
        )
        .await;
        if let Err(e) = finalized {
            return Err(self.fail_with(key, "Failed to record sync result", e).await);
        }

        #[allow(clippy::cast_precision_loss, reason = "Unix seconds fit in f64")]
        let timestamp = now.timestamp() as f64;
        self.metrics.record_sync_success(
            &key.namespace,
            &key.name,
            outputs,
            classified.sensitive.len(),
            timestamp,
        );

        if forced {
            info!(outputs = outputs, "Successfully recreated missing resources");
        } else {
            info!(outputs = outputs, "Successfully reconciled TerraformOutputs");
        }

        Ok(ReconcileOutcome::Synced {
            outputs,
            forced,
            requeue_after: interval,
        })
    }

    async fn write_artifacts(
        &self,
        resource: &TerraformOutputs,
        classified: &super::classify::ClassifiedOutputs,
    ) -> Result<(), SyncError> {
        let target = &resource.spec.target;

        if let Some(name) = target.config_map_name() {
            upsert_artifact(
                self.store.as_ref(),
                &self.metrics,
                ArtifactKind::ConfigMap,
                resource,
                &ObjectKey::new(&target.namespace, name),
                classified.non_sensitive.clone(),
            )
            .await?;
        }

        if let Some(name) = target.secret_name() {
            upsert_artifact(
                self.store.as_ref(),
                &self.metrics,
                ArtifactKind::Secret,
                resource,
                &ObjectKey::new(&target.namespace, name),
                classified.sensitive.clone(),
            )
            .await?;
        }

        Ok(())
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config)
    }

    async fn set_phase(
        &self,
        key: &ObjectKey,
        phase: SyncPhase,
        message: String,
    ) -> Result<(), SyncError> {
        update_with_retry(
            self.store.as_ref(),
            key,
            UpdateScope::Status,
            self.retry_policy(),
            |latest| {
                latest
                    .status
                    .get_or_insert_with(Default::default)
                    .set_phase(phase, message.clone(), Utc::now());
            },
        )
        .await
        .map(drop)
    }

    /// Mark the resource Failed unless it is gone, handing the error back
    async fn fail_with(&self, key: &ObjectKey, context: &str, error: SyncError) -> SyncError {
        if error != SyncError::NotFound {
            self.mark_failed(key, format!("{context}: {error}")).await;
        }
        error
    }

    /// Record a failure in the status; a failed write is logged and does not mask the cause
    async fn mark_failed(&self, key: &ObjectKey, message: String) {
        warn!(reason = %message, "Marking TerraformOutputs as Failed");
        if let Err(e) = self.set_phase(key, SyncPhase::Failed, message).await {
            warn!(error = %e, "Failed to update status to Failed");
        }
    }
}

/// Validate every backend of the resource
fn resolve_backends(resource: &TerraformOutputs) -> Result<Vec<BackendDescriptor>, SyncError> {
    if resource.spec.backends.is_empty() {
        return Err(SyncError::NoBackends);
    }
    resource
        .spec
        .backends
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            BackendDescriptor::try_from(spec)
                .map_err(|source| SyncError::UnsupportedBackendKind { index, source })
        })
        .collect()
}
