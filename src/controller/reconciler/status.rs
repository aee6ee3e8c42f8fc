//! # Conflict-Safe Updates
//!
//! Every write to a `TerraformOutputs` resource goes through
//! [`update_with_retry`]: re-read the latest version, apply the mutation,
//! write it back with its `resourceVersion`. A conflict restarts the cycle
//! until the attempt budget is spent.

use super::types::SyncError;
use crate::config::ControllerConfig;
use crate::crd::TerraformOutputs;
use crate::store::{ClusterStore, ObjectKey, StoreError};
use std::time::Duration;
use tracing::debug;

/// Which parts of the resource an update writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    /// Status subresource only
    Status,
    /// Object metadata (annotations) first, then status on the returned version
    StatusAndAnnotations,
}

/// Attempt budget for conflict retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            attempts: config.conflict_retry_attempts.max(1),
            backoff: config.conflict_retry_backoff(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ControllerConfig::default())
    }
}

/// Read-modify-write of the resource, retried on conflict
///
/// A resource that disappears mid-update yields [`SyncError::NotFound`];
/// exhausting the budget yields [`SyncError::WriteConflict`].
pub async fn update_with_retry<F>(
    store: &dyn ClusterStore,
    key: &ObjectKey,
    scope: UpdateScope,
    retry: RetryPolicy,
    mut mutate: F,
) -> Result<TerraformOutputs, SyncError>
where
    F: FnMut(&mut TerraformOutputs) + Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut latest = store.get_outputs(key).await?;
        mutate(&mut latest);

        let result = match scope {
            UpdateScope::Status => store.replace_outputs_status(&latest).await,
            UpdateScope::StatusAndAnnotations => {
                match store.replace_outputs(&latest).await {
                    Ok(mut updated) => {
                        // object writes do not touch the status subresource
                        updated.status = latest.status.clone();
                        store.replace_outputs_status(&updated).await
                    }
                    Err(e) => Err(e),
                }
            }
        };

        match result {
            Ok(updated) => return Ok(updated),
            Err(StoreError::Conflict(message)) if attempt < retry.attempts => {
                debug!(
                    resource = %key,
                    attempt = attempt,
                    error = %message,
                    "Write conflict, retrying against the latest version"
                );
                tokio::time::sleep(retry.backoff).await;
            }
            Err(StoreError::Conflict(_)) => {
                return Err(SyncError::WriteConflict { attempts: attempt });
            }
            Err(e) => return Err(e.into()),
        }
    }
}
