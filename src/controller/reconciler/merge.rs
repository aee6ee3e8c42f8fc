//! # Snapshot Merge
//!
//! Fetches every backend in declared order and folds the outputs into one map.
//! On a key collision the later backend wins; the overwrite is logged, not
//! treated as an error. Any fetch failure aborts the whole merge.

use super::types::SyncError;
use crate::backend::{BackendFetcher, Snapshot};
use crate::crd::BackendDescriptor;
use crate::observability::metrics::{SyncMetrics, RESULT_ERROR, RESULT_SUCCESS};
use crate::store::ObjectKey;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// Outputs of all backends after merging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedOutputs {
    pub values: BTreeMap<String, Value>,
    pub sensitive: BTreeMap<String, bool>,
}

impl MergedOutputs {
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fold one backend's snapshot in, overwriting colliding keys
    pub fn absorb(&mut self, index: usize, snapshot: Snapshot) {
        for (key, entry) in snapshot {
            if self.values.contains_key(&key) {
                info!(key = %key, backend = index, "Output key conflict detected, using latest value");
            }
            self.sensitive.insert(key.clone(), entry.sensitive);
            self.values.insert(key, entry.value);
        }
    }
}

/// Fetch and merge the outputs of all backends
pub async fn merge_all(
    fetcher: &dyn BackendFetcher,
    metrics: &SyncMetrics,
    resource: &ObjectKey,
    backends: &[BackendDescriptor],
) -> Result<MergedOutputs, SyncError> {
    let mut merged = MergedOutputs::default();

    for (index, backend) in backends.iter().enumerate() {
        info!(backend = index, location = %backend.location(), "Processing backend");
        let started = Instant::now();
        let result = fetcher.fetch(backend).await;
        let outcome = if result.is_ok() { RESULT_SUCCESS } else { RESULT_ERROR };
        metrics.record_backend_fetch(
            &resource.namespace,
            &resource.name,
            backend.kind(),
            index,
            outcome,
            started.elapsed().as_secs_f64(),
        );

        let snapshot = result.map_err(|e| SyncError::from_fetch(index, e))?;
        let count = snapshot.len();
        merged.absorb(index, snapshot);
        info!(backend = index, outputs = count, "Successfully processed backend");
    }

    info!(
        total_outputs = merged.len(),
        backends = backends.len(),
        "Fetched and merged Terraform outputs from all backends"
    );
    Ok(merged)
}
