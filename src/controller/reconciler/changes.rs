//! # Change Detection
//!
//! Compares the fingerprint (S3 ETag) of every backend against the value
//! stored in the resource's annotations, keyed by backend index.

use super::types::SyncError;
use crate::backend::BackendFetcher;
use crate::constants::ETAG_ANNOTATION_PREFIX;
use crate::crd::BackendDescriptor;
use std::collections::BTreeMap;
use tracing::debug;

/// Fingerprints by backend index
pub type Fingerprints = BTreeMap<usize, String>;

/// Annotation key holding the fingerprint of backend `index`
#[must_use]
pub fn annotation_key(index: usize) -> String {
    format!("{ETAG_ANNOTATION_PREFIX}{index}")
}

/// Fingerprints currently recorded on the resource
#[must_use]
pub fn stored_fingerprints(annotations: &BTreeMap<String, String>) -> Fingerprints {
    annotations
        .iter()
        .filter_map(|(key, value)| {
            let index = key.strip_prefix(ETAG_ANNOTATION_PREFIX)?.parse().ok()?;
            Some((index, value.clone()))
        })
        .collect()
}

/// Fetch the current fingerprint of every backend, failing on the first error
pub async fn measure(
    fetcher: &dyn BackendFetcher,
    backends: &[BackendDescriptor],
) -> Result<Fingerprints, SyncError> {
    let mut current = Fingerprints::new();
    for (index, backend) in backends.iter().enumerate() {
        let fingerprint = fetcher
            .fingerprint(backend)
            .await
            .map_err(|e| SyncError::from_fetch(index, e))?;
        current.insert(index, fingerprint);
    }
    Ok(current)
}

/// Whether any backend changed since the fingerprints were last recorded
///
/// A backend without a stored fingerprint counts as changed. The full set of
/// current fingerprints is returned so that every index can be persisted.
pub async fn has_changed(
    fetcher: &dyn BackendFetcher,
    annotations: &BTreeMap<String, String>,
    backends: &[BackendDescriptor],
) -> Result<(bool, Fingerprints), SyncError> {
    let stored = stored_fingerprints(annotations);
    let current = measure(fetcher, backends).await?;

    let changed = current.iter().fold(false, |changed, (index, fingerprint)| {
        let previous = stored.get(index).filter(|s| !s.is_empty());
        let backend_changed = previous != Some(fingerprint);
        if backend_changed {
            debug!(backend = index, previous = ?previous, current = %fingerprint, "Backend fingerprint changed");
        }
        changed || backend_changed
    });

    Ok((changed, current))
}

/// Write fingerprints into annotations, dropping indices beyond `backend_count`
pub fn apply_fingerprints(
    annotations: &mut BTreeMap<String, String>,
    fingerprints: &Fingerprints,
    backend_count: usize,
) {
    annotations.retain(|key, _| {
        key.strip_prefix(ETAG_ANNOTATION_PREFIX)
            .and_then(|suffix| suffix.parse::<usize>().ok())
            .is_none_or(|index| index < backend_count)
    });
    for (index, fingerprint) in fingerprints {
        annotations.insert(annotation_key(*index), fingerprint.clone());
    }
}
