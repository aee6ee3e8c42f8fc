//! # Artifact Sync
//!
//! Creates or updates the target ConfigMap (non-sensitive outputs) and Secret
//! (sensitive outputs).
//!
//! New artifacts carry the standard labels and a controller owner reference
//! to the `TerraformOutputs` resource, so Kubernetes garbage-collects them
//! with it. Existing artifacts get their data and labels replaced in full;
//! their owner references are left as they are.

use super::types::SyncError;
use crate::constants::{API_GROUP, API_VERSION, KIND, MANAGED_BY, MANAGED_BY_LABEL, SOURCE_LABEL};
use crate::crd::TerraformOutputs;
use crate::observability::metrics::{SyncMetrics, RESULT_ERROR, RESULT_SUCCESS};
use crate::store::{ClusterStore, ObjectKey, StoreError};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// The two artifact kinds written per resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    ConfigMap,
    Secret,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::ConfigMap => f.write_str("ConfigMap"),
            ArtifactKind::Secret => f.write_str("Secret"),
        }
    }
}

/// Labels applied to every generated artifact
#[must_use]
pub fn artifact_labels(resource_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
        (SOURCE_LABEL.to_string(), resource_name.to_string()),
    ])
}

/// Whether `refs` contains a reference to `resource` (kind, apiVersion, name and uid)
#[must_use]
pub fn has_owner_reference(refs: &[OwnerReference], resource: &TerraformOutputs) -> bool {
    let api_version = format!("{API_GROUP}/{API_VERSION}");
    let Some(uid) = resource.metadata.uid.as_deref() else {
        return false;
    };
    refs.iter().any(|r| {
        r.kind == KIND
            && r.api_version == api_version
            && r.name == resource.name_any()
            && r.uid == uid
    })
}

fn new_metadata(owner: &TerraformOutputs, key: &ObjectKey) -> Result<ObjectMeta, String> {
    let owner_ref = owner
        .controller_owner_ref(&())
        .ok_or_else(|| "owner resource has no name or uid".to_string())?;
    Ok(ObjectMeta {
        name: Some(key.name.clone()),
        namespace: Some(key.namespace.clone()),
        labels: Some(artifact_labels(&owner.name_any())),
        owner_references: Some(vec![owner_ref]),
        ..ObjectMeta::default()
    })
}

/// Create or replace one artifact; empty `data` still yields an (empty) artifact
pub async fn upsert_artifact(
    store: &dyn ClusterStore,
    metrics: &SyncMetrics,
    kind: ArtifactKind,
    owner: &TerraformOutputs,
    key: &ObjectKey,
    data: BTreeMap<String, String>,
) -> Result<(), SyncError> {
    let owner_namespace = owner.namespace().unwrap_or_default();
    let owner_name = owner.name_any();
    let keys = data.len();

    let (operation, result) = match kind {
        ArtifactKind::ConfigMap => upsert_config_map(store, owner, key, data).await,
        ArtifactKind::Secret => upsert_secret(store, owner, key, data).await,
    };

    let outcome = if result.is_ok() { RESULT_SUCCESS } else { RESULT_ERROR };
    if let Some(operation) = operation {
        match kind {
            ArtifactKind::ConfigMap => {
                metrics.record_configmap_operation(&owner_namespace, &owner_name, operation, outcome);
            }
            ArtifactKind::Secret => {
                metrics.record_secret_operation(&owner_namespace, &owner_name, operation, outcome);
            }
        }
    }

    result.map_err(|message| SyncError::ArtifactSyncFailure {
        kind,
        key: key.clone(),
        message,
    })?;

    if keys == 0 {
        info!(kind = %kind, target = %key, "Empty {} synced (no matching outputs)", kind);
    } else {
        info!(kind = %kind, target = %key, keys = keys, "{} synced", kind);
    }
    Ok(())
}

/// Returns the attempted operation (if any) and its result
async fn upsert_config_map(
    store: &dyn ClusterStore,
    owner: &TerraformOutputs,
    key: &ObjectKey,
    data: BTreeMap<String, String>,
) -> (Option<&'static str>, Result<(), String>) {
    match store.get_config_map(key).await {
        Err(StoreError::NotFound) => {
            let metadata = match new_metadata(owner, key) {
                Ok(m) => m,
                Err(e) => return (None, Err(e)),
            };
            let config_map = ConfigMap {
                metadata,
                data: Some(data),
                ..ConfigMap::default()
            };
            let result = store.create_config_map(&config_map).await;
            (Some("create"), result.map(drop).map_err(|e| e.to_string()))
        }
        Err(e) => (None, Err(e.to_string())),
        Ok(mut existing) => {
            existing.data = Some(data);
            existing.binary_data = None;
            existing.metadata.labels = Some(artifact_labels(&owner.name_any()));
            let result = store.replace_config_map(&existing).await;
            (Some("update"), result.map(drop).map_err(|e| e.to_string()))
        }
    }
}

async fn upsert_secret(
    store: &dyn ClusterStore,
    owner: &TerraformOutputs,
    key: &ObjectKey,
    data: BTreeMap<String, String>,
) -> (Option<&'static str>, Result<(), String>) {
    let data: BTreeMap<String, ByteString> = data
        .into_iter()
        .map(|(k, v)| (k, ByteString(v.into_bytes())))
        .collect();

    match store.get_secret(key).await {
        Err(StoreError::NotFound) => {
            let metadata = match new_metadata(owner, key) {
                Ok(m) => m,
                Err(e) => return (None, Err(e)),
            };
            let secret = Secret {
                metadata,
                data: Some(data),
                type_: Some("Opaque".to_string()),
                ..Secret::default()
            };
            let result = store.create_secret(&secret).await;
            (Some("create"), result.map(drop).map_err(|e| e.to_string()))
        }
        Err(e) => (None, Err(e.to_string())),
        Ok(mut existing) => {
            existing.data = Some(data);
            existing.string_data = None;
            existing.metadata.labels = Some(artifact_labels(&owner.name_any()));
            let result = store.replace_secret(&existing).await;
            (Some("update"), result.map(drop).map_err(|e| e.to_string()))
        }
    }
}

/// Whether a configured artifact is missing or not owned by `resource`
///
/// Lookup errors other than not-found are logged and do not force a sync.
pub async fn should_force_sync(store: &dyn ClusterStore, resource: &TerraformOutputs) -> bool {
    let target = &resource.spec.target;

    if let Some(name) = target.config_map_name() {
        let key = ObjectKey::new(&target.namespace, name);
        match store.get_config_map(&key).await {
            Err(StoreError::NotFound) => {
                info!(configmap = %key, "ConfigMap missing, triggering force sync");
                return true;
            }
            Err(e) => warn!(configmap = %key, error = %e, "Failed to check ConfigMap existence"),
            Ok(cm) if !has_owner_reference(cm.owner_references(), resource) => {
                info!(configmap = %key, "ConfigMap exists but lacks proper owner reference, triggering force sync");
                return true;
            }
            Ok(_) => {}
        }
    }

    if let Some(name) = target.secret_name() {
        let key = ObjectKey::new(&target.namespace, name);
        match store.get_secret(&key).await {
            Err(StoreError::NotFound) => {
                info!(secret = %key, "Secret missing, triggering force sync");
                return true;
            }
            Err(e) => warn!(secret = %key, error = %e, "Failed to check Secret existence"),
            Ok(secret) if !has_owner_reference(secret.owner_references(), resource) => {
                info!(secret = %key, "Secret exists but lacks proper owner reference, triggering force sync");
                return true;
            }
            Ok(_) => {}
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{TargetSpec, TerraformOutputsSpec};

    fn resource() -> TerraformOutputs {
        let mut resource = TerraformOutputs::new(
            "network",
            TerraformOutputsSpec {
                backends: vec![],
                sync_interval: "5m".to_string(),
                target: TargetSpec::default(),
            },
        );
        resource.metadata.namespace = Some("infra".to_string());
        resource.metadata.uid = Some("uid-1".to_string());
        resource
    }

    #[test]
    fn test_owner_reference_matches_kind_version_name_uid() {
        let resource = resource();
        let owner_ref = resource.controller_owner_ref(&()).unwrap();
        assert!(has_owner_reference(&[owner_ref.clone()], &resource));

        let wrong_uid = OwnerReference {
            uid: "uid-2".to_string(),
            ..owner_ref.clone()
        };
        assert!(!has_owner_reference(&[wrong_uid], &resource));

        let wrong_kind = OwnerReference {
            kind: "Deployment".to_string(),
            ..owner_ref
        };
        assert!(!has_owner_reference(&[wrong_kind], &resource));
        assert!(!has_owner_reference(&[], &resource));
    }

    #[test]
    fn test_new_metadata_sets_labels_and_controller_ref() {
        let resource = resource();
        let meta = new_metadata(&resource, &ObjectKey::new("apps", "network-outputs")).unwrap();
        let labels = meta.labels.unwrap();
        assert_eq!(labels.get(MANAGED_BY_LABEL).map(String::as_str), Some("tfout"));
        assert_eq!(labels.get(SOURCE_LABEL).map(String::as_str), Some("network"));
        let refs = meta.owner_references.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].controller, Some(true));
        assert_eq!(refs[0].api_version, "tfout.wibrow.net/v1alpha1");
    }

    #[test]
    fn test_new_metadata_requires_uid() {
        let mut resource = resource();
        resource.metadata.uid = None;
        assert!(new_metadata(&resource, &ObjectKey::new("apps", "x")).is_err());
    }
}
