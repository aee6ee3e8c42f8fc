//! # Cluster Store
//!
//! The reconciler's view of the Kubernetes API: reads and writes of the
//! `TerraformOutputs` resource and of the ConfigMaps/Secrets it owns.
//!
//! Every write is a single API call. Writes of the resource carry its
//! `resourceVersion`, so a concurrent modification surfaces as
//! [`StoreError::Conflict`] instead of being overwritten.

mod kubernetes;

pub use kubernetes::KubeStore;

use crate::crd::TerraformOutputs;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use thiserror::Error;

/// Namespace and name of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,
    /// The stored object changed since it was read
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("{0}")]
    Other(String),
}

/// Access to cluster objects used by the reconciler
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_outputs(&self, key: &ObjectKey) -> Result<TerraformOutputs, StoreError>;

    /// Replace the resource (metadata and spec), conflict-checked on `resourceVersion`
    async fn replace_outputs(&self, outputs: &TerraformOutputs)
        -> Result<TerraformOutputs, StoreError>;

    /// Write the status subresource, conflict-checked on `resourceVersion`
    async fn replace_outputs_status(
        &self,
        outputs: &TerraformOutputs,
    ) -> Result<TerraformOutputs, StoreError>;

    async fn get_config_map(&self, key: &ObjectKey) -> Result<ConfigMap, StoreError>;
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError>;
    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError>;

    async fn get_secret(&self, key: &ObjectKey) -> Result<Secret, StoreError>;
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;
    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;
}
