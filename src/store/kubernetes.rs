//! `ClusterStore` backed by the Kubernetes API server.

use super::{ClusterStore, ObjectKey, StoreError};
use crate::constants::FIELD_MANAGER;
use crate::crd::TerraformOutputs;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Production store using a kube client
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        let code = match &error {
            kube::Error::Api(api_err) => Some(api_err.code),
            _ => None,
        };
        match code {
            Some(404) => StoreError::NotFound,
            Some(409) => StoreError::Conflict(error.to_string()),
            _ => StoreError::Other(error.to_string()),
        }
    }
}

fn identity<K: Resource>(object: &K) -> Result<(String, String), StoreError> {
    let meta = object.meta();
    match (meta.namespace.as_deref(), meta.name.as_deref()) {
        (Some(ns), Some(name)) => Ok((ns.to_string(), name.to_string())),
        _ => Err(StoreError::Other(
            "object is missing metadata.namespace or metadata.name".to_string(),
        )),
    }
}

async fn get<K>(store: &KubeStore, key: &ObjectKey) -> Result<K, StoreError>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + std::fmt::Debug,
    <K as Resource>::DynamicType: Default,
{
    Ok(store.api::<K>(&key.namespace).get(&key.name).await?)
}

async fn create<K>(store: &KubeStore, object: &K) -> Result<K, StoreError>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Serialize
        + std::fmt::Debug,
    <K as Resource>::DynamicType: Default,
{
    let (namespace, _) = identity(object)?;
    let params = PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..PostParams::default()
    };
    Ok(store.api::<K>(&namespace).create(&params, object).await?)
}

async fn replace<K>(store: &KubeStore, object: &K) -> Result<K, StoreError>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Serialize
        + std::fmt::Debug,
    <K as Resource>::DynamicType: Default,
{
    let (namespace, name) = identity(object)?;
    let params = PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..PostParams::default()
    };
    Ok(store
        .api::<K>(&namespace)
        .replace(&name, &params, object)
        .await?)
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_outputs(&self, key: &ObjectKey) -> Result<TerraformOutputs, StoreError> {
        get(self, key).await
    }

    async fn replace_outputs(
        &self,
        outputs: &TerraformOutputs,
    ) -> Result<TerraformOutputs, StoreError> {
        replace(self, outputs).await
    }

    async fn replace_outputs_status(
        &self,
        outputs: &TerraformOutputs,
    ) -> Result<TerraformOutputs, StoreError> {
        let (namespace, name) = identity(outputs)?;
        // resourceVersion in a merge patch makes the API server reject stale writes with 409
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": outputs.metadata.resource_version },
            "status": outputs.status,
        });
        let api: Api<TerraformOutputs> = self.api(&namespace);
        Ok(api
            .patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await?)
    }

    async fn get_config_map(&self, key: &ObjectKey) -> Result<ConfigMap, StoreError> {
        get(self, key).await
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        create(self, config_map).await
    }

    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        replace(self, config_map).await
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Secret, StoreError> {
        get(self, key).await
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        create(self, secret).await
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        replace(self, secret).await
    }
}
