//! Common test utilities for reconciliation tests
//!
//! Provides an in-memory [`ClusterStore`] with `resourceVersion` conflict
//! checks and a scripted [`BackendFetcher`], so whole reconciliation passes
//! run without a cluster or S3.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tfout_controller::backend::{BackendFetcher, FetchError, Snapshot};
use tfout_controller::config::ControllerConfig;
use tfout_controller::controller::reconciler::Reconciler;
use tfout_controller::crd::{
    BackendDescriptor, BackendSpec, S3Spec, TargetSpec, TerraformOutputs, TerraformOutputsSpec,
};
use tfout_controller::observability::SyncMetrics;
use tfout_controller::store::{ClusterStore, ObjectKey, StoreError};

pub const NAMESPACE: &str = "default";

fn key_of(metadata: &ObjectMeta) -> ObjectKey {
    ObjectKey::new(
        metadata.namespace.clone().unwrap_or_default(),
        metadata.name.clone().unwrap_or_default(),
    )
}

/// In-memory cluster with optimistic concurrency on every object
#[derive(Default)]
pub struct MemoryStore {
    outputs: Mutex<BTreeMap<ObjectKey, TerraformOutputs>>,
    config_maps: Mutex<BTreeMap<ObjectKey, ConfigMap>>,
    secrets: Mutex<BTreeMap<ObjectKey, Secret>>,
    revision: AtomicU64,
    pending_conflicts: AtomicU32,
    conflict_free_writes: AtomicUsize,
    pub outputs_writes: AtomicUsize,
    pub artifact_writes: AtomicUsize,
}

impl MemoryStore {
    fn next_revision(&self) -> String {
        (self.revision.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn take_conflict(&self) -> bool {
        if self.pending_conflicts.load(Ordering::SeqCst) == 0 {
            return false;
        }
        let spared = self
            .conflict_free_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        !spared
            && self
                .pending_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
    }

    /// Store a resource as if it had been applied by a user
    pub fn seed(&self, mut resource: TerraformOutputs) -> ObjectKey {
        let name = resource.metadata.name.clone().unwrap_or_default();
        resource.metadata.namespace.get_or_insert_with(|| NAMESPACE.to_string());
        resource.metadata.uid.get_or_insert_with(|| format!("uid-{name}"));
        resource.metadata.resource_version = Some(self.next_revision());
        let key = key_of(&resource.metadata);
        self.outputs.lock().unwrap().insert(key.clone(), resource);
        key
    }

    pub fn outputs(&self, key: &ObjectKey) -> Option<TerraformOutputs> {
        self.outputs.lock().unwrap().get(key).cloned()
    }

    /// Edit a stored resource out of band, bumping its version
    pub fn edit_outputs(&self, key: &ObjectKey, edit: impl FnOnce(&mut TerraformOutputs)) {
        let revision = self.next_revision();
        let mut outputs = self.outputs.lock().unwrap();
        let resource = outputs.get_mut(key).expect("resource seeded");
        edit(resource);
        resource.metadata.resource_version = Some(revision);
    }

    /// Move `lastSyncTime` into the past so the sync interval has elapsed
    pub fn backdate_last_sync(&self, key: &ObjectKey, by: chrono::Duration) {
        self.edit_outputs(key, |resource| {
            let status = resource.status.get_or_insert_with(Default::default);
            status.last_sync_time = Some((chrono::Utc::now() - by).to_rfc3339());
        });
    }

    pub fn remove_outputs(&self, key: &ObjectKey) {
        self.outputs.lock().unwrap().remove(key);
    }

    pub fn config_map(&self, key: &ObjectKey) -> Option<ConfigMap> {
        self.config_maps.lock().unwrap().get(key).cloned()
    }

    pub fn secret(&self, key: &ObjectKey) -> Option<Secret> {
        self.secrets.lock().unwrap().get(key).cloned()
    }

    pub fn delete_config_map(&self, key: &ObjectKey) {
        self.config_maps.lock().unwrap().remove(key);
    }

    pub fn delete_secret(&self, key: &ObjectKey) {
        self.secrets.lock().unwrap().remove(key);
    }

    /// Place a ConfigMap not created by the controller
    pub fn insert_config_map(&self, mut config_map: ConfigMap) {
        config_map.metadata.resource_version = Some(self.next_revision());
        let key = key_of(&config_map.metadata);
        self.config_maps.lock().unwrap().insert(key, config_map);
    }

    /// Fail the next `count` resource writes with a conflict
    pub fn inject_conflicts(&self, count: u32) {
        self.inject_conflicts_after(0, count);
    }

    /// Let `writes` resource writes through, then fail the next `count`
    pub fn inject_conflicts_after(&self, writes: usize, count: u32) {
        self.conflict_free_writes.store(writes, Ordering::SeqCst);
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    fn write_outputs(
        &self,
        incoming: &TerraformOutputs,
        apply: impl FnOnce(&mut TerraformOutputs, &TerraformOutputs),
    ) -> Result<TerraformOutputs, StoreError> {
        if self.take_conflict() {
            return Err(StoreError::Conflict("injected conflict".to_string()));
        }
        let revision = self.next_revision();
        let mut outputs = self.outputs.lock().unwrap();
        let stored = outputs
            .get_mut(&key_of(&incoming.metadata))
            .ok_or(StoreError::NotFound)?;
        if stored.metadata.resource_version != incoming.metadata.resource_version {
            return Err(StoreError::Conflict(
                "the object has been modified".to_string(),
            ));
        }
        apply(stored, incoming);
        stored.metadata.resource_version = Some(revision);
        self.outputs_writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }
}

fn create_object<T: Clone>(
    objects: &Mutex<BTreeMap<ObjectKey, T>>,
    key: ObjectKey,
    object: T,
) -> Result<T, StoreError> {
    let mut objects = objects.lock().unwrap();
    if objects.contains_key(&key) {
        return Err(StoreError::Other(format!("{key} already exists")));
    }
    objects.insert(key, object.clone());
    Ok(object)
}

fn replace_object<T: Clone>(
    objects: &Mutex<BTreeMap<ObjectKey, T>>,
    key: &ObjectKey,
    object: T,
) -> Result<T, StoreError> {
    let mut objects = objects.lock().unwrap();
    let stored = objects.get_mut(key).ok_or(StoreError::NotFound)?;
    *stored = object.clone();
    Ok(object)
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn get_outputs(&self, key: &ObjectKey) -> Result<TerraformOutputs, StoreError> {
        self.outputs(key).ok_or(StoreError::NotFound)
    }

    async fn replace_outputs(
        &self,
        outputs: &TerraformOutputs,
    ) -> Result<TerraformOutputs, StoreError> {
        self.write_outputs(outputs, |stored, incoming| {
            stored.metadata = incoming.metadata.clone();
            stored.spec = incoming.spec.clone();
        })
    }

    async fn replace_outputs_status(
        &self,
        outputs: &TerraformOutputs,
    ) -> Result<TerraformOutputs, StoreError> {
        self.write_outputs(outputs, |stored, incoming| {
            stored.status = incoming.status.clone();
        })
    }

    async fn get_config_map(&self, key: &ObjectKey) -> Result<ConfigMap, StoreError> {
        self.config_map(key).ok_or(StoreError::NotFound)
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        let mut config_map = config_map.clone();
        config_map.metadata.resource_version = Some(self.next_revision());
        self.artifact_writes.fetch_add(1, Ordering::SeqCst);
        create_object(&self.config_maps, key_of(&config_map.metadata), config_map)
    }

    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        let mut config_map = config_map.clone();
        config_map.metadata.resource_version = Some(self.next_revision());
        self.artifact_writes.fetch_add(1, Ordering::SeqCst);
        replace_object(&self.config_maps, &key_of(&config_map.metadata), config_map)
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Secret, StoreError> {
        self.secret(key).ok_or(StoreError::NotFound)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let mut secret = secret.clone();
        secret.metadata.resource_version = Some(self.next_revision());
        self.artifact_writes.fetch_add(1, Ordering::SeqCst);
        create_object(&self.secrets, key_of(&secret.metadata), secret)
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let mut secret = secret.clone();
        secret.metadata.resource_version = Some(self.next_revision());
        self.artifact_writes.fetch_add(1, Ordering::SeqCst);
        replace_object(&self.secrets, &key_of(&secret.metadata), secret)
    }
}

enum FakeObject {
    Present { etag: String, body: Vec<u8> },
    Failing(FetchError),
}

/// Scripted state backend keyed by bucket and object key
#[derive(Default)]
pub struct FakeFetcher {
    objects: Mutex<BTreeMap<(String, String), FakeObject>>,
    hang: AtomicBool,
    pub fingerprint_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl FakeFetcher {
    /// Publish a state document whose `outputs` section is `outputs`
    pub fn put(&self, bucket: &str, key: &str, etag: &str, outputs: Value) {
        let body = json!({ "version": 4, "terraform_version": "1.6.0", "outputs": outputs });
        self.put_raw(bucket, key, etag, body.to_string().as_bytes());
    }

    pub fn put_raw(&self, bucket: &str, key: &str, etag: &str, body: &[u8]) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            FakeObject::Present {
                etag: etag.to_string(),
                body: body.to_vec(),
            },
        );
    }

    pub fn fail(&self, bucket: &str, key: &str, error: FetchError) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), FakeObject::Failing(error));
    }

    /// Make every subsequent call wait forever
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    async fn lookup(&self, backend: &BackendDescriptor) -> Result<(String, Vec<u8>), FetchError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let BackendDescriptor::S3(s3) = backend;
        let objects = self.objects.lock().unwrap();
        match objects.get(&(s3.bucket.clone(), s3.key.clone())) {
            Some(FakeObject::Present { etag, body }) => Ok((etag.clone(), body.clone())),
            Some(FakeObject::Failing(error)) => Err(error.clone()),
            None => Err(FetchError::Unavailable(format!(
                "NoSuchKey: s3://{}/{}",
                s3.bucket, s3.key
            ))),
        }
    }
}

#[async_trait]
impl BackendFetcher for FakeFetcher {
    async fn fingerprint(&self, backend: &BackendDescriptor) -> Result<String, FetchError> {
        self.fingerprint_calls.fetch_add(1, Ordering::SeqCst);
        self.lookup(backend).await.map(|(etag, _)| etag)
    }

    async fn fetch(&self, backend: &BackendDescriptor) -> Result<Snapshot, FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let (_, body) = self.lookup(backend).await?;
        Snapshot::from_slice(&body)
    }
}

/// Store, fetcher and metrics shared by one test
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub metrics: Arc<SyncMetrics>,
    pub config: ControllerConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            fetcher: Arc::new(FakeFetcher::default()),
            metrics: Arc::new(SyncMetrics::new().unwrap()),
            config: ControllerConfig {
                conflict_retry_backoff_ms: 0,
                ..ControllerConfig::default()
            },
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.store.clone(),
            self.fetcher.clone(),
            self.metrics.clone(),
            self.config.clone(),
        )
    }
}

pub fn s3_backend(bucket: &str, key: &str) -> BackendSpec {
    BackendSpec {
        backend_type: None,
        s3: Some(S3Spec {
            bucket: bucket.to_string(),
            key: key.to_string(),
            region: "eu-west-1".to_string(),
            endpoint: None,
            role: None,
        }),
    }
}

pub fn target(namespace: &str, config_map: Option<&str>, secret: Option<&str>) -> TargetSpec {
    TargetSpec {
        namespace: namespace.to_string(),
        config_map_name: config_map.map(str::to_string),
        secret_name: secret.map(str::to_string),
    }
}

pub fn outputs_resource(
    name: &str,
    backends: Vec<BackendSpec>,
    target: TargetSpec,
) -> TerraformOutputs {
    let mut resource = TerraformOutputs::new(
        name,
        TerraformOutputsSpec {
            backends,
            sync_interval: "5m".to_string(),
            target,
        },
    );
    resource.metadata.namespace = Some(NAMESPACE.to_string());
    resource
}

/// One entry of a state document's `outputs` section
pub fn output(value: Value, sensitive: bool) -> Value {
    json!({ "value": value, "type": "string", "sensitive": sensitive })
}
