//! # S3 Backend
//!
//! Reads Terraform state from S3 or an S3-compatible store.
//!
//! A client is built per call from the default AWS credential chain, scoped
//! to the backend's region. An `endpoint` switches to path-style addressing
//! (MinIO, Ceph) and a `role` is assumed through STS before the request.

use super::{BackendFetcher, FetchError, Snapshot};
use crate::crd::{BackendDescriptor, S3Spec};
use crate::observability::metrics::{SyncMetrics, RESULT_ERROR, RESULT_SUCCESS};
use async_trait::async_trait;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SESSION_NAME: &str = "tfout-controller";

/// Fetcher for S3 backends
#[derive(Debug, Clone)]
pub struct S3Fetcher {
    metrics: Arc<SyncMetrics>,
}

impl S3Fetcher {
    #[must_use]
    pub fn new(metrics: Arc<SyncMetrics>) -> Self {
        Self { metrics }
    }

    async fn client(spec: &S3Spec) -> aws_sdk_s3::Client {
        let region = Region::new(spec.region.clone());
        let mut sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region.clone())
            .load()
            .await;

        if let Some(role) = spec.role() {
            debug!(role = role, "Assuming IAM role for S3 access");
            let provider = AssumeRoleProvider::builder(role)
                .session_name(SESSION_NAME)
                .region(region.clone())
                .configure(&sdk_config)
                .build()
                .await;
            sdk_config = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(provider)
                .load()
                .await;
        }

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = spec.endpoint() {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        aws_sdk_s3::Client::from_conf(builder.build())
    }

    fn record(&self, operation: &str, ok: bool) {
        let result = if ok { RESULT_SUCCESS } else { RESULT_ERROR };
        self.metrics.record_s3_request(operation, result);
    }

    async fn head_etag(&self, spec: &S3Spec) -> Result<String, FetchError> {
        let client = Self::client(spec).await;
        let response = client
            .head_object()
            .bucket(&spec.bucket)
            .key(&spec.key)
            .send()
            .await;
        self.record("HeadObject", response.is_ok());

        let response = response.map_err(|e| {
            FetchError::Unavailable(format!(
                "failed to get S3 object metadata for s3://{}/{}: {}",
                spec.bucket,
                spec.key,
                aws_sdk_s3::error::DisplayErrorContext(&e)
            ))
        })?;

        let etag = normalize_etag(response.e_tag());
        if etag.is_empty() {
            warn!(
                bucket = %spec.bucket,
                key = %spec.key,
                "S3 object has no ETag, changes cannot be detected and every interval will fetch it"
            );
        }
        Ok(etag)
    }

    async fn get_snapshot(&self, spec: &S3Spec) -> Result<Snapshot, FetchError> {
        info!(bucket = %spec.bucket, key = %spec.key, "Downloading Terraform state");
        let client = Self::client(spec).await;
        let response = client
            .get_object()
            .bucket(&spec.bucket)
            .key(&spec.key)
            .send()
            .await;
        self.record("GetObject", response.is_ok());

        let response = response.map_err(|e| {
            FetchError::Unavailable(format!(
                "failed to download s3://{}/{}: {}",
                spec.bucket,
                spec.key,
                aws_sdk_s3::error::DisplayErrorContext(&e)
            ))
        })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| {
                FetchError::Unavailable(format!(
                    "failed to read body of s3://{}/{}: {e}",
                    spec.bucket, spec.key
                ))
            })?
            .into_bytes();

        Snapshot::from_slice(&bytes)
    }
}

/// ETag without its surrounding quotes; empty when S3 returned none
fn normalize_etag(raw: Option<&str>) -> String {
    raw.unwrap_or_default().trim_matches('"').to_string()
}

#[async_trait]
impl BackendFetcher for S3Fetcher {
    async fn fingerprint(&self, backend: &BackendDescriptor) -> Result<String, FetchError> {
        match backend {
            BackendDescriptor::S3(spec) => self.head_etag(spec).await,
        }
    }

    async fn fetch(&self, backend: &BackendDescriptor) -> Result<Snapshot, FetchError> {
        match backend {
            BackendDescriptor::S3(spec) => self.get_snapshot(spec).await,
        }
    }
}
