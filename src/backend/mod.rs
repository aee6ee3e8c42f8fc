//! # Backends
//!
//! Retrieval of Terraform state snapshots from remote storage.
//!
//! A [`BackendFetcher`] offers two operations per backend: a cheap
//! `fingerprint` (metadata only, used for change detection) and an expensive
//! `fetch` that downloads and parses the full state document.

mod s3;
mod snapshot;

pub use s3::S3Fetcher;
pub use snapshot::{OutputEntry, Snapshot};

use crate::crd::BackendDescriptor;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport or authentication failure reaching the backend
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The state document could not be parsed
    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

/// Read access to Terraform state backends
#[async_trait]
pub trait BackendFetcher: Send + Sync {
    /// Content fingerprint of the state object, without downloading it
    async fn fingerprint(&self, backend: &BackendDescriptor) -> Result<String, FetchError>;

    /// Download and parse the state object
    async fn fetch(&self, backend: &BackendDescriptor) -> Result<Snapshot, FetchError>;
}
