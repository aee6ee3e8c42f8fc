//! # Backend Configuration
//!
//! Terraform state backend configuration.
//!
//! `BackendSpec` is the wire form stored on the resource: one optional field per
//! backend kind. Before use it is converted into a [`BackendDescriptor`], which
//! requires exactly one kind to be populated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend configuration as written in the resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendSpec {
    /// Legacy backend discriminator ("s3"). Optional; must agree with the populated kind.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,
    /// S3 (or S3-compatible) state location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Spec>,
}

/// S3 backend configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct S3Spec {
    /// S3 bucket name
    pub bucket: String,
    /// Path to the Terraform state file
    pub key: String,
    /// AWS region
    pub region: String,
    /// S3-compatible endpoint (MinIO, Ceph, ...). Enables path-style addressing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// IAM role to assume for accessing the bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl S3Spec {
    /// Endpoint override, ignoring empty strings
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|e| !e.is_empty())
    }

    /// Role to assume, ignoring empty strings
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref().filter(|r| !r.is_empty())
    }
}

/// A validated backend location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendDescriptor {
    S3(S3Spec),
}

impl BackendDescriptor {
    /// Backend kind as used in metric labels and log fields
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BackendDescriptor::S3(_) => "s3",
        }
    }

    /// Human-readable location for logs and status messages
    #[must_use]
    pub fn location(&self) -> String {
        match self {
            BackendDescriptor::S3(s3) => format!("s3://{}/{}", s3.bucket, s3.key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendSpecError {
    #[error("no backend kind configured (expected one of: s3)")]
    NoKind,
    #[error("exactly one backend kind must be configured, found: {}", .0.join(", "))]
    MultipleKinds(Vec<&'static str>),
    #[error("unsupported backend type: {0}")]
    UnknownType(String),
    #[error("backend type '{declared}' does not match configured kind '{populated}'")]
    TypeMismatch {
        declared: String,
        populated: &'static str,
    },
}

impl TryFrom<&BackendSpec> for BackendDescriptor {
    type Error = BackendSpecError;

    fn try_from(spec: &BackendSpec) -> Result<Self, Self::Error> {
        let populated: Vec<&'static str> = [spec.s3.as_ref().map(|_| "s3")]
            .into_iter()
            .flatten()
            .collect();

        if let Some(declared) = spec.backend_type.as_deref().filter(|t| !t.is_empty()) {
            let declared = declared.to_lowercase();
            if declared != "s3" {
                return Err(BackendSpecError::UnknownType(declared));
            }
            if let [kind] = populated.as_slice() {
                if *kind != declared {
                    return Err(BackendSpecError::TypeMismatch {
                        declared,
                        populated: *kind,
                    });
                }
            }
        }

        match (populated.as_slice(), &spec.s3) {
            ([], _) => Err(BackendSpecError::NoKind),
            (["s3"], Some(s3)) => Ok(BackendDescriptor::S3(s3.clone())),
            _ => Err(BackendSpecError::MultipleKinds(populated)),
        }
    }
}
