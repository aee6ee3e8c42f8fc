//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of the `TerraformOutputs` custom resource
pub const API_GROUP: &str = "tfout.wibrow.net";

/// API version of the `TerraformOutputs` custom resource
pub const API_VERSION: &str = "v1alpha1";

/// Kind of the `TerraformOutputs` custom resource
pub const KIND: &str = "TerraformOutputs";

/// Annotation prefix for the last observed S3 ETag, suffixed with the backend index
pub const ETAG_ANNOTATION_PREFIX: &str = "terraform-tfout.wibrow.net/s3-etag-";

/// Value of the `app.kubernetes.io/managed-by` label on generated ConfigMaps/Secrets
pub const MANAGED_BY: &str = "tfout";

/// Label key for the managing tool
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Label key naming the `TerraformOutputs` resource an artifact was generated from
pub const SOURCE_LABEL: &str = "terraform-outputs/source";

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "tfout-controller";

/// Default sync interval when `syncInterval` is missing or unparseable (seconds)
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

/// Default target namespace for generated ConfigMaps/Secrets
pub const DEFAULT_TARGET_NAMESPACE: &str = "default";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default requeue interval for errors raised before the sync interval is known (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default upper bound for a single reconciliation pass (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 300;

/// Serial processing avoids two passes racing on ETag annotations and status
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 1;

/// Attempts for a conflict-safe read-modify-write of the resource
pub const DEFAULT_CONFLICT_RETRY_ATTEMPTS: u32 = 5;

/// Delay between conflict retries (milliseconds)
pub const DEFAULT_CONFLICT_RETRY_BACKOFF_MS: u64 = 10;

/// Default delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Upper bound for the HTTP server to bind before startup fails (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for the HTTP server to bind (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
