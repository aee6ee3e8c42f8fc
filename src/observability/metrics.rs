//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! Every metric lives in a registry owned by a [`SyncMetrics`] instance, so a
//! reconciler (or a test) can be built without touching process-wide state.
//!
//! ## Metrics Exposed
//!
//! - `terraform_outputs_reconcile_total` - Reconciliations by result
//! - `terraform_outputs_reconcile_duration_seconds` - Duration of reconciliations
//! - `terraform_outputs_backend_fetch_total` - Backend fetches by backend and result
//! - `terraform_outputs_backend_fetch_duration_seconds` - Duration of backend fetches
//! - `terraform_outputs_found_total` - Outputs found across all backends (gauge)
//! - `terraform_outputs_sensitive_total` - Sensitive outputs found (gauge)
//! - `terraform_outputs_last_sync_timestamp` - Unix time of the last successful sync
//! - `terraform_outputs_s3_requests_total` - S3 requests by operation and result
//! - `terraform_outputs_configmap_operations_total` - ConfigMap writes
//! - `terraform_outputs_secret_operations_total` - Secret writes

use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Result label value for a successful operation
pub const RESULT_SUCCESS: &str = "success";
/// Result label value for a failed operation
pub const RESULT_ERROR: &str = "error";

/// Counters, gauges and histograms recorded by one reconciler
#[derive(Debug, Clone)]
pub struct SyncMetrics {
    registry: Registry,
    reconcile_total: IntCounterVec,
    reconcile_duration: HistogramVec,
    backend_fetch_total: IntCounterVec,
    backend_fetch_duration: HistogramVec,
    outputs_found: IntGaugeVec,
    sensitive_outputs_found: IntGaugeVec,
    last_sync_timestamp: GaugeVec,
    s3_requests_total: IntCounterVec,
    configmap_operations_total: IntCounterVec,
    secret_operations_total: IntCounterVec,
}

impl SyncMetrics {
    /// Create the metric set and register it with a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconcile_total = IntCounterVec::new(
            Opts::new(
                "terraform_outputs_reconcile_total",
                "Total number of reconciliations",
            ),
            &["namespace", "name", "result"],
        )?;
        let reconcile_duration = HistogramVec::new(
            HistogramOpts::new(
                "terraform_outputs_reconcile_duration_seconds",
                "Duration of reconciliation operations",
            ),
            &["namespace", "name", "result"],
        )?;
        let backend_fetch_total = IntCounterVec::new(
            Opts::new(
                "terraform_outputs_backend_fetch_total",
                "Total number of backend fetches",
            ),
            &["namespace", "name", "backend_type", "backend_index", "result"],
        )?;
        let backend_fetch_duration = HistogramVec::new(
            HistogramOpts::new(
                "terraform_outputs_backend_fetch_duration_seconds",
                "Duration of backend fetch operations",
            ),
            &["namespace", "name", "backend_type", "backend_index"],
        )?;
        let outputs_found = IntGaugeVec::new(
            Opts::new(
                "terraform_outputs_found_total",
                "Total number of outputs found from all backends",
            ),
            &["namespace", "name"],
        )?;
        let sensitive_outputs_found = IntGaugeVec::new(
            Opts::new(
                "terraform_outputs_sensitive_total",
                "Total number of sensitive outputs found",
            ),
            &["namespace", "name"],
        )?;
        let last_sync_timestamp = GaugeVec::new(
            Opts::new(
                "terraform_outputs_last_sync_timestamp",
                "Timestamp of the last successful sync",
            ),
            &["namespace", "name"],
        )?;
        let s3_requests_total = IntCounterVec::new(
            Opts::new(
                "terraform_outputs_s3_requests_total",
                "Total number of S3 requests",
            ),
            &["operation", "result"],
        )?;
        let configmap_operations_total = IntCounterVec::new(
            Opts::new(
                "terraform_outputs_configmap_operations_total",
                "Total number of ConfigMap operations",
            ),
            &["namespace", "name", "operation", "result"],
        )?;
        let secret_operations_total = IntCounterVec::new(
            Opts::new(
                "terraform_outputs_secret_operations_total",
                "Total number of Secret operations",
            ),
            &["namespace", "name", "operation", "result"],
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(reconcile_duration.clone()))?;
        registry.register(Box::new(backend_fetch_total.clone()))?;
        registry.register(Box::new(backend_fetch_duration.clone()))?;
        registry.register(Box::new(outputs_found.clone()))?;
        registry.register(Box::new(sensitive_outputs_found.clone()))?;
        registry.register(Box::new(last_sync_timestamp.clone()))?;
        registry.register(Box::new(s3_requests_total.clone()))?;
        registry.register(Box::new(configmap_operations_total.clone()))?;
        registry.register(Box::new(secret_operations_total.clone()))?;

        Ok(Self {
            registry,
            reconcile_total,
            reconcile_duration,
            backend_fetch_total,
            backend_fetch_duration,
            outputs_found,
            sensitive_outputs_found,
            last_sync_timestamp,
            s3_requests_total,
            configmap_operations_total,
            secret_operations_total,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn encode_text(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub fn record_reconcile(&self, namespace: &str, name: &str, result: &str, seconds: f64) {
        self.reconcile_total
            .with_label_values(&[namespace, name, result])
            .inc();
        self.reconcile_duration
            .with_label_values(&[namespace, name, result])
            .observe(seconds);
    }

    pub fn record_backend_fetch(
        &self,
        namespace: &str,
        name: &str,
        backend_type: &str,
        backend_index: usize,
        result: &str,
        seconds: f64,
    ) {
        let index = backend_index.to_string();
        self.backend_fetch_total
            .with_label_values(&[namespace, name, backend_type, index.as_str(), result])
            .inc();
        if result == RESULT_SUCCESS {
            self.backend_fetch_duration
                .with_label_values(&[namespace, name, backend_type, index.as_str()])
                .observe(seconds);
        }
    }

    /// Record output counts and the sync timestamp after a successful pass
    pub fn record_sync_success(
        &self,
        namespace: &str,
        name: &str,
        outputs: usize,
        sensitive: usize,
        timestamp: f64,
    ) {
        self.outputs_found
            .with_label_values(&[namespace, name])
            .set(i64::try_from(outputs).unwrap_or(i64::MAX));
        self.sensitive_outputs_found
            .with_label_values(&[namespace, name])
            .set(i64::try_from(sensitive).unwrap_or(i64::MAX));
        self.last_sync_timestamp
            .with_label_values(&[namespace, name])
            .set(timestamp);
    }

    pub fn record_s3_request(&self, operation: &str, result: &str) {
        self.s3_requests_total
            .with_label_values(&[operation, result])
            .inc();
    }

    pub fn record_configmap_operation(
        &self,
        namespace: &str,
        name: &str,
        operation: &str,
        result: &str,
    ) {
        self.configmap_operations_total
            .with_label_values(&[namespace, name, operation, result])
            .inc();
    }

    pub fn record_secret_operation(&self, namespace: &str, name: &str, operation: &str, result: &str) {
        self.secret_operations_total
            .with_label_values(&[namespace, name, operation, result])
            .inc();
    }

    #[must_use]
    pub fn reconcile_count(&self, namespace: &str, name: &str, result: &str) -> u64 {
        self.reconcile_total
            .with_label_values(&[namespace, name, result])
            .get()
    }

    #[must_use]
    pub fn s3_request_count(&self, operation: &str, result: &str) -> u64 {
        self.s3_requests_total
            .with_label_values(&[operation, result])
            .get()
    }

    #[must_use]
    pub fn outputs_found(&self, namespace: &str, name: &str) -> i64 {
        self.outputs_found.with_label_values(&[namespace, name]).get()
    }

    #[must_use]
    pub fn sensitive_outputs_found(&self, namespace: &str, name: &str) -> i64 {
        self.sensitive_outputs_found
            .with_label_values(&[namespace, name])
            .get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instances_do_not_share_state() {
        let a = SyncMetrics::new().unwrap();
        let b = SyncMetrics::new().unwrap();
        a.record_reconcile("default", "net", RESULT_SUCCESS, 0.2);
        assert_eq!(a.reconcile_count("default", "net", RESULT_SUCCESS), 1);
        assert_eq!(b.reconcile_count("default", "net", RESULT_SUCCESS), 0);
    }

    #[test]
    fn test_encode_text_contains_metric_names() {
        let metrics = SyncMetrics::new().unwrap();
        metrics.record_s3_request("HeadObject", RESULT_SUCCESS);
        metrics.record_sync_success("default", "net", 4, 1, 1_700_000_000.0);
        let text = String::from_utf8(metrics.encode_text().unwrap()).unwrap();
        assert!(text.contains("terraform_outputs_s3_requests_total"));
        assert!(text.contains("terraform_outputs_found_total"));
        assert_eq!(metrics.sensitive_outputs_found("default", "net"), 1);
    }
}
