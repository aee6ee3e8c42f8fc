//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "plain" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown log format '{s}', expected text or json"))
    }
}

/// Which rule decides whether an output lands in the Secret or the ConfigMap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensitivityPolicyKind {
    /// Use the `sensitive` flag recorded in the Terraform state
    #[default]
    Declared,
    /// Treat exactly the keys listed in `SENSITIVE_KEYS` as sensitive
    AllowList,
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Worker limit for the controller; 1 keeps processing serial
    pub max_concurrent_reconciliations: u16,
    /// Deadline for one reconciliation pass (seconds)
    pub reconcile_timeout_secs: u64,
    /// Requeue delay for errors raised before a sync interval is known (seconds)
    pub reconciliation_error_requeue_secs: u64,
    /// Attempts for conflict-safe resource updates
    pub conflict_retry_attempts: u32,
    /// Delay between conflict retries (milliseconds)
    pub conflict_retry_backoff_ms: u64,
    /// Delay before restarting the watch stream after it ends (seconds)
    pub watch_restart_delay_secs: u64,
    pub log_format: LogFormat,
    pub sensitivity_policy: SensitivityPolicyKind,
    /// Keys routed to the Secret when `sensitivity_policy` is `AllowList`
    pub sensitive_keys: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        use crate::constants::{
            DEFAULT_CONFLICT_RETRY_ATTEMPTS, DEFAULT_CONFLICT_RETRY_BACKOFF_MS,
            DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_METRICS_PORT,
            DEFAULT_RECONCILE_TIMEOUT_SECS, DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            DEFAULT_WATCH_RESTART_DELAY_SECS,
        };

        let sensitivity_policy = match lookup("SENSITIVITY_POLICY")
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            Some("allow-list" | "allowlist" | "allow_list") => SensitivityPolicyKind::AllowList,
            _ => SensitivityPolicyKind::Declared,
        };

        let sensitive_keys = lookup("SENSITIVE_KEYS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            metrics_port: parsed_or(&lookup, "METRICS_PORT", DEFAULT_METRICS_PORT),
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty()),
            max_concurrent_reconciliations: parsed_or(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            )
            .max(1),
            reconcile_timeout_secs: parsed_or(
                &lookup,
                "RECONCILE_TIMEOUT_SECS",
                DEFAULT_RECONCILE_TIMEOUT_SECS,
            ),
            reconciliation_error_requeue_secs: parsed_or(
                &lookup,
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            ),
            conflict_retry_attempts: parsed_or(
                &lookup,
                "CONFLICT_RETRY_ATTEMPTS",
                DEFAULT_CONFLICT_RETRY_ATTEMPTS,
            )
            .max(1),
            conflict_retry_backoff_ms: parsed_or(
                &lookup,
                "CONFLICT_RETRY_BACKOFF_MS",
                DEFAULT_CONFLICT_RETRY_BACKOFF_MS,
            ),
            watch_restart_delay_secs: parsed_or(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            sensitivity_policy,
            sensitive_keys,
        }
    }

    /// Get reconcile pass deadline
    #[must_use]
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Get reconciliation error requeue duration
    #[must_use]
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    /// Get delay between conflict retries
    #[must_use]
    pub fn conflict_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.conflict_retry_backoff_ms)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read a value through `lookup` and parse it, falling back to `default`
fn parsed_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ControllerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.metrics_port, 8080);
        assert_eq!(config.max_concurrent_reconciliations, 1);
        assert_eq!(config.conflict_retry_attempts, 5);
        assert_eq!(config.conflict_retry_backoff(), Duration::from_millis(10));
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.sensitivity_policy, SensitivityPolicyKind::Declared);
        assert!(config.watch_namespace.is_none());
        assert!(config.sensitive_keys.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("METRICS_PORT", "9100"),
            ("WATCH_NAMESPACE", "infra"),
            ("LOG_FORMAT", "JSON"),
            ("CONFLICT_RETRY_ATTEMPTS", "8"),
            ("SENSITIVITY_POLICY", "allow-list"),
            ("SENSITIVE_KEYS", "db_pass, api_token ,,"),
        ]);
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.watch_namespace.as_deref(), Some("infra"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.conflict_retry_attempts, 8);
        assert_eq!(config.sensitivity_policy, SensitivityPolicyKind::AllowList);
        assert_eq!(config.sensitive_keys, vec!["db_pass", "api_token"]);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("METRICS_PORT", "not-a-port"),
            ("MAX_CONCURRENT_RECONCILIATIONS", "0"),
            ("LOG_FORMAT", "xml"),
            ("WATCH_NAMESPACE", "  "),
        ]);
        assert_eq!(config.metrics_port, 8080);
        assert_eq!(config.max_concurrent_reconciliations, 1);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.watch_namespace.is_none());
    }
}
