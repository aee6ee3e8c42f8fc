//! # TerraformOutputs Spec
//!
//! Main CRD specification types and default values.

use serde::{Deserialize, Serialize};

/// TerraformOutputs Custom Resource Definition
///
/// Projects the outputs of one or more Terraform state files into a ConfigMap
/// (non-sensitive outputs) and a Secret (sensitive outputs).
///
/// # Example
///
/// ```yaml
/// apiVersion: tfout.wibrow.net/v1alpha1
/// kind: TerraformOutputs
/// metadata:
///   name: network-outputs
///   namespace: default
/// spec:
///   backends:
///     - s3:
///         bucket: my-terraform-state
///         key: network/terraform.tfstate
///         region: eu-west-1
///   syncInterval: 5m
///   target:
///     namespace: apps
///     configMapName: network-outputs
///     secretName: network-outputs-secret
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "TerraformOutputs",
    group = "tfout.wibrow.net",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::TerraformOutputsStatus",
    shortname = "tfo",
    printcolumn = r#"{"name":"Bucket", "type":"string", "jsonPath":".spec.backends[0].s3.bucket"}, {"name":"Status", "type":"string", "jsonPath":".status.syncStatus"}, {"name":"Outputs", "type":"integer", "jsonPath":".status.outputCount"}, {"name":"Last Sync", "type":"date", "jsonPath":".status.lastSyncTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TerraformOutputsSpec {
    /// Terraform state backends, merged in order (a later backend wins on key collisions)
    #[schemars(length(min = 1))]
    pub backends: Vec<crate::crd::BackendSpec>,
    /// How often to check the backends for changes
    /// Format: Go-style duration string (e.g., "30s", "5m", "1h30m")
    /// Default: "5m"
    #[serde(default = "default_sync_interval")]
    pub sync_interval: String,
    /// Where the outputs are stored
    pub target: TargetSpec,
}

/// Target ConfigMap/Secret for the projected outputs
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    /// Namespace where the ConfigMap/Secret are created
    #[serde(default = "default_target_namespace")]
    pub namespace: String,
    /// ConfigMap for non-sensitive outputs
    #[serde(default)]
    pub config_map_name: Option<String>,
    /// Secret for sensitive outputs (sensitivity comes from the Terraform state)
    #[serde(default)]
    pub secret_name: Option<String>,
}

impl TargetSpec {
    /// Configured ConfigMap name, ignoring empty strings
    #[must_use]
    pub fn config_map_name(&self) -> Option<&str> {
        self.config_map_name.as_deref().filter(|n| !n.is_empty())
    }

    /// Configured Secret name, ignoring empty strings
    #[must_use]
    pub fn secret_name(&self) -> Option<&str> {
        self.secret_name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Default value for the sync interval
pub fn default_sync_interval() -> String {
    "5m".to_string()
}

/// Default value for the target namespace
pub fn default_target_namespace() -> String {
    crate::constants::DEFAULT_TARGET_NAMESPACE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults_from_yaml() {
        let spec: TerraformOutputsSpec = serde_yaml::from_str(
            r"
backends:
  - s3:
      bucket: state
      key: prod/terraform.tfstate
      region: us-east-1
target:
  configMapName: outputs
",
        )
        .unwrap();

        assert_eq!(spec.sync_interval, "5m");
        assert_eq!(spec.target.namespace, "default");
        assert_eq!(spec.target.config_map_name(), Some("outputs"));
        assert_eq!(spec.target.secret_name(), None);
        assert_eq!(spec.backends.len(), 1);
    }

    #[test]
    fn test_empty_target_names_are_unset() {
        let target = TargetSpec {
            namespace: "default".to_string(),
            config_map_name: Some(String::new()),
            secret_name: Some(String::new()),
        };
        assert_eq!(target.config_map_name(), None);
        assert_eq!(target.secret_name(), None);
    }
}
