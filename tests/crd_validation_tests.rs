//! # CRD Validation Tests
//!
//! Tests for the CRD elements to catch schema drift early.
//! These tests validate that sample resources deserialize correctly and that
//! the generated definition carries the expected names and subresources.

use kube::core::CustomResourceExt;
use tfout_controller::crd::{BackendDescriptor, SyncPhase, TerraformOutputs};

#[test]
fn test_full_resource_deserializes() {
    let yaml = r#"
apiVersion: tfout.wibrow.net/v1alpha1
kind: TerraformOutputs
metadata:
  name: network-outputs
  namespace: infra
spec:
  backends:
    - s3:
        bucket: tf-state
        key: network/terraform.tfstate
        region: eu-west-1
        endpoint: http://minio.storage:9000
        role: arn:aws:iam::123456789012:role/tf-reader
    - type: s3
      s3:
        bucket: tf-state
        key: dns/terraform.tfstate
        region: eu-west-1
  syncInterval: 1h30m
  target:
    namespace: apps
    configMapName: network-outputs
    secretName: network-secrets
status:
  lastSyncTime: "2024-01-01T00:00:00Z"
  syncStatus: Success
  message: Successfully synced 3 outputs
  outputCount: 3
  conditions:
    - type: Ready
      status: "True"
      reason: SyncSucceeded
"#;

    let resource: TerraformOutputs =
        serde_yaml::from_str(yaml).expect("Failed to deserialize TerraformOutputs");

    assert_eq!(resource.spec.backends.len(), 2);
    assert_eq!(resource.spec.sync_interval, "1h30m");
    assert_eq!(resource.spec.target.namespace, "apps");
    assert_eq!(resource.spec.target.config_map_name(), Some("network-outputs"));

    let first = BackendDescriptor::try_from(&resource.spec.backends[0]).unwrap();
    let BackendDescriptor::S3(s3) = &first;
    assert_eq!(s3.endpoint(), Some("http://minio.storage:9000"));
    assert_eq!(s3.role(), Some("arn:aws:iam::123456789012:role/tf-reader"));
    assert_eq!(first.location(), "s3://tf-state/network/terraform.tfstate");

    let status = resource.status.unwrap();
    assert_eq!(status.sync_status, Some(SyncPhase::Success));
    assert_eq!(status.output_count, 3);
    assert!(status.last_sync().is_some());
}

#[test]
fn test_minimal_resource_uses_defaults() {
    let yaml = r#"
apiVersion: tfout.wibrow.net/v1alpha1
kind: TerraformOutputs
metadata:
  name: minimal
spec:
  backends:
    - s3:
        bucket: tf-state
        key: terraform.tfstate
        region: us-east-1
  target:
    configMapName: minimal-outputs
"#;

    let resource: TerraformOutputs = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(resource.spec.sync_interval, "5m");
    assert_eq!(resource.spec.target.namespace, "default");
    assert_eq!(resource.spec.target.secret_name(), None);
    assert!(resource.status.is_none());
}

#[test]
fn test_generated_crd_names_and_subresources() {
    let crd = serde_json::to_value(TerraformOutputs::crd()).unwrap();

    assert_eq!(crd["metadata"]["name"], "terraformoutputs.tfout.wibrow.net");
    assert_eq!(crd["spec"]["group"], "tfout.wibrow.net");
    assert_eq!(crd["spec"]["scope"], "Namespaced");
    assert_eq!(crd["spec"]["names"]["kind"], "TerraformOutputs");
    assert_eq!(crd["spec"]["names"]["shortNames"][0], "tfo");

    let version = &crd["spec"]["versions"][0];
    assert_eq!(version["name"], "v1alpha1");
    assert!(version["subresources"]["status"].is_object());

    let columns: Vec<&str> = version["additionalPrinterColumns"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(columns, vec!["Bucket", "Status", "Outputs", "Last Sync"]);
}

#[test]
fn test_generated_crd_schema_requires_backends_and_target() {
    let crd = serde_json::to_value(TerraformOutputs::crd()).unwrap();
    let spec_schema =
        &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["spec"];

    let required: Vec<&str> = spec_schema["required"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r.as_str())
        .collect();
    assert!(required.contains(&"backends"));
    assert!(required.contains(&"target"));
    assert!(!required.contains(&"syncInterval"));
    assert_eq!(spec_schema["properties"]["backends"]["minItems"], 1);
}
