//! # CRD Generator
//!
//! Generates the `TerraformOutputs` CustomResourceDefinition YAML.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/terraformoutputs.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use tfout_controller::crd::TerraformOutputs;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&TerraformOutputs::crd())?);
    Ok(())
}
