//! # Terraform Outputs Controller
//!
//! A Kubernetes controller that projects Terraform outputs into the cluster.
//!
//! ## Overview
//!
//! For every `TerraformOutputs` resource the controller:
//!
//! 1. **Watches S3 state files** - Compares object ETags against annotations on the resource
//! 2. **Merges outputs** - Reads the `outputs` section of each state file, later backends win
//! 3. **Projects outputs** - Writes non-sensitive values to a ConfigMap and sensitive ones to a Secret
//! 4. **Reports status** - Keeps a `Ready` condition, sync time and output count on the resource
//!
//! ## Usage
//!
//! ```bash
//! tfout-controller --watch-namespace infra --log-format json
//! ```

use clap::Parser;
use tfout_controller::config::{ControllerConfig, LogFormat};
use tfout_controller::runtime::{initialize, run_watch_loop};

/// Command line overrides applied on top of the environment configuration
#[derive(Debug, Parser)]
#[command(name = "tfout-controller", version, about)]
struct Cli {
    /// Port for /metrics, /healthz and /readyz
    #[arg(long)]
    port: Option<u16>,

    /// Log output format (text or json)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Watch a single namespace instead of the whole cluster
    #[arg(long, env = "WATCH_NAMESPACE")]
    watch_namespace: Option<String>,
}

impl Cli {
    fn apply(self, mut config: ControllerConfig) -> ControllerConfig {
        if let Some(port) = self.port {
            config.metrics_port = port;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(namespace) = self.watch_namespace.filter(|ns| !ns.trim().is_empty()) {
            config.watch_namespace = Some(namespace);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().apply(ControllerConfig::from_env());
    let init = initialize(config).await?;
    run_watch_loop(init).await
}
