//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::ControllerConfig;
use crate::constants::{DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::TerraformOutputs;
use crate::observability::logging::init_tracing;
use anyhow::{Context, Result};
use kube::{api::Api, Client};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// API for the TerraformOutputs CRD (one namespace or all)
    pub resources: Api<TerraformOutputs>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Cancelled on shutdown
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready.load(Ordering::Relaxed))
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Kubernetes client creation
/// - Reconciler and metrics setup
/// - HTTP server startup
pub async fn initialize(config: ControllerConfig) -> Result<InitializationResult> {
    // Required for rustls 0.23+ when no default provider is set via features
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    init_tracing(config.log_format)?;
    if !provider_installed {
        info!("rustls crypto provider already installed");
    }

    info!("Starting Terraform outputs controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(config = ?config, "Loaded controller configuration");

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let resources: Api<TerraformOutputs> = match config.watch_namespace.as_deref() {
        Some(namespace) => {
            info!(namespace = namespace, "Watching TerraformOutputs in a single namespace");
            Api::namespaced(client.clone(), namespace)
        }
        None => Api::all(client.clone()),
    };

    let shutdown = CancellationToken::new();
    let metrics_port = config.metrics_port;
    let reconciler = Arc::new(
        Reconciler::for_cluster(client.clone(), config)?.with_cancellation(shutdown.child_token()),
    );

    let server_state = Arc::new(ServerState::new(Arc::clone(&reconciler.metrics)));
    let server_handle = {
        let state = Arc::clone(&server_state);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = start_server(metrics_port, state, shutdown).await {
                error!("HTTP server error: {}", e);
            }
        })
    };
    wait_for_server_ready(&server_state, &server_handle).await?;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        resources,
        reconciler,
        server_state,
        shutdown,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(DEFAULT_SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = Duration::from_millis(DEFAULT_SERVER_POLL_INTERVAL_MS);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
