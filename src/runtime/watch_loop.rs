//! # Watch Loop
//!
//! Runs the kube-runtime controller over `TerraformOutputs` resources and the
//! ConfigMaps/Secrets they own. Deleting or editing an owned artifact
//! re-triggers reconciliation of its owner.

use crate::constants::{MANAGED_BY, MANAGED_BY_LABEL};
use crate::controller::reconciler::reconcile;
use crate::controller::server::ServerState;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use crate::runtime::initialization::InitializationResult;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::Api;
use kube_runtime::controller::{self, Controller};
use kube_runtime::watcher;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

/// Resolves on the first SIGTERM or SIGINT
///
/// A signal that cannot be registered is logged and never fires.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}

/// Mark the server not ready and cancel `shutdown` once `signal` resolves
pub fn spawn_shutdown_handler<F>(
    signal: F,
    shutdown: CancellationToken,
    server_state: Arc<ServerState>,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;
        info!("Initiating graceful shutdown...");
        server_state.set_ready(false);
        shutdown.cancel();
    })
}

/// Run the controller watch loop until shutdown
///
/// The watch restarts after a delay whenever its stream ends.
pub async fn run_watch_loop(init: InitializationResult) -> Result<(), anyhow::Error> {
    let InitializationResult {
        client,
        resources,
        reconciler,
        server_state,
        shutdown,
    } = init;

    let concurrency = reconciler.config.max_concurrent_reconciliations;
    let restart_delay = reconciler.config.watch_restart_delay();
    let owned_selector = format!("{MANAGED_BY_LABEL}={MANAGED_BY}");

    // SIGTERM/SIGINT: mark not ready, cancel the in-flight pass, stop the controller
    spawn_shutdown_handler(shutdown_signal(), shutdown.clone(), Arc::clone(&server_state));

    loop {
        if shutdown.is_cancelled() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        info!(concurrency = concurrency, "Starting controller watch loop...");
        let owned = watcher::Config::default().labels(&owned_selector);
        Controller::new(resources.clone(), watcher::Config::default().any_semantic())
            .owns(Api::<ConfigMap>::all(client.clone()), owned.clone())
            .owns(Api::<Secret>::all(client.clone()), owned)
            .with_config(controller::Config::default().concurrency(concurrency))
            .graceful_shutdown_on(shutdown.clone().cancelled_owned())
            .run(reconcile, handle_reconciliation_error, reconciler.clone())
            .for_each(|result| async move {
                match result {
                    Ok((object, action)) => {
                        debug!(resource = %object, action = ?action, "watch.event.success");
                    }
                    // Already logged and requeued by the error policy
                    Err(controller::Error::ReconcilerFailed(error, object)) => {
                        debug!(resource = %object, error = %error, "watch.event.reconcile_failed");
                    }
                    Err(e) => {
                        handle_watch_stream_error(&e.to_string());
                    }
                }
            })
            .instrument(watch_span)
            .await;

        if shutdown.is_cancelled() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
