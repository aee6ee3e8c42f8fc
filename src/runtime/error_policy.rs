//! # Error Policy
//!
//! Error handling for the controller watch loop: requeueing failed
//! reconciliations and classifying watch stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::TerraformOutputs;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, warn};

/// Requeue a failed reconciliation after the delay carried by the error
///
/// Errors raised once the sync interval is known carry that interval;
/// earlier failures carry the configured error requeue delay.
pub fn handle_reconciliation_error(
    obj: Arc<TerraformOutputs>,
    error: &ReconcilerError,
    _ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    let requeue_after = error.requeue_after();
    error!(
        requeue_after_secs = requeue_after.as_secs(),
        "Reconciliation error for {}/{}: {}", namespace, name, error
    );
    Action::requeue(requeue_after)
}

/// Classification of a watch stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// 401: credentials or RBAC revoked
    Unauthorized,
    /// 410: resource version expired, the watch restarts
    Expired,
    /// 429: API server storage reinitializing
    Throttled,
    /// 404: CRD missing or resource deleted
    NotFound,
    Other,
}

#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    // 404 is checked first: a plain-text 404 body also surfaces as "WatchFailed"
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    if is_not_found {
        return WatchErrorKind::NotFound;
    }
    if error_string.contains("401") || error_string.contains("Unauthorized") {
        return WatchErrorKind::Unauthorized;
    }
    if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        return WatchErrorKind::Expired;
    }
    if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        return WatchErrorKind::Throttled;
    }
    WatchErrorKind::Other
}

/// Log a watch stream error at a level matching its kind
pub fn handle_watch_stream_error(error_string: &str) -> WatchErrorKind {
    let kind = classify_watch_error(error_string);
    match kind {
        WatchErrorKind::Unauthorized => error!(
            error = error_string,
            "Watch authentication failed (401 Unauthorized), RBAC may have been revoked or token expired"
        ),
        WatchErrorKind::Expired => warn!(
            error = error_string,
            "Watch resource version expired (410), watch will restart"
        ),
        WatchErrorKind::Throttled => warn!(
            error = error_string,
            "API server storage reinitializing (429)"
        ),
        WatchErrorKind::NotFound => warn!(
            error = error_string,
            "Resource not found (404), the TerraformOutputs CRD may be missing"
        ),
        WatchErrorKind::Other => error!(error = error_string, "Controller stream error"),
    }
    kind
}
