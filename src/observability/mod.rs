//! # Observability
//!
//! - `metrics`: Prometheus metrics owned by the reconciler
//! - `logging`: tracing subscriber setup

pub mod logging;
pub mod metrics;

pub use metrics::SyncMetrics;
