//! # Controller
//!
//! Core controller modules for the Terraform outputs controller.
//!
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod reconciler;
pub mod server;
