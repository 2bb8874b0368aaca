//! Prometheus metrics backend for cmdrun job execution.
//!
//! This crate provides a [`PrometheusMetrics`] implementation of [`cmdrun_core::MetricsBackend`] that exposes metrics in Prometheus format.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use cmdrun_core::MetricsHandle;
//! use cmdrun_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: MetricsHandle = Arc::new(metrics.clone());
//!
//! // Render for a `/metrics` endpoint.
//! let body = metrics.render()?;
//! assert!(body.contains("cmdrun_jobs_started_total"));
//! # let _ = handle;
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `cmdrun_jobs_started_total` - Counter
//! - `cmdrun_jobs_completed_total{outcome}` - Counter
//! - `cmdrun_job_duration_seconds` - Histogram
//! - `cmdrun_store_errors_total{kind}` - Counter
//!
//! ## HTTP Server
//! This crate does NOT provide an HTTP server for the `/metrics` endpoint.
//! Mount [`PrometheusMetrics::render`] in your application's router.

mod backend;
pub use backend::{MetricsError, PrometheusMetrics};

pub use prometheus::{Encoder, Registry, TextEncoder};
