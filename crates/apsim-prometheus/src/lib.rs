//! Prometheus metrics backend for the server manager.
//!
//! [`PrometheusMetrics`] implements [`apsim_core::MetricsBackend`] on top of
//! its own registry, so it never collides with other collectors in the process.
//!
//! ## Metrics
//! - `apsim_uploads_total{kind}` - Counter (`primary`, `auxiliary`)
//! - `apsim_swaps_total{outcome}` - Counter (`started`, `failed`, `resumed`)
//! - `apsim_backend_running` - Gauge (0 or 1)
//!
//! ## HTTP Server
//! This crate does NOT serve `/metrics`. Mount [`PrometheusMetrics::encode_text`]
//! on the application's router.

mod backend;
pub use backend::PrometheusMetrics;
