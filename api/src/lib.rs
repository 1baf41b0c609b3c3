//! Titanic API Module
//!
//! HTTP inference service: `GET /predict/` answers with the Production
//! model's survival prediction, `GET /health` reports liveness and
//! `GET /metrics` exposes Prometheus request metrics.

pub mod handlers;
pub mod metrics;
pub mod models;
pub mod server;

pub use handlers::*;
pub use metrics::ApiMetrics;
pub use models::*;
pub use server::*;
