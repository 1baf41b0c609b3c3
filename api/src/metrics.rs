//! Prometheus metrics for the inference service
//!
//! Every routed request is counted by method, route template and status, and
//! its latency observed in a histogram. `GET /metrics` renders the registry in
//! the Prometheus text format.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

/// Request metrics of one service instance.
#[derive(Clone)]
pub struct ApiMetrics {
    registry: Arc<Registry>,
    pub requests_total: CounterVec,
    pub request_duration: HistogramVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests handled"),
            &["method", "handler", "status"],
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "handler"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            request_duration,
        })
    }

    /// Record one finished request
    pub fn record_request(&self, method: &str, handler: &str, status: u16, latency_secs: f64) {
        self.requests_total
            .with_label_values(&[method, handler, &status.to_string()])
            .inc();
        self.request_duration
            .with_label_values(&[method, handler])
            .observe(latency_secs);
    }

    /// Get Prometheus text output
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Middleware recording count and latency of each routed request.
pub async fn track_metrics(
    State(metrics): State<ApiMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let handler = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    metrics.record_request(
        &method,
        &handler,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
