//! API Server Module
//!
//! This module contains the server setup functionality for the inference service.

use anyhow::{Context, Result};
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use titanic_core::config::Settings;
use titanic_core::ml_integration::{ModelRegistry, ModelResolver};

use crate::handlers::{health_check, metrics_handler, predict, ApiState};
use crate::metrics::track_metrics;
use crate::models::ApiConfig;

/// Routes of the inference service over `state`.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/predict/", get(predict))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_metrics,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main API server
pub struct ApiServer {
    /// Server configuration
    config: ApiConfig,
    /// Shared state
    state: Arc<ApiState>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(
        config: ApiConfig,
        resolver: Arc<ModelResolver>,
        model_name: String,
    ) -> Result<Self> {
        let state = ApiState::new(resolver, model_name)
            .context("Failed to register request metrics")?;
        Ok(Self {
            config,
            state: Arc::new(state),
        })
    }

    /// Server for `settings.model_name`, resolving through `registry` with
    /// the configured cache TTL.
    pub fn from_settings(settings: &Settings, registry: Arc<dyn ModelRegistry>) -> Result<Self> {
        let resolver = Arc::new(ModelResolver::new(registry, settings.model_cache_ttl()));
        Self::new(
            ApiConfig::from_settings(settings),
            resolver,
            settings.model_name.clone(),
        )
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    /// Start the API server and run until Ctrl-C.
    pub async fn start(&self) -> Result<()> {
        let addr = self.config.bind_address();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!(
            "Titanic API server listening on {} (model '{}')",
            addr, self.state.model_name
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("API server terminated unexpectedly")?;

        info!("Titanic API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
