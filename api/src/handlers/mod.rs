//! API Handlers Module
//!
//! This module contains the request handlers for the inference service.

use axum::{
    debug_handler,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use thiserror::Error;

use titanic_core::error::InferenceError;
use titanic_core::ml_integration::{ModelResolver, PredictRequest};

use crate::metrics::ApiMetrics;
use crate::models::{ErrorBody, HealthResponse, PredictResponse};

pub const SERVICE_NAME: &str = "titanic-api";

/// Represents the state of the API server
pub struct ApiState {
    /// Production model resolver
    pub resolver: Arc<ModelResolver>,
    /// Registered model served by `/predict/`
    pub model_name: String,
    /// Request metrics exposed at `/metrics`
    pub metrics: ApiMetrics,
}

impl ApiState {
    pub fn new(
        resolver: Arc<ModelResolver>,
        model_name: impl Into<String>,
    ) -> Result<Self, prometheus::Error> {
        Ok(Self {
            resolver,
            model_name: model_name.into(),
            metrics: ApiMetrics::new()?,
        })
    }
}

/// Failures surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Inference(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Prediction failed: {}", self);
        } else {
            tracing::debug!("Rejected prediction request: {}", self);
        }
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint
#[debug_handler]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

/// Prometheus scrape endpoint
#[debug_handler]
pub async fn metrics_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        state.metrics.gather(),
    )
}

/// Predict survival for one passenger with the Production model
#[debug_handler]
pub async fn predict(
    State(state): State<Arc<ApiState>>,
    query: Result<Query<PredictRequest>, QueryRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Query(request) = query?;
    tracing::debug!("Predicting with '{}': {:?}", state.model_name, request);

    let prediction = state.resolver.predict(&state.model_name, &request).await?;
    Ok(Json(PredictResponse {
        survived: prediction.survived,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        let err = ApiError::from(InferenceError::InputValidation("bad".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::BadRequest("missing field".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_model_failures_map_to_server_error() {
        for err in [
            InferenceError::ModelNotRegistered("m".into()),
            InferenceError::NoProductionVersion("m".into()),
            InferenceError::ModelLoad {
                name: "m".into(),
                reason: "corrupt".into(),
            },
        ] {
            assert_eq!(
                ApiError::from(err).status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }
}
