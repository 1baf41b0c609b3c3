//! HTTP client for the inference service.
//!
//! Calls `GET {base}/predict/` on each configured target in turn and returns
//! the first successful answer. The compose-internal default base URL gets a
//! `localhost` fallback so the same configuration works outside containers.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use titanic_api::PredictResponse;
use titanic_core::config::DEFAULT_API_BASE_URL;
use titanic_core::ml_integration::PredictRequest;

const LOCAL_FALLBACK_URL: &str = "http://localhost:8086";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(reqwest::Error),

    #[error("no inference service target configured")]
    NoTargets,

    #[error("prediction request to {target} failed: {source}")]
    Request {
        target: String,
        #[source]
        source: reqwest::Error,
    },
}

pub struct PredictionClient {
    http: reqwest::Client,
    targets: Vec<String>,
}

impl PredictionClient {
    /// Client for `base_url`, plus the local fallback when `base_url` is the
    /// compose default.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_targets(fallback_targets(base_url))
    }

    pub fn with_targets(targets: Vec<String>) -> Result<Self, ClientError> {
        if targets.is_empty() {
            return Err(ClientError::NoTargets);
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self { http, targets })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// First successful prediction across the targets; the last failure
    /// otherwise.
    pub async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, ClientError> {
        let mut last_error = None;
        for target in &self.targets {
            match self.predict_at(target, request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!("{}", e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(ClientError::NoTargets))
    }

    async fn predict_at(
        &self,
        target: &str,
        request: &PredictRequest,
    ) -> Result<PredictResponse, ClientError> {
        let url = format!("{}/predict/", target);
        debug!("GET {}", url);
        let failed = |source: reqwest::Error| ClientError::Request {
            target: target.to_string(),
            source,
        };

        self.http
            .get(&url)
            .query(request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(failed)?
            .json::<PredictResponse>()
            .await
            .map_err(failed)
    }
}

/// Targets tried for `base_url`, in order.
pub fn fallback_targets(base_url: &str) -> Vec<String> {
    let mut targets = vec![base_url.trim_end_matches('/').to_string()];
    if base_url == DEFAULT_API_BASE_URL {
        targets.push(LOCAL_FALLBACK_URL.to_string());
    }
    targets
}

/// Human-readable outcome shown by the CLI.
pub fn render_outcome(survived: u8) -> &'static str {
    if survived == 1 {
        "Survived"
    } else {
        "Did not survive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_default_gets_local_fallback() {
        assert_eq!(
            fallback_targets("http://api:8086"),
            vec!["http://api:8086", "http://localhost:8086"]
        );
    }

    #[test]
    fn test_custom_base_url_has_no_fallback() {
        assert_eq!(
            fallback_targets("http://127.0.0.1:9000/"),
            vec!["http://127.0.0.1:9000"]
        );
    }

    #[test]
    fn test_empty_target_list_is_rejected() {
        assert!(matches!(
            PredictionClient::with_targets(Vec::new()),
            Err(ClientError::NoTargets)
        ));
    }

    #[test]
    fn test_render_outcome() {
        assert_eq!(render_outcome(1), "Survived");
        assert_eq!(render_outcome(0), "Did not survive");
    }
}
