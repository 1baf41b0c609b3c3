//! Production model resolution for inference.
//!
//! Each lookup asks the registry which version currently holds Production
//! and loads its artifact. Resolved pipelines are cached per model name for
//! at most `ttl`; a zero TTL resolves fresh on every call.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::InferenceError;
use crate::ml_integration::inference::PredictRequest;
use crate::ml_integration::metadata::ModelStage;
use crate::ml_integration::model_management::ModelRegistry;
use crate::ml_integration::pipeline::SurvivalPipeline;

/// The Production pipeline of a registered model.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub name: String,
    pub version: u32,
    pub pipeline: Arc<SurvivalPipeline>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub survived: u8,
    /// Version that produced the prediction
    pub version: u32,
}

struct CachedModel {
    model: ResolvedModel,
    loaded_at: Instant,
}

pub struct ModelResolver {
    registry: Arc<dyn ModelRegistry>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedModel>>,
}

impl ModelResolver {
    pub fn new(registry: Arc<dyn ModelRegistry>, ttl: Duration) -> Self {
        Self {
            registry,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Resolve the Production version of `name`.
    pub async fn resolve(&self, name: &str) -> Result<ResolvedModel, InferenceError> {
        if let Some(model) = self.cached(name).await {
            return Ok(model);
        }

        match self.registry.get_by_name(name).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                return Err(InferenceError::ModelNotRegistered(name.to_string()))
            }
            Err(e) => {
                return Err(InferenceError::ModelLoad {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            }
        }

        let version = match self
            .registry
            .get_version_by_stage(name, ModelStage::Production)
            .await
        {
            Ok(Some(version)) => version,
            Ok(None) => return Err(InferenceError::NoProductionVersion(name.to_string())),
            Err(e) if e.is_not_found() => {
                return Err(InferenceError::ModelNotRegistered(name.to_string()))
            }
            Err(e) => {
                return Err(InferenceError::ModelLoad {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let pipeline = self
            .registry
            .load_artifact(&version.artifact)
            .await
            .map_err(|e| InferenceError::ModelLoad {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        info!(
            "Loaded '{}' version {} from {}",
            name, version.version, version.artifact
        );

        let model = ResolvedModel {
            name: name.to_string(),
            version: version.version,
            pipeline: Arc::new(pipeline),
        };
        if !self.ttl.is_zero() {
            self.cache.write().await.insert(
                name.to_string(),
                CachedModel {
                    model: model.clone(),
                    loaded_at: Instant::now(),
                },
            );
        }
        Ok(model)
    }

    /// Validate `request`, then predict with the Production version of
    /// `name`. Invalid input never reaches the registry.
    pub async fn predict(
        &self,
        name: &str,
        request: &PredictRequest,
    ) -> Result<Prediction, InferenceError> {
        let record = request.to_record()?;
        let model = self.resolve(name).await?;
        let survived = model.pipeline.predict_one(&record)?;
        debug!("'{}' v{} predicted {}", name, model.version, survived);
        Ok(Prediction {
            survived: u8::from(survived == 1),
            version: model.version,
        })
    }

    /// Drop every cached pipeline.
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }

    async fn cached(&self, name: &str) -> Option<ResolvedModel> {
        if self.ttl.is_zero() {
            return None;
        }
        let cache = self.cache.read().await;
        cache
            .get(name)
            .filter(|entry| entry.loaded_at.elapsed() < self.ttl)
            .map(|entry| entry.model.clone())
    }
}
