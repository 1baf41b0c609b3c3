//! In-memory registry backend.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::ml_integration::metadata::{ModelStage, ModelVersion, RegisteredModel};
use crate::ml_integration::model_management::registry::load_pipeline;
use crate::ml_integration::model_management::{ArtifactRef, ArtifactStore, ModelRegistry};
use crate::ml_integration::pipeline::SurvivalPipeline;

struct RegistryEntry {
    model: RegisteredModel,
    versions: Vec<ModelVersion>,
}

/// Registry held in process memory. Every mutation happens under a single
/// write lock, so stage transitions are atomic.
pub struct InMemoryRegistry {
    entries: RwLock<HashMap<String, RegistryEntry>>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl InMemoryRegistry {
    pub fn new(artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            artifacts,
        }
    }

    pub fn artifacts(&self) -> Arc<dyn ArtifactStore> {
        Arc::clone(&self.artifacts)
    }
}

#[async_trait]
impl ModelRegistry for InMemoryRegistry {
    async fn get_by_name(&self, name: &str) -> Result<RegisteredModel, RegistryError> {
        let entries = self.entries.read().await;
        entries
            .get(name)
            .map(|entry| entry.model.clone())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    async fn create(&self, name: &str) -> Result<RegisteredModel, RegistryError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(name) {
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }

        let model = RegisteredModel {
            name: name.to_string(),
            created_at: Utc::now(),
            latest_version: None,
        };
        entries.insert(
            name.to_string(),
            RegistryEntry {
                model: model.clone(),
                versions: Vec::new(),
            },
        );
        info!("Created registered model: {}", name);
        Ok(model)
    }

    async fn add_version(
        &self,
        name: &str,
        artifact: &ArtifactRef,
        run_id: &str,
    ) -> Result<ModelVersion, RegistryError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let now = Utc::now();
        let version = ModelVersion {
            name: name.to_string(),
            version: entry.model.latest_version.unwrap_or(0) + 1,
            artifact: artifact.clone(),
            run_id: run_id.to_string(),
            stage: ModelStage::None,
            created_at: now,
            updated_at: now,
        };
        entry.model.latest_version = Some(version.version);
        entry.versions.push(version.clone());

        debug!("Registered {} version {}", name, version.version);
        Ok(version)
    }

    async fn set_stage(
        &self,
        name: &str,
        version: u32,
        stage: ModelStage,
        archive_others: bool,
    ) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        if !entry.versions.iter().any(|v| v.version == version) {
            return Err(RegistryError::VersionNotFound {
                name: name.to_string(),
                version,
            });
        }

        let now = Utc::now();
        for candidate in entry.versions.iter_mut() {
            if candidate.version == version {
                candidate.stage = stage;
                candidate.updated_at = now;
            } else if archive_others && candidate.stage == stage {
                candidate.stage = ModelStage::Archived;
                candidate.updated_at = now;
            }
        }

        debug!("Moved {} version {} to {}", name, version, stage);
        Ok(())
    }

    async fn get_version_by_stage(
        &self,
        name: &str,
        stage: ModelStage,
    ) -> Result<Option<ModelVersion>, RegistryError> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        Ok(entry
            .versions
            .iter()
            .filter(|v| v.stage == stage)
            .max_by_key(|v| v.version)
            .cloned())
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<ModelVersion>, RegistryError> {
        let entries = self.entries.read().await;
        entries
            .get(name)
            .map(|entry| entry.versions.clone())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    async fn load_artifact(
        &self,
        artifact: &ArtifactRef,
    ) -> Result<SurvivalPipeline, RegistryError> {
        load_pipeline(&self.artifacts, artifact).await
    }
}
