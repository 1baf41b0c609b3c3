//! Model Registry
//!
//! The registry maps a model name to an ordered history of artifact versions,
//! each tagged with a lifecycle stage. Training and inference only see it
//! through the [`ModelRegistry`] trait so the backend can be swapped.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::ml_integration::metadata::{ModelStage, ModelVersion, RegisteredModel};
use crate::ml_integration::model_management::{ArtifactRef, ArtifactStore};
use crate::ml_integration::pipeline::SurvivalPipeline;

/// Registry collaborator used by the training workflow and the inference
/// resolver.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Look up a registered model; absence is [`RegistryError::NotFound`].
    async fn get_by_name(&self, name: &str) -> Result<RegisteredModel, RegistryError>;

    /// Create an empty registered model. Fails with
    /// [`RegistryError::AlreadyExists`] if the name is taken.
    async fn create(&self, name: &str) -> Result<RegisteredModel, RegistryError>;

    /// Append a new version in stage `None`, numbered after the latest one.
    async fn add_version(
        &self,
        name: &str,
        artifact: &ArtifactRef,
        run_id: &str,
    ) -> Result<ModelVersion, RegistryError>;

    /// Move `version` to `stage`. With `archive_others`, every other version
    /// currently in `stage` moves to `Archived` in the same atomic step.
    async fn set_stage(
        &self,
        name: &str,
        version: u32,
        stage: ModelStage,
        archive_others: bool,
    ) -> Result<(), RegistryError>;

    /// Highest-numbered version currently in `stage`, if any.
    async fn get_version_by_stage(
        &self,
        name: &str,
        stage: ModelStage,
    ) -> Result<Option<ModelVersion>, RegistryError>;

    /// All versions of `name`, oldest first.
    async fn list_versions(&self, name: &str) -> Result<Vec<ModelVersion>, RegistryError>;

    /// Deserialize the pipeline stored at `artifact`.
    async fn load_artifact(&self, artifact: &ArtifactRef)
        -> Result<SurvivalPipeline, RegistryError>;
}

/// Shared artifact loading for registry backends.
pub(crate) async fn load_pipeline(
    store: &Arc<dyn ArtifactStore>,
    artifact: &ArtifactRef,
) -> Result<SurvivalPipeline, RegistryError> {
    let bytes = store.get(artifact).await?;
    Ok(SurvivalPipeline::from_bytes(&bytes)?)
}
