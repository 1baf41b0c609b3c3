//! ML Integration Module
//!
//! Training and serving of the Titanic survival classifier.
//!
//! # Architecture
//!
//! The module is organized into several submodules:
//! - `metadata`: Feature schema, passenger records, registry version types
//! - `data`: Dataset loading from a URL or local CSV file
//! - `trainer`: Stratified splitting and the bagged decision-tree forest
//! - `operations`: Imputers and the one-hot encoder
//! - `pipeline`: The fitted preprocessing + classifier artifact
//! - `model_management`: Artifact stores and the model registry
//! - `training`: The train → register → promote workflow
//! - `inference`: Request normalization and Production model resolution
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use titanic_core::config::Settings;
//! use titanic_core::ml_integration::{
//!     artifact_store_from_settings, registry_from_settings, TrainingWorkflow,
//! };
//!
//! # async fn train() -> anyhow::Result<()> {
//! let settings = Settings::load(None)?;
//! let artifacts = artifact_store_from_settings(&settings);
//! let registry = registry_from_settings(&settings, Arc::clone(&artifacts)).await?;
//! let report = TrainingWorkflow::new(&settings, registry, artifacts).run().await?;
//! println!("promoted version {}", report.version);
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod inference;
pub mod metadata;
pub mod model_management;
pub mod operations;
pub mod pipeline;
pub mod trainer;
pub mod training;

#[cfg(test)]
mod tests;

// Re-export key types for convenience
pub use data::{load_dataset, parse_csv, TitanicDataset};
pub use inference::{ModelResolver, PredictRequest, Prediction, ResolvedModel};
pub use metadata::{
    ModelStage, ModelVersion, PassengerRecord, RegisteredModel, RunRecord, CATEGORICAL_FEATURES,
    NUMERIC_FEATURES, TITANIC_FEATURES,
};
pub use model_management::{
    artifact_store_from_settings, registry_from_settings, ArtifactRef, ArtifactStore,
    FsArtifactStore, InMemoryArtifactStore, InMemoryRegistry, ModelRegistry, SqliteRegistry,
};
pub use operations::Preprocessor;
pub use pipeline::SurvivalPipeline;
pub use trainer::{stratified_split, ForestParams, RandomForest, SplitIndices};
pub use training::{TrainingReport, TrainingWorkflow};
