//! Titanic Core Module
//!
//! Training workflow, model registry and inference resolution for the Titanic
//! survival classifier. The HTTP service and the command-line entry point
//! live in their own crates and depend on this one.

pub mod config;
pub mod error;
pub mod ml_integration;

pub use config::Settings;
pub use error::{
    ArtifactError, DataLoadError, InferenceError, PipelineError, RegistryError, SettingsError,
    SplitError, WorkflowError,
};
pub use ml_integration::{
    ModelRegistry, ModelResolver, PredictRequest, SurvivalPipeline, TrainingReport,
    TrainingWorkflow,
};
