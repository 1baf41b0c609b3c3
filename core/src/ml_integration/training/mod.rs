//! Training workflow

pub mod orchestrator;

pub use orchestrator::{TrainingReport, TrainingWorkflow, MODEL_ARTIFACT_PATH, RUN_RECORD_PATH};
