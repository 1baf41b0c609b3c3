//! Error types for the Titanic core crate.
//!
//! Every failure the training workflow and the inference resolver can raise
//! is one of the enums below. No error is retried automatically; the caller
//! owns retry policy.

use thiserror::Error;

/// Failures while reading the tabular dataset source.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("dataset source '{source_location}' is unreachable: {reason}")]
    Unreachable {
        source_location: String,
        reason: String,
    },

    #[error("dataset is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("failed to parse dataset: {0}")]
    Parse(String),

    #[error("row {row} has no 'survived' label")]
    MissingLabel { row: usize },

    #[error("dataset contains no rows")]
    Empty,
}

/// Failures while partitioning the dataset.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("test size must lie strictly between 0 and 1, got {0}")]
    InvalidTestSize(f64),

    #[error("cannot split an empty dataset")]
    Empty,
}

/// Failures while fitting or applying the preprocessing + classifier unit.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("feature '{0}' has no observed values in the training partition")]
    NoObservedValues(String),

    #[error("training partition is empty")]
    EmptyTrainingSet,

    #[error("records and labels differ in length: {records} vs {labels}")]
    LengthMismatch { records: usize, labels: usize },

    #[error("classifier fit failed: {0}")]
    Fit(String),

    #[error("expected {expected} transformed columns, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("invalid classifier parameters: {0}")]
    InvalidParams(String),
}

/// Failures while storing or reading serialized artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serialization(String),

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("invalid artifact reference: {0}")]
    InvalidReference(String),
}

impl From<bincode::Error> for ArtifactError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ArtifactError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Registry collaborator failures. `NotFound` is kept apart from every other
/// failure so callers can branch on it.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registered model '{0}' not found")]
    NotFound(String),

    #[error("registered model '{0}' already exists")]
    AlreadyExists(String),

    #[error("version {version} of registered model '{name}' not found")]
    VersionNotFound { name: String, version: u32 },

    #[error("registry backend error: {0}")]
    Backend(String),

    #[error("failed to load artifact: {0}")]
    Artifact(#[from] ArtifactError),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Training workflow failures. Any of these aborts the run before the
/// previously promoted version is touched, except `Promotion`, which is
/// raised when the stage transition itself cannot be confirmed.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("data load failed: {0}")]
    DataLoad(#[from] DataLoadError),

    #[error("train/test split failed: {0}")]
    Split(#[from] SplitError),

    #[error("pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("failed to persist artifact: {0}")]
    ArtifactPersist(#[from] ArtifactError),

    #[error("registry lookup failed: {0}")]
    RegistryLookup(#[source] RegistryError),

    #[error("model registration failed: {0}")]
    Registration(#[source] RegistryError),

    #[error("promotion of '{name}' version {version} failed: {reason}")]
    Promotion {
        name: String,
        version: u32,
        reason: String,
    },
}

/// Inference-side failures. Only `InputValidation` is user-correctable;
/// everything else means the model is unavailable.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("{0}")]
    InputValidation(String),

    #[error("registered model '{0}' not found")]
    ModelNotRegistered(String),

    #[error("registered model '{0}' has no Production version")]
    NoProductionVersion(String),

    #[error("failed to load model '{name}': {reason}")]
    ModelLoad { name: String, reason: String },

    #[error("prediction failed: {0}")]
    Prediction(#[from] PipelineError),
}

impl InferenceError {
    /// True for errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InputValidation(_))
    }
}

/// Configuration failures.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
