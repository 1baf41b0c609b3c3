//! Training orchestration: train → register → promote.
//!
//! One [`TrainingWorkflow::run`] produces a fresh pipeline from the dataset,
//! stores it as a run artifact, attaches it as a new registry version and
//! makes that version the sole Production holder. Any failure before the
//! promotion step leaves the previous Production version untouched.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{ArtifactError, RegistryError, WorkflowError};
use crate::ml_integration::data::{load_dataset, TitanicDataset};
use crate::ml_integration::metadata::{ModelStage, RunRecord};
use crate::ml_integration::model_management::{ArtifactRef, ArtifactStore, ModelRegistry};
use crate::ml_integration::pipeline::SurvivalPipeline;
use crate::ml_integration::trainer::stratified_split;

/// Artifact path of the serialized pipeline inside a run.
pub const MODEL_ARTIFACT_PATH: &str = "model";
/// Artifact path of the run record inside a run.
pub const RUN_RECORD_PATH: &str = "run.json";

/// Outcome of a successful training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub run_id: String,
    pub model_name: String,
    pub version: u32,
    pub artifact: ArtifactRef,
    /// Accuracy on the held-out partition
    pub test_accuracy: Option<f64>,
    pub train_rows: usize,
    pub test_rows: usize,
}

pub struct TrainingWorkflow<'a> {
    settings: &'a Settings,
    registry: Arc<dyn ModelRegistry>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl<'a> TrainingWorkflow<'a> {
    pub fn new(
        settings: &'a Settings,
        registry: Arc<dyn ModelRegistry>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            settings,
            registry,
            artifacts,
        }
    }

    /// Load the configured dataset and run the workflow on it.
    pub async fn run(&self) -> Result<TrainingReport, WorkflowError> {
        let dataset = load_dataset(&self.settings.titanic_data_url).await?;
        self.run_with_dataset(&dataset).await
    }

    pub async fn run_with_dataset(
        &self,
        dataset: &TitanicDataset,
    ) -> Result<TrainingReport, WorkflowError> {
        let name = self.settings.model_name.as_str();
        let started_at = Utc::now();

        let split = stratified_split(
            &dataset.labels,
            self.settings.test_size,
            self.settings.random_seed,
        )?;
        let train = dataset.select(&split.train);
        let test = dataset.select(&split.test);
        info!(
            "Split {} rows into {} train / {} test (survival rate {:.3})",
            dataset.len(),
            train.len(),
            test.len(),
            dataset.positive_rate()
        );

        let params = self.settings.forest_params();
        let pipeline = SurvivalPipeline::fit(&train.records, &train.labels, &params)?;
        let test_accuracy = pipeline.score(&test.records, &test.labels)?;
        match test_accuracy {
            Some(accuracy) => info!("Test accuracy: {:.4}", accuracy),
            None => warn!("Test partition is empty; accuracy not computed"),
        }

        let run_id = Uuid::new_v4().simple().to_string();
        let artifact = self
            .artifacts
            .put(&run_id, MODEL_ARTIFACT_PATH, pipeline.to_bytes()?)
            .await?;
        info!("Stored pipeline artifact {}", artifact);

        let mut metrics = BTreeMap::new();
        if let Some(accuracy) = test_accuracy {
            metrics.insert("test_accuracy".to_string(), accuracy);
        }
        let record = RunRecord {
            run_id: run_id.clone(),
            experiment: self.settings.experiment_name.clone(),
            started_at,
            finished_at: Utc::now(),
            params: BTreeMap::from([
                ("n_estimators".to_string(), json!(params.n_estimators)),
                ("max_depth".to_string(), json!(params.max_depth)),
                ("random_seed".to_string(), json!(params.seed)),
                ("test_size".to_string(), json!(self.settings.test_size)),
                ("train_rows".to_string(), json!(train.len())),
            ]),
            metrics,
            model_artifact: artifact.clone(),
        };
        let record_bytes = serde_json::to_vec_pretty(&record).map_err(ArtifactError::from)?;
        self.artifacts
            .put(&run_id, RUN_RECORD_PATH, record_bytes)
            .await?;

        self.ensure_registered(name).await?;
        let version = self
            .registry
            .add_version(name, &artifact, &run_id)
            .await
            .map_err(WorkflowError::Registration)?;
        info!("Registered '{}' version {}", name, version.version);

        self.promote(name, version.version).await?;
        info!("Promoted '{}' version {} to Production", name, version.version);

        Ok(TrainingReport {
            run_id,
            model_name: name.to_string(),
            version: version.version,
            artifact,
            test_accuracy,
            train_rows: train.len(),
            test_rows: test.len(),
        })
    }

    /// Create the registered model on absence. Any other lookup failure
    /// aborts the run.
    async fn ensure_registered(&self, name: &str) -> Result<(), WorkflowError> {
        match self.registry.get_by_name(name).await {
            Ok(model) => {
                debug!(
                    "Registered model '{}' exists (latest version {:?})",
                    name, model.latest_version
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("Registered model '{}' not found, creating it", name);
                match self.registry.create(name).await {
                    Ok(_) => Ok(()),
                    // Another run created it between our lookup and create.
                    Err(RegistryError::AlreadyExists(_)) => {
                        debug!("Registered model '{}' was created concurrently", name);
                        Ok(())
                    }
                    Err(e) => Err(WorkflowError::Registration(e)),
                }
            }
            Err(e) => Err(WorkflowError::RegistryLookup(e)),
        }
    }

    /// Move `version` to Production, archiving the previous holder, then
    /// confirm it is the only Production version. An unconfirmed transition
    /// is retried once.
    async fn promote(&self, name: &str, version: u32) -> Result<(), WorkflowError> {
        let failed = |reason: String| WorkflowError::Promotion {
            name: name.to_string(),
            version,
            reason,
        };

        self.registry
            .set_stage(name, version, ModelStage::Production, true)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let Some(reason) = self
            .production_violation(name, version)
            .await
            .map_err(|e| failed(e.to_string()))?
        else {
            return Ok(());
        };

        warn!(
            "Promotion of '{}' version {} not confirmed ({}), retrying once",
            name, version, reason
        );
        self.registry
            .set_stage(name, version, ModelStage::Production, true)
            .await
            .map_err(|e| failed(e.to_string()))?;

        match self
            .production_violation(name, version)
            .await
            .map_err(|e| failed(e.to_string()))?
        {
            None => Ok(()),
            Some(reason) => Err(failed(reason)),
        }
    }

    /// Describe how the Production stage differs from "held by exactly
    /// `version`", or `None` when it matches.
    async fn production_violation(
        &self,
        name: &str,
        version: u32,
    ) -> Result<Option<String>, RegistryError> {
        let holders: Vec<u32> = self
            .registry
            .list_versions(name)
            .await?
            .into_iter()
            .filter(|v| v.stage == ModelStage::Production)
            .map(|v| v.version)
            .collect();

        if holders == [version] {
            Ok(None)
        } else {
            Ok(Some(format!("Production held by versions {:?}", holders)))
        }
    }
}
