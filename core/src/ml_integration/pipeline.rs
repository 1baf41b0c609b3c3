//! Survival Pipeline
//!
//! The single fit/predict unit that becomes a model artifact: a frozen
//! [`Preprocessor`] feeding a [`RandomForest`]. Once fitted it is never
//! mutated; a newer run produces a new pipeline instead.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ArtifactError, PipelineError};
use crate::ml_integration::metadata::{PassengerRecord, TITANIC_FEATURES};
use crate::ml_integration::operations::Preprocessor;
use crate::ml_integration::trainer::{ForestParams, RandomForest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivalPipeline {
    feature_names: Vec<String>,
    preprocessor: Preprocessor,
    classifier: RandomForest,
    params: ForestParams,
}

impl SurvivalPipeline {
    /// Fit preprocessing statistics and the classifier on the training
    /// partition only.
    pub fn fit(
        records: &[PassengerRecord],
        labels: &[usize],
        params: &ForestParams,
    ) -> Result<Self, PipelineError> {
        if records.len() != labels.len() {
            return Err(PipelineError::LengthMismatch {
                records: records.len(),
                labels: labels.len(),
            });
        }

        let preprocessor = Preprocessor::fit(records)?;
        let features = preprocessor.transform(records);
        let targets = Array1::from(labels.to_vec());
        let classifier = RandomForest::fit(&features, &targets, params)?;

        info!(
            "Fitted survival pipeline on {} rows ({} transformed features)",
            records.len(),
            preprocessor.n_output_features()
        );

        Ok(Self {
            feature_names: TITANIC_FEATURES.iter().map(|f| f.to_string()).collect(),
            preprocessor,
            classifier,
            params: params.clone(),
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn predict(&self, records: &[PassengerRecord]) -> Result<Vec<usize>, PipelineError> {
        let features = self.preprocessor.transform(records);
        Ok(self.classifier.predict(&features)?.to_vec())
    }

    pub fn predict_proba(&self, records: &[PassengerRecord]) -> Result<Vec<f64>, PipelineError> {
        let features = self.preprocessor.transform(records);
        Ok(self.classifier.predict_proba(&features)?.to_vec())
    }

    /// Prediction for exactly one record.
    pub fn predict_one(&self, record: &PassengerRecord) -> Result<usize, PipelineError> {
        let predictions = self.predict(std::slice::from_ref(record))?;
        Ok(predictions[0])
    }

    /// Accuracy against `labels`, or `None` when there is nothing to score.
    pub fn score(
        &self,
        records: &[PassengerRecord],
        labels: &[usize],
    ) -> Result<Option<f64>, PipelineError> {
        if records.is_empty() {
            return Ok(None);
        }
        if records.len() != labels.len() {
            return Err(PipelineError::LengthMismatch {
                records: records.len(),
                labels: labels.len(),
            });
        }
        let predictions = self.predict(records)?;
        let correct = predictions
            .iter()
            .zip(labels)
            .filter(|(predicted, actual)| predicted == actual)
            .count();
        Ok(Some(correct as f64 / labels.len() as f64))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
