//! Feature Preprocessing Operations
//!
//! Median imputation for the numeric group, most-frequent imputation plus
//! one-hot encoding for the categorical group. Every statistic is computed
//! once from the training partition and frozen inside [`Preprocessor`].

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::PipelineError;
use crate::ml_integration::metadata::{PassengerRecord, CATEGORICAL_FEATURES, NUMERIC_FEATURES};

/// Per-feature medians of the numeric group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    medians: Vec<f64>,
}

impl MedianImputer {
    /// `columns[i]` holds every observed-or-missing value of `names[i]`.
    pub fn fit(columns: &[Vec<Option<f64>>], names: &[&str]) -> Result<Self, PipelineError> {
        let medians = columns
            .iter()
            .zip(names)
            .map(|(column, name)| {
                median(column.iter().flatten().copied().collect())
                    .ok_or_else(|| PipelineError::NoObservedValues(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { medians })
    }

    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    pub fn impute(&self, feature: usize, value: Option<f64>) -> f64 {
        value.unwrap_or(self.medians[feature])
    }
}

/// Per-feature most frequent values of the categorical group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeImputer {
    modes: Vec<String>,
}

impl ModeImputer {
    pub fn fit(columns: &[Vec<Option<String>>], names: &[&str]) -> Result<Self, PipelineError> {
        let modes = columns
            .iter()
            .zip(names)
            .map(|(column, name)| {
                mode(column.iter().flatten())
                    .ok_or_else(|| PipelineError::NoObservedValues(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { modes })
    }

    pub fn modes(&self) -> &[String] {
        &self.modes
    }

    pub fn impute<'a>(&'a self, feature: usize, value: Option<&'a str>) -> &'a str {
        value.unwrap_or(&self.modes[feature])
    }
}

/// Sorted category vocabulary per categorical feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<Vec<String>>,
}

impl OneHotEncoder {
    pub fn fit(columns: &[Vec<String>]) -> Self {
        let categories = columns
            .iter()
            .map(|column| {
                column
                    .iter()
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .collect();
        Self { categories }
    }

    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }

    /// Total width of all one-hot blocks.
    pub fn width(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    /// One-hot block for `value` of `feature`. A value outside the
    /// vocabulary encodes as all zeros.
    pub fn encode(&self, feature: usize, value: &str) -> Vec<f64> {
        let vocabulary = &self.categories[feature];
        let mut block = vec![0.0; vocabulary.len()];
        if let Ok(position) = vocabulary.binary_search_by(|known| known.as_str().cmp(value)) {
            block[position] = 1.0;
        }
        block
    }
}

/// Frozen preprocessing stage: numeric columns first, then each categorical
/// feature's one-hot block in [`CATEGORICAL_FEATURES`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    numeric: MedianImputer,
    categorical: ModeImputer,
    encoder: OneHotEncoder,
}

impl Preprocessor {
    pub fn fit(records: &[PassengerRecord]) -> Result<Self, PipelineError> {
        if records.is_empty() {
            return Err(PipelineError::EmptyTrainingSet);
        }

        let mut numeric_columns = vec![Vec::with_capacity(records.len()); NUMERIC_FEATURES.len()];
        let mut categorical_columns =
            vec![Vec::with_capacity(records.len()); CATEGORICAL_FEATURES.len()];
        for record in records {
            for (column, value) in numeric_columns.iter_mut().zip(record.numeric_values()) {
                column.push(value);
            }
            for (column, value) in categorical_columns
                .iter_mut()
                .zip(record.categorical_values())
            {
                column.push(value);
            }
        }

        let numeric = MedianImputer::fit(&numeric_columns, &NUMERIC_FEATURES)?;
        let categorical = ModeImputer::fit(&categorical_columns, &CATEGORICAL_FEATURES)?;

        // The encoder sees the imputed columns, so the mode is always part of
        // the vocabulary.
        let imputed: Vec<Vec<String>> = categorical_columns
            .iter()
            .enumerate()
            .map(|(feature, column)| {
                column
                    .iter()
                    .map(|value| categorical.impute(feature, value.as_deref()).to_string())
                    .collect()
            })
            .collect();
        let encoder = OneHotEncoder::fit(&imputed);

        Ok(Self {
            numeric,
            categorical,
            encoder,
        })
    }

    pub fn medians(&self) -> &[f64] {
        self.numeric.medians()
    }

    pub fn modes(&self) -> &[String] {
        self.categorical.modes()
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    /// Width of a transformed row.
    pub fn n_output_features(&self) -> usize {
        NUMERIC_FEATURES.len() + self.encoder.width()
    }

    pub fn transform_one(&self, record: &PassengerRecord) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.n_output_features());
        for (feature, value) in record.numeric_values().into_iter().enumerate() {
            row.push(self.numeric.impute(feature, value));
        }
        for (feature, value) in record.categorical_values().iter().enumerate() {
            let value = self.categorical.impute(feature, value.as_deref());
            row.extend(self.encoder.encode(feature, value));
        }
        row
    }

    pub fn transform(&self, records: &[PassengerRecord]) -> Array2<f64> {
        let width = self.n_output_features();
        let mut matrix = Array2::<f64>::zeros((records.len(), width));
        for (mut target, record) in matrix.rows_mut().into_iter().zip(records) {
            for (cell, value) in target.iter_mut().zip(self.transform_one(record)) {
                *cell = value;
            }
        }
        matrix
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Most frequent value; ties go to the lexicographically smallest.
fn mode<'a>(values: impl Iterator<Item = &'a String>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}
