//! ML Model Metadata Types
//!
//! Feature schema shared by training and inference, the passenger record that
//! flows through the pipeline, and the registry-facing version/stage types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::ml_integration::model_management::ArtifactRef;

/// Features consumed by training and inference, in this fixed order.
pub const TITANIC_FEATURES: [&str; 7] = [
    "pclass", "sex", "age", "sibsp", "parch", "fare", "embarked",
];

/// Features imputed with the training median.
pub const NUMERIC_FEATURES: [&str; 4] = ["age", "sibsp", "parch", "fare"];

/// Features imputed with the training mode and one-hot encoded.
pub const CATEGORICAL_FEATURES: [&str; 3] = ["pclass", "sex", "embarked"];

pub const LABEL_COLUMN: &str = "survived";

/// Port assumed when a request leaves `embarked` empty.
pub const EMBARKED_DEFAULT: &str = "S";

/// One passenger's feature vector. Any field may be missing in the dataset;
/// the fitted pipeline imputes it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PassengerRecord {
    pub pclass: Option<i64>,
    pub sex: Option<String>,
    pub age: Option<f64>,
    pub sibsp: Option<i64>,
    pub parch: Option<i64>,
    pub fare: Option<f64>,
    pub embarked: Option<String>,
}

impl PassengerRecord {
    /// Values of [`NUMERIC_FEATURES`], in order.
    pub fn numeric_values(&self) -> [Option<f64>; 4] {
        [
            self.age,
            self.sibsp.map(|v| v as f64),
            self.parch.map(|v| v as f64),
            self.fare,
        ]
    }

    /// Values of [`CATEGORICAL_FEATURES`], in order. `pclass` is treated as a
    /// category label.
    pub fn categorical_values(&self) -> [Option<String>; 3] {
        [
            self.pclass.map(|class| class.to_string()),
            self.sex.clone(),
            self.embarked.clone(),
        ]
    }
}

/// Lifecycle stage of a registered model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelStage {
    None,
    Staging,
    Production,
    Archived,
}

impl ModelStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStage::None => "None",
            ModelStage::Staging => "Staging",
            ModelStage::Production => "Production",
            ModelStage::Archived => "Archived",
        }
    }
}

impl fmt::Display for ModelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(ModelStage::None),
            "staging" => Ok(ModelStage::Staging),
            "production" => Ok(ModelStage::Production),
            "archived" => Ok(ModelStage::Archived),
            other => Err(format!("unknown model stage: {}", other)),
        }
    }
}

/// A named slot in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Highest version number registered so far
    pub latest_version: Option<u32>,
}

/// One immutable artifact version under a registered model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u32,
    pub artifact: ArtifactRef,
    /// Training run that produced the artifact
    pub run_id: String,
    pub stage: ModelStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Record of one training run, stored next to its model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub params: BTreeMap<String, serde_json::Value>,
    pub metrics: BTreeMap<String, f64>,
    pub model_artifact: ArtifactRef,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_feature_groups_cover_all_features() {
        let groups: HashSet<&str> = NUMERIC_FEATURES
            .iter()
            .chain(CATEGORICAL_FEATURES.iter())
            .copied()
            .collect();
        let all: HashSet<&str> = TITANIC_FEATURES.iter().copied().collect();
        assert_eq!(groups, all);
        assert_eq!(
            NUMERIC_FEATURES.len() + CATEGORICAL_FEATURES.len(),
            TITANIC_FEATURES.len()
        );
    }

    #[test]
    fn test_categorical_values_render_pclass_as_label() {
        let record = PassengerRecord {
            pclass: Some(3),
            sex: Some("male".into()),
            embarked: None,
            ..Default::default()
        };
        assert_eq!(
            record.categorical_values(),
            [Some("3".to_string()), Some("male".to_string()), None]
        );
    }

    #[test]
    fn test_stage_round_trips_through_its_name() {
        for stage in [
            ModelStage::None,
            ModelStage::Staging,
            ModelStage::Production,
            ModelStage::Archived,
        ] {
            assert_eq!(stage.as_str().parse::<ModelStage>().unwrap(), stage);
        }
        assert!("retired".parse::<ModelStage>().is_err());
    }
}
