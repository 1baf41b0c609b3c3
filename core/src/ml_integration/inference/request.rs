//! Prediction request parsing and normalization.

use serde::{Deserialize, Serialize};

use crate::error::InferenceError;
use crate::ml_integration::metadata::{PassengerRecord, EMBARKED_DEFAULT};

/// Feature values as submitted by a caller, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub pclass: i64,
    pub sex: String,
    pub age: f64,
    pub sibsp: i64,
    pub parch: i64,
    pub fare: f64,
    #[serde(default)]
    pub embarked: Option<String>,
}

impl PredictRequest {
    /// Normalize into a [`PassengerRecord`]: `sex` must be `male` or
    /// `female` in any case, `embarked` is uppercased and defaults to `S`.
    pub fn to_record(&self) -> Result<PassengerRecord, InferenceError> {
        let sex = self.sex.trim().to_lowercase();
        if sex != "male" && sex != "female" {
            return Err(InferenceError::InputValidation(format!(
                "sex must be 'male' or 'female', got '{}'",
                self.sex
            )));
        }

        let embarked = self
            .embarked
            .as_deref()
            .map(|port| port.trim().to_uppercase())
            .filter(|port| !port.is_empty())
            .unwrap_or_else(|| EMBARKED_DEFAULT.to_string());

        Ok(PassengerRecord {
            pclass: Some(self.pclass),
            sex: Some(sex),
            age: Some(self.age),
            sibsp: Some(self.sibsp),
            parch: Some(self.parch),
            fare: Some(self.fare),
            embarked: Some(embarked),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(sex: &str, embarked: Option<&str>) -> PredictRequest {
        PredictRequest {
            pclass: 1,
            sex: sex.to_string(),
            age: 25.0,
            sibsp: 0,
            parch: 0,
            fare: 50.0,
            embarked: embarked.map(str::to_string),
        }
    }

    #[test]
    fn test_normalizes_sex_and_defaults_embarked() {
        let record = request("FEMALE", Some("")).to_record().unwrap();
        assert_eq!(record.sex.as_deref(), Some("female"));
        assert_eq!(record.embarked.as_deref(), Some("S"));
        assert_eq!(record.pclass, Some(1));
        assert_eq!(record.fare, Some(50.0));
    }

    #[test]
    fn test_absent_embarked_defaults_to_southampton() {
        let record = request("male", None).to_record().unwrap();
        assert_eq!(record.embarked.as_deref(), Some("S"));
    }

    #[test]
    fn test_embarked_is_uppercased() {
        let record = request(" Male ", Some(" c")).to_record().unwrap();
        assert_eq!(record.sex.as_deref(), Some("male"));
        assert_eq!(record.embarked.as_deref(), Some("C"));
    }

    #[test]
    fn test_invalid_sex_is_rejected_with_message() {
        let err = request("invalid", None).to_record().unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("invalid"));
    }
}
