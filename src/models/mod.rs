use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Raw caller-supplied student attributes. Partial by design: any base
/// feature may be absent, values may be numbers, numeric strings or
/// booleans, and unknown keys are ignored downstream.
pub type RawRecord = HashMap<String, Value>;

/// Predicted academic outcome. The integer class indices are fixed by the
/// training procedure's target encoding and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Dropout,
    Enrolled,
    Graduate,
}

impl Outcome {
    pub const NUM_CLASSES: usize = 3;

    pub fn from_class(class: usize) -> Option<Self> {
        match class {
            0 => Some(Outcome::Dropout),
            1 => Some(Outcome::Enrolled),
            2 => Some(Outcome::Graduate),
            _ => None,
        }
    }

    pub fn class(&self) -> usize {
        match self {
            Outcome::Dropout => 0,
            Outcome::Enrolled => 1,
            Outcome::Graduate => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Dropout => "Dropout",
            Outcome::Enrolled => "Enrolled",
            Outcome::Graduate => "Graduate",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Dropout" => Some(Outcome::Dropout),
            "Enrolled" => Some(Outcome::Enrolled),
            "Graduate" => Some(Outcome::Graduate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
        }
    }
}

/// Request body for the predict endpoint: either a single record object
/// (what the original dashboard sends) or an array of records.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PredictRequest {
    Batch(Vec<RawRecord>),
    Single(RawRecord),
}

impl PredictRequest {
    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            PredictRequest::Batch(records) => records,
            PredictRequest::Single(record) => vec![record],
        }
    }
}

/// Per-class probability distribution, serialized with the label names as
/// keys to match the documented response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ClassProbabilities {
    #[serde(rename = "Dropout")]
    pub dropout: f64,
    #[serde(rename = "Enrolled")]
    pub enrolled: f64,
    #[serde(rename = "Graduate")]
    pub graduate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// 1-based position in the input batch.
    pub student_id: usize,
    pub predicted_status: Outcome,
    /// Top class probability rendered as a percentage string, e.g. "87.3%".
    pub confidence: String,
    pub confidence_level: ConfidenceLevel,
    pub reliability: String,
    pub probabilities: ClassProbabilities,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub model_version: String,
    pub predictions: Vec<PredictionResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_class_mapping_roundtrips() {
        for class in 0..Outcome::NUM_CLASSES {
            let outcome = Outcome::from_class(class).unwrap();
            assert_eq!(outcome.class(), class);
            assert_eq!(Outcome::from_label(outcome.as_str()), Some(outcome));
        }
        assert_eq!(Outcome::from_class(3), None);
    }

    #[test]
    fn predict_request_accepts_single_object() {
        let req: PredictRequest = serde_json::from_value(json!({"gender": 1})).unwrap();
        let records = req.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["gender"], json!(1));
    }

    #[test]
    fn predict_request_accepts_array() {
        let req: PredictRequest =
            serde_json::from_value(json!([{"gender": 1}, {"debtor": "0"}])).unwrap();
        assert_eq!(req.into_records().len(), 2);
    }

    #[test]
    fn probabilities_serialize_with_label_keys() {
        let probs = ClassProbabilities {
            dropout: 0.2,
            enrolled: 0.3,
            graduate: 0.5,
        };
        let value = serde_json::to_value(&probs).unwrap();
        assert_eq!(value["Dropout"], json!(0.2));
        assert_eq!(value["Graduate"], json!(0.5));
    }
}
