//! Prediction orchestration: feature build → scale → classify → label
//! mapping → confidence tiering.

use std::path::Path;
use tracing::debug;

use super::artifact::{argmax, ModelArtifact};
use super::features;
use super::schema::SchemaVariant;
use crate::config::ModelConfig;
use crate::error::{PredictionError, Result};
use crate::models::{
    ClassProbabilities, ConfidenceLevel, Outcome, PredictionResult, RawRecord,
};

// Calibration table from the offline evaluation run. These are fixed
// configuration, not values recomputed per request; they only change when
// retraining changes the measured per-tier accuracy.
const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.9;
const MEDIUM_CONFIDENCE_THRESHOLD: f64 = 0.5;
const HIGH_RELIABILITY: &str = "97.9% accurate";
const MEDIUM_RELIABILITY: &str = "81.6% accurate";
const LOW_RELIABILITY: &str = "44.3% accurate - recommend manual review";

/// Tier a prediction by its top class probability.
pub(crate) fn confidence_tier(top_probability: f64) -> (ConfidenceLevel, &'static str) {
    if top_probability >= HIGH_CONFIDENCE_THRESHOLD {
        (ConfidenceLevel::High, HIGH_RELIABILITY)
    } else if top_probability >= MEDIUM_CONFIDENCE_THRESHOLD {
        (ConfidenceLevel::Medium, MEDIUM_RELIABILITY)
    } else {
        (ConfidenceLevel::Low, LOW_RELIABILITY)
    }
}

/// Holds one read-only [`ModelArtifact`] for the process lifetime. No
/// mutable state: `predict` works on a local batch, so a single instance
/// is safely shared across concurrent request handlers.
pub struct Predictor {
    artifact: ModelArtifact,
}

impl Predictor {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }

    /// Load the serving artifact per the startup selection rule
    /// (optimized first, original as fallback).
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let artifact = ModelArtifact::load(
            Path::new(&config.optimized_path),
            Path::new(&config.original_path),
        )?;
        Ok(Self::new(artifact))
    }

    pub fn variant(&self) -> SchemaVariant {
        self.artifact.variant
    }

    pub fn version_label(&self) -> String {
        self.artifact.version_label()
    }

    /// Predict one result per record, preserving input order.
    pub fn predict(&self, records: &[RawRecord]) -> Result<Vec<PredictionResult>> {
        if records.is_empty() {
            return Err(PredictionError::Validation(
                "at least one record is required".to_string(),
            ));
        }

        let features = features::build(records, self.artifact.variant)?;
        let scaled = self.artifact.scaler.transform(&features)?;
        let probabilities = self.artifact.classifier.predict_proba(&scaled)?;

        let mut results = Vec::with_capacity(records.len());
        for (i, row) in probabilities.rows().into_iter().enumerate() {
            let row = row.to_vec();
            let class = argmax(&row);
            let predicted_status = Outcome::from_class(class).ok_or_else(|| {
                PredictionError::Inference(format!("classifier produced class index {}", class))
            })?;
            let top_probability = row[class];
            let (confidence_level, reliability) = confidence_tier(top_probability);

            results.push(PredictionResult {
                student_id: i + 1,
                predicted_status,
                confidence: format!("{:.1}%", top_probability * 100.0),
                confidence_level,
                reliability: reliability.to_string(),
                probabilities: ClassProbabilities {
                    dropout: row[Outcome::Dropout.class()],
                    enrolled: row[Outcome::Enrolled.class()],
                    graduate: row[Outcome::Graduate.class()],
                },
            });
        }

        debug!(
            batch_size = records.len(),
            variant = self.artifact.variant.as_str(),
            "Prediction batch complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::artifact::{SoftmaxClassifier, StandardScaler};
    use ndarray::{Array1, Array2};
    use serde_json::json;

    /// Artifact with neutral scaling and fixed class preferences, so the
    /// output distribution is the same for every input record.
    fn constant_artifact(variant: SchemaVariant, bias: [f64; 3]) -> ModelArtifact {
        let width = variant.width();
        ModelArtifact {
            scaler: StandardScaler {
                mean: Array1::zeros(width),
                std: Array1::ones(width),
            },
            classifier: SoftmaxClassifier {
                weights: Array2::zeros((width, 3)),
                bias: Array1::from_vec(bias.to_vec()),
            },
            variant,
            model_name: (variant == SchemaVariant::Extended)
                .then(|| "test candidate".to_string()),
            accuracy: (variant == SchemaVariant::Extended).then_some(80.0),
        }
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(confidence_tier(0.9).0, ConfidenceLevel::High);
        assert_eq!(confidence_tier(0.95).0, ConfidenceLevel::High);
        assert_eq!(confidence_tier(0.5).0, ConfidenceLevel::Medium);
        assert_eq!(confidence_tier(0.89).0, ConfidenceLevel::Medium);
        assert_eq!(confidence_tier(0.4999).0, ConfidenceLevel::Low);
        assert_eq!(
            confidence_tier(0.2).1,
            "44.3% accurate - recommend manual review"
        );
    }

    #[test]
    fn empty_record_yields_valid_result() {
        let predictor = Predictor::new(constant_artifact(SchemaVariant::Base, [0.0, 0.0, 0.0]));
        let results = predictor.predict(&[RawRecord::new()]).unwrap();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.student_id, 1);
        let sum =
            result.probabilities.dropout + result.probabilities.enrolled + result.probabilities.graduate;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn batch_preserves_order_and_ids() {
        let predictor = Predictor::new(constant_artifact(SchemaVariant::Extended, [0.0, 2.0, 0.0]));
        let records = vec![RawRecord::new(), RawRecord::new(), RawRecord::new()];
        let results = predictor.predict(&records).unwrap();
        assert_eq!(results.len(), 3);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.student_id, i + 1);
            assert_eq!(result.predicted_status, Outcome::Enrolled);
        }
    }

    #[test]
    fn confidence_is_per_record() {
        // Weight on age makes the distribution depend on the record.
        let mut artifact = constant_artifact(SchemaVariant::Base, [0.0, 0.0, 0.0]);
        artifact.classifier.weights[[6, 0]] = 3.0; // age_at_enrollment column
        let predictor = Predictor::new(artifact);

        let confident: RawRecord =
            [("age_at_enrollment".to_string(), json!(5))].into_iter().collect();
        let neutral = RawRecord::new();
        let results = predictor.predict(&[confident, neutral]).unwrap();
        assert_ne!(results[0].confidence, results[1].confidence);
        assert_eq!(results[0].predicted_status, Outcome::Dropout);
    }

    #[test]
    fn empty_batch_is_a_validation_error() {
        let predictor = Predictor::new(constant_artifact(SchemaVariant::Base, [0.0, 0.0, 0.0]));
        assert!(matches!(
            predictor.predict(&[]),
            Err(PredictionError::Validation(_))
        ));
    }

    #[test]
    fn version_label_follows_variant() {
        let optimized = Predictor::new(constant_artifact(SchemaVariant::Extended, [0.0; 3]));
        assert_eq!(optimized.version_label(), "Optimized (80.00% accuracy)");
        let original = Predictor::new(constant_artifact(SchemaVariant::Base, [0.0; 3]));
        assert_eq!(original.version_label(), "Original (76.27% accuracy)");
    }
}
