//! Model artifact: the immutable {scaler, classifier, variant} bundle
//! produced by training and consumed read-only by the predictor.
//!
//! Two on-disk JSON shapes exist, mirroring the two generations of
//! training output: the optimized artifact is a tagged triple
//! `{scaler, classifier, model_name, accuracy}` (extended schema), the
//! original artifact is a bare pair `{scaler, classifier}` (base schema).
//! The loader detects the shape and fixes the variant once, at load time.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, warn};

use super::schema::SchemaVariant;
use crate::error::{PredictionError, Result};
use crate::models::Outcome;

/// Version label reported when serving the first-generation artifact,
/// fixed calibration metadata from its offline evaluation.
const ORIGINAL_MODEL_LABEL: &str = "Original (76.27% accuracy)";

/// Per-column standardization fitted once at training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl StandardScaler {
    /// Fit mean and standard deviation per column. Zero-variance columns
    /// get a unit scale so transform never divides by zero.
    pub fn fit(x: &Array2<f64>) -> Self {
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let std = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Self { mean, std }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardize using the fitted parameters; never refits.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(PredictionError::SchemaMismatch {
                expected: self.n_features(),
                actual: x.ncols(),
            });
        }
        Ok((x - &self.mean) / &self.std)
    }
}

/// Multinomial logistic (softmax) classifier over the three outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxClassifier {
    /// (n_features × n_classes) weight matrix.
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

impl SoftmaxClassifier {
    pub fn zeros(n_features: usize, n_classes: usize) -> Self {
        Self {
            weights: Array2::zeros((n_features, n_classes)),
            bias: Array1::zeros(n_classes),
        }
    }

    pub fn n_features(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_classes(&self) -> usize {
        self.weights.ncols()
    }

    /// Class probability distribution per row; rows sum to 1.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(PredictionError::Inference(format!(
                "classifier was fit on {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }

        let mut logits = x.dot(&self.weights) + &self.bias;
        for mut row in logits.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            if !sum.is_finite() || sum <= 0.0 {
                return Err(PredictionError::Inference(
                    "non-finite logits during softmax".to_string(),
                ));
            }
            row.mapv_inplace(|v| v / sum);
        }
        Ok(logits)
    }

    /// Hard prediction: argmax class index per row.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.rows().into_iter().map(|row| argmax(&row.to_vec())).collect())
    }
}

pub(crate) fn argmax(row: &[f64]) -> usize {
    row.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Immutable trained bundle. Loaded once at startup, shared read-only.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub scaler: StandardScaler,
    pub classifier: SoftmaxClassifier,
    pub variant: SchemaVariant,
    /// Training-time candidate name (optimized artifacts only).
    pub model_name: Option<String>,
    /// Held-out accuracy in percent (optimized artifacts only).
    pub accuracy: Option<f64>,
}

/// On-disk shapes. Serde tries the tagged triple first; a file missing
/// `model_name`/`accuracy` parses as the original pair.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ArtifactFile {
    Optimized {
        scaler: StandardScaler,
        classifier: SoftmaxClassifier,
        model_name: String,
        accuracy: f64,
    },
    Original {
        scaler: StandardScaler,
        classifier: SoftmaxClassifier,
    },
}

impl ModelArtifact {
    /// Read one artifact file, detect its shape, and validate that the
    /// persisted parameters agree with the variant's column list.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            PredictionError::Artifact(format!("cannot open {}: {}", path.display(), e))
        })?;
        let parsed: ArtifactFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| {
                PredictionError::Artifact(format!("cannot parse {}: {}", path.display(), e))
            })?;

        let artifact = match parsed {
            ArtifactFile::Optimized {
                scaler,
                classifier,
                model_name,
                accuracy,
            } => Self {
                scaler,
                classifier,
                variant: SchemaVariant::Extended,
                model_name: Some(model_name),
                accuracy: Some(accuracy),
            },
            ArtifactFile::Original { scaler, classifier } => Self {
                scaler,
                classifier,
                variant: SchemaVariant::Base,
                model_name: None,
                accuracy: None,
            },
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// Startup-time selection: prefer the optimized artifact if present
    /// and well-formed, otherwise fall back to the original. The decision
    /// is fixed for the process lifetime.
    pub fn load(optimized_path: &Path, original_path: &Path) -> Result<Self> {
        match Self::read(optimized_path) {
            Ok(artifact) if artifact.variant == SchemaVariant::Extended => {
                debug!(path = %optimized_path.display(), "Loaded optimized model artifact");
                return Ok(artifact);
            }
            Ok(_) => {
                warn!(
                    path = %optimized_path.display(),
                    "Optimized artifact path holds a base-shaped file, falling back"
                );
            }
            Err(e) => {
                warn!(
                    path = %optimized_path.display(),
                    error = %e,
                    "Failed to load optimized artifact, falling back to original"
                );
            }
        }

        let artifact = Self::read(original_path)?;
        if artifact.variant != SchemaVariant::Base {
            return Err(PredictionError::Artifact(format!(
                "original artifact {} is not base-shaped",
                original_path.display()
            )));
        }
        debug!(path = %original_path.display(), "Loaded original model artifact");
        Ok(artifact)
    }

    /// Persist using the on-disk shape implied by the variant.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PredictionError::Artifact(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let file = File::create(path).map_err(|e| {
            PredictionError::Artifact(format!("cannot create {}: {}", path.display(), e))
        })?;
        let shape = match (&self.model_name, self.accuracy) {
            (Some(model_name), Some(accuracy)) => ArtifactFile::Optimized {
                scaler: self.scaler.clone(),
                classifier: self.classifier.clone(),
                model_name: model_name.clone(),
                accuracy,
            },
            _ => ArtifactFile::Original {
                scaler: self.scaler.clone(),
                classifier: self.classifier.clone(),
            },
        };
        serde_json::to_writer(BufWriter::new(file), &shape)
            .map_err(|e| PredictionError::Artifact(format!("cannot write artifact: {}", e)))
    }

    /// Human-readable model version reported in every response.
    pub fn version_label(&self) -> String {
        match (self.variant, self.accuracy) {
            (SchemaVariant::Extended, Some(accuracy)) => {
                format!("Optimized ({:.2}% accuracy)", accuracy)
            }
            _ => ORIGINAL_MODEL_LABEL.to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        let width = self.variant.width();
        if self.scaler.n_features() != width
            || self.scaler.std.len() != width
            || self.classifier.n_features() != width
        {
            return Err(PredictionError::Artifact(format!(
                "artifact parameters disagree with the {} schema: scaler {} / classifier {} vs {} columns",
                self.variant.as_str(),
                self.scaler.n_features(),
                self.classifier.n_features(),
                width
            )));
        }
        if self.classifier.n_classes() != Outcome::NUM_CLASSES {
            return Err(PredictionError::Artifact(format!(
                "classifier has {} classes, expected {}",
                self.classifier.n_classes(),
                Outcome::NUM_CLASSES
            )));
        }
        Ok(())
    }
}
