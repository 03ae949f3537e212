//! Offline training procedure.
//!
//! Loads a labelled CSV, engineers the extended features through the same
//! builder the predictor uses (so the scaler and classifier are fit on
//! exactly the serving column order), fits the scaler, trains candidate
//! classifiers and persists the best one as the optimized artifact.

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::Value;
use std::env;
use std::path::Path;
use tracing::info;

use super::artifact::{ModelArtifact, SoftmaxClassifier, StandardScaler};
use super::features;
use super::schema::SchemaVariant;
use crate::models::{Outcome, RawRecord};

/// Extra weight on the Enrolled class on top of balanced weighting; it is
/// the minority class and otherwise gets swallowed by the other two.
pub const ENROLLED_WEIGHT_BOOST: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub dataset_path: String,
    pub output_path: String,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset_path: "data/students.csv".to_string(),
            output_path: "models/model_optimized.json".to_string(),
            test_fraction: 0.2,
            seed: 13,
        }
    }
}

impl TrainConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();
        Self {
            dataset_path: env::var("DATASET_PATH").unwrap_or(defaults.dataset_path),
            output_path: env::var("MODEL_OPTIMIZED_PATH").unwrap_or(defaults.output_path),
            test_fraction: defaults.test_fraction,
            seed: defaults.seed,
        }
    }
}

pub struct Dataset {
    pub records: Vec<RawRecord>,
    pub labels: Vec<usize>,
}

/// Load a labelled dataset. Headers are normalized (lowercase, spaces and
/// slashes to underscores, the dataset's "nacionality" typo fixed) and the
/// target column is mapped to class indices.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("cannot open dataset {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .context("dataset has no header row")?
        .iter()
        .map(normalize_header)
        .collect();
    let target_idx = headers
        .iter()
        .position(|h| h == "target")
        .context("dataset has no target column")?;

    let mut records = Vec::new();
    let mut labels = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("malformed CSV row {}", line + 2))?;
        let raw_label = row
            .get(target_idx)
            .with_context(|| format!("row {} is missing the target field", line + 2))?
            .trim();
        let label = Outcome::from_label(raw_label)
            .with_context(|| format!("row {}: unknown target label '{}'", line + 2, raw_label))?
            .class();

        let mut record = RawRecord::new();
        for (i, field) in row.iter().enumerate() {
            if i != target_idx {
                record.insert(headers[i].clone(), Value::String(field.to_string()));
            }
        }
        records.push(record);
        labels.push(label);
    }

    if records.is_empty() {
        bail!("dataset {} contains no rows", path.display());
    }
    Ok(Dataset { records, labels })
}

pub fn normalize_header(raw: &str) -> String {
    let name = raw.trim().to_lowercase().replace(' ', "_").replace('/', "_");
    if name == "nacionality" {
        "nationality".to_string()
    } else {
        name
    }
}

/// Seeded stratified split: per class, shuffle and carve off the test
/// fraction, so class proportions survive the split.
pub fn stratified_split(
    labels: &[usize],
    test_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); Outcome::NUM_CLASSES];
    for (i, &label) in labels.iter().enumerate() {
        by_class[label].push(i);
    }

    let mut train = Vec::new();
    let mut test = Vec::new();
    for mut indices in by_class {
        indices.shuffle(&mut rng);
        let n_test = (indices.len() as f64 * test_fraction).round() as usize;
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }
    (train, test)
}

/// sklearn-style balanced weights: n_samples / (n_classes * count).
pub fn balanced_class_weights(labels: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &label in labels {
        counts[label] += 1;
    }
    let n = labels.len() as f64;
    counts
        .iter()
        .map(|&count| {
            if count == 0 {
                0.0
            } else {
                n / (n_classes as f64 * count as f64)
            }
        })
        .collect()
}

/// One hyperparameter configuration in the candidate search.
#[derive(Debug, Clone)]
pub struct TrainCandidate {
    pub name: String,
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

pub fn default_candidates() -> Vec<TrainCandidate> {
    vec![
        TrainCandidate {
            name: "Softmax Regression (600 epochs, lr=0.10)".to_string(),
            epochs: 600,
            learning_rate: 0.10,
            l2: 1e-4,
        },
        TrainCandidate {
            name: "Softmax Regression (300 epochs, lr=0.30)".to_string(),
            epochs: 300,
            learning_rate: 0.30,
            l2: 1e-3,
        },
        TrainCandidate {
            name: "Softmax Regression (1000 epochs, lr=0.05)".to_string(),
            epochs: 1000,
            learning_rate: 0.05,
            l2: 1e-5,
        },
    ]
}

/// Full-batch gradient descent on class-weighted cross entropy with L2.
pub fn fit_softmax(
    x: &Array2<f64>,
    y: &[usize],
    class_weights: &[f64],
    candidate: &TrainCandidate,
) -> Result<SoftmaxClassifier> {
    let (n_samples, n_features) = x.dim();
    if n_samples != y.len() {
        bail!("{} rows but {} labels", n_samples, y.len());
    }
    let mut clf = SoftmaxClassifier::zeros(n_features, class_weights.len());
    let sample_weights: Vec<f64> = y.iter().map(|&c| class_weights[c]).collect();
    let weight_sum: f64 = sample_weights.iter().sum();
    if weight_sum <= 0.0 {
        bail!("all sample weights are zero");
    }

    for _ in 0..candidate.epochs {
        // Weighted (p - onehot(y)) residuals.
        let mut residuals = clf.predict_proba(x)?;
        for (i, &label) in y.iter().enumerate() {
            residuals[[i, label]] -= 1.0;
        }
        for (mut row, &w) in residuals.rows_mut().into_iter().zip(&sample_weights) {
            row.mapv_inplace(|v| v * w);
        }

        let grad_w = x.t().dot(&residuals) / weight_sum + &clf.weights * candidate.l2;
        let grad_b = residuals.sum_axis(Axis(0)) / weight_sum;
        clf.weights = &clf.weights - &(grad_w * candidate.learning_rate);
        clf.bias = &clf.bias - &(grad_b * candidate.learning_rate);
    }
    Ok(clf)
}

pub fn accuracy(classifier: &SoftmaxClassifier, x: &Array2<f64>, y: &[usize]) -> Result<f64> {
    let predictions = classifier.predict(x)?;
    let correct = predictions.iter().zip(y).filter(|(p, t)| p == t).count();
    Ok(correct as f64 / y.len() as f64)
}

pub struct TrainReport {
    pub model_name: String,
    /// Held-out accuracy of the selected candidate, as a fraction.
    pub accuracy: f64,
    pub candidate_results: Vec<(String, f64)>,
}

/// Run the whole procedure and write the optimized artifact.
pub fn run_training(config: &TrainConfig) -> Result<TrainReport> {
    info!("Loading dataset from '{}'", config.dataset_path);
    let dataset = load_dataset(Path::new(&config.dataset_path))?;
    info!("Loaded {} samples", dataset.records.len());

    let matrix = features::build(&dataset.records, SchemaVariant::Extended)?;

    let (train_idx, test_idx) =
        stratified_split(&dataset.labels, config.test_fraction, config.seed);
    if train_idx.is_empty() || test_idx.is_empty() {
        bail!("dataset too small to split: {} samples", dataset.labels.len());
    }
    info!("Split: {} train, {} test", train_idx.len(), test_idx.len());

    let x_train = matrix.select(Axis(0), &train_idx);
    let x_test = matrix.select(Axis(0), &test_idx);
    let y_train: Vec<usize> = train_idx.iter().map(|&i| dataset.labels[i]).collect();
    let y_test: Vec<usize> = test_idx.iter().map(|&i| dataset.labels[i]).collect();

    let scaler = StandardScaler::fit(&x_train);
    let x_train = scaler.transform(&x_train)?;
    let x_test = scaler.transform(&x_test)?;

    let mut class_weights = balanced_class_weights(&y_train, Outcome::NUM_CLASSES);
    class_weights[Outcome::Enrolled.class()] *= ENROLLED_WEIGHT_BOOST;
    info!("Class weights: {:?}", class_weights);

    let mut best: Option<(TrainCandidate, SoftmaxClassifier, f64)> = None;
    let mut candidate_results = Vec::new();
    for candidate in default_candidates() {
        let classifier = fit_softmax(&x_train, &y_train, &class_weights, &candidate)?;
        let acc = accuracy(&classifier, &x_test, &y_test)?;
        info!("{}: {:.2}% held-out accuracy", candidate.name, acc * 100.0);
        candidate_results.push((candidate.name.clone(), acc));
        let is_better = best.as_ref().map(|(_, _, b)| acc > *b).unwrap_or(true);
        if is_better {
            best = Some((candidate, classifier, acc));
        }
    }
    let (candidate, classifier, acc) = best.context("no training candidates configured")?;
    info!("Best model: {} ({:.2}%)", candidate.name, acc * 100.0);

    let artifact = ModelArtifact {
        scaler,
        classifier,
        variant: SchemaVariant::Extended,
        model_name: Some(candidate.name.clone()),
        accuracy: Some(acc * 100.0),
    };
    artifact.save(Path::new(&config.output_path))?;
    info!("Artifact saved to '{}'", config.output_path);

    Ok(TrainReport {
        model_name: candidate.name,
        accuracy: acc,
        candidate_results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn header_normalization() {
        assert_eq!(
            normalize_header("Curricular units 1st sem (grade)"),
            "curricular_units_1st_sem_(grade)"
        );
        assert_eq!(normalize_header("Nacionality"), "nationality");
        assert_eq!(normalize_header("Daytime/evening attendance"), "daytime_evening_attendance");
    }

    #[test]
    fn stratified_split_keeps_class_proportions() {
        let labels: Vec<usize> = (0..30).map(|i| i % 3).collect();
        let (train, test) = stratified_split(&labels, 0.2, 13);
        assert_eq!(train.len() + test.len(), 30);
        assert_eq!(test.len(), 6);
        for class in 0..3 {
            assert_eq!(test.iter().filter(|&&i| labels[i] == class).count(), 2);
        }
        // Disjoint.
        for i in &test {
            assert!(!train.contains(i));
        }
    }

    #[test]
    fn split_is_reproducible() {
        let labels: Vec<usize> = (0..50).map(|i| i % 3).collect();
        assert_eq!(
            stratified_split(&labels, 0.2, 13),
            stratified_split(&labels, 0.2, 13)
        );
    }

    #[test]
    fn balanced_weights_invert_frequencies() {
        let labels = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2];
        let weights = balanced_class_weights(&labels, 3);
        assert!((weights[0] - 20.0 / 30.0).abs() < 1e-12);
        assert!((weights[1] - 20.0 / 15.0).abs() < 1e-12);
        assert!((weights[2] - 20.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn softmax_fit_separates_clustered_classes() {
        // Three one-hot clusters, perfectly separable.
        let n_per_class = 20;
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for class in 0..3 {
            for _ in 0..n_per_class {
                let mut row = vec![0.0; 3];
                row[class] = 5.0;
                data.extend(row);
                labels.push(class);
            }
        }
        let x = Array2::from_shape_vec((3 * n_per_class, 3), data).unwrap();
        let candidate = TrainCandidate {
            name: "test".to_string(),
            epochs: 300,
            learning_rate: 0.2,
            l2: 1e-4,
        };
        let clf = fit_softmax(&x, &labels, &[1.0, 1.0, 1.0], &candidate).unwrap();
        assert!(accuracy(&clf, &x, &labels).unwrap() > 0.95);
    }

    #[test]
    fn load_dataset_normalizes_and_maps_labels() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "Curricular units 1st sem (grade),Nacionality,Target\n12.5,1,Dropout\n14.0,2,Graduate"
        )
        .unwrap();

        let dataset = load_dataset(file.path()).unwrap();
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.labels, vec![0, 2]);
        assert!(dataset.records[0].contains_key("curricular_units_1st_sem_(grade)"));
        assert!(dataset.records[0].contains_key("nationality"));
        assert!(!dataset.records[0].contains_key("target"));
    }

    #[test]
    fn load_dataset_rejects_unknown_label() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gender,Target\n1,Expelled").unwrap();
        assert!(load_dataset(file.path()).is_err());
    }
}
