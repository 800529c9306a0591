//! Offline training: split, fit and evaluate the fitness model.

use chrono::Utc;
use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::artifacts::FitnessModel;
use crate::dataset::Dataset;
use crate::domain::{FEATURE_COLUMNS, TARGET_COLUMNS};
use crate::error::ForestError;
use crate::forest::{ForestConfig, RandomForest};

/// Fraction of rows held out for evaluation.
pub const TEST_RATIO: f64 = 0.2;

/// Seed for the train/test shuffle.
pub const SPLIT_SEED: u64 = 42;

/// Held-out error for one target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetMetrics {
    pub target: String,
    /// Mean absolute error.
    pub mae: f64,
    /// Coefficient of determination; None when the held-out target is constant.
    pub r2: Option<f64>,
}

/// Result of a training run.
#[derive(Debug)]
pub struct TrainingReport {
    pub model: FitnessModel,
    pub n_train: usize,
    pub n_test: usize,
    pub metrics: Vec<TargetMetrics>,
}

/// Splits row indices into (train, test) after a seeded shuffle.
///
/// The test partition has ceil(n × test_ratio) rows and takes the front of
/// the shuffled order.
pub fn train_test_split(n: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64) * test_ratio).ceil() as usize;
    let n_test = n_test.min(n);
    let train = indices.split_off(n_test);
    (train, indices)
}

/// Fits the forest on the training partition and scores the held-out rows.
pub fn train(dataset: &Dataset, config: ForestConfig) -> Result<TrainingReport, ForestError> {
    let (train_idx, test_idx) = train_test_split(dataset.n_rows(), TEST_RATIO, SPLIT_SEED);

    let x_train = dataset.features.select_rows(train_idx.iter());
    let y_train = dataset.targets.select_rows(train_idx.iter());

    log::info!(
        "Fitting {} trees on {} rows ({} held out)",
        config.n_estimators,
        train_idx.len(),
        test_idx.len()
    );
    let forest = RandomForest::fit(&x_train, &y_train, config)?;

    let metrics = if test_idx.is_empty() {
        Vec::new()
    } else {
        let x_test = dataset.features.select_rows(test_idx.iter());
        let y_test = dataset.targets.select_rows(test_idx.iter());
        let predicted = forest.predict_matrix(&x_test)?;
        evaluate(&y_test, &predicted)
    };

    let model = FitnessModel {
        forest,
        feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        target_columns: TARGET_COLUMNS.iter().map(|c| c.to_string()).collect(),
        n_train: train_idx.len(),
        trained_at: Utc::now(),
    };

    Ok(TrainingReport {
        model,
        n_train: train_idx.len(),
        n_test: test_idx.len(),
        metrics,
    })
}

/// Computes MAE and R² for each target column.
fn evaluate(actual: &DMatrix<f64>, predicted: &DMatrix<f64>) -> Vec<TargetMetrics> {
    let n = actual.nrows() as f64;

    (0..actual.ncols())
        .map(|c| {
            let truth = actual.column(c);
            let guess = predicted.column(c);

            let mae = truth
                .iter()
                .zip(guess.iter())
                .map(|(t, p)| (t - p).abs())
                .sum::<f64>()
                / n;

            let mean = truth.mean();
            let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
            let ss_res: f64 = truth
                .iter()
                .zip(guess.iter())
                .map(|(t, p)| (t - p).powi(2))
                .sum();
            let r2 = (ss_tot > 0.0).then(|| 1.0 - ss_res / ss_tot);

            TargetMetrics {
                target: TARGET_COLUMNS
                    .get(c)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("target_{}", c)),
                mae,
                r2,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderTable;

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    fn synthetic_dataset(n: usize) -> Dataset {
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for i in 0..n {
            let row: Vec<f64> = (0..16).map(|c| ((i * (c + 1)) % 7) as f64).collect();
            targets.extend_from_slice(&[2000.0 + row[0] * 10.0, 100.0 + row[1], 30.0]);
            features.extend(row);
        }
        Dataset {
            features: DMatrix::from_row_slice(n, 16, &features),
            targets: DMatrix::from_row_slice(n, 3, &targets),
            encoders: EncoderTable::new(),
        }
    }

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split(10, 0.2, 42);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        // ceil: 11 × 0.2 = 2.2 → 3 test rows
        let (train, test) = train_test_split(11, 0.2, 42);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 3);
    }

    #[test]
    fn test_split_is_a_partition() {
        let (train, test) = train_test_split(25, 0.2, 42);
        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_reproducible() {
        assert_eq!(train_test_split(50, 0.2, 42), train_test_split(50, 0.2, 42));
        assert_ne!(train_test_split(50, 0.2, 42), train_test_split(50, 0.2, 1));
    }

    #[test]
    fn test_train_reports_partition_and_metrics() {
        let data = synthetic_dataset(30);
        let config = ForestConfig {
            n_estimators: 5,
            ..ForestConfig::default()
        };
        let report = train(&data, config).unwrap();

        assert_eq!(report.n_train, 24);
        assert_eq!(report.n_test, 6);
        assert_eq!(report.model.n_train, 24);
        assert_eq!(report.model.feature_columns.len(), 16);
        assert_eq!(report.model.forest.n_outputs(), 3);
        assert_eq!(report.metrics.len(), 3);
        assert_eq!(report.metrics[0].target, "Calories_Intake");
        // Exercise_Duration is constant in the synthetic data
        assert!(report.metrics[2].r2.is_none());
        assert!(approx_eq(report.metrics[2].mae, 0.0, 1e-9));
    }

    #[test]
    fn test_train_single_row_fails() {
        let data = synthetic_dataset(1);
        assert!(matches!(
            train(&data, ForestConfig::default()),
            Err(ForestError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn test_evaluate_perfect_prediction() {
        let actual = DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]);
        let metrics = evaluate(&actual, &actual);
        assert!(approx_eq(metrics[0].mae, 0.0, 1e-12));
        assert!(approx_eq(metrics[0].r2.unwrap(), 1.0, 1e-12));
    }
}
