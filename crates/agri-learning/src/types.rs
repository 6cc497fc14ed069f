//! Common types used throughout the agri-learning crate.
//!
//! # Overview
//!
//! - [`RegressionMetrics`]: held-out evaluation scores
//! - [`TrainingReport`]: result of [`Trainer::run()`](crate::Trainer::run)
//! - [`ModelInfo`]: metadata about a loaded model

use crate::error::{LearningError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Regression metrics on the held-out partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Coefficient of determination. Range: (-∞, 1.0], where 1.0 is perfect.
    ///
    /// When the held-out target is constant, this is 1.0 for a perfect fit
    /// and 0.0 otherwise.
    pub r2: f64,

    /// Mean Squared Error. Lower is better.
    pub mse: f64,

    /// Mean Absolute Error, in target units. Lower is better.
    pub mae: f64,
}

impl RegressionMetrics {
    /// Score `predicted` against `actual`.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] if the slices are empty or of
    /// different lengths.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.is_empty() {
            return Err(LearningError::InvalidData(
                "cannot evaluate on an empty set".to_string(),
            ));
        }
        if actual.len() != predicted.len() {
            return Err(LearningError::InvalidData(format!(
                "{} targets but {} predictions",
                actual.len(),
                predicted.len()
            )));
        }

        let n = actual.len() as f64;
        let mean = actual.iter().sum::<f64>() / n;

        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        let mut abs_err = 0.0;
        for (a, p) in actual.iter().zip(predicted) {
            ss_res += (a - p).powi(2);
            ss_tot += (a - mean).powi(2);
            abs_err += (a - p).abs();
        }

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self {
            r2,
            mse: ss_res / n,
            mae: abs_err / n,
        })
    }
}

/// Result of a complete training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TrainingReport {
    /// Held-out metrics.
    pub metrics: RegressionMetrics,

    /// Feature importance scores (feature name, importance).
    ///
    /// Sorted in descending order by importance; values sum to 1.0 unless no
    /// tree ever split.
    pub feature_importance: Vec<(String, f64)>,

    /// Rows in the training partition.
    pub n_train: usize,

    /// Rows in the held-out partition.
    pub n_test: usize,

    /// Where the model artifact was written.
    pub model_path: String,

    /// Wall-clock time from load to persist, in seconds.
    pub training_time_seconds: f64,
}

/// Information about a trained model.
///
/// Returned by [`InferenceService::metadata()`](crate::InferenceService::metadata).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ModelInfo {
    /// Artifact format version.
    pub format_version: u32,

    /// When the model was trained.
    pub trained_at: DateTime<Utc>,

    /// Name of the target column the model predicts.
    pub target_column: String,

    /// Feature columns, in the order the model expects them.
    pub feature_names: Vec<String>,

    /// Number of trees in the forest.
    pub n_trees: usize,

    /// Held-out metrics recorded at training time, if evaluated.
    pub metrics: Option<RegressionMetrics>,

    /// Whether the artifact carries a categorical code table.
    pub has_code_table: bool,
}

/// Pair feature names with importances, most important first.
pub(crate) fn ranked_importances(names: &[String], importances: &[f64]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = names
        .iter()
        .cloned()
        .zip(importances.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let m = RegressionMetrics::compute(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.mse, 0.0);
        assert_eq!(m.mae, 0.0);
    }

    #[test]
    fn test_known_values() {
        let m = RegressionMetrics::compute(&[1.0, 2.0, 3.0, 4.0], &[2.0, 2.0, 3.0, 2.0]).unwrap();
        // residuals: -1, 0, 0, 2; ss_tot = 5
        assert_eq!(m.mse, 5.0 / 4.0);
        assert_eq!(m.mae, 3.0 / 4.0);
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn test_mean_prediction_scores_zero() {
        let m = RegressionMetrics::compute(&[1.0, 3.0], &[2.0, 2.0]).unwrap();
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn test_constant_target() {
        let exact = RegressionMetrics::compute(&[2.0, 2.0], &[2.0, 2.0]).unwrap();
        assert_eq!(exact.r2, 1.0);
        let off = RegressionMetrics::compute(&[2.0, 2.0], &[2.0, 3.0]).unwrap();
        assert_eq!(off.r2, 0.0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(RegressionMetrics::compute(&[], &[]).is_err());
        assert!(RegressionMetrics::compute(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_ranked_importances() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranked = ranked_importances(&names, &[0.2, 0.5, 0.3]);
        let order: Vec<&str> = ranked.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }
}
