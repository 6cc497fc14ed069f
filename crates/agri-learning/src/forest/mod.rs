//! Random forest regressor.
//!
//! An averaging ensemble of CART regression trees ([`RegressionTree`]). Each
//! tree is grown on a bootstrap sample with its own ChaCha8 RNG seeded
//! `seed + tree_index`, so a fit is fully determined by the data and
//! [`ForestParams`].

mod tree;

pub use tree::{Node, RegressionTree};

use crate::config::ForestParams;
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tree::TreeLimits;

/// A fitted (or empty) random forest regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<RegressionTree>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl RandomForestRegressor {
    /// Create an unfitted forest.
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    /// Fit the forest, replacing any previously grown trees.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidConfig`] if the params fail validation
    /// - [`LearningError::InvalidData`] if `x` is empty, `x` and `y` disagree
    ///   on the row count, or any value is not finite
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.params.validate()?;

        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(LearningError::InvalidData(format!(
                "cannot fit on a {}x{} matrix",
                n_samples, n_features
            )));
        }
        if y.len() != n_samples {
            return Err(LearningError::InvalidData(format!(
                "{} feature rows but {} targets",
                n_samples,
                y.len()
            )));
        }
        if let Some(((row, col), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(LearningError::InvalidData(format!(
                "non-finite feature value at row {}, column {}",
                row, col
            )));
        }
        if let Some(row) = y.iter().position(|v| !v.is_finite()) {
            return Err(LearningError::InvalidData(format!(
                "non-finite target value at row {}",
                row
            )));
        }

        let limits = TreeLimits {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: self.params.max_features.resolve(n_features),
        };

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        let mut importances = vec![0.0; n_features];
        let mut tree_importances = vec![0.0; n_features];

        for tree_idx in 0..self.params.n_estimators {
            let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed.wrapping_add(tree_idx as u64));

            let indices: Vec<usize> = if self.params.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            tree_importances.iter_mut().for_each(|v| *v = 0.0);
            let tree = RegressionTree::fit(
                x,
                y.view(),
                indices,
                &limits,
                &mut rng,
                &mut tree_importances,
            );

            let total: f64 = tree_importances.iter().sum();
            if total > 0.0 {
                for (acc, v) in importances.iter_mut().zip(&tree_importances) {
                    *acc += v / total;
                }
            }

            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(
            "Fitted {} trees on {} samples x {} features",
            trees.len(),
            n_samples,
            n_features
        );

        self.trees = trees;
        self.n_features = n_features;
        self.feature_importances = importances;
        Ok(())
    }

    /// Predict one value per row of `x`, the mean over all trees.
    ///
    /// # Errors
    ///
    /// - [`LearningError::NotLoaded`] if the forest has not been fitted
    /// - [`LearningError::SchemaMismatch`] if `x` has the wrong column count
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(LearningError::NotLoaded);
        }
        if x.ncols() != self.n_features {
            return Err(LearningError::SchemaMismatch(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let n_trees = self.trees.len() as f64;
        Ok(x.rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Mean impurity decrease per feature, normalized to sum to 1 (all zeros
    /// when no tree ever split).
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Consistency check for forests read from disk.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.feature_importances.len() != self.n_features {
            return Err(format!(
                "{} feature importances for {} features",
                self.feature_importances.len(),
                self.n_features
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}
