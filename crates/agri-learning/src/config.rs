//! Configuration types for training.
//!
//! This module provides [`ForestParams`] (the random forest hyperparameters
//! stored with every model) and [`TrainingConfig`] (the full train run), each
//! with a validating builder.
//!
//! # Example
//!
//! ```
//! use agri_learning::{ForestParams, TrainingConfig};
//!
//! let config = TrainingConfig::builder()
//!     .target_column("standard_yield")
//!     .test_size(0.3)
//!     .random_seed(42)
//!     .forest(ForestParams::builder().n_estimators(50).build().expect("valid params"))
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::LearningError;
use serde::{Deserialize, Serialize};

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum MaxFeatures {
    /// Every feature (the usual choice for regression forests)
    #[default]
    All,
    /// Square root of the number of features
    Sqrt,
    /// Log2 of the number of features
    Log2,
    /// Fraction of the number of features, in `(0.0, 1.0]`
    Fraction(f64),
    /// Fixed number of features, capped at the number available
    Fixed(usize),
}

impl MaxFeatures {
    /// Resolve to a concrete count for `n_features` features (at least 1).
    #[must_use]
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(k) => k,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters of the random forest regressor.
///
/// Defaults: 200 trees, max depth 20, min split 2, min leaf 1, bootstrap on,
/// all features per split, seed 42.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees in the ensemble (default: 200). Must be at least 1.
    pub n_estimators: usize,

    /// Maximum tree depth (default: `Some(20)`). `None` grows trees until the
    /// other stopping rules apply.
    pub max_depth: Option<usize>,

    /// Minimum samples required to split a node (default: 2). Must be at least 2.
    pub min_samples_split: usize,

    /// Minimum samples in each leaf (default: 1). Must be at least 1.
    pub min_samples_leaf: usize,

    /// Features considered per split (default: all).
    pub max_features: MaxFeatures,

    /// Fit each tree on a bootstrap sample of the rows (default: true).
    pub bootstrap: bool,

    /// Base seed; tree `i` uses `seed + i` (default: 42).
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: Some(20),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    /// Create a new builder for `ForestParams`.
    #[must_use]
    pub fn builder() -> ForestParamsBuilder {
        ForestParamsBuilder::default()
    }

    /// Check every constraint documented on the fields.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), LearningError> {
        if self.n_estimators == 0 {
            return Err(LearningError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        if self.max_depth == Some(0) {
            return Err(LearningError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }

        if self.min_samples_split < 2 {
            return Err(LearningError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }

        if self.min_samples_leaf == 0 {
            return Err(LearningError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }

        match self.max_features {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(LearningError::InvalidConfig(
                    "max_features fraction must be in (0.0, 1.0]".to_string(),
                ));
            }
            MaxFeatures::Fixed(0) => {
                return Err(LearningError::InvalidConfig(
                    "max_features must be at least 1".to_string(),
                ));
            }
            _ => {}
        }

        Ok(())
    }
}

/// Builder for [`ForestParams`].
#[derive(Debug, Clone, Default)]
pub struct ForestParamsBuilder {
    params: ForestParams,
}

impl ForestParamsBuilder {
    /// Set the number of trees (default: 200).
    #[must_use]
    pub fn n_estimators(mut self, n: usize) -> Self {
        self.params.n_estimators = n;
        self
    }

    /// Set the maximum depth (default: 20).
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.params.max_depth = Some(depth);
        self
    }

    /// Grow trees without a depth limit.
    #[must_use]
    pub fn unlimited_depth(mut self) -> Self {
        self.params.max_depth = None;
        self
    }

    /// Set the minimum samples to split a node (default: 2).
    #[must_use]
    pub fn min_samples_split(mut self, n: usize) -> Self {
        self.params.min_samples_split = n;
        self
    }

    /// Set the minimum samples per leaf (default: 1).
    #[must_use]
    pub fn min_samples_leaf(mut self, n: usize) -> Self {
        self.params.min_samples_leaf = n;
        self
    }

    /// Set the per-split feature subset strategy (default: all).
    #[must_use]
    pub fn max_features(mut self, max_features: MaxFeatures) -> Self {
        self.params.max_features = max_features;
        self
    }

    /// Enable or disable bootstrap sampling (default: true).
    #[must_use]
    pub fn bootstrap(mut self, bootstrap: bool) -> Self {
        self.params.bootstrap = bootstrap;
        self
    }

    /// Set the base seed (default: 42).
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.params.seed = seed;
        self
    }

    /// Build the parameters, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if any constraint is violated.
    pub fn build(self) -> Result<ForestParams, LearningError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

/// Configuration of a complete training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Name of the target column after header normalization
    /// (default: `"standard_yield"`).
    pub target_column: String,

    /// Fraction of rows held out for evaluation (default: 0.3).
    ///
    /// Must be between 0.0 and 1.0 (exclusive).
    pub test_size: f64,

    /// Seed of the train/test shuffle (default: 42).
    pub random_seed: u64,

    /// Forest hyperparameters.
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: "standard_yield".to_string(),
            test_size: 0.3,
            random_seed: 42,
            forest: ForestParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Create a new builder for `TrainingConfig`.
    #[must_use]
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }
}

/// Builder for [`TrainingConfig`].
#[derive(Debug, Clone, Default)]
pub struct TrainingConfigBuilder {
    config: TrainingConfig,
}

impl TrainingConfigBuilder {
    /// Set the target column name.
    #[must_use]
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.config.target_column = column.into();
        self
    }

    /// Set the held-out fraction (default: 0.3).
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.test_size = size;
        self
    }

    /// Set the shuffle seed (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the forest hyperparameters.
    #[must_use]
    pub fn forest(mut self, params: ForestParams) -> Self {
        self.config.forest = params;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if:
    /// - `target_column` is empty
    /// - `test_size` is not in range `(0.0, 1.0)`
    /// - the forest parameters are invalid
    pub fn build(self) -> Result<TrainingConfig, LearningError> {
        if self.config.target_column.trim().is_empty() {
            return Err(LearningError::InvalidConfig(
                "target_column must not be empty".to_string(),
            ));
        }

        validate_test_size(self.config.test_size)?;
        self.config.forest.validate()?;

        Ok(self.config)
    }
}

/// Reject test fractions outside `(0.0, 1.0)`.
pub(crate) fn validate_test_size(test_size: f64) -> Result<(), LearningError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(LearningError::InvalidConfig(format!(
            "test_size must be between 0.0 and 1.0 (exclusive), got {}",
            test_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.target_column, "standard_yield");
        assert_eq!(config.test_size, 0.3);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.forest.n_estimators, 200);
        assert_eq!(config.forest.max_depth, Some(20));
        assert_eq!(config.forest.min_samples_split, 2);
        assert_eq!(config.forest.min_samples_leaf, 1);
        assert_eq!(config.forest.max_features, MaxFeatures::All);
    }

    #[test]
    fn test_builder() {
        let config = TrainingConfig::builder()
            .target_column("yield")
            .test_size(0.25)
            .random_seed(7)
            .forest(ForestParams::builder().n_estimators(10).build().unwrap())
            .build()
            .unwrap();

        assert_eq!(config.target_column, "yield");
        assert_eq!(config.test_size, 0.25);
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.forest.n_estimators, 10);
    }

    #[test]
    fn test_invalid_test_size() {
        for size in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let result = TrainingConfig::builder().test_size(size).build();
            assert!(result.is_err(), "test_size {size} accepted");
            assert!(result.unwrap_err().to_string().contains("test_size"));
        }
    }

    #[test]
    fn test_invalid_forest_params() {
        let result = ForestParams::builder().n_estimators(0).build();
        assert!(result.unwrap_err().to_string().contains("n_estimators"));

        let result = ForestParams::builder().min_samples_split(1).build();
        assert!(result.unwrap_err().to_string().contains("min_samples_split"));

        let result = ForestParams::builder().min_samples_leaf(0).build();
        assert!(result.unwrap_err().to_string().contains("min_samples_leaf"));

        let result = ForestParams::builder().max_depth(0).build();
        assert!(result.unwrap_err().to_string().contains("max_depth"));

        let result = ForestParams::builder()
            .max_features(MaxFeatures::Fraction(1.5))
            .build();
        assert!(result.unwrap_err().to_string().contains("max_features"));
    }

    #[test]
    fn test_empty_target_column() {
        let result = TrainingConfig::builder().target_column("  ").build();
        assert!(matches!(result, Err(LearningError::InvalidConfig(_))));
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::All.resolve(11), 11);
        assert_eq!(MaxFeatures::Sqrt.resolve(11), 4);
        assert_eq!(MaxFeatures::Log2.resolve(11), 4);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(11), 6);
        assert_eq!(MaxFeatures::Fixed(20).resolve(11), 11);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
    }

    #[test]
    fn test_forest_params_serialization() {
        let params = ForestParams::builder()
            .max_features(MaxFeatures::Fraction(0.5))
            .unlimited_depth()
            .build()
            .unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let back: ForestParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
