//! Staged training of the crop yield regressor.
//!
//! [`Trainer`] walks a fixed sequence of stages:
//!
//! ```text
//! Uninitialized → DataLoaded → Split → Trained → Evaluated → Persisted
//! ```
//!
//! Every operation names the earliest stage it needs; calling it earlier
//! fails with [`LearningError::StateOrder`] instead of touching missing data.
//! Loading restarts the sequence from `DataLoaded`.
//!
//! # Example
//!
//! ```no_run
//! use agri_learning::{ForestParams, Trainer};
//!
//! # fn main() -> agri_learning::Result<()> {
//! let mut trainer = Trainer::new("standard_yield");
//! trainer.load("data/crop_yield.csv")?;
//! trainer.split(0.3, 42)?;
//! trainer.train(&ForestParams::default())?;
//! let metrics = trainer.evaluate()?;
//! println!("r2 = {:.3}", metrics.r2);
//! trainer.persist("models/random_forest_model.json")?;
//! # Ok(())
//! # }
//! ```

use crate::config::{ForestParams, TrainingConfig, validate_test_size};
use crate::error::{LearningError, Result};
use crate::forest::RandomForestRegressor;
use crate::matrix::{column_values, feature_matrix};
use crate::model::ModelArtifact;
use crate::types::{RegressionMetrics, TrainingReport, ranked_importances};
use agri_processing::{
    CategoricalCodeTable, ProcessingError, normalize_column_name, normalize_columns, read_csv,
};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Stages of a training run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TrainerStage {
    Uninitialized,
    DataLoaded,
    Split,
    Trained,
    Evaluated,
    Persisted,
}

impl TrainerStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::DataLoaded => "DataLoaded",
            Self::Split => "Split",
            Self::Trained => "Trained",
            Self::Evaluated => "Evaluated",
            Self::Persisted => "Persisted",
        }
    }
}

impl fmt::Display for TrainerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Train/test partitions with the target removed from the features.
#[derive(Debug, Clone)]
struct Partitions {
    feature_names: Vec<String>,
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_test: Array2<f64>,
    y_test: Array1<f64>,
}

/// Stateful trainer for the random forest regressor.
#[derive(Debug, Clone)]
pub struct Trainer {
    stage: TrainerStage,
    target_column: String,
    code_table: Option<CategoricalCodeTable>,
    data: Option<DataFrame>,
    partitions: Option<Partitions>,
    forest: Option<RandomForestRegressor>,
    metrics: Option<RegressionMetrics>,
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new("standard_yield")
    }
}

impl Trainer {
    /// Create a trainer predicting `target_column` (matched after header
    /// normalization).
    pub fn new(target_column: impl AsRef<str>) -> Self {
        Self {
            stage: TrainerStage::Uninitialized,
            target_column: normalize_column_name(target_column.as_ref()),
            code_table: None,
            data: None,
            partitions: None,
            forest: None,
            metrics: None,
        }
    }

    /// Attach the code table the categorical features were encoded with, so
    /// it is persisted alongside the model.
    #[must_use]
    pub fn with_code_table(mut self, table: CategoricalCodeTable) -> Self {
        self.code_table = Some(table);
        self
    }

    pub fn stage(&self) -> TrainerStage {
        self.stage
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Feature columns in model order, once the data has been split.
    pub fn feature_names(&self) -> Option<&[String]> {
        self.partitions.as_ref().map(|p| p.feature_names.as_slice())
    }

    /// Row counts of the (training, test) partitions.
    pub fn partition_sizes(&self) -> Option<(usize, usize)> {
        self.partitions
            .as_ref()
            .map(|p| (p.y_train.len(), p.y_test.len()))
    }

    pub fn metrics(&self) -> Option<RegressionMetrics> {
        self.metrics
    }

    pub fn forest(&self) -> Option<&RandomForestRegressor> {
        self.forest.as_ref()
    }

    fn require(&self, operation: &'static str, required: TrainerStage) -> Result<()> {
        if self.stage < required {
            return Err(LearningError::StateOrder {
                operation,
                required: required.name(),
                actual: self.stage.name(),
            });
        }
        Ok(())
    }

    /// Read a CSV dataset and normalize its headers.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::DataLoad`] if the file is missing or cannot be
    /// parsed.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Loading training data from: {}", path.display());
        let df = read_csv(path).map_err(|e| match e {
            ProcessingError::DataLoad { path, reason } => LearningError::DataLoad { path, reason },
            other => LearningError::Preprocessing(other),
        })?;
        self.load_frame(df)
    }

    /// Use an in-memory frame as the dataset. Headers are normalized.
    pub fn load_frame(&mut self, df: DataFrame) -> Result<()> {
        let df = normalize_columns(df)?;
        info!("Dataset loaded: {} rows x {} columns", df.height(), df.width());

        self.data = Some(df);
        self.partitions = None;
        self.forest = None;
        self.metrics = None;
        self.stage = TrainerStage::DataLoaded;
        Ok(())
    }

    /// Shuffle rows with a ChaCha8 RNG seeded by `seed` and hold out
    /// `ceil(n * test_fraction)` of them for evaluation.
    ///
    /// # Errors
    ///
    /// - [`LearningError::StateOrder`] before [`load`](Self::load)
    /// - [`LearningError::InvalidConfig`] if `test_fraction` is not in `(0, 1)`
    /// - [`LearningError::MissingTargetColumn`] if the target is absent
    /// - [`LearningError::InvalidData`] for a non-numeric or missing cell, no
    ///   feature columns, or too few rows for two non-empty partitions
    pub fn split(&mut self, test_fraction: f64, seed: u64) -> Result<()> {
        self.require("split", TrainerStage::DataLoaded)?;
        validate_test_size(test_fraction)?;

        let df = self
            .data
            .as_ref()
            .ok_or(LearningError::StateOrder {
                operation: "split",
                required: TrainerStage::DataLoaded.name(),
                actual: self.stage.name(),
            })?;

        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        if !names.contains(&self.target_column) {
            return Err(LearningError::MissingTargetColumn(self.target_column.clone()));
        }

        let feature_names: Vec<String> = names
            .into_iter()
            .filter(|n| *n != self.target_column)
            .collect();
        if feature_names.is_empty() {
            return Err(LearningError::InvalidData(
                "dataset has no feature columns".to_string(),
            ));
        }

        let n_rows = df.height();
        let n_test = (n_rows as f64 * test_fraction).ceil() as usize;
        if n_test == 0 || n_test >= n_rows {
            return Err(LearningError::InvalidData(format!(
                "{} rows cannot be split into non-empty train and test sets at test fraction {}",
                n_rows, test_fraction
            )));
        }

        let y = Array1::from(column_values(df, &self.target_column).map_err(LearningError::InvalidData)?);
        let x = feature_matrix(df, &feature_names).map_err(LearningError::InvalidData)?;

        let mut order: Vec<usize> = (0..n_rows).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        let (test_rows, train_rows) = order.split_at(n_test);

        let partitions = Partitions {
            feature_names,
            x_train: x.select(Axis(0), train_rows),
            y_train: y.select(Axis(0), train_rows),
            x_test: x.select(Axis(0), test_rows),
            y_test: y.select(Axis(0), test_rows),
        };

        info!(
            "Split {} rows into {} train / {} test (seed {})",
            n_rows,
            train_rows.len(),
            test_rows.len(),
            seed
        );
        debug!("Features: {:?}", partitions.feature_names);

        self.partitions = Some(partitions);
        self.forest = None;
        self.metrics = None;
        self.stage = TrainerStage::Split;
        Ok(())
    }

    /// Fit a random forest on the training partition.
    pub fn train(&mut self, params: &ForestParams) -> Result<()> {
        self.require("train", TrainerStage::Split)?;
        let partitions = self.partitions()?;

        info!(
            "Training random forest: {} trees, max depth {:?}",
            params.n_estimators, params.max_depth
        );
        let started = Instant::now();
        let mut forest = RandomForestRegressor::new(params.clone());
        forest.fit(&partitions.x_train, &partitions.y_train)?;
        info!("Training finished in {:.2}s", started.elapsed().as_secs_f64());

        self.forest = Some(forest);
        self.metrics = None;
        self.stage = TrainerStage::Trained;
        Ok(())
    }

    /// Score the held-out partition.
    pub fn evaluate(&mut self) -> Result<RegressionMetrics> {
        self.require("evaluate", TrainerStage::Trained)?;
        let partitions = self.partitions()?;
        let forest = self.fitted_forest("evaluate")?;

        let predictions = forest.predict(&partitions.x_test)?.to_vec();
        let metrics = RegressionMetrics::compute(&partitions.y_test.to_vec(), &predictions)?;

        info!(
            "Evaluation: r2={:.3}, mse={:.3}, mae={:.3}",
            metrics.r2, metrics.mse, metrics.mae
        );

        self.metrics = Some(metrics);
        self.stage = self.stage.max(TrainerStage::Evaluated);
        Ok(metrics)
    }

    /// Build the artifact for the fitted model without writing it.
    pub fn artifact(&self) -> Result<ModelArtifact> {
        self.require("artifact", TrainerStage::Trained)?;
        let partitions = self.partitions()?;
        let forest = self.fitted_forest("artifact")?;

        let mut artifact = ModelArtifact::new(
            forest.clone(),
            self.target_column.clone(),
            partitions.feature_names.clone(),
        );
        artifact.metrics = self.metrics;
        artifact.code_table = self.code_table.clone();
        Ok(artifact)
    }

    /// Write the model artifact to `path`, creating parent directories and
    /// overwriting any existing file.
    pub fn persist(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.require("persist", TrainerStage::Evaluated)?;
        let path = path.as_ref();
        self.artifact()?.save(path)?;
        info!("Model written to: {}", path.display());

        self.stage = TrainerStage::Persisted;
        Ok(())
    }

    /// Run load → split → train → evaluate → persist on a CSV file.
    pub fn run(
        &mut self,
        data_path: impl AsRef<Path>,
        model_path: impl AsRef<Path>,
        config: &TrainingConfig,
    ) -> Result<TrainingReport> {
        let started = Instant::now();
        self.target_column = normalize_column_name(&config.target_column);
        self.load(data_path)?;
        self.finish_run(model_path.as_ref(), config, started)
    }

    /// Same as [`run`](Self::run) on an already prepared frame.
    pub fn run_frame(
        &mut self,
        df: DataFrame,
        model_path: impl AsRef<Path>,
        config: &TrainingConfig,
    ) -> Result<TrainingReport> {
        let started = Instant::now();
        self.target_column = normalize_column_name(&config.target_column);
        self.load_frame(df)?;
        self.finish_run(model_path.as_ref(), config, started)
    }

    fn finish_run(
        &mut self,
        model_path: &Path,
        config: &TrainingConfig,
        started: Instant,
    ) -> Result<TrainingReport> {
        self.split(config.test_size, config.random_seed)?;
        self.train(&config.forest)?;
        let metrics = self.evaluate()?;
        self.persist(model_path)?;

        let partitions = self.partitions()?;
        let forest = self.fitted_forest("run")?;
        Ok(TrainingReport {
            metrics,
            feature_importance: ranked_importances(
                &partitions.feature_names,
                forest.feature_importances(),
            ),
            n_train: partitions.y_train.len(),
            n_test: partitions.y_test.len(),
            model_path: model_path.display().to_string(),
            training_time_seconds: started.elapsed().as_secs_f64(),
        })
    }

    fn partitions(&self) -> Result<&Partitions> {
        self.partitions.as_ref().ok_or(LearningError::StateOrder {
            operation: "split data access",
            required: TrainerStage::Split.name(),
            actual: self.stage.name(),
        })
    }

    fn fitted_forest(&self, operation: &'static str) -> Result<&RandomForestRegressor> {
        self.forest.as_ref().ok_or(LearningError::StateOrder {
            operation,
            required: TrainerStage::Trained.name(),
            actual: self.stage.name(),
        })
    }
}
