//! agri-learning: random forest training and inference for crop yield.
//!
//! This crate trains a random forest regressor on preprocessed survey data
//! (see `agri-processing`), persists it as a self-describing JSON artifact,
//! and serves predictions from it through a load-once service.
//!
//! # Features
//!
//! - **Native Random Forest**: CART regression trees with bootstrap sampling
//!   and per-split feature subsampling, fully reproducible from a seed
//! - **Staged Training**: an explicit `load → split → train → evaluate →
//!   persist` state machine that rejects out-of-order calls
//! - **Self-Describing Artifacts**: feature schema, metrics and the
//!   categorical code table travel with the trees
//! - **Load-Once Inference**: a thread-safe service that never confuses "not
//!   ready" with "no predictions"
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use agri_learning::{InferenceService, Trainer, TrainingConfig};
//!
//! let config = TrainingConfig::builder()
//!     .target_column("standard_yield")
//!     .test_size(0.3)
//!     .build()?;
//!
//! let report = Trainer::default().run(
//!     "data/crop_yield.csv",
//!     "models/random_forest_model.json",
//!     &config,
//! )?;
//! println!("r2 = {:.3}", report.metrics.r2);
//!
//! let service = InferenceService::new();
//! service.load("models/random_forest_model.json")?;
//! let predictions = service.predict(&feature_rows)?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  raw CSV ──► agri-processing (normalize, encode, quality policy) │
//! └───────────────────────────┬──────────────────────────────────────┘
//!                             ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Trainer ──► RandomForestRegressor ──► ModelArtifact (JSON)      │
//! └───────────────────────────┬──────────────────────────────────────┘
//!                             ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  InferenceService (load once, Arc-shared) ──► predictions        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`](Result). The
//! error type provides specific variants for different failure modes:
//!
//! - [`LearningError::StateOrder`] - a trainer stage was called too early
//! - [`LearningError::MissingTargetColumn`] - the target is not in the data
//! - [`LearningError::ModelLoad`] - missing or corrupt model artifact
//! - [`LearningError::NotLoaded`] - prediction before a model was loaded
//! - [`LearningError::SchemaMismatch`] - rows do not match the model's features
//!
//! See [`LearningError`] for the complete list.

mod config;
mod error;
pub mod forest;
mod inference;
mod matrix;
mod model;
mod trainer;
mod types;

// Re-export public API
//
// Configuration types
pub use config::{ForestParams, ForestParamsBuilder, MaxFeatures, TrainingConfig, TrainingConfigBuilder};
// Error types
pub use error::{LearningError, Result};
// Model
pub use forest::RandomForestRegressor;
pub use model::{DEFAULT_MODEL_PATH, FORMAT_VERSION, ModelArtifact};
// Training
pub use trainer::{Trainer, TrainerStage};
// Inference
pub use inference::{InferenceService, ServiceStatus};
// Result and metrics types
pub use types::{ModelInfo, RegressionMetrics, TrainingReport};
