//! Error types for the agri-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Example
//!
//! ```no_run
//! use agri_learning::{LearningError, TrainingConfig};
//!
//! fn configure() -> Result<TrainingConfig, LearningError> {
//!     // Errors are automatically propagated with ?
//!     let config = TrainingConfig::builder()
//!         .target_column("standard_yield")
//!         .test_size(0.3)
//!         .build()?;
//!     Ok(config)
//! }
//! ```

use agri_processing::ProcessingError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for training and inference.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// The training dataset could not be read.
    #[error("Failed to load data from '{path}': {reason}")]
    DataLoad {
        /// The path that was read.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// The target column is not part of the dataset.
    ///
    /// Column names are compared after header normalization, so
    /// `"Standard_yield"` in the file matches `standard_yield`.
    #[error("Target column '{0}' not found")]
    MissingTargetColumn(String),

    /// Invalid configuration provided to the trainer.
    ///
    /// Check the error message for details on which configuration value is
    /// invalid and what values are accepted.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data provided for training.
    ///
    /// Common causes:
    /// - a feature column is not numeric (encode categorical columns first)
    /// - a feature or target cell is missing
    /// - too few rows to form both a training and a test partition
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// An operation was called before the stage it depends on.
    #[error("'{operation}' requires stage {required}, but the trainer is at {actual}")]
    StateOrder {
        /// The operation that was attempted.
        operation: &'static str,
        /// The earliest stage at which the operation is allowed.
        required: &'static str,
        /// The stage the trainer was in.
        actual: &'static str,
    },

    /// The model artifact could not be loaded.
    ///
    /// Covers a missing file, unreadable or corrupt JSON, an unsupported
    /// format version and internally inconsistent artifacts.
    #[error("Failed to load model from '{path}': {reason}")]
    ModelLoad {
        /// The path that was read.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// Prediction was requested before a model was loaded.
    #[error("No model loaded")]
    NotLoaded,

    /// The input rows do not match the model's feature schema.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// An error raised by the shared preprocessing code, such as an
    /// unseen categorical value at inference time.
    #[error(transparent)]
    Preprocessing(#[from] ProcessingError),

    /// I/O error during file operations.
    ///
    /// This wraps standard I/O errors that occur while persisting a model.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error while writing a model artifact.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Polars error while reading feature columns.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl LearningError {
    /// Get error code for front-end handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DataLoad { .. } => "DATA_LOAD_ERROR",
            Self::MissingTargetColumn(_) => "MISSING_TARGET_COLUMN",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::StateOrder { .. } => "STATE_ORDER",
            Self::ModelLoad { .. } => "MODEL_LOAD_ERROR",
            Self::NotLoaded => "NOT_LOADED",
            Self::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            Self::Preprocessing(e) => e.error_code(),
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
        }
    }

    /// Check if this error comes from an unseen categorical value.
    pub fn is_unknown_category(&self) -> bool {
        matches!(self, Self::Preprocessing(e) if e.is_unknown_category())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for training and inference operations.
pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_order_message() {
        let err = LearningError::StateOrder {
            operation: "train",
            required: "Split",
            actual: "DataLoaded",
        };
        assert_eq!(
            err.to_string(),
            "'train' requires stage Split, but the trainer is at DataLoaded"
        );
        assert_eq!(err.error_code(), "STATE_ORDER");
    }

    #[test]
    fn test_preprocessing_error_keeps_code() {
        let err: LearningError = ProcessingError::UnknownCategory {
            column: "crop_type".to_string(),
            value: "yam".to_string(),
            row: 2,
        }
        .into();
        assert_eq!(err.error_code(), "UNKNOWN_CATEGORY");
        assert!(err.is_unknown_category());
        assert!(err.to_string().contains("yam"));
    }

    #[test]
    fn test_error_serialization() {
        let json = serde_json::to_string(&LearningError::NotLoaded).unwrap();
        assert_eq!(json, r#"{"code":"NOT_LOADED","message":"No model loaded"}"#);
    }
}
