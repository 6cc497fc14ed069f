//! Custom error types for survey data preprocessing.
//!
//! This module provides the error hierarchy using `thiserror` for the schema
//! normalizer, the feature encoder and the quality inspector.
//!
//! Errors are serializable so a front-end can render them as `{code, message}`
//! without string matching.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for preprocessing.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// The source file could not be read or parsed as CSV.
    #[error("Failed to load data from '{path}': {reason}")]
    DataLoad { path: String, reason: String },

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The dataset's columns violate the expected schema.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A categorical value has no entry in the established code table.
    #[error("Unknown category '{value}' in column '{column}' (row {row})")]
    UnknownCategory {
        column: String,
        value: String,
        row: usize,
    },

    /// Missing values were found and the active policy rejects them.
    #[error("Dataset contains {count} missing values")]
    MissingValues { count: usize },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for front-end handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DataLoad { .. } => "DATA_LOAD_ERROR",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            Self::MissingValues { .. } => "MISSING_VALUES",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Returns the innermost error, skipping any context wrappers.
    pub fn root(&self) -> &ProcessingError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error comes from an unseen categorical value.
    pub fn is_unknown_category(&self) -> bool {
        matches!(self.root(), Self::UnknownCategory { .. })
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for preprocessing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            ProcessingError::ColumnNotFound("ph".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(
            ProcessingError::MissingValues { count: 3 }.error_code(),
            "MISSING_VALUES"
        );
    }

    #[test]
    fn test_unknown_category_message_names_row_and_column() {
        let error = ProcessingError::UnknownCategory {
            column: "soil_type".to_string(),
            value: "clay".to_string(),
            row: 7,
        };
        let message = error.to_string();
        assert!(message.contains("soil_type"));
        assert!(message.contains("clay"));
        assert!(message.contains("row 7"));
    }

    #[test]
    fn test_error_serialization() {
        let error = ProcessingError::ColumnNotFound("rainfall".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("rainfall"));
    }

    #[test]
    fn test_with_context_preserves_code_and_kind() {
        let error = ProcessingError::UnknownCategory {
            column: "crop_type".to_string(),
            value: "yam".to_string(),
            row: 0,
        }
        .with_context("While encoding inference rows");
        assert!(error.to_string().contains("While encoding inference rows"));
        assert_eq!(error.error_code(), "UNKNOWN_CATEGORY");
        assert!(error.is_unknown_category());
    }
}
