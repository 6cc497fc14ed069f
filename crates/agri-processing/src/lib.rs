//! Survey Data Preprocessing Library
//!
//! Cleaning and encoding of agricultural survey data for crop yield models,
//! built on Polars.
//!
//! # Overview
//!
//! - **Schema Normalization**: canonical column names and categorical values,
//!   duplicate row removal ([`schema`])
//! - **Feature Encoding**: explicit, versioned categorical code tables shared
//!   between training and inference ([`encoding`])
//! - **Quality Inspection**: duplicate and missing-value counts, and a
//!   configurable missing-value policy ([`quality`])
//! - **Pipeline**: all of the above in one configured run ([`Preprocessor`])
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use agri_processing::{MissingValuePolicy, PreprocessingConfig, Preprocessor, read_csv};
//!
//! let raw = read_csv("data/crop_survey.csv")?;
//!
//! let config = PreprocessingConfig::builder()
//!     .categorical_columns(["Soil_type", "Crop_type", "Location"])
//!     .missing_policy(MissingValuePolicy::DropRows)
//!     .target_column("Standard_yield")
//!     .build()?;
//!
//! let dataset = Preprocessor::new(config)?.run(raw, None)?;
//! dataset.code_table.to_json_file("outputs/crop_survey_codes.json")?;
//! ```
//!
//! # Inference
//!
//! The code table learned during training is stored with the model. New rows
//! are encoded against it and never receive a fresh code:
//!
//! ```rust,ignore
//! use agri_processing::encoding::encode_categorical;
//!
//! let (encoded, _) = encode_categorical(rows, &columns, Some(&table))?;
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod imputers;
pub mod pipeline;
pub mod quality;
pub mod schema;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, MissingValuePolicy, PreprocessingConfig, PreprocessingConfigBuilder,
};
pub use encoding::{
    CODE_TABLE_VERSION, CategoricalCodeTable, decode_categorical, encode_categorical,
    numeric_columns,
};
pub use error::{ProcessingError, Result as ProcessingResult, ResultExt};
pub use imputers::StatisticalImputer;
pub use pipeline::{PreprocessingStage, Preprocessor};
pub use quality::{
    QualityReport, apply_missing_policy, count_duplicates, count_missing, inspect,
    missing_by_column,
};
pub use schema::{
    deduplicate, normalize_categorical_value, normalize_categorical_values, normalize_column_name,
    normalize_columns,
};
pub use types::{PreprocessedDataset, PreprocessingSummary};
pub use utils::{is_numeric_dtype, read_csv, write_csv};
