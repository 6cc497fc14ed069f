//! Preprocessing pipeline.
//!
//! Chains the schema normalizer, the quality inspector and the feature
//! encoder into the one sequence used both by the CLI and by training:
//!
//! 1. normalize column headers
//! 2. normalize categorical values
//! 3. inspect quality
//! 4. remove duplicate rows (optional)
//! 5. apply the missing-value policy
//! 6. encode categorical columns
//!
//! # Example
//!
//! ```rust,ignore
//! use agri_processing::{MissingValuePolicy, PreprocessingConfig, Preprocessor};
//!
//! let config = PreprocessingConfig::builder()
//!     .categorical_columns(["soil_type", "crop_type"])
//!     .missing_policy(MissingValuePolicy::DropRows)
//!     .build()?;
//!
//! let dataset = Preprocessor::new(config)?.run(raw, None)?;
//! println!("{} rows ready", dataset.data.height());
//! ```

use crate::config::PreprocessingConfig;
use crate::encoding::{CategoricalCodeTable, encode_categorical};
use crate::error::{ProcessingError, Result, ResultExt};
use crate::quality::{apply_missing_policy, inspect};
use crate::schema::{deduplicate, normalize_categorical_values, normalize_columns};
use crate::types::PreprocessedDataset;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Stages of the preprocessing pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessingStage {
    NormalizeColumns,
    NormalizeValues,
    Inspection,
    Deduplication,
    MissingValues,
    Encoding,
}

impl PreprocessingStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NormalizeColumns => "Normalizing Columns",
            Self::NormalizeValues => "Normalizing Values",
            Self::Inspection => "Inspecting Quality",
            Self::Deduplication => "Removing Duplicates",
            Self::MissingValues => "Handling Missing Values",
            Self::Encoding => "Encoding Categories",
        }
    }
}

/// Runs the preprocessing stages configured by a [`PreprocessingConfig`].
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessingConfig,
}

impl Preprocessor {
    /// Create a preprocessor, validating the configuration.
    pub fn new(config: PreprocessingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Run every stage on `df`.
    ///
    /// With `code_table = None` categorical codes are learned from the data;
    /// with `Some(table)` the given table is applied and unseen values fail
    /// with [`ProcessingError::UnknownCategory`].
    pub fn run(
        &self,
        df: DataFrame,
        code_table: Option<&CategoricalCodeTable>,
    ) -> Result<PreprocessedDataset> {
        match self.run_internal(df, code_table) {
            Ok(dataset) => Ok(dataset),
            Err(e) => {
                error!("Preprocessing failed: {}", e);
                Err(e)
            }
        }
    }

    fn run_internal(
        &self,
        df: DataFrame,
        code_table: Option<&CategoricalCodeTable>,
    ) -> Result<PreprocessedDataset> {
        let start = Instant::now();
        let mut steps = Vec::new();
        let categorical = self.config.normalized_categorical_columns();

        info!(
            "Preprocessing {} rows x {} columns",
            df.height(),
            df.width()
        );

        Self::log_stage(PreprocessingStage::NormalizeColumns);
        let df = normalize_columns(df).context("While normalizing column names")?;
        if let Some(target) = self.config.normalized_target_column()
            && df.column(&target).is_err()
        {
            return Err(ProcessingError::ColumnNotFound(target));
        }
        steps.push(format!("Normalized {} column names", df.width()));

        Self::log_stage(PreprocessingStage::NormalizeValues);
        let df = normalize_categorical_values(df, &categorical)?;
        if !categorical.is_empty() {
            steps.push(format!(
                "Normalized values of categorical columns: {}",
                categorical.join(", ")
            ));
        }

        Self::log_stage(PreprocessingStage::Inspection);
        let quality_before = inspect(&df)?;
        info!(
            "Found {} duplicate rows and {} missing cells",
            quality_before.duplicate_rows, quality_before.missing_cells
        );

        let df = if self.config.remove_duplicates {
            Self::log_stage(PreprocessingStage::Deduplication);
            let before = df.height();
            let df = deduplicate(df)?;
            let removed = before - df.height();
            if removed > 0 {
                steps.push(format!("Removed {} duplicate rows", removed));
            }
            df
        } else {
            debug!("Keeping duplicate rows");
            df
        };

        Self::log_stage(PreprocessingStage::MissingValues);
        let before = df.height();
        let df = apply_missing_policy(df, self.config.missing_policy)?;
        steps.push(format!(
            "Applied missing value policy '{}'",
            self.config.missing_policy
        ));
        if df.height() == 0 && before > 0 {
            warn!("No rows left after applying the missing value policy");
        }

        Self::log_stage(PreprocessingStage::Encoding);
        let (df, code_table) = encode_categorical(df, &categorical, code_table)
            .context("While encoding categorical columns")?;
        if code_table.columns().next().is_some() {
            steps.push(format!(
                "Encoded categorical columns: {}",
                code_table.columns().collect::<Vec<_>>().join(", ")
            ));
        }

        let quality_after = inspect(&df)?;
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Preprocessing complete: {} rows x {} columns in {}ms",
            quality_after.rows, quality_after.columns, duration_ms
        );

        Ok(PreprocessedDataset {
            data: df,
            code_table,
            quality_before,
            quality_after,
            steps,
            duration_ms,
        })
    }

    fn log_stage(stage: PreprocessingStage) {
        debug!("Stage: {}", stage.display_name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissingValuePolicy;
    use crate::quality::count_missing;

    fn raw_survey() -> DataFrame {
        df! {
            "Elevation" => &[Some(500.9), Some(620.0), Some(500.9), Some(710.5)],
            "Soil_type" => &[Some("Sandy"), Some(" loamy"), Some("Sandy"), None],
            "Crop_type" => &[Some("Maize"), Some("Tea"), Some("Maize"), Some("Rice")],
            "Standard_yield" => &[Some(1.2), Some(0.8), Some(1.2), Some(0.4)],
        }
        .unwrap()
    }

    fn config(policy: MissingValuePolicy) -> PreprocessingConfig {
        PreprocessingConfig::builder()
            .categorical_columns(["Soil_type", "Crop_type"])
            .missing_policy(policy)
            .target_column("Standard_yield")
            .build()
            .unwrap()
    }

    #[test]
    fn test_run_drop_rows() {
        let dataset = Preprocessor::new(config(MissingValuePolicy::DropRows))
            .unwrap()
            .run(raw_survey(), None)
            .unwrap();

        assert_eq!(dataset.quality_before.rows, 4);
        assert_eq!(dataset.quality_before.duplicate_rows, 1);
        assert_eq!(dataset.quality_before.missing_cells, 1);
        assert_eq!(dataset.data.height(), 2);
        assert_eq!(count_missing(&dataset.data), 0);
        assert_eq!(dataset.data.column("soil_type").unwrap().dtype(), &DataType::Int64);
        assert_eq!(dataset.code_table.encode("soil_type", "loamy"), Some(0));
        assert!(dataset.quality_after.is_clean());
    }

    #[test]
    fn test_run_reject() {
        let err = Preprocessor::new(config(MissingValuePolicy::Reject))
            .unwrap()
            .run(raw_survey(), None)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::MissingValues { count: 1 }));
    }

    #[test]
    fn test_run_missing_target() {
        let df = raw_survey().drop("Standard_yield").unwrap();
        let err = Preprocessor::new(config(MissingValuePolicy::Impute))
            .unwrap()
            .run(df, None)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::ColumnNotFound(name) if name == "standard_yield"));
    }

    #[test]
    fn test_run_with_fixed_table() {
        let table = CategoricalCodeTable::survey_defaults();
        let dataset = Preprocessor::new(config(MissingValuePolicy::Impute))
            .unwrap()
            .run(raw_survey(), Some(&table))
            .unwrap();
        let soil = dataset.data.column("soil_type").unwrap().i64().unwrap();
        assert_eq!(soil.get(0), Some(3));
        assert_eq!(dataset.code_table, table);
    }

    #[test]
    fn test_summary_counts_removed_rows() {
        let dataset = Preprocessor::new(config(MissingValuePolicy::DropRows))
            .unwrap()
            .run(raw_survey(), None)
            .unwrap();
        let summary = dataset.summary(MissingValuePolicy::DropRows);
        assert_eq!(summary.rows_removed, 2);
        assert_eq!(summary.encoded_columns, vec!["crop_type", "soil_type"]);
    }
}
