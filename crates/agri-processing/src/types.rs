use crate::config::MissingValuePolicy;
use crate::encoding::CategoricalCodeTable;
use crate::quality::QualityReport;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Output of [`Preprocessor::run`](crate::Preprocessor::run).
#[derive(Debug, Clone)]
pub struct PreprocessedDataset {
    /// Normalized, cleaned and encoded frame.
    pub data: DataFrame,
    /// Code table used for the categorical columns.
    pub code_table: CategoricalCodeTable,
    /// Quality of the frame right after header normalization.
    pub quality_before: QualityReport,
    /// Quality of the returned frame.
    pub quality_after: QualityReport,
    /// Human-readable log of what was done, in order.
    pub steps: Vec<String>,
    /// Wall-clock time spent in the pipeline.
    pub duration_ms: u64,
}

impl PreprocessedDataset {
    /// Serializable summary for reports and `--json` output.
    pub fn summary(&self, missing_policy: MissingValuePolicy) -> PreprocessingSummary {
        PreprocessingSummary {
            duration_ms: self.duration_ms,
            rows_before: self.quality_before.rows,
            rows_after: self.quality_after.rows,
            rows_removed: self
                .quality_before
                .rows
                .saturating_sub(self.quality_after.rows),
            columns: self.quality_after.columns,
            missing_policy,
            encoded_columns: self.code_table.columns().map(str::to_string).collect(),
            completeness_before: self.quality_before.completeness(),
            completeness_after: self.quality_after.completeness(),
            quality_before: self.quality_before.clone(),
            quality_after: self.quality_after.clone(),
            steps: self.steps.clone(),
        }
    }
}

/// Human-readable summary of what the preprocessing pipeline did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    /// Number of rows before preprocessing.
    pub rows_before: usize,
    /// Number of rows after preprocessing.
    pub rows_after: usize,
    /// Number of rows removed (duplicates and, with `DropRows`, incomplete rows).
    pub rows_removed: usize,
    pub columns: usize,

    pub missing_policy: MissingValuePolicy,
    /// Columns that were replaced by integer codes.
    pub encoded_columns: Vec<String>,

    /// Share of present cells before preprocessing (0.0 - 1.0).
    pub completeness_before: f64,
    /// Share of present cells after preprocessing (0.0 - 1.0).
    pub completeness_after: f64,

    pub quality_before: QualityReport,
    pub quality_after: QualityReport,
    pub steps: Vec<String>,
}
