//! Statistical imputation methods.
//!
//! Median for numeric columns, mode for text columns.

use crate::error::{ProcessingError, Result};
use crate::utils::{fill_numeric_nulls, fill_string_nulls, numeric_median, string_mode};
use polars::prelude::*;
use tracing::debug;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill nulls and NaNs of a numeric column with its median.
    ///
    /// The column becomes `Float64`. A column with no observed value cannot
    /// be imputed and fails with [`ProcessingError::MissingValues`].
    pub fn apply_numeric_median(df: &mut DataFrame, col_name: &str) -> Result<f64> {
        let (median, filled) = {
            let series = df
                .column(col_name)
                .map_err(|_| ProcessingError::ColumnNotFound(col_name.to_string()))?
                .as_materialized_series();
            let median = numeric_median(series)?.ok_or_else(|| {
                ProcessingError::MissingValues {
                    count: series.len(),
                }
                .with_context(format!("Column '{}' has no values to impute from", col_name))
            })?;
            (median, fill_numeric_nulls(series, median)?)
        };

        df.replace(col_name, filled)?;
        debug!("Filled '{}' with median: {}", col_name, median);
        Ok(median)
    }

    /// Fill nulls of a text column with its most frequent value.
    pub fn apply_mode_imputation(df: &mut DataFrame, col_name: &str) -> Result<String> {
        let (mode, filled) = {
            let series = df
                .column(col_name)
                .map_err(|_| ProcessingError::ColumnNotFound(col_name.to_string()))?
                .as_materialized_series();
            let mode = string_mode(series).ok_or_else(|| {
                ProcessingError::MissingValues {
                    count: series.len(),
                }
                .with_context(format!("Column '{}' has no values to impute from", col_name))
            })?;
            let filled = fill_string_nulls(series, &mode)?;
            (mode, filled)
        };

        df.replace(col_name, filled)?;
        debug!("Filled '{}' with mode: '{}'", col_name, mode);
        Ok(mode)
    }
}
