//! Missing-value policy.

use super::inspector::count_missing;
use crate::config::MissingValuePolicy;
use crate::error::{ProcessingError, Result};
use crate::imputers::StatisticalImputer;
use crate::utils::{is_numeric_dtype, missing_mask, nan_count};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Resolve missing cells according to `policy`.
///
/// `Reject` fails with [`ProcessingError::MissingValues`] when anything is
/// missing, `DropRows` removes incomplete rows, `Impute` fills numeric
/// columns with their median and text columns with their mode, and
/// `Propagate` returns the frame unchanged.
pub fn apply_missing_policy(df: DataFrame, policy: MissingValuePolicy) -> Result<DataFrame> {
    let missing = count_missing(&df);
    if missing == 0 {
        return Ok(df);
    }

    match policy {
        MissingValuePolicy::Reject => Err(ProcessingError::MissingValues { count: missing }),
        MissingValuePolicy::DropRows => drop_incomplete_rows(df),
        MissingValuePolicy::Impute => impute(df),
        MissingValuePolicy::Propagate => {
            debug!("Leaving {} missing cells in place", missing);
            Ok(df)
        }
    }
}

fn drop_incomplete_rows(df: DataFrame) -> Result<DataFrame> {
    let mut keep = vec![true; df.height()];
    for column in df.get_columns() {
        let mask = missing_mask(column.as_materialized_series())?;
        for (keep, missing) in keep.iter_mut().zip(mask) {
            *keep &= !missing;
        }
    }

    let mask = BooleanChunked::from_slice(PlSmallStr::from_static("keep"), &keep);
    let filtered = df.filter(&mask)?;
    let dropped = df.height() - filtered.height();
    warn!(
        "Dropped {} of {} rows with missing values",
        dropped,
        df.height()
    );
    Ok(filtered)
}

fn impute(mut df: DataFrame) -> Result<DataFrame> {
    let incomplete: Vec<(String, DataType)> = df
        .get_columns()
        .iter()
        .filter(|c| c.null_count() > 0 || nan_count(c.as_materialized_series()) > 0)
        .map(|c| (c.name().to_string(), c.dtype().clone()))
        .collect();

    for (col_name, dtype) in &incomplete {
        if is_numeric_dtype(dtype) {
            StatisticalImputer::apply_numeric_median(&mut df, col_name)?;
        } else if dtype == &DataType::String {
            StatisticalImputer::apply_mode_imputation(&mut df, col_name)?;
        } else {
            return Err(ProcessingError::MissingValues {
                count: df.column(col_name)?.null_count(),
            }
            .with_context(format!(
                "Column '{}' has dtype {:?}, which cannot be imputed",
                col_name, dtype
            )));
        }
    }

    info!("Imputed missing values in {} columns", incomplete.len());
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse() -> DataFrame {
        df! {
            "rainfall" => &[Some(100.0), None, Some(300.0), Some(f64::NAN)],
            "soil_type" => &[Some("sandy"), Some("loamy"), None, Some("sandy")],
            "slope" => &[1i64, 2, 3, 4],
        }
        .unwrap()
    }

    #[test]
    fn test_reject_reports_count() {
        let err = apply_missing_policy(sparse(), MissingValuePolicy::Reject).unwrap_err();
        assert!(matches!(err, ProcessingError::MissingValues { count: 3 }));
    }

    #[test]
    fn test_reject_passes_complete_frame() {
        let df = df! { "slope" => &[1i64, 2] }.unwrap();
        let out = apply_missing_policy(df.clone(), MissingValuePolicy::Reject).unwrap();
        assert!(out.equals(&df));
    }

    #[test]
    fn test_drop_rows() {
        let out = apply_missing_policy(sparse(), MissingValuePolicy::DropRows).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(count_missing(&out), 0);
        assert_eq!(out.column("slope").unwrap().i64().unwrap().get(0), Some(1));
    }

    #[test]
    fn test_impute() {
        let out = apply_missing_policy(sparse(), MissingValuePolicy::Impute).unwrap();
        assert_eq!(out.height(), 4);
        assert_eq!(count_missing(&out), 0);
        assert_eq!(out.column("rainfall").unwrap().f64().unwrap().get(1), Some(200.0));
        assert_eq!(out.column("soil_type").unwrap().str().unwrap().get(2), Some("sandy"));
        assert_eq!(out.column("slope").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_propagate_keeps_missing() {
        let out = apply_missing_policy(sparse(), MissingValuePolicy::Propagate).unwrap();
        assert_eq!(count_missing(&out), 3);
    }
}
