//! Shared utilities for the preprocessing modules.
//!
//! Helpers used by more than one module: dtype checks, CSV loading, and the
//! small per-series statistics behind imputation.

use crate::error::{ProcessingError, Result};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::Path;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a floating point type (the only kind that holds NaN).
#[inline]
pub fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

// =============================================================================
// Loading
// =============================================================================

/// Read a delimited file with a header row into a DataFrame.
///
/// The whole file is scanned for schema inference so a float appearing late
/// in an integer-looking column does not break parsing.
pub fn read_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let load_error = |reason: String| ProcessingError::DataLoad {
        path: path.display().to_string(),
        reason,
    };

    if !path.exists() {
        return Err(load_error("file does not exist".to_string()));
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| load_error(e.to_string()))
}

/// Write a DataFrame as CSV with a header row, creating parent directories.
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Number of NaN cells in a float Series. Zero for any other dtype.
pub fn nan_count(series: &Series) -> usize {
    match series.dtype() {
        DataType::Float64 => series
            .f64()
            .map(|ca| ca.into_iter().flatten().filter(|v| v.is_nan()).count())
            .unwrap_or(0),
        DataType::Float32 => series
            .f32()
            .map(|ca| ca.into_iter().flatten().filter(|v| v.is_nan()).count())
            .unwrap_or(0),
        _ => 0,
    }
}

/// Per-row missing flags (null, or NaN for float columns).
pub fn missing_mask(series: &Series) -> PolarsResult<Vec<bool>> {
    let nulls = series.is_null();
    if !is_float_dtype(series.dtype()) {
        return Ok(nulls.into_iter().map(|v| v.unwrap_or(false)).collect());
    }
    let values = series.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.is_none_or(f64::is_nan))
        .collect())
}

/// Median of the non-missing values of a numeric Series.
pub fn numeric_median(series: &Series) -> PolarsResult<Option<f64>> {
    let values = series.cast(&DataType::Float64)?;
    let mut present: Vec<f64> = values
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect();
    if present.is_empty() {
        return Ok(None);
    }
    present.sort_by(f64::total_cmp);
    let mid = present.len() / 2;
    let median = if present.len() % 2 == 0 {
        (present[mid - 1] + present[mid]) / 2.0
    } else {
        present[mid]
    };
    Ok(Some(median))
}

/// Calculate the mode (most frequent value) of a string Series.
///
/// Ties go to the lexicographically smallest value so the result does not
/// depend on hash ordering.
pub fn string_mode(series: &Series) -> Option<String> {
    let non_null = series.drop_nulls();
    if non_null.is_empty() {
        return None;
    }

    let str_chunked = non_null.str().ok()?;

    let mut value_counts: std::collections::BTreeMap<&str, usize> =
        std::collections::BTreeMap::new();
    for val in str_chunked.into_iter().flatten() {
        *value_counts.entry(val).or_insert(0) += 1;
    }

    let max = value_counts.values().copied().max()?;
    value_counts
        .into_iter()
        .find(|(_, count)| *count == max)
        .map(|(val, _)| val.to_string())
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null and NaN values in a numeric Series, returning a Float64 Series.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let values = series.cast(&DataType::Float64)?;
    let filled: Vec<f64> = values
        .f64()?
        .into_iter()
        .map(|v| match v {
            Some(v) if !v.is_nan() => v,
            _ => fill_value,
        })
        .collect();

    Ok(Series::new(series.name().clone(), filled))
}

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let filled: Vec<String> = series
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or(fill_value).to_string())
        .collect();

    Ok(Series::new(series.name().clone(), filled))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_nan_count() {
        let series = Series::new("x".into(), &[Some(1.0), Some(f64::NAN), None]);
        assert_eq!(nan_count(&series), 1);
        let ints = Series::new("y".into(), &[1i64, 2]);
        assert_eq!(nan_count(&ints), 0);
    }

    #[test]
    fn test_missing_mask() {
        let series = Series::new("x".into(), &[Some(1.0), Some(f64::NAN), None]);
        assert_eq!(missing_mask(&series).unwrap(), vec![false, true, true]);
        let text = Series::new("s".into(), &[Some("a"), None]);
        assert_eq!(missing_mask(&text).unwrap(), vec![false, true]);
    }

    #[test]
    fn test_numeric_median() {
        let odd = Series::new("x".into(), &[Some(3.0), None, Some(1.0), Some(2.0)]);
        assert_eq!(numeric_median(&odd).unwrap(), Some(2.0));
        let even = Series::new("x".into(), &[4i64, 1, 3, 2]);
        assert_eq!(numeric_median(&even).unwrap(), Some(2.5));
        let empty = Series::new("x".into(), &[None::<f64>, None]);
        assert_eq!(numeric_median(&empty).unwrap(), None);
    }

    #[test]
    fn test_fill_numeric_nulls() {
        let series = Series::new("test".into(), &[Some(1.0), None, Some(f64::NAN)]);
        let filled = fill_numeric_nulls(&series, 0.5).unwrap();
        let values: Vec<Option<f64>> = filled.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(1.0), Some(0.5), Some(0.5)]);
    }

    #[test]
    fn test_fill_string_nulls() {
        let series = Series::new("test".into(), &[Some("a"), None]);
        let filled = fill_string_nulls(&series, "b").unwrap();
        assert_eq!(filled.null_count(), 0);
        assert_eq!(filled.str().unwrap().get(1), Some("b"));
    }

    #[test]
    fn test_string_mode() {
        let series = Series::new("test".into(), &["a", "b", "a", "c", "a"]);
        assert_eq!(string_mode(&series), Some("a".to_string()));
    }

    #[test]
    fn test_string_mode_tie_is_deterministic() {
        let series = Series::new("test".into(), &["sandy", "loamy", "sandy", "loamy"]);
        assert_eq!(string_mode(&series), Some("loamy".to_string()));
    }

    #[test]
    fn test_read_csv_missing_file() {
        let err = read_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, ProcessingError::DataLoad { .. }));
    }
}
