//! Conversion from polars frames to dense `f64` matrices.
//!
//! Errors are plain messages naming the row and column; callers decide
//! whether a bad cell is invalid training data or a schema mismatch.

use agri_processing::is_numeric_dtype;
use ndarray::Array2;
use polars::prelude::*;

/// Read a numeric column as `f64`, rejecting nulls, NaN and infinities.
pub(crate) fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, String> {
    let column = df
        .column(name)
        .map_err(|_| format!("column '{}' not found", name))?;
    if !is_numeric_dtype(column.dtype()) {
        return Err(format!(
            "column '{}' has non-numeric dtype {:?}",
            name,
            column.dtype()
        ));
    }

    let cast = column
        .cast(&DataType::Float64)
        .map_err(|e| format!("column '{}': {}", name, e))?;
    let values = cast
        .f64()
        .map_err(|e| format!("column '{}': {}", name, e))?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v.is_finite() => Ok(v),
            Some(_) => Err(format!("non-finite value at row {}, column '{}'", row, name)),
            None => Err(format!("missing value at row {}, column '{}'", row, name)),
        })
        .collect()
}

/// Stack `columns` (in the given order) into an `n_rows x n_columns` matrix.
pub(crate) fn feature_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>, String> {
    let mut x = Array2::zeros((df.height(), columns.len()));
    for (j, name) in columns.iter().enumerate() {
        for (i, value) in column_values(df, name)?.into_iter().enumerate() {
            x[[i, j]] = value;
        }
    }
    Ok(x)
}
