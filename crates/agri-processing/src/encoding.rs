//! Categorical feature encoding.
//!
//! A [`CategoricalCodeTable`] maps each normalized categorical value to an
//! integer code. Codes follow a single rule everywhere: the distinct
//! normalized values of a column, sorted lexicographically, numbered from 0.
//! Training builds a table; inference looks values up in the table that was
//! stored with the model and never invents a code.

use crate::error::{ProcessingError, Result};
use crate::schema::normalize_categorical_value;
use crate::utils::is_numeric_dtype;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Version of the serialized code table layout.
pub const CODE_TABLE_VERSION: u32 = 1;

/// Immutable value-to-code mapping, one map per categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalCodeTable {
    version: u32,
    columns: BTreeMap<String, BTreeMap<String, i64>>,
}

impl Default for CategoricalCodeTable {
    fn default() -> Self {
        Self {
            version: CODE_TABLE_VERSION,
            columns: BTreeMap::new(),
        }
    }
}

impl CategoricalCodeTable {
    /// Build a table from raw values per column.
    ///
    /// Values are normalized first, then deduplicated and numbered in
    /// lexicographic order.
    pub fn from_values<C, V, S>(columns: C) -> Self
    where
        C: IntoIterator<Item = (S, V)>,
        V: IntoIterator,
        V::Item: AsRef<str>,
        S: Into<String>,
    {
        let columns = columns
            .into_iter()
            .map(|(name, values)| {
                let distinct: BTreeSet<String> = values
                    .into_iter()
                    .map(|v| normalize_categorical_value(v.as_ref()))
                    .collect();
                let codes = distinct
                    .into_iter()
                    .enumerate()
                    .map(|(code, value)| (value, code as i64))
                    .collect();
                (name.into(), codes)
            })
            .collect();

        Self {
            version: CODE_TABLE_VERSION,
            columns,
        }
    }

    /// The fixed vocabulary of the crop survey form.
    ///
    /// Built with the same rule as a training table, so codes entered through
    /// the form agree with codes learned from survey exports.
    pub fn survey_defaults() -> Self {
        Self::from_values([
            (
                "soil_type",
                vec!["Loamy", "Peaty", "Rocky", "Sandy", "Silt", "Volcanic"],
            ),
            (
                "crop_type",
                vec![
                    "Banana", "Cassava", "Coffee", "Maize", "Potato", "Rice", "Tea", "Wheat",
                ],
            ),
            (
                "location",
                vec![
                    "Rural Akatsi",
                    "Rural Amanzi",
                    "Rural Hawasa",
                    "Rural Kililani",
                    "Rural Sokoto",
                ],
            ),
        ])
    }

    /// Layout version this table was written with.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Names of the columns the table covers, sorted.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Whether the table has an entry for `column`.
    pub fn contains_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Number of known values for `column`, if the column is covered.
    pub fn cardinality(&self, column: &str) -> Option<usize> {
        self.columns.get(column).map(BTreeMap::len)
    }

    /// Code of an already-normalized value.
    pub fn encode(&self, column: &str, value: &str) -> Option<i64> {
        self.columns.get(column)?.get(value).copied()
    }

    /// Normalized value behind a code.
    pub fn decode(&self, column: &str, code: i64) -> Option<&str> {
        self.columns
            .get(column)?
            .iter()
            .find(|(_, c)| **c == code)
            .map(|(value, _)| value.as_str())
    }

    /// Merge the columns of `other` into a copy of this table.
    ///
    /// Columns present in both keep the entry from `other`.
    pub fn merged(&self, other: &CategoricalCodeTable) -> Self {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.clone());
        Self {
            version: CODE_TABLE_VERSION,
            columns,
        }
    }

    /// Check that the table was written with the current layout and that
    /// every column is numbered by the lexicographic rule.
    pub fn validate(&self) -> Result<()> {
        if self.version != CODE_TABLE_VERSION {
            return Err(ProcessingError::Schema(format!(
                "code table version {} is not supported (expected {})",
                self.version, CODE_TABLE_VERSION
            )));
        }
        for (column, codes) in &self.columns {
            // BTreeMap iterates keys in lexicographic order.
            for (expected, (value, code)) in codes.iter().enumerate() {
                if *code != expected as i64 {
                    return Err(ProcessingError::Schema(format!(
                        "code table column '{}' maps '{}' to {} (expected {})",
                        column, value, code, expected
                    )));
                }
            }
        }
        Ok(())
    }

    /// Serialize the table as pretty JSON.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate a table written by [`Self::to_json_file`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ProcessingError::DataLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let table: Self = serde_json::from_str(&content)?;
        table.validate()?;
        Ok(table)
    }
}

/// Names of the numeric (integer or float) columns, in frame order.
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| is_numeric_dtype(c.dtype()))
        .map(|c| c.name().to_string())
        .collect()
}

/// Replace categorical text columns with integer codes.
///
/// With `code_table = None` a fresh table is built from the data (training).
/// With `Some(table)` values are looked up and an unseen value fails with
/// [`ProcessingError::UnknownCategory`] (inference). Named columns that are
/// not text are left as they are. Nulls stay null.
pub fn encode_categorical(
    mut df: DataFrame,
    columns: &[String],
    code_table: Option<&CategoricalCodeTable>,
) -> Result<(DataFrame, CategoricalCodeTable)> {
    let text_columns = text_columns(&df, columns)?;

    let table = match code_table {
        Some(table) => {
            if let Some(missing) = text_columns.iter().find(|c| !table.contains_column(c)) {
                return Err(ProcessingError::Schema(format!(
                    "code table has no entry for categorical column '{}'",
                    missing
                )));
            }
            table.clone()
        }
        None => {
            let mut per_column = Vec::with_capacity(text_columns.len());
            for col_name in &text_columns {
                let values: Vec<String> = df
                    .column(col_name)?
                    .str()?
                    .into_iter()
                    .flatten()
                    .map(str::to_string)
                    .collect();
                per_column.push((col_name.clone(), values));
            }
            let table = CategoricalCodeTable::from_values(per_column);
            info!(
                "Built code table for {} categorical columns",
                text_columns.len()
            );
            table
        }
    };

    for col_name in &text_columns {
        let codes = {
            let values = df.column(col_name)?.str()?;
            let mut codes: Vec<Option<i64>> = Vec::with_capacity(values.len());
            for (row, value) in values.into_iter().enumerate() {
                let Some(value) = value else {
                    codes.push(None);
                    continue;
                };
                let normalized = normalize_categorical_value(value);
                let code = table.encode(col_name, &normalized).ok_or_else(|| {
                    ProcessingError::UnknownCategory {
                        column: col_name.clone(),
                        value: normalized.clone(),
                        row,
                    }
                })?;
                codes.push(Some(code));
            }
            codes
        };

        debug!(
            "Encoded column '{}' ({} categories)",
            col_name,
            table.cardinality(col_name).unwrap_or(0)
        );
        df.replace(col_name, Series::new(col_name.as_str().into(), codes))?;
    }

    Ok((df, table))
}

/// Replace integer code columns with their normalized text values.
pub fn decode_categorical(
    mut df: DataFrame,
    columns: &[String],
    table: &CategoricalCodeTable,
) -> Result<DataFrame> {
    for col_name in columns {
        let column = df
            .column(col_name)
            .map_err(|_| ProcessingError::ColumnNotFound(col_name.clone()))?;
        if !table.contains_column(col_name) {
            return Err(ProcessingError::Schema(format!(
                "code table has no entry for column '{}'",
                col_name
            )));
        }
        let dtype = column.dtype();
        if !is_numeric_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64) {
            return Err(ProcessingError::Schema(format!(
                "column '{}' has dtype {:?}, expected integer codes",
                col_name, dtype
            )));
        }

        let codes = column.cast(&DataType::Int64)?;
        let mut values: Vec<Option<String>> = Vec::with_capacity(codes.len());
        for (row, code) in codes.i64()?.into_iter().enumerate() {
            let Some(code) = code else {
                values.push(None);
                continue;
            };
            let value =
                table
                    .decode(col_name, code)
                    .ok_or_else(|| ProcessingError::UnknownCategory {
                        column: col_name.clone(),
                        value: code.to_string(),
                        row,
                    })?;
            values.push(Some(value.to_string()));
        }

        df.replace(col_name, Series::new(col_name.as_str().into(), values))?;
    }
    Ok(df)
}

/// Resolve the named columns, returning the ones that hold text.
fn text_columns(df: &DataFrame, columns: &[String]) -> Result<Vec<String>> {
    let mut text = Vec::with_capacity(columns.len());
    for col_name in columns {
        let column = df
            .column(col_name)
            .map_err(|_| ProcessingError::ColumnNotFound(col_name.clone()))?;
        if column.dtype() == &DataType::String {
            text.push(col_name.clone());
        } else {
            debug!(
                "Column '{}' is {:?}, leaving it as is",
                col_name,
                column.dtype()
            );
        }
    }
    Ok(text)
}
