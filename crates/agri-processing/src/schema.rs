//! Schema normalization: column headers, categorical text and duplicate rows.
//!
//! Survey exports arrive with headers such as `"Min_temperature_C"`,
//! `"City/Location"` or `"Salary?"` and free-text categories with stray
//! casing and spaces. Everything downstream (encoder, trainer, inference)
//! keys on the normalized forms produced here.

use crate::error::{ProcessingError, Result, ResultExt};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s").expect("Invalid regex: whitespace"));

/// Normalize a single column header.
///
/// Trims, lower-cases, removes `(`, `)` and `?`, and maps `-` and `/` to `_`.
/// Internal spaces are kept. Applying the rule twice gives the same result.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(['(', ')', '?'], "")
        .replace(['-', '/'], "_")
        .trim()
        .to_string()
}

/// Normalize a single categorical value.
///
/// Lower-cases, trims, turns every remaining whitespace character into `_`
/// and strips parentheses, so `"Volcanic (Rich)"` becomes `"volcanic_rich"`.
pub fn normalize_categorical_value(value: &str) -> String {
    let lowered = value.to_lowercase();
    WHITESPACE
        .replace_all(lowered.trim(), "_")
        .replace(['(', ')'], "")
}

/// Apply [`normalize_column_name`] to every header of the frame.
///
/// Fails with [`ProcessingError::Schema`] when two headers collapse to the
/// same name instead of silently overwriting one of them.
pub fn normalize_columns(mut df: DataFrame) -> Result<DataFrame> {
    let originals: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let mut seen: HashMap<String, &str> = HashMap::with_capacity(originals.len());
    let mut normalized = Vec::with_capacity(originals.len());

    for original in &originals {
        let name = normalize_column_name(original);
        if let Some(previous) = seen.insert(name.clone(), original) {
            return Err(ProcessingError::Schema(format!(
                "columns '{}' and '{}' both normalize to '{}'",
                previous, original, name
            )));
        }
        if name != *original {
            debug!("Renaming column '{}' -> '{}'", original, name);
        }
        normalized.push(name);
    }

    df.set_column_names(normalized.iter().map(|s| s.as_str()))
        .context("Failed to rename columns")?;
    Ok(df)
}

/// Apply [`normalize_categorical_value`] to each named text column.
///
/// Columns that are not text are left untouched. Nulls stay null.
pub fn normalize_categorical_values(mut df: DataFrame, columns: &[String]) -> Result<DataFrame> {
    for col_name in columns {
        let column = df
            .column(col_name)
            .map_err(|_| ProcessingError::ColumnNotFound(col_name.clone()))?;
        let series = column.as_materialized_series();
        if series.dtype() != &DataType::String {
            debug!(
                "Column '{}' is {:?}, skipping value normalization",
                col_name,
                series.dtype()
            );
            continue;
        }

        let normalized: Vec<Option<String>> = series
            .str()?
            .into_iter()
            .map(|opt| opt.map(normalize_categorical_value))
            .collect();

        let normalized = Series::new(col_name.as_str().into(), normalized);
        df.replace(col_name, normalized)?;
    }
    Ok(df)
}

/// Remove exact full-row duplicates, keeping the first occurrence.
///
/// The relative order of surviving rows is preserved and nulls compare
/// equal to nulls.
pub fn deduplicate(df: DataFrame) -> Result<DataFrame> {
    let before = df.height();
    let deduped = df
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()
        .context("Failed to remove duplicate rows")?;
    debug!("Removed {} duplicate rows", before - deduped.height());
    Ok(deduped)
}
