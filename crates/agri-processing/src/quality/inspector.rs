//! Read-only quality counts.

use crate::error::Result;
use crate::schema::deduplicate;
use crate::utils::nan_count;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Snapshot of a dataset's shape and data quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub rows: usize,
    pub columns: usize,
    /// Rows that exactly repeat an earlier row.
    pub duplicate_rows: usize,
    /// Null cells plus NaN float cells.
    pub missing_cells: usize,
    /// Missing cells per column; columns without any are omitted.
    pub missing_by_column: BTreeMap<String, usize>,
}

impl QualityReport {
    /// True when there are neither duplicates nor missing cells.
    pub fn is_clean(&self) -> bool {
        self.duplicate_rows == 0 && self.missing_cells == 0
    }

    /// Fraction of cells that are present, 1.0 for an empty frame.
    pub fn completeness(&self) -> f64 {
        let total = self.rows * self.columns;
        if total == 0 {
            1.0
        } else {
            1.0 - self.missing_cells as f64 / total as f64
        }
    }
}

/// Number of rows that exactly duplicate an earlier row.
///
/// Nulls compare equal to nulls. Returns 0 for a frame without duplicates.
pub fn count_duplicates(df: &DataFrame) -> Result<usize> {
    let unique = deduplicate(df.clone())?;
    Ok(df.height() - unique.height())
}

/// Total number of missing cells: nulls in any column plus NaN in float columns.
pub fn count_missing(df: &DataFrame) -> usize {
    df.get_columns()
        .iter()
        .map(|c| column_missing(c.as_materialized_series()))
        .sum()
}

/// Missing cells per column, omitting complete columns.
pub fn missing_by_column(df: &DataFrame) -> BTreeMap<String, usize> {
    df.get_columns()
        .iter()
        .filter_map(|c| {
            let missing = column_missing(c.as_materialized_series());
            (missing > 0).then(|| (c.name().to_string(), missing))
        })
        .collect()
}

/// Build a [`QualityReport`] for the frame.
pub fn inspect(df: &DataFrame) -> Result<QualityReport> {
    let report = QualityReport {
        rows: df.height(),
        columns: df.width(),
        duplicate_rows: count_duplicates(df)?,
        missing_cells: count_missing(df),
        missing_by_column: missing_by_column(df),
    };
    debug!(
        "Quality: {} rows, {} columns, {} duplicates, {} missing cells",
        report.rows, report.columns, report.duplicate_rows, report.missing_cells
    );
    Ok(report)
}

fn column_missing(series: &Series) -> usize {
    series.null_count() + nan_count(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> DataFrame {
        df! {
            "name" => &["Alice", "Bob", "Alice", "Eve"],
            "age" => &[Some(25i64), Some(30), Some(25), None],
        }
        .unwrap()
    }

    #[test]
    fn test_count_duplicates() {
        assert_eq!(count_duplicates(&people()).unwrap(), 1);
        let deduped = deduplicate(people()).unwrap();
        assert_eq!(count_duplicates(&deduped).unwrap(), 0);
    }

    #[test]
    fn test_count_missing_includes_nan() {
        let df = df! {
            "a" => &[Some(1.0), Some(f64::NAN), None],
            "b" => &[Some("x"), None, Some("z")],
        }
        .unwrap();
        assert_eq!(count_missing(&df), 3);
    }

    #[test]
    fn test_count_missing_ignores_column_order() {
        let df = people();
        let reordered = df.select(["age", "name"]).unwrap();
        assert_eq!(count_missing(&df), count_missing(&reordered));
    }

    #[test]
    fn test_inspect_report() {
        let report = inspect(&people()).unwrap();
        assert_eq!(report.rows, 4);
        assert_eq!(report.columns, 2);
        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(report.missing_cells, 1);
        assert_eq!(report.missing_by_column.get("age"), Some(&1));
        assert!(!report.missing_by_column.contains_key("name"));
        assert!(!report.is_clean());
        assert!((report.completeness() - 7.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_report_serializes() {
        let report = inspect(&people()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duplicate_rows"], 1);
        assert_eq!(json["missing_by_column"]["age"], 1);
    }
}
