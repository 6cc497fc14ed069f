//! Imputation of missing values.
//!
//! Statistical fills used by the `Impute` missing-value policy.

mod statistical;

pub use statistical::StatisticalImputer;
