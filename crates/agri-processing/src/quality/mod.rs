//! Data quality inspection.
//!
//! Read-only counts (duplicates, missing cells) summarized into a
//! [`QualityReport`], and the [`MissingValuePolicy`](crate::MissingValuePolicy)
//! that decides what happens to missing cells before training.

mod inspector;
mod policy;

pub use inspector::{QualityReport, count_duplicates, count_missing, inspect, missing_by_column};
pub use policy::apply_missing_policy;
