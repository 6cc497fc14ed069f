//! Configuration types for the preprocessing pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use serde::{Deserialize, Serialize};

/// How missing cells are handled once the dataset has been inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MissingValuePolicy {
    /// Fail with [`crate::ProcessingError::MissingValues`] if any cell is missing
    #[default]
    Reject,
    /// Drop every row that has at least one missing cell
    DropRows,
    /// Fill numeric columns with the median and text columns with the mode
    Impute,
    /// Leave missing cells in place for a downstream stage to report
    Propagate,
}

impl std::fmt::Display for MissingValuePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Reject => "reject",
            Self::DropRows => "drop-rows",
            Self::Impute => "impute",
            Self::Propagate => "propagate",
        };
        f.write_str(name)
    }
}

/// Configuration for the preprocessing pipeline.
///
/// Use [`PreprocessingConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use agri_processing::config::{MissingValuePolicy, PreprocessingConfig};
///
/// let config = PreprocessingConfig::builder()
///     .categorical_columns(["Soil_type", "Crop_type"])
///     .missing_policy(MissingValuePolicy::DropRows)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Columns holding categorical text. Names may be given raw; they are
    /// normalized with the same rule as the headers before use.
    /// Default: empty
    pub categorical_columns: Vec<String>,

    /// Policy applied to missing cells after the quality report is taken.
    /// Default: Reject
    pub missing_policy: MissingValuePolicy,

    /// Whether to remove exact duplicate rows.
    /// Default: true
    pub remove_duplicates: bool,

    /// Column that must be present after normalization (the regression target).
    /// Default: None
    pub target_column: Option<String>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            categorical_columns: Vec::new(),
            missing_policy: MissingValuePolicy::default(),
            remove_duplicates: true,
            target_column: None,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PreprocessingConfigBuilder {
        PreprocessingConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let mut seen = std::collections::HashSet::new();
        for column in &self.categorical_columns {
            let name = crate::schema::normalize_column_name(column);
            if name.is_empty() {
                return Err(ConfigValidationError::EmptyColumnName);
            }
            if !seen.insert(name.clone()) {
                return Err(ConfigValidationError::DuplicateColumn(name));
            }
        }

        if let Some(target) = &self.target_column {
            let target = crate::schema::normalize_column_name(target);
            if target.is_empty() {
                return Err(ConfigValidationError::EmptyColumnName);
            }
            if seen.contains(&target) {
                return Err(ConfigValidationError::TargetIsCategorical(target));
            }
        }

        Ok(())
    }

    /// Categorical column names after header normalization.
    pub fn normalized_categorical_columns(&self) -> Vec<String> {
        self.categorical_columns
            .iter()
            .map(|c| crate::schema::normalize_column_name(c))
            .collect()
    }

    /// Target column name after header normalization.
    pub fn normalized_target_column(&self) -> Option<String> {
        self.target_column
            .as_deref()
            .map(crate::schema::normalize_column_name)
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Column names must not be empty after normalization")]
    EmptyColumnName,

    #[error("Column '{0}' is listed more than once")]
    DuplicateColumn(String),

    #[error("Target column '{0}' cannot also be categorical")]
    TargetIsCategorical(String),
}

impl From<ConfigValidationError> for crate::ProcessingError {
    fn from(err: ConfigValidationError) -> Self {
        crate::ProcessingError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PreprocessingConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PreprocessingConfigBuilder {
    categorical_columns: Option<Vec<String>>,
    missing_policy: Option<MissingValuePolicy>,
    remove_duplicates: Option<bool>,
    target_column: Option<String>,
}

impl PreprocessingConfigBuilder {
    /// Set the categorical columns to normalize and encode.
    pub fn categorical_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categorical_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the missing value policy.
    pub fn missing_policy(mut self, policy: MissingValuePolicy) -> Self {
        self.missing_policy = Some(policy);
        self
    }

    /// Enable or disable duplicate row removal.
    pub fn remove_duplicates(mut self, remove: bool) -> Self {
        self.remove_duplicates = Some(remove);
        self
    }

    /// Set the column the dataset is required to contain.
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PreprocessingConfig` or an error if validation fails.
    pub fn build(self) -> Result<PreprocessingConfig, ConfigValidationError> {
        let config = PreprocessingConfig {
            categorical_columns: self.categorical_columns.unwrap_or_default(),
            missing_policy: self.missing_policy.unwrap_or_default(),
            remove_duplicates: self.remove_duplicates.unwrap_or(true),
            target_column: self.target_column,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreprocessingConfig::default();
        assert!(config.categorical_columns.is_empty());
        assert_eq!(config.missing_policy, MissingValuePolicy::Reject);
        assert!(config.remove_duplicates);
        assert!(config.target_column.is_none());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PreprocessingConfig::builder()
            .categorical_columns(["Soil_type", "Crop_type"])
            .missing_policy(MissingValuePolicy::Impute)
            .remove_duplicates(false)
            .target_column("Standard_yield")
            .build()
            .unwrap();

        assert_eq!(
            config.normalized_categorical_columns(),
            vec!["soil_type".to_string(), "crop_type".to_string()]
        );
        assert_eq!(config.missing_policy, MissingValuePolicy::Impute);
        assert!(!config.remove_duplicates);
        assert_eq!(
            config.normalized_target_column().as_deref(),
            Some("standard_yield")
        );
    }

    #[test]
    fn test_validation_duplicate_after_normalization() {
        let result = PreprocessingConfig::builder()
            .categorical_columns(["Soil_type", "soil_type "])
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::DuplicateColumn(name) if name == "soil_type"
        ));
    }

    #[test]
    fn test_validation_target_is_categorical() {
        let result = PreprocessingConfig::builder()
            .categorical_columns(["crop_type"])
            .target_column("Crop_type")
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::TargetIsCategorical(_)
        ));
    }

    #[test]
    fn test_validation_empty_name() {
        let result = PreprocessingConfig::builder()
            .categorical_columns(["()"])
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyColumnName
        ));
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "categorical_columns": ["soil_type", "location"],
            "missing_policy": "DropRows",
            "remove_duplicates": false,
            "target_column": "standard_yield"
        }"#;

        let config: PreprocessingConfig =
            serde_json::from_str(json).expect("Should deserialize from JSON");

        assert_eq!(config.categorical_columns.len(), 2);
        assert_eq!(config.missing_policy, MissingValuePolicy::DropRows);
        assert!(!config.remove_duplicates);
        assert_eq!(config.target_column, Some("standard_yield".to_string()));
    }

    #[test]
    fn test_policy_display_matches_cli_names() {
        assert_eq!(MissingValuePolicy::DropRows.to_string(), "drop-rows");
        assert_eq!(MissingValuePolicy::Propagate.to_string(), "propagate");
    }
}
