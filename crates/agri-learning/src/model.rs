//! Persisted model artifact.
//!
//! A [`ModelArtifact`] is a self-describing JSON document: the fitted forest,
//! the ordered feature schema, the target name, the hyperparameters, held-out
//! metrics and (optionally) the categorical code table the features were
//! encoded with. Everything needed to score raw rows travels in one file.

use crate::error::{LearningError, Result};
use crate::forest::RandomForestRegressor;
use crate::types::{ModelInfo, RegressionMetrics};
use agri_processing::CategoricalCodeTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current artifact format. Bump when the JSON layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Default location of the model artifact.
pub const DEFAULT_MODEL_PATH: &str = "models/random_forest_model.json";

/// A trained model ready to persist or serve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    pub target_column: String,
    /// Feature columns in the order the forest was fitted on.
    pub feature_names: Vec<String>,
    pub metrics: Option<RegressionMetrics>,
    pub code_table: Option<CategoricalCodeTable>,
    pub forest: RandomForestRegressor,
}

impl ModelArtifact {
    /// Wrap a fitted forest.
    pub fn new(
        forest: RandomForestRegressor,
        target_column: impl Into<String>,
        feature_names: Vec<String>,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            trained_at: Utc::now(),
            target_column: target_column.into(),
            feature_names,
            metrics: None,
            code_table: None,
            forest,
        }
    }

    /// Loads an artifact from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::ModelLoad`] if:
    /// - The file does not exist or cannot be read
    /// - The JSON is corrupt or does not describe an artifact
    /// - The format version is not [`FORMAT_VERSION`]
    /// - The artifact is internally inconsistent (see [`validate`](Self::validate))
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let model_load = |reason: String| LearningError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };

        if !path.exists() {
            return Err(model_load("file does not exist".to_string()));
        }

        let bytes = fs::read(path).map_err(|e| model_load(e.to_string()))?;
        Self::from_bytes(&bytes).map_err(|e| match e {
            LearningError::ModelLoad { reason, .. } => model_load(reason),
            other => model_load(other.to_string()),
        })
    }

    /// Saves the artifact as JSON, creating parent directories and
    /// overwriting any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize and validate an artifact from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::ModelLoad`] with an empty path for corrupt,
    /// unsupported or inconsistent data.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model_load = |reason: String| LearningError::ModelLoad {
            path: String::new(),
            reason,
        };
        let artifact: Self = serde_json::from_slice(bytes).map_err(|e| model_load(e.to_string()))?;
        artifact.validate().map_err(model_load)?;
        Ok(artifact)
    }

    /// Check the artifact can be served: known format, a fitted forest whose
    /// width matches the feature schema, and a valid code table if present.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            ));
        }
        if self.feature_names.is_empty() {
            return Err("artifact has no feature names".to_string());
        }
        if self.forest.n_features() != self.feature_names.len() {
            return Err(format!(
                "forest expects {} features but {} names are recorded",
                self.forest.n_features(),
                self.feature_names.len()
            ));
        }
        self.forest.validate()?;
        if let Some(table) = &self.code_table {
            table.validate().map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    /// Summary of the artifact without the trees.
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            format_version: self.format_version,
            trained_at: self.trained_at,
            target_column: self.target_column.clone(),
            feature_names: self.feature_names.clone(),
            n_trees: self.forest.n_trees(),
            metrics: self.metrics,
            has_code_table: self.code_table.is_some(),
        }
    }
}
