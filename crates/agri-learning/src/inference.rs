//! Load-once inference service.
//!
//! [`InferenceService`] owns the model for the lifetime of a serving process.
//! Construct it once, share it (usually behind an `Arc`) with every request
//! handler, and call [`load`](InferenceService::load) before the first
//! prediction.
//!
//! # Thread Safety
//!
//! State lives in a `parking_lot::RwLock`:
//! - loads take an upgradable read lock, so concurrent first requests are
//!   serialized and only one of them reads the artifact
//! - predictions take a short read lock to clone the `Arc<ModelArtifact>`
//!   and then score without holding any lock
//!
//! # Example
//!
//! ```no_run
//! use agri_learning::InferenceService;
//! use polars::prelude::*;
//!
//! # fn main() -> agri_learning::Result<()> {
//! let service = InferenceService::new();
//! service.load("models/random_forest_model.json")?;
//!
//! let row = df! {
//!     "Soil_type" => &["Loamy"],
//!     "Crop_type" => &["Maize"],
//!     "Location" => &["Rural Akatsi"],
//!     "Rainfall" => &[1200.0],
//! }?;
//! let predictions = service.predict_raw(row)?;
//! # Ok(())
//! # }
//! ```

use crate::error::{LearningError, Result};
use crate::matrix::feature_matrix;
use crate::model::ModelArtifact;
use crate::types::ModelInfo;
use agri_processing::{encode_categorical, normalize_columns};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Whether the service can answer predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    NotLoaded,
    Loaded,
}

#[derive(Debug)]
enum ServiceState {
    NotLoaded,
    Loaded {
        artifact: Arc<ModelArtifact>,
        path: PathBuf,
    },
}

/// Serves predictions from a single model loaded at most once.
#[derive(Debug)]
pub struct InferenceService {
    state: RwLock<ServiceState>,
}

static_assertions::assert_impl_all!(InferenceService: Send, Sync);

impl Default for InferenceService {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceService {
    /// Create a service with no model loaded.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ServiceState::NotLoaded),
        }
    }

    /// Create a service that is already loaded with `artifact`.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        artifact.validate().map_err(|reason| LearningError::ModelLoad {
            path: String::new(),
            reason,
        })?;
        Ok(Self {
            state: RwLock::new(ServiceState::Loaded {
                artifact: Arc::new(artifact),
                path: PathBuf::new(),
            }),
        })
    }

    /// Load the model artifact at `path`.
    ///
    /// Once a model is loaded, further calls return `Ok(())` without reading
    /// anything, whatever the path.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::ModelLoad`] if the artifact is missing,
    /// unreadable, corrupt or inconsistent. The service stays `NotLoaded`.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let state = self.state.upgradable_read();

        if let ServiceState::Loaded { path: loaded, .. } = &*state {
            debug!(
                "Model already loaded from {}, ignoring load of {}",
                loaded.display(),
                path.display()
            );
            return Ok(());
        }

        let artifact = ModelArtifact::load(path)?;
        info!(
            "Loaded model from {}: {} trees, {} features",
            path.display(),
            artifact.forest.n_trees(),
            artifact.feature_names.len()
        );

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        *state = ServiceState::Loaded {
            artifact: Arc::new(artifact),
            path: path.to_path_buf(),
        };
        Ok(())
    }

    pub fn status(&self) -> ServiceStatus {
        match &*self.state.read() {
            ServiceState::NotLoaded => ServiceStatus::NotLoaded,
            ServiceState::Loaded { .. } => ServiceStatus::Loaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status() == ServiceStatus::Loaded
    }

    /// Path the model was loaded from.
    pub fn model_path(&self) -> Option<PathBuf> {
        match &*self.state.read() {
            ServiceState::NotLoaded => None,
            ServiceState::Loaded { path, .. } => Some(path.clone()),
        }
    }

    fn model(&self) -> Result<Arc<ModelArtifact>> {
        match &*self.state.read() {
            ServiceState::NotLoaded => Err(LearningError::NotLoaded),
            ServiceState::Loaded { artifact, .. } => Ok(Arc::clone(artifact)),
        }
    }

    /// Feature columns the model expects, in order.
    pub fn feature_names(&self) -> Result<Vec<String>> {
        Ok(self.model()?.feature_names.clone())
    }

    pub fn metadata(&self) -> Result<ModelInfo> {
        Ok(self.model()?.info())
    }

    /// Score encoded feature rows.
    ///
    /// `rows` must have exactly the model's feature columns, same names, same
    /// order, all numeric and without missing cells. Returns one prediction
    /// per row in input order.
    ///
    /// # Errors
    ///
    /// - [`LearningError::NotLoaded`] if no model has been loaded
    /// - [`LearningError::SchemaMismatch`] if the columns or cell types do
    ///   not match the model
    pub fn predict(&self, rows: &DataFrame) -> Result<Vec<f64>> {
        let model = self.model()?;
        check_schema(rows, &model.feature_names)?;
        score(&model, rows)
    }

    /// Score raw rows as entered by a user.
    ///
    /// Headers are normalized, categorical text is normalized and encoded
    /// with the model's code table, and the feature columns are picked in
    /// model order (extra columns are ignored).
    ///
    /// # Errors
    ///
    /// As [`predict`](Self::predict), plus
    /// [`ProcessingError::UnknownCategory`](agri_processing::ProcessingError::UnknownCategory)
    /// (wrapped in [`LearningError::Preprocessing`]) for a value the code
    /// table does not know.
    pub fn predict_raw(&self, rows: DataFrame) -> Result<Vec<f64>> {
        let model = self.model()?;
        let mut df = normalize_columns(rows)?;

        if let Some(table) = &model.code_table {
            let categorical: Vec<String> = table
                .columns()
                .filter(|c| df.column(c).is_ok())
                .map(str::to_string)
                .collect();
            let (encoded, _) = encode_categorical(df, &categorical, Some(table))?;
            df = encoded;
        }

        let missing: Vec<&str> = model
            .feature_names
            .iter()
            .filter(|name| df.column(name.as_str()).is_err())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(LearningError::SchemaMismatch(format!(
                "missing feature columns: {}",
                missing.join(", ")
            )));
        }

        score(&model, &df)
    }
}

fn check_schema(rows: &DataFrame, expected: &[String]) -> Result<()> {
    let actual = rows.get_column_names();
    if actual.len() != expected.len() {
        return Err(LearningError::SchemaMismatch(format!(
            "expected {} feature columns, got {}",
            expected.len(),
            actual.len()
        )));
    }
    for (position, (got, want)) in actual.iter().zip(expected).enumerate() {
        if got.as_str() != want {
            return Err(LearningError::SchemaMismatch(format!(
                "column {} is '{}', expected '{}'",
                position, got, want
            )));
        }
    }
    Ok(())
}

fn score(model: &ModelArtifact, rows: &DataFrame) -> Result<Vec<f64>> {
    let x = feature_matrix(rows, &model.feature_names).map_err(LearningError::SchemaMismatch)?;
    Ok(model.forest.predict(&x)?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForestParams;
    use crate::forest::RandomForestRegressor;
    use agri_processing::CategoricalCodeTable;
    use ndarray::array;
    use polars::prelude::*;

    fn artifact() -> ModelArtifact {
        let x = array![[0.0, 100.0], [1.0, 200.0], [2.0, 300.0], [0.0, 400.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let params = ForestParams::builder().n_estimators(4).build().unwrap();
        let mut forest = RandomForestRegressor::new(params);
        forest.fit(&x, &y).unwrap();
        let mut artifact = ModelArtifact::new(
            forest,
            "standard_yield",
            vec!["soil_type".to_string(), "rainfall".to_string()],
        );
        artifact.code_table = Some(CategoricalCodeTable::from_values([(
            "soil_type",
            vec!["loamy", "sandy", "silt"],
        )]));
        artifact
    }

    #[test]
    fn test_predict_before_load() {
        let service = InferenceService::new();
        let rows = df! { "soil_type" => &[0i64], "rainfall" => &[1.0f64] }.unwrap();
        assert!(matches!(service.predict(&rows), Err(LearningError::NotLoaded)));
        assert!(matches!(service.metadata(), Err(LearningError::NotLoaded)));
        assert_eq!(service.status(), ServiceStatus::NotLoaded);
    }

    #[test]
    fn test_failed_load_leaves_not_loaded() {
        let service = InferenceService::new();
        let err = service.load("/nonexistent/model.json").unwrap_err();
        assert_eq!(err.error_code(), "MODEL_LOAD_ERROR");
        assert_eq!(service.status(), ServiceStatus::NotLoaded);
        assert!(service.model_path().is_none());
    }

    #[test]
    fn test_predict_one_per_row() {
        let service = InferenceService::from_artifact(artifact()).unwrap();
        let rows = df! {
            "soil_type" => &[0i64, 1, 2],
            "rainfall" => &[150.0f64, 250.0, 350.0],
        }
        .unwrap();
        let predictions = service.predict(&rows).unwrap();
        assert_eq!(predictions.len(), 3);
    }

    #[test]
    fn test_wrong_order_is_mismatch() {
        let service = InferenceService::from_artifact(artifact()).unwrap();
        let rows = df! {
            "rainfall" => &[150.0f64],
            "soil_type" => &[0i64],
        }
        .unwrap();
        let err = service.predict(&rows).unwrap_err();
        assert!(matches!(err, LearningError::SchemaMismatch(ref m) if m.contains("column 0")));
    }

    #[test]
    fn test_missing_column_is_mismatch() {
        let service = InferenceService::from_artifact(artifact()).unwrap();
        let rows = df! { "soil_type" => &[0i64] }.unwrap();
        assert_eq!(
            service.predict(&rows).unwrap_err().error_code(),
            "SCHEMA_MISMATCH"
        );
    }

    #[test]
    fn test_text_cell_is_mismatch() {
        let service = InferenceService::from_artifact(artifact()).unwrap();
        let rows = df! {
            "soil_type" => &["loamy"],
            "rainfall" => &[150.0f64],
        }
        .unwrap();
        assert_eq!(
            service.predict(&rows).unwrap_err().error_code(),
            "SCHEMA_MISMATCH"
        );
    }

    #[test]
    fn test_predict_raw_encodes_text() {
        let service = InferenceService::from_artifact(artifact()).unwrap();
        let raw = df! {
            "Rainfall" => &[150.0f64],
            "Soil_type" => &["  Sandy "],
            "Standard_yield" => &[9.0f64],
        }
        .unwrap();
        let encoded = df! {
            "soil_type" => &[1i64],
            "rainfall" => &[150.0f64],
        }
        .unwrap();
        assert_eq!(
            service.predict_raw(raw).unwrap(),
            service.predict(&encoded).unwrap()
        );
    }

    #[test]
    fn test_predict_raw_unknown_category() {
        let service = InferenceService::from_artifact(artifact()).unwrap();
        let raw = df! {
            "Soil_type" => &["Clay"],
            "Rainfall" => &[150.0f64],
        }
        .unwrap();
        let err = service.predict_raw(raw).unwrap_err();
        assert!(err.is_unknown_category());
    }

    #[test]
    fn test_second_load_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        artifact().save(&path).unwrap();

        let service = InferenceService::new();
        service.load(&path).unwrap();
        service.load("/nonexistent/model.json").unwrap();
        assert_eq!(service.model_path(), Some(path));
    }

    #[test]
    fn test_concurrent_first_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        artifact().save(&path).unwrap();

        let service = Arc::new(InferenceService::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let path = path.clone();
                std::thread::spawn(move || service.load(&path))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert!(service.is_loaded());
        assert_eq!(service.feature_names().unwrap().len(), 2);
    }
}
