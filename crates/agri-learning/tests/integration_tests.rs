//! Integration tests for training and inference.
//!
//! These tests preprocess the CSV fixture with agri-processing, train small
//! forests and serve them through the inference service.

use agri_learning::{
    ForestParams, InferenceService, LearningError, ModelArtifact, ServiceStatus, Trainer,
    TrainerStage, TrainingConfig,
};
use agri_processing::{
    CategoricalCodeTable, MissingValuePolicy, PreprocessedDataset, PreprocessingConfig,
    Preprocessor, read_csv,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/crop_yield_train.csv")
}

fn preprocess(code_table: Option<&CategoricalCodeTable>) -> PreprocessedDataset {
    let config = PreprocessingConfig::builder()
        .categorical_columns(["soil_type", "crop_type", "location"])
        .missing_policy(MissingValuePolicy::Reject)
        .target_column("standard_yield")
        .build()
        .unwrap();
    Preprocessor::new(config)
        .unwrap()
        .run(read_csv(fixture()).unwrap(), code_table)
        .unwrap()
}

fn config(n_estimators: usize) -> TrainingConfig {
    TrainingConfig::builder()
        .target_column("standard_yield")
        .test_size(0.3)
        .random_seed(42)
        .forest(
            ForestParams::builder()
                .n_estimators(n_estimators)
                .seed(42)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

/// Train on the preprocessed fixture and write the model to `path`.
fn train_to(path: &Path) -> PreprocessedDataset {
    let dataset = preprocess(None);
    Trainer::default()
        .with_code_table(dataset.code_table.clone())
        .run_frame(dataset.data.clone(), path, &config(10))
        .unwrap();
    dataset
}

fn feature_rows(dataset: &PreprocessedDataset, offset: i64, len: usize) -> DataFrame {
    dataset
        .data
        .drop("standard_yield")
        .unwrap()
        .slice(offset, len)
}

// ============================================================================
// End-to-End Scenarios
// ============================================================================

#[test]
fn test_train_then_predict_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("models/random_forest_model.json");
    let dataset = train_to(&model_path);

    let service = InferenceService::new();
    service.load(&model_path).unwrap();
    assert_eq!(service.status(), ServiceStatus::Loaded);

    let predictions = service.predict(&feature_rows(&dataset, 0, 1)).unwrap();
    assert_eq!(predictions.len(), 1);
    assert!(predictions[0].is_finite());
}

#[test]
fn test_load_nonexistent_model() {
    let service = InferenceService::new();
    let err = service.load("/nonexistent/models/model.json").unwrap_err();
    assert!(matches!(err, LearningError::ModelLoad { .. }));
    assert_eq!(service.status(), ServiceStatus::NotLoaded);

    let rows = df! { "rainfall" => &[900.0f64] }.unwrap();
    assert!(matches!(service.predict(&rows), Err(LearningError::NotLoaded)));
}

#[test]
fn test_predict_before_load_is_not_an_empty_success() {
    let service = InferenceService::new();
    let rows = df! { "rainfall" => Vec::<f64>::new() }.unwrap();
    assert!(matches!(service.predict(&rows), Err(LearningError::NotLoaded)));
}

// ============================================================================
// Reproducibility
// ============================================================================

#[test]
fn test_same_seed_same_model_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = preprocess(None);

    let mut first = Trainer::default();
    let report_a = first
        .run_frame(dataset.data.clone(), dir.path().join("a.json"), &config(8))
        .unwrap();
    let mut second = Trainer::default();
    let report_b = second
        .run_frame(dataset.data.clone(), dir.path().join("b.json"), &config(8))
        .unwrap();

    assert_eq!(report_a.metrics, report_b.metrics);
    assert_eq!(report_a.n_test, 24);
    assert_eq!(first.forest(), second.forest());
}

#[test]
fn test_persisted_model_predicts_like_the_trainer() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    let dataset = preprocess(None);

    let mut trainer = Trainer::default().with_code_table(dataset.code_table.clone());
    trainer.load_frame(dataset.data.clone()).unwrap();
    trainer.split(0.3, 7).unwrap();
    trainer
        .train(&ForestParams::builder().n_estimators(6).build().unwrap())
        .unwrap();
    let metrics = trainer.evaluate().unwrap();
    trainer.persist(&model_path).unwrap();
    assert_eq!(trainer.stage(), TrainerStage::Persisted);

    let in_memory = InferenceService::from_artifact(trainer.artifact().unwrap()).unwrap();
    let from_disk = InferenceService::new();
    from_disk.load(&model_path).unwrap();

    let rows = feature_rows(&dataset, 0, 10);
    assert_eq!(
        in_memory.predict(&rows).unwrap(),
        from_disk.predict(&rows).unwrap()
    );

    let info = from_disk.metadata().unwrap();
    assert_eq!(info.metrics, Some(metrics));
    assert_eq!(info.n_trees, 6);
    assert!(info.has_code_table);
    assert_eq!(ModelArtifact::load(&model_path).unwrap().code_table, Some(dataset.code_table));
}

// ============================================================================
// Schema Enforcement
// ============================================================================

#[test]
fn test_missing_feature_column() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    let dataset = train_to(&model_path);

    let service = InferenceService::new();
    service.load(&model_path).unwrap();

    let rows = feature_rows(&dataset, 0, 2).drop("rainfall").unwrap();
    let err = service.predict(&rows).unwrap_err();
    assert_eq!(err.error_code(), "SCHEMA_MISMATCH");
}

#[test]
fn test_feature_names_follow_training_order() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    train_to(&model_path);

    let service = InferenceService::new();
    service.load(&model_path).unwrap();
    let names = service.feature_names().unwrap();
    assert_eq!(names.first().map(String::as_str), Some("elevation"));
    assert_eq!(names.last().map(String::as_str), Some("crop_type"));
    assert!(!names.contains(&"standard_yield".to_string()));
}

// ============================================================================
// Raw Rows at the Form Boundary
// ============================================================================

#[test]
fn test_raw_rows_match_encoded_rows() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    let dataset = train_to(&model_path);

    let service = InferenceService::new();
    service.load(&model_path).unwrap();

    let raw = read_csv(fixture()).unwrap().slice(0, 5);
    assert_eq!(
        service.predict_raw(raw).unwrap(),
        service.predict(&feature_rows(&dataset, 0, 5)).unwrap()
    );
}

#[test]
fn test_unseen_soil_type() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    train_to(&model_path);

    let service = InferenceService::new();
    service.load(&model_path).unwrap();

    let mut raw = read_csv(fixture()).unwrap().slice(0, 1);
    raw.replace("Soil_type", Series::new("Soil_type".into(), &["Clay"]))
        .unwrap();
    let err = service.predict_raw(raw).unwrap_err();
    assert!(err.is_unknown_category());
    assert_eq!(err.error_code(), "UNKNOWN_CATEGORY");
}

#[test]
fn test_survey_vocabulary_model() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    let survey = CategoricalCodeTable::survey_defaults();
    let dataset = preprocess(Some(&survey));
    assert_eq!(dataset.code_table, survey);

    Trainer::default()
        .with_code_table(dataset.code_table.clone())
        .run_frame(dataset.data, &model_path, &config(4))
        .unwrap();

    let service = InferenceService::new();
    service.load(&model_path).unwrap();
    let row = read_csv(fixture()).unwrap().slice(3, 1);
    assert_eq!(service.predict_raw(row).unwrap().len(), 1);
}

// ============================================================================
// Training Failures
// ============================================================================

#[test]
fn test_missing_training_file() {
    let mut trainer = Trainer::default();
    let err = trainer.load("/nonexistent/data.csv").unwrap_err();
    assert!(matches!(err, LearningError::DataLoad { .. }));
    assert_eq!(trainer.stage(), TrainerStage::Uninitialized);
}

#[test]
fn test_unencoded_categories_rejected() {
    let mut trainer = Trainer::default();
    trainer.load(fixture()).unwrap();
    let err = trainer.split(0.3, 42).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_DATA");
    assert!(err.to_string().contains("location"));
}

#[test]
fn test_out_of_order_stage() {
    let mut trainer = Trainer::default();
    trainer.load(fixture()).unwrap();
    let err = trainer.evaluate().unwrap_err();
    assert_eq!(
        err.to_string(),
        "'evaluate' requires stage Trained, but the trainer is at DataLoaded"
    );
}
