use crate::helpers::*;
use chrono::Utc;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;
use visa_pipeline::core::{
    create_new_file, IngestionArtifact, PipelineError, PipelinePhase, RunLayout, Stage,
    TrainingConfig, ValidationArtifact,
};
use visa_pipeline::data::Table;
use visa_pipeline::stages::ingestion::documents_to_table;
use visa_pipeline::stages::{DataTransformation, DataValidation, StatisticalDriftDetector};
use visa_pipeline::store::Document;

/// Lay out train/test partitions of `documents` in a fresh run directory
fn ingested(config: &TrainingConfig, documents: &[Document]) -> (RunLayout, IngestionArtifact) {
    let layout = RunLayout::create(&config.artifact_root, Uuid::new_v4(), Utc::now()).unwrap();
    let table = documents_to_table(documents, &config.schema).unwrap();
    let split = table.n_rows() * 4 / 5;
    let train: Vec<usize> = (0..split).collect();
    let test: Vec<usize> = (split..table.n_rows()).collect();
    write(&table.select_rows(&train), &layout.train_file());
    write(&table.select_rows(&test), &layout.test_file());
    let artifact = IngestionArtifact {
        feature_store_path: layout.feature_store_file(),
        train_file_path: layout.train_file(),
        test_file_path: layout.test_file(),
    };
    (layout, artifact)
}

fn write(table: &Table, path: &std::path::Path) {
    table.write_csv(create_new_file(path).unwrap()).unwrap();
}

#[test]
fn test_conforming_partitions_pass() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let (layout, ingestion) = ingested(&config, &synthetic_documents(100, 1));

    let artifact = DataValidation::new(&config, &layout, &StatisticalDriftDetector)
        .initiate(&ingestion)
        .unwrap();

    assert!(artifact.validation_status);
    assert_eq!(artifact.message, "");
    assert!(artifact.drift_report_path.unwrap().exists());
}

#[test]
fn test_missing_columns_are_reported() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let (layout, _) = ingested(&config, &synthetic_documents(10, 1));

    // Two declared columns dropped, two undeclared ones in their place
    let table = documents_to_table(&synthetic_documents(100, 1), &config.schema).unwrap();
    let mut table = table.drop_columns(&["continent".to_string(), "unit_of_wage".to_string()]);
    let n = table.n_rows();
    let filler = vec![visa_pipeline::data::Cell::Text("x".to_string()); n];
    table.set_column("employer_name", filler.clone()).unwrap();
    table.set_column("case_number", filler).unwrap();
    let train_path = layout.root().join("bad_train.csv");
    write(&table, &train_path);
    let ingestion = IngestionArtifact {
        feature_store_path: layout.feature_store_file(),
        train_file_path: train_path,
        test_file_path: layout.test_file(),
    };

    let artifact = DataValidation::new(&config, &layout, &StatisticalDriftDetector)
        .initiate(&ingestion)
        .unwrap();

    assert!(!artifact.validation_status);
    assert_eq!(
        artifact.message,
        "Columns missing in Training Set: continent, unit_of_wage"
    );
    assert_eq!(artifact.drift_report_path, None);
}

#[test]
fn test_failed_validation_stops_transformation() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let (layout, ingestion) = ingested(&config, &synthetic_documents(50, 1));
    let validation = ValidationArtifact {
        validation_status: false,
        message: "Columns missing in Training Set: continent".to_string(),
        drift_report_path: None,
    };

    let err = DataTransformation::new(&config, &layout)
        .initiate(&ingestion, &validation)
        .unwrap_err();

    match err {
        PipelineError::Schema { stage, message } => {
            assert_eq!(stage, Stage::Transformation);
            assert_eq!(message, validation.message);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!layout.transformed_train_file().exists());
    assert!(!layout.transformed_test_file().exists());
    assert!(!layout.preprocessor_file().exists());
}

#[test]
fn test_undeclared_field_aborts_the_run_before_transformation() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let documents: Vec<Document> = synthetic_documents(100, 9)
        .into_iter()
        .map(|mut document| {
            document.insert("employer_name".to_string(), "Acme".into());
            document
        })
        .collect();
    let objects = Arc::new(SpyObjectStore::new());
    let (pipeline, _) = recording_pipeline(config, document_store(documents), objects.clone());

    let failure = pipeline.run().unwrap_err();

    assert_eq!(failure.state.failed_stage, Some(Stage::Transformation));
    assert_eq!(failure.state.phase, PipelinePhase::Validated);
    match &failure.error {
        PipelineError::Schema { message, .. } => {
            assert!(message.contains("Column count mismatch in Training Set: expected 9, found 10"));
        }
        other => panic!("unexpected error: {}", other),
    }
    let run_dir = failure.run_dir.unwrap();
    assert!(!run_dir.join("data_transformation").exists());
    assert_eq!(objects.upload_count(), 0);
}

#[test]
fn test_documents_without_declared_fields_keep_the_column() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let documents = without_fields(synthetic_documents(5, 2), &["continent"]);

    let table = documents_to_table(&documents, &config.schema).unwrap();

    assert!(table.has_column("continent"));
    assert!(table.column("continent").unwrap().all(|cell| cell.is_missing()));
}
