use crate::helpers::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use visa_pipeline::core::{PipelineError, PipelinePhase, RunStatus, Stage};
use visa_pipeline::data::{Matrix, Table};
use visa_pipeline::execution::PipelineEvent;
use visa_pipeline::persistence::{InMemoryPersistence, PersistenceBackend, RunSummary};
use visa_pipeline::store::InMemoryDocumentStore;

fn stage_events(events: &[PipelineEvent]) -> Vec<(Stage, bool)> {
    events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::StageCompleted { stage, .. } => Some((*stage, true)),
            PipelineEvent::StageFailed { stage, .. } => Some((*stage, false)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_first_model_is_promoted() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let objects = Arc::new(SpyObjectStore::new());
    let (pipeline, events) = recording_pipeline(
        config,
        document_store(synthetic_documents(200, 42)),
        objects.clone(),
    );

    let outcome = pipeline.run().unwrap();

    assert_eq!(outcome.state.status, RunStatus::Completed);
    assert_eq!(outcome.state.phase, PipelinePhase::Pushed);
    assert!(outcome.promoted());
    assert!(outcome.evaluation.is_model_accepted);
    assert_eq!(outcome.evaluation.production_f1, None);
    assert_eq!(outcome.evaluation.difference, outcome.evaluation.candidate_f1);

    let model_bytes = fs::read(&outcome.trainer.trained_model_path).unwrap();
    assert_eq!(objects.upload_count(), 1);
    assert_eq!(objects.buckets_created(), 1);
    assert_eq!(objects.production_bytes(), Some(model_bytes));

    let pusher = outcome.pusher.as_ref().unwrap();
    assert_eq!(pusher.bucket_name, BUCKET);
    assert_eq!(pusher.model_key, MODEL_KEY);

    let completed: Vec<Stage> = stage_events(&events.lock().unwrap())
        .into_iter()
        .map(|(stage, ok)| {
            assert!(ok, "{} failed", stage);
            stage
        })
        .collect();
    assert_eq!(completed, Stage::ALL.to_vec());
}

#[test]
fn test_run_directory_holds_every_artifact() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let (pipeline, _) = recording_pipeline(
        config,
        document_store(synthetic_documents(200, 42)),
        Arc::new(SpyObjectStore::new()),
    );

    let outcome = pipeline.run().unwrap();
    assert!(outcome.run_dir.starts_with(root.path()));

    let snapshot = Table::read_csv_file(&outcome.ingestion.feature_store_path).unwrap();
    assert_eq!(snapshot.n_rows(), 200);
    assert_eq!(snapshot.n_cols(), 9);
    assert!(!snapshot.has_column("_id"));

    let train = Table::read_csv_file(&outcome.ingestion.train_file_path).unwrap();
    let test = Table::read_csv_file(&outcome.ingestion.test_file_path).unwrap();
    assert_eq!(train.n_rows(), 160);
    assert_eq!(test.n_rows(), 40);

    assert!(outcome.validation.validation_status);
    assert!(outcome.validation.message.is_empty());
    let report = outcome.validation.drift_report_path.as_ref().unwrap();
    assert!(report.starts_with(&outcome.run_dir));
    assert!(fs::read_to_string(report).unwrap().contains("dataset_drift"));

    // Transformed arrays carry the encoded target as their last column
    let train_array = Matrix::load(outcome.transformation.transformed_train_path()).unwrap();
    let test_array = Matrix::load(outcome.transformation.transformed_test_path()).unwrap();
    assert_eq!(train_array.cols(), test_array.cols());
    let (_, labels) = test_array.split_last_column().unwrap();
    assert!(labels.iter().all(|&y| y == 0.0 || y == 1.0));
    assert!(outcome.transformation.preprocessor_path().exists());
    assert!(outcome.trainer.trained_model_path.exists());
}

#[test]
fn test_each_run_gets_its_own_directory() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let (pipeline, _) = recording_pipeline(
        config,
        document_store(synthetic_documents(120, 3)),
        Arc::new(SpyObjectStore::new()),
    );

    let first = pipeline.run().unwrap();
    let second = pipeline.run().unwrap();

    assert_ne!(first.state.run_id, second.state.run_id);
    assert_ne!(first.run_dir, second.run_dir);
    assert!(first.trainer.trained_model_path.exists());
    assert!(second.trainer.trained_model_path.exists());
}

#[test]
fn test_unreachable_collection_fails_ingestion() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let (pipeline, events) = recording_pipeline(
        config,
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(SpyObjectStore::new()),
    );

    let failure = pipeline.run().unwrap_err();

    assert!(matches!(
        failure.error,
        PipelineError::Connectivity {
            stage: Stage::Ingestion,
            ..
        }
    ));
    assert_eq!(failure.state.status, RunStatus::Failed);
    assert_eq!(failure.state.failed_stage, Some(Stage::Ingestion));
    assert_eq!(failure.state.phase, PipelinePhase::Init);
    // The run directory is kept for inspection
    assert!(failure.run_dir.as_ref().unwrap().is_dir());
    assert_eq!(
        stage_events(&events.lock().unwrap()),
        vec![(Stage::Ingestion, false)]
    );
}

#[test]
fn test_weak_models_fail_the_quality_floor() {
    let root = TempDir::new().unwrap();
    let mut config = test_config(root.path(), 0.95);
    // No cleaning: random labels stay unlearnable
    config.transformation.enn_neighbors = 0;
    let objects = Arc::new(SpyObjectStore::new());
    let (pipeline, _) = recording_pipeline(
        config,
        document_store(noise_documents(200, 11)),
        objects.clone(),
    );

    let failure = pipeline.run().unwrap_err();

    assert!(matches!(failure.error, PipelineError::QualityThreshold { .. }));
    assert_eq!(failure.state.failed_stage, Some(Stage::Training));
    assert_eq!(failure.state.phase, PipelinePhase::Transformed);
    let run_dir = failure.run_dir.unwrap();
    assert!(!run_dir.join("model_trainer").exists());
    assert_eq!(objects.upload_count(), 0);
}

#[tokio::test]
async fn test_runs_are_recorded_in_history() {
    let root = TempDir::new().unwrap();
    let history = InMemoryPersistence::new();

    let config = test_config(root.path(), 0.5);
    let (pipeline, _) = recording_pipeline(
        config.clone(),
        document_store(synthetic_documents(120, 5)),
        Arc::new(SpyObjectStore::new()),
    );
    let outcome = pipeline.run().unwrap();
    history
        .save_run(&RunSummary::from_outcome(&config.pipeline_name, &outcome))
        .await
        .unwrap();

    let (broken, _) = recording_pipeline(
        config.clone(),
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(SpyObjectStore::new()),
    );
    let failure = broken.run().unwrap_err();
    history
        .save_run(&RunSummary::from_failure(&config.pipeline_name, &failure))
        .await
        .unwrap();

    let runs = history.list_runs(&config.pipeline_name).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, failure.state.run_id);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].error.is_some());

    let saved = history.load_run(outcome.state.run_id).await.unwrap().unwrap();
    assert_eq!(saved.phase, PipelinePhase::Pushed);
    assert_eq!(saved.accepted, Some(true));
    assert_eq!(saved.candidate_f1, Some(outcome.evaluation.candidate_f1));
}

#[test]
fn test_shipped_configuration_loads() {
    let config = visa_pipeline::core::TrainingConfig::from_file("config/pipeline.yaml").unwrap();

    assert_eq!(config.schema.column_count(), 12);
    assert_eq!(config.schema.target_column, "case_status");
    assert!(!config.trainer.model_space.expand().is_empty());
    assert!((0.0..1.0).contains(&config.ingestion.split_ratio));
}
