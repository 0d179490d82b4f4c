use crate::helpers::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use visa_pipeline::core::{ClassificationMetric, IngestionArtifact, TrainerArtifact};
use visa_pipeline::stages::ingestion::documents_to_table;
use visa_pipeline::stages::ModelEvaluation;
use visa_pipeline::store::Document;

fn ingestion_with_test_set(dir: &Path, documents: &[Document]) -> IngestionArtifact {
    let config = test_config(dir, 0.5);
    let table = documents_to_table(documents, &config.schema).unwrap();
    let test_file_path = dir.join("test.csv");
    table.write_csv(File::create(&test_file_path).unwrap()).unwrap();
    IngestionArtifact {
        feature_store_path: PathBuf::new(),
        train_file_path: PathBuf::new(),
        test_file_path,
    }
}

fn candidate(f1: f64) -> TrainerArtifact {
    TrainerArtifact {
        trained_model_path: PathBuf::from("model.json"),
        metric: ClassificationMetric {
            precision: f1,
            recall: f1,
            f1,
        },
        best_score: f1,
        model_name: "KNeighborsClassifier".to_string(),
    }
}

#[test]
fn test_without_production_model_the_candidate_is_accepted() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 0.5);
    let documents = synthetic_documents(40, 8);
    let ingestion = ingestion_with_test_set(dir.path(), &documents);
    let objects = SpyObjectStore::new();

    let artifact = ModelEvaluation::new(&config, &objects)
        .initiate(&ingestion, &candidate(0.42))
        .unwrap();

    assert!(artifact.is_model_accepted);
    assert_eq!(artifact.production_f1, None);
    assert_eq!(artifact.difference, 0.42);
    assert_eq!(artifact.production_model_key, MODEL_KEY);
}

#[test]
fn test_production_model_is_scored_on_the_test_set() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 0.5);
    let documents = synthetic_documents(40, 8);
    let ingestion = ingestion_with_test_set(dir.path(), &documents);

    let strong = SpyObjectStore::new();
    strong.seed_production(&memorizing_bundle(&config, &documents));
    let rejected = ModelEvaluation::new(&config, &strong)
        .initiate(&ingestion, &candidate(0.75))
        .unwrap();
    assert!(!rejected.is_model_accepted);
    assert_eq!(rejected.production_f1, Some(1.0));
    assert!((rejected.difference + 0.25).abs() < 1e-9);

    let weak = SpyObjectStore::new();
    weak.seed_production(&certified_only_bundle(&config, &documents));
    let accepted = ModelEvaluation::new(&config, &weak)
        .initiate(&ingestion, &candidate(0.75))
        .unwrap();
    assert!(accepted.is_model_accepted);
    assert_eq!(accepted.production_f1, Some(0.0));
    assert!((accepted.difference - 0.75).abs() < 1e-9);
}

#[test]
fn test_equal_scores_keep_production() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 0.5);
    let documents = synthetic_documents(40, 8);
    let ingestion = ingestion_with_test_set(dir.path(), &documents);

    let objects = SpyObjectStore::new();
    objects.seed_production(&memorizing_bundle(&config, &documents));
    let artifact = ModelEvaluation::new(&config, &objects)
        .initiate(&ingestion, &candidate(1.0))
        .unwrap();

    assert!(!artifact.is_model_accepted);
    assert_eq!(artifact.difference, 0.0);
}
