use crate::helpers::*;
use chrono::Utc;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;
use uuid::Uuid;
use visa_pipeline::core::RunLayout;
use visa_pipeline::stages::ingestion::split_indices;
use visa_pipeline::stages::DataIngestion;

#[test]
fn test_split_is_a_seeded_partition() {
    let (train, test) = split_indices(200, 0.2, 42);
    assert_eq!(train.len(), 160);
    assert_eq!(test.len(), 40);

    let all: BTreeSet<usize> = train.iter().chain(&test).copied().collect();
    assert_eq!(all.len(), 200);
    assert_eq!(split_indices(200, 0.2, 42), (train, test));
    assert_ne!(split_indices(200, 0.2, 43).1, split_indices(200, 0.2, 42).1);
}

#[test]
fn test_test_size_rounds_up() {
    let (train, test) = split_indices(11, 0.2, 7);
    assert_eq!(test.len(), 3);
    assert_eq!(train.len(), 8);
}

#[test]
fn test_same_snapshot_splits_identically_across_runs() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let store = document_store(synthetic_documents(150, 4));

    let ingest = || {
        let layout =
            RunLayout::create(&config.artifact_root, Uuid::new_v4(), Utc::now()).unwrap();
        let artifact = DataIngestion::new(&config, &layout, store.as_ref())
            .initiate()
            .unwrap();
        (
            fs::read(&artifact.train_file_path).unwrap(),
            fs::read(&artifact.test_file_path).unwrap(),
        )
    };

    let first = ingest();
    let second = ingest();
    assert_eq!(first, second);
}
