use crate::helpers::*;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use visa_pipeline::data::{Matrix, Table};
use visa_pipeline::ml::bundle::ModelBundle;
use visa_pipeline::ml::preprocess::Preprocessor;
use visa_pipeline::stages::ingestion::documents_to_table;
use visa_pipeline::stages::prepare_features;

#[test]
fn test_transform_depends_only_on_fitted_data() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 0.5);
    let groups = config.schema.feature_groups();
    let table = documents_to_table(&synthetic_documents(200, 21), &config.schema).unwrap();
    let (features, _) = prepare_features(&table, &config.schema, REFERENCE_YEAR).unwrap();

    let fit_rows: Vec<usize> = (0..150).collect();
    let held_out: Vec<usize> = (150..200).collect();
    let fit_part = features.select_rows(&fit_rows);
    let held_part = features.select_rows(&held_out);

    let on_fit = Preprocessor::fit(&fit_part, &groups).unwrap();
    let on_all = Preprocessor::fit(&features, &groups).unwrap();
    assert_ne!(on_fit, on_all);

    // Row order of the transformed set has no influence on the fitted statistics
    let reversed: Vec<usize> = held_out.iter().rev().map(|i| i - 150).collect();
    let forward = on_fit.transform(&held_part).unwrap();
    let backward = on_fit.transform(&held_part.select_rows(&reversed)).unwrap();
    let n = forward.rows();
    for i in 0..n {
        assert_eq!(forward.row(i), backward.row(n - 1 - i));
    }
}

#[test]
fn test_pipeline_fits_the_preprocessor_on_train_only() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let (pipeline, _) = recording_pipeline(
        config.clone(),
        document_store(synthetic_documents(200, 42)),
        Arc::new(SpyObjectStore::new()),
    );
    let outcome = pipeline.run().unwrap();

    let train = Table::read_csv_file(&outcome.ingestion.train_file_path).unwrap();
    let (features, _) = prepare_features(&train, &config.schema, REFERENCE_YEAR).unwrap();
    let expected = Preprocessor::fit(&features, &config.schema.feature_groups()).unwrap();

    let saved = Preprocessor::from_bytes(
        &fs::read(outcome.transformation.preprocessor_path()).unwrap(),
    )
    .unwrap();
    assert_eq!(saved, expected);

    // The promoted bundle carries the same preprocessor and reproduces test predictions
    let bundle =
        ModelBundle::from_bytes(&fs::read(&outcome.trainer.trained_model_path).unwrap()).unwrap();
    assert_eq!(bundle.preprocessor(), &expected);

    let test = Table::read_csv_file(&outcome.ingestion.test_file_path).unwrap();
    let (test_features, _) = prepare_features(&test, &config.schema, REFERENCE_YEAR).unwrap();
    let predictions = bundle.predict(&test_features).unwrap();
    assert_eq!(predictions.len(), test.n_rows());
    assert!(predictions.iter().all(|&p| p == 0.0 || p == 1.0));

    let test_array = Matrix::load(outcome.transformation.transformed_test_path()).unwrap();
    assert_eq!(
        test_array.cols(),
        expected.n_features_out() + 1,
        "transformed test set has one column per feature plus the target"
    );
}

#[test]
fn test_test_partition_keeps_its_rows_without_rebalancing() {
    let root = TempDir::new().unwrap();
    let mut config = test_config(root.path(), 0.5);
    config.transformation.rebalance_test = false;
    let (pipeline, _) = recording_pipeline(
        config.clone(),
        document_store(synthetic_documents(200, 42)),
        Arc::new(SpyObjectStore::new()),
    );
    let outcome = pipeline.run().unwrap();

    let raw_test = Table::read_csv_file(&outcome.ingestion.test_file_path).unwrap();
    let test_array = Matrix::load(outcome.transformation.transformed_test_path()).unwrap();
    assert_eq!(raw_test.n_rows(), 40);
    assert_eq!(test_array.rows(), raw_test.n_rows());

    // Labels stay in the raw order of the test split
    let (_, expected) = prepare_features(&raw_test, &config.schema, REFERENCE_YEAR).unwrap();
    let (_, labels) = test_array.split_last_column().unwrap();
    assert_eq!(labels, expected);
}
