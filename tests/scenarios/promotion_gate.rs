use crate::helpers::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use visa_pipeline::core::{PipelinePhase, RunStatus, Stage};
use visa_pipeline::execution::PipelineEvent;

#[test]
fn test_candidate_not_better_than_production_is_not_pushed() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let documents = synthetic_documents(200, 42);

    let objects = Arc::new(SpyObjectStore::new());
    objects.seed_production(&memorizing_bundle(&config, &documents));
    let before = objects.production_bytes();

    let (pipeline, events) =
        recording_pipeline(config, document_store(documents), objects.clone());
    let outcome = pipeline.run().unwrap();

    assert!(!outcome.evaluation.is_model_accepted);
    assert_eq!(outcome.evaluation.production_f1, Some(1.0));
    assert!(outcome.evaluation.difference <= 0.0);
    assert!(outcome.pusher.is_none());
    assert_eq!(outcome.state.status, RunStatus::Completed);
    assert_eq!(outcome.state.phase, PipelinePhase::Skipped);

    assert_eq!(objects.upload_count(), 0);
    assert_eq!(objects.production_bytes(), before);

    let events = events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::PromotionSkipped { .. })));
    assert!(!events.iter().any(|e| matches!(
        e,
        PipelineEvent::StageStarted {
            stage: Stage::Pusher
        }
    )));
}

#[test]
fn test_better_candidate_replaces_production() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 0.5);
    let documents = synthetic_documents(200, 42);

    let objects = Arc::new(SpyObjectStore::new());
    objects.seed_production(&certified_only_bundle(&config, &documents));

    let (pipeline, _) = recording_pipeline(config, document_store(documents), objects.clone());
    let outcome = pipeline.run().unwrap();

    let evaluation = &outcome.evaluation;
    assert_eq!(evaluation.production_f1, Some(0.0));
    assert!(evaluation.candidate_f1 > 0.0);
    assert!(evaluation.is_model_accepted);
    assert_eq!(evaluation.difference, evaluation.candidate_f1);
    assert_eq!(outcome.state.phase, PipelinePhase::Pushed);

    assert_eq!(objects.upload_count(), 1);
    // The bucket already held the production model
    assert_eq!(objects.buckets_created(), 0);
    assert_eq!(
        objects.production_bytes(),
        Some(fs::read(&outcome.trainer.trained_model_path).unwrap())
    );
}
