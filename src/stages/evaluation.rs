//! Model evaluation against the production model

use super::{ml_error, read_table};
use crate::core::{
    EvaluationArtifact, IngestionArtifact, PipelineError, PipelineResult, Stage, StoreError,
    TrainerArtifact, TrainingConfig,
};
use crate::ml::bundle::ModelBundle;
use crate::ml::metrics::f1;
use crate::stages::prepare_features;
use crate::store::ObjectStore;
use tracing::info;

/// Acceptance rule: the candidate must strictly beat production (0 when absent)
///
/// Returns `(accepted, candidate - production)`.
pub fn compare_scores(candidate_f1: f64, production_f1: Option<f64>) -> (bool, f64) {
    let baseline = production_f1.unwrap_or(0.0);
    (candidate_f1 > baseline, candidate_f1 - baseline)
}

pub struct ModelEvaluation<'a> {
    config: &'a TrainingConfig,
    store: &'a dyn ObjectStore,
}

impl<'a> ModelEvaluation<'a> {
    pub fn new(config: &'a TrainingConfig, store: &'a dyn ObjectStore) -> Self {
        Self { config, store }
    }

    /// The promoted bundle, or `None` when nothing has been promoted yet
    pub fn fetch_production_model(&self) -> PipelineResult<Option<ModelBundle>> {
        let registry = &self.config.registry;
        let connectivity =
            |e: StoreError| PipelineError::connectivity(Stage::Evaluation, "fetch production model", e);

        if !self.store.bucket_exists(&registry.bucket).map_err(connectivity)? {
            info!("Bucket {} does not exist yet, no production model", registry.bucket);
            return Ok(None);
        }
        if !self
            .store
            .key_exists(&registry.bucket, &registry.model_key)
            .map_err(connectivity)?
        {
            info!("No production model at {}/{}", registry.bucket, registry.model_key);
            return Ok(None);
        }
        let bytes = self
            .store
            .download(&registry.bucket, &registry.model_key)
            .map_err(connectivity)?;
        let bundle = ModelBundle::from_bytes(&bytes)
            .map_err(|e| ml_error(Stage::Evaluation, "decode production model", e))?;
        Ok(Some(bundle))
    }

    /// Score the production model on the raw test partition and compare
    pub fn evaluate(
        &self,
        ingestion: &IngestionArtifact,
        trainer: &TrainerArtifact,
    ) -> PipelineResult<EvaluationArtifact> {
        info!("Starting model evaluation");
        let candidate_f1 = trainer.metric.f1;

        let production_f1 = match self.fetch_production_model()? {
            Some(bundle) => {
                let test = read_table(Stage::Evaluation, "read test set", &ingestion.test_file_path)?;
                let (features, labels) =
                    prepare_features(&test, &self.config.schema, self.config.reference_year)?;
                let predictions = bundle
                    .predict(&features)
                    .map_err(|e| ml_error(Stage::Evaluation, "score production model", e))?;
                Some(f1(&labels, &predictions))
            }
            None => None,
        };

        let (is_model_accepted, difference) = compare_scores(candidate_f1, production_f1);
        info!(
            "Candidate f1 {:.4} vs production {} -> {}",
            candidate_f1,
            production_f1.map_or("none".to_string(), |s| format!("{:.4}", s)),
            if is_model_accepted { "accepted" } else { "rejected" }
        );

        Ok(EvaluationArtifact {
            is_model_accepted,
            difference,
            trained_model_path: trainer.trained_model_path.clone(),
            production_model_key: self.config.registry.model_key.clone(),
            candidate_f1,
            production_f1,
        })
    }

    pub fn initiate(
        &self,
        ingestion: &IngestionArtifact,
        trainer: &TrainerArtifact,
    ) -> PipelineResult<EvaluationArtifact> {
        self.evaluate(ingestion, trainer)
    }
}
