//! Model pusher: promotes an accepted bundle to the registry

use crate::core::{
    EvaluationArtifact, PipelineError, PipelineResult, PusherArtifact, Stage, StoreError,
    TrainingConfig,
};
use crate::store::ObjectStore;
use tracing::info;

pub struct ModelPusher<'a> {
    config: &'a TrainingConfig,
    store: &'a dyn ObjectStore,
}

impl<'a> ModelPusher<'a> {
    pub fn new(config: &'a TrainingConfig, store: &'a dyn ObjectStore) -> Self {
        Self { config, store }
    }

    /// Upload the candidate to the canonical key (last writer wins)
    pub fn initiate(&self, evaluation: &EvaluationArtifact) -> PipelineResult<PusherArtifact> {
        if !evaluation.is_model_accepted {
            return Err(PipelineError::InvalidState(
                "refusing to push a rejected model".to_string(),
            ));
        }
        let registry = &self.config.registry;
        let connectivity = |operation: &'static str| {
            move |e: StoreError| PipelineError::connectivity(Stage::Pusher, operation, e)
        };

        if !self
            .store
            .bucket_exists(&registry.bucket)
            .map_err(connectivity("check bucket"))?
        {
            self.store
                .create_bucket(&registry.bucket)
                .map_err(connectivity("create bucket"))?;
        }
        self.store
            .upload(
                &evaluation.trained_model_path,
                &registry.bucket,
                &registry.model_key,
                false,
            )
            .map_err(connectivity("upload model"))?;
        info!(
            "Pushed {} to {}/{}",
            evaluation.trained_model_path.display(),
            registry.bucket,
            registry.model_key
        );

        Ok(PusherArtifact {
            bucket_name: registry.bucket.clone(),
            model_key: registry.model_key.clone(),
        })
    }
}
