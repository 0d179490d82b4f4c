//! Model trainer: model selection and bundling

use super::ml_error;
use crate::core::{
    ClassificationMetric, PipelineError, PipelineResult, RunLayout, Stage, TrainerArtifact,
    TrainingConfig, TransformationArtifact,
};
use crate::data::Matrix;
use crate::ml::bundle::ModelBundle;
use crate::ml::metrics::classification_metric;
use crate::ml::models::Classifier;
use crate::ml::preprocess::Preprocessor;
use crate::ml::selection::{grid_search, SearchResult};
use tracing::info;

pub struct ModelTrainer<'a> {
    config: &'a TrainingConfig,
    layout: &'a RunLayout,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(config: &'a TrainingConfig, layout: &'a RunLayout) -> Self {
        Self { config, layout }
    }

    /// Search the model space on `train` and score the winner on `test`
    ///
    /// Both arrays carry the label in their last column.
    pub fn select_best_model(
        &self,
        train: &Matrix,
        test: &Matrix,
    ) -> PipelineResult<(SearchResult, ClassificationMetric)> {
        let split = |m: &Matrix, what: &'static str| {
            m.split_last_column()
                .map_err(|e| PipelineError::storage(Stage::Training, what, e))
        };
        let (x_train, y_train) = split(train, "split train array")?;
        let (x_test, y_test) = split(test, "split test array")?;

        let result = grid_search(&self.config.trainer.model_space, &x_train, &y_train)
            .map_err(|e| ml_error(Stage::Training, "model selection", e))?;
        let predictions = result
            .estimator
            .predict(&x_test)
            .map_err(|e| ml_error(Stage::Training, "predict test set", e))?;
        let metric = classification_metric(&y_test, &predictions);
        info!(
            "Held-out scores of {}: precision {:.4}, recall {:.4}, f1 {:.4}",
            result.params, metric.precision, metric.recall, metric.f1
        );
        Ok((result, metric))
    }

    pub fn initiate(&self, transformation: &TransformationArtifact) -> PipelineResult<TrainerArtifact> {
        info!("Starting model training");
        let load = |path: &std::path::Path, what: &'static str| {
            Matrix::load(path).map_err(|e| PipelineError::storage(Stage::Training, what, e))
        };
        let train = load(transformation.transformed_train_path(), "load train array")?;
        let test = load(transformation.transformed_test_path(), "load test array")?;

        let (result, metric) = self.select_best_model(&train, &test)?;
        let expected_score = self.config.trainer.expected_score;
        if result.best_score < expected_score {
            return Err(PipelineError::QualityThreshold {
                best_score: result.best_score,
                expected_score,
            });
        }

        let bytes = std::fs::read(transformation.preprocessor_path())
            .map_err(|e| PipelineError::storage(Stage::Training, "load preprocessor", e))?;
        let preprocessor = Preprocessor::from_bytes(&bytes)
            .map_err(|e| ml_error(Stage::Training, "decode preprocessor", e))?;

        let model_name = result.estimator.name().to_string();
        let bundle = ModelBundle::new(preprocessor, result.estimator);
        let bundle_bytes = bundle
            .to_bytes()
            .map_err(|e| ml_error(Stage::Training, "encode model bundle", e))?;
        let path = self.layout.trained_model_file();
        crate::core::write_new(&path, &bundle_bytes)
            .map_err(|e| PipelineError::storage(Stage::Training, "write model bundle", e))?;
        info!("Saved model bundle to {}", path.display());

        Ok(TrainerArtifact {
            trained_model_path: path,
            metric,
            best_score: result.best_score,
            model_name,
        })
    }
}
