//! Data transformation: feature engineering, preprocessing and rebalancing

use super::{ml_error, read_table};
use crate::core::{
    IngestionArtifact, PipelineError, PipelineResult, RunLayout, SchemaConfig, Stage,
    TrainingConfig, TransformationArtifact, ValidationArtifact,
};
use crate::data::{Cell, Matrix, Table, TARGET_MAPPING};
use crate::ml::preprocess::{FeatureGroups, Preprocessor};
use crate::ml::resample::SmoteEnn;
use tracing::{debug, info};

/// Split off the target and engineer the model inputs of a raw partition
///
/// Derives the age feature from the reference year, drops the excluded
/// columns and encodes the target through the fixed label mapping.
pub fn prepare_features(
    table: &Table,
    schema: &SchemaConfig,
    reference_year: i32,
) -> PipelineResult<(Table, Vec<f64>)> {
    let (mut features, target) = table.split_column(&schema.target_column).ok_or_else(|| {
        PipelineError::schema(
            Stage::Transformation,
            format!("target column '{}' not found", schema.target_column),
        )
    })?;

    let age = &schema.age_feature;
    let source: Vec<Cell> = features
        .column(&age.source_column)
        .ok_or_else(|| {
            PipelineError::schema(
                Stage::Transformation,
                format!("column '{}' not found", age.source_column),
            )
        })?
        .cloned()
        .collect();
    let ages = source
        .iter()
        .map(|cell| match cell {
            Cell::Missing => Ok(Cell::Missing),
            other => other
                .as_f64()
                .map(|year| Cell::Number(reference_year as f64 - year))
                .ok_or_else(|| {
                    PipelineError::schema(
                        Stage::Transformation,
                        format!("'{}' is not a year in column '{}'", other, age.source_column),
                    )
                }),
        })
        .collect::<PipelineResult<Vec<_>>>()?;
    features
        .set_column(&age.name, ages)
        .map_err(|e| PipelineError::schema(Stage::Transformation, e.to_string()))?;

    let features = features.drop_columns(&schema.drop_columns);

    let labels = target
        .iter()
        .map(|cell| {
            cell.category()
                .and_then(|label| TARGET_MAPPING.encode(&label))
                .ok_or_else(|| {
                    PipelineError::schema(
                        Stage::Transformation,
                        format!("unknown target label '{}'", cell),
                    )
                })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    Ok((features, labels))
}

pub struct DataTransformation<'a> {
    config: &'a TrainingConfig,
    layout: &'a RunLayout,
}

impl<'a> DataTransformation<'a> {
    pub fn new(config: &'a TrainingConfig, layout: &'a RunLayout) -> Self {
        Self { config, layout }
    }

    /// Column groups of the composite transform, before fitting
    pub fn build_transformer(&self) -> FeatureGroups {
        self.config.schema.feature_groups()
    }

    fn resampler(&self) -> SmoteEnn {
        let settings = &self.config.transformation;
        SmoteEnn::new(settings.smote_neighbors, settings.enn_neighbors, settings.seed)
    }

    fn save_array(&self, matrix: &Matrix, path: &std::path::Path, operation: &'static str) -> PipelineResult<()> {
        matrix
            .save(path)
            .map_err(|e| PipelineError::storage(Stage::Transformation, operation, e))
    }

    /// Fit on train, apply to both partitions, rebalance and persist
    ///
    /// Fails before touching any file when validation did not pass.
    pub fn initiate(
        &self,
        ingestion: &IngestionArtifact,
        validation: &ValidationArtifact,
    ) -> PipelineResult<TransformationArtifact> {
        let passed = validation.ensure_passed()?;
        info!("Starting data transformation");

        let schema = &self.config.schema;
        let year = self.config.reference_year;
        let train = read_table(Stage::Transformation, "read train set", &ingestion.train_file_path)?;
        let test = read_table(Stage::Transformation, "read test set", &ingestion.test_file_path)?;
        let (train_features, train_labels) = prepare_features(&train, schema, year)?;
        let (test_features, test_labels) = prepare_features(&test, schema, year)?;
        debug!("Model inputs: {}", train_features.columns().join(", "));

        let preprocessor = Preprocessor::fit(&train_features, &self.build_transformer())
            .map_err(|e| ml_error(Stage::Transformation, "fit preprocessor", e))?;
        let train_x = preprocessor
            .transform(&train_features)
            .map_err(|e| ml_error(Stage::Transformation, "transform train set", e))?;
        let test_x = preprocessor
            .transform(&test_features)
            .map_err(|e| ml_error(Stage::Transformation, "transform test set", e))?;
        info!(
            "Preprocessor fitted on {} training rows, {} output features",
            train_x.rows(),
            preprocessor.n_features_out()
        );

        let resampler = self.resampler();
        let (train_x, train_y) = resampler
            .fit_resample(&train_x, &train_labels)
            .map_err(|e| ml_error(Stage::Transformation, "rebalance train set", e))?;
        info!("Rebalanced training set to {} rows", train_x.rows());
        let (test_x, test_y) = if self.config.transformation.rebalance_test {
            let (x, y) = resampler
                .fit_resample(&test_x, &test_labels)
                .map_err(|e| ml_error(Stage::Transformation, "rebalance test set", e))?;
            info!("Rebalanced test set to {} rows", x.rows());
            (x, y)
        } else {
            (test_x, test_labels)
        };

        let train_arr = train_x
            .with_column(&train_y)
            .map_err(|e| PipelineError::storage(Stage::Transformation, "combine train array", e))?;
        let test_arr = test_x
            .with_column(&test_y)
            .map_err(|e| PipelineError::storage(Stage::Transformation, "combine test array", e))?;

        let preprocessor_bytes = preprocessor
            .to_bytes()
            .map_err(|e| ml_error(Stage::Transformation, "encode preprocessor", e))?;
        crate::core::write_new(&self.layout.preprocessor_file(), &preprocessor_bytes)
            .map_err(|e| PipelineError::storage(Stage::Transformation, "write preprocessor", e))?;
        self.save_array(&train_arr, &self.layout.transformed_train_file(), "write train array")?;
        self.save_array(&test_arr, &self.layout.transformed_test_file(), "write test array")?;

        info!("Data transformation finished");
        Ok(TransformationArtifact::new(
            &passed,
            self.layout.transformed_train_file(),
            self.layout.transformed_test_file(),
            self.layout.preprocessor_file(),
        ))
    }
}
