//! The six pipeline stages
//!
//! Each stage is a small struct borrowing the shared configuration and its
//! collaborators, with an `initiate` method that consumes upstream artifacts
//! and returns its own.

pub mod drift;
pub mod evaluation;
pub mod ingestion;
pub mod pusher;
pub mod trainer;
pub mod transformation;
pub mod validation;

pub use drift::{DriftDetector, DriftReport, StatisticalDriftDetector};
pub use evaluation::{compare_scores, ModelEvaluation};
pub use ingestion::DataIngestion;
pub use pusher::ModelPusher;
pub use trainer::ModelTrainer;
pub use transformation::{prepare_features, DataTransformation};
pub use validation::DataValidation;

use crate::core::{PipelineError, Stage};
use crate::data::Table;
use crate::ml::MlError;
use std::path::Path;

/// Wrap an ML failure in the pipeline error of the stage it happened in
pub(crate) fn ml_error(stage: Stage, operation: &'static str, err: MlError) -> PipelineError {
    match err {
        MlError::NoCandidate {
            best_score,
            base_score,
        } => PipelineError::QualityThreshold {
            best_score,
            expected_score: base_score,
        },
        MlError::Json(_) | MlError::UnsupportedVersion { .. } => {
            PipelineError::serialization(stage, operation, err)
        }
        MlError::InvalidSpace(message) => PipelineError::Config(message),
        other => PipelineError::schema(stage, format!("{}: {}", operation, other)),
    }
}

pub(crate) fn read_table(stage: Stage, operation: &'static str, path: &Path) -> Result<Table, PipelineError> {
    Table::read_csv_file(path).map_err(|e| PipelineError::storage(stage, operation, e))
}

pub(crate) fn write_table(
    stage: Stage,
    operation: &'static str,
    table: &Table,
    path: &Path,
) -> Result<(), PipelineError> {
    let file = crate::core::create_new_file(path).map_err(|e| PipelineError::storage(stage, operation, e))?;
    table
        .write_csv(std::io::BufWriter::new(file))
        .map_err(|e| PipelineError::storage(stage, operation, e))
}
