//! Preprocessing, resampling, estimators and model selection

pub mod bundle;
pub mod metrics;
pub mod models;
pub mod neighbors;
pub mod preprocess;
pub mod resample;
pub mod selection;

use thiserror::Error;

/// Errors raised while fitting, applying or decoding models
#[derive(Debug, Error)]
pub enum MlError {
    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("column '{column}' holds non-numeric value '{value}'")]
    NonNumeric { column: String, value: String },

    #[error("cannot fit on empty input")]
    EmptyInput,

    #[error("invalid label {0}, expected 0 or 1")]
    InvalidLabel(f64),

    #[error("expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("no candidate reached the base score {base_score:.4} (best {best_score:.4})")]
    NoCandidate { best_score: f64, base_score: f64 },

    #[error("invalid model space: {0}")]
    InvalidSpace(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported {kind} format version {found} (expected {expected})")]
    UnsupportedVersion {
        kind: String,
        found: u32,
        expected: u32,
    },
}

pub type MlResult<T> = Result<T, MlError>;

/// Convert a 0/1 label vector to booleans, rejecting anything else
pub(crate) fn binary_labels(y: &[f64]) -> MlResult<Vec<bool>> {
    y.iter()
        .map(|&v| {
            if v == 0.0 {
                Ok(false)
            } else if v == 1.0 {
                Ok(true)
            } else {
                Err(MlError::InvalidLabel(v))
            }
        })
        .collect()
}
