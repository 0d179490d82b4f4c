//! Error types shared by the pipeline stages and their collaborators

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The stage a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingestion,
    Validation,
    Transformation,
    Training,
    Evaluation,
    Pusher,
}

impl Stage {
    /// Stages in execution order
    pub const ALL: [Stage; 6] = [
        Stage::Ingestion,
        Stage::Validation,
        Stage::Transformation,
        Stage::Training,
        Stage::Evaluation,
        Stage::Pusher,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingestion => "data_ingestion",
            Stage::Validation => "data_validation",
            Stage::Transformation => "data_transformation",
            Stage::Training => "model_trainer",
            Stage::Evaluation => "model_evaluation",
            Stage::Pusher => "model_pusher",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by external collaborators (document store, object store)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("{container}/{name} not found")]
    NotFound { container: String, name: String },

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Uniform error envelope returned by every stage
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An external store could not be reached or answered with an error
    #[error("[{stage}] {operation} failed: {source}")]
    Connectivity {
        stage: Stage,
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// Local artifact I/O failed
    #[error("[{stage}] {operation} failed: {source}")]
    Storage {
        stage: Stage,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Data does not match the declared schema
    #[error("[{stage}] schema error: {message}")]
    Schema { stage: Stage, message: String },

    /// No model candidate cleared the configured floor
    #[error("[model_trainer] no model reached the expected score: best {best_score:.4} < expected {expected_score:.4}")]
    QualityThreshold { best_score: f64, expected_score: f64 },

    /// An artifact could not be encoded or decoded
    #[error("[{stage}] {operation} failed: {message}")]
    Serialization {
        stage: Stage,
        operation: &'static str,
        message: String,
    },

    /// The orchestrator was asked to do something its state forbids
    #[error("invalid pipeline state: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn connectivity(stage: Stage, operation: &'static str, source: StoreError) -> Self {
        PipelineError::Connectivity {
            stage,
            operation,
            source,
        }
    }

    pub fn storage(stage: Stage, operation: &'static str, source: std::io::Error) -> Self {
        PipelineError::Storage {
            stage,
            operation,
            source,
        }
    }

    pub fn schema(stage: Stage, message: impl Into<String>) -> Self {
        PipelineError::Schema {
            stage,
            message: message.into(),
        }
    }

    pub fn serialization(stage: Stage, operation: &'static str, message: impl fmt::Display) -> Self {
        PipelineError::Serialization {
            stage,
            operation,
            message: message.to_string(),
        }
    }

    /// Stage the error originated from, when known
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Connectivity { stage, .. }
            | PipelineError::Storage { stage, .. }
            | PipelineError::Schema { stage, .. }
            | PipelineError::Serialization { stage, .. } => Some(*stage),
            PipelineError::QualityThreshold { .. } => Some(Stage::Training),
            PipelineError::InvalidState(_) | PipelineError::Config(_) => None,
        }
    }
}

/// Result alias used across the stages
pub type PipelineResult<T> = Result<T, PipelineError>;
