//! visa-pipeline - batch training pipeline for visa-application classification
//!
//! Ingests applications from a document store, validates and transforms them,
//! selects a classifier, and promotes it to an object store only when it beats
//! the model currently in production.

pub mod cli;
pub mod core;
pub mod data;
pub mod execution;
pub mod ml;
pub mod persistence;
pub mod serving;
pub mod stages;
pub mod store;

// Re-export commonly used types
pub use core::{PipelineError, PipelinePhase, PipelineResult, RunState, Stage, TrainingConfig};
pub use execution::{PipelineEvent, RunFailure, RunOutcome, TrainingPipeline};
pub use ml::bundle::ModelBundle;
pub use store::{DocumentStore, ObjectStore};
