//! Pipeline orchestration

pub mod engine;

pub use engine::{EventHandler, PipelineEvent, RunFailure, RunOutcome, TrainingPipeline};
