//! Persistence layer for training run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

use crate::core::{PipelinePhase, RunState, RunStatus};
use crate::execution::{RunFailure, RunOutcome};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Summary of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    pub status: RunStatus,

    /// Last phase reached
    pub phase: PipelinePhase,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run completed or failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Run artifact directory, if one was created
    pub run_dir: Option<PathBuf>,

    /// Whether evaluation accepted the candidate
    pub accepted: Option<bool>,

    pub candidate_f1: Option<f64>,

    /// Candidate F1 minus production F1
    pub difference: Option<f64>,

    /// Error text of a failed run
    pub error: Option<String>,
}

impl RunSummary {
    fn from_state(pipeline_name: &str, state: &RunState, run_dir: Option<PathBuf>) -> Self {
        Self {
            run_id: state.run_id,
            pipeline_name: pipeline_name.to_string(),
            status: state.status,
            phase: state.phase,
            started_at: state.started_at.unwrap_or_else(Utc::now),
            completed_at: state.completed_at,
            run_dir,
            accepted: None,
            candidate_f1: None,
            difference: None,
            error: state.error.clone(),
        }
    }

    /// Summary of a run that reached a terminal phase
    pub fn from_outcome(pipeline_name: &str, outcome: &RunOutcome) -> Self {
        let evaluation = &outcome.evaluation;
        Self {
            accepted: Some(evaluation.is_model_accepted),
            candidate_f1: Some(evaluation.candidate_f1),
            difference: Some(evaluation.difference),
            ..Self::from_state(pipeline_name, &outcome.state, Some(outcome.run_dir.clone()))
        }
    }

    /// Summary of an aborted run
    pub fn from_failure(pipeline_name: &str, failure: &RunFailure) -> Self {
        Self::from_state(pipeline_name, &failure.state, failure.run_dir.clone())
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run summary, replacing any earlier record with the same ID
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List runs of a pipeline, most recent first
    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>>;

    /// List all pipeline names
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    runs: tokio::sync::RwLock<std::collections::HashMap<Uuid, RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .values()
            .filter(|r| r.pipeline_name == pipeline_name)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.values().map(|r| r.pipeline_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
