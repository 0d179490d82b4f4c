//! Run state models

use crate::core::error::{PipelineError, PipelineResult, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is currently executing a stage
    Running,
    /// Run reached a terminal phase (pushed or skipped)
    Completed,
    /// A stage failed and the run was aborted
    Failed,
}

/// Position of a run in the stage sequence
///
/// Transitions are strictly sequential. The only branch is
/// `Evaluated -> Pushed` versus `Evaluated -> Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Init,
    Ingested,
    Validated,
    Transformed,
    Trained,
    Evaluated,
    Pushed,
    Skipped,
}

impl PipelinePhase {
    /// Check if the run can go no further
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Pushed | PipelinePhase::Skipped)
    }

    /// Check whether `next` is a legal successor of this phase
    pub fn can_advance_to(&self, next: PipelinePhase) -> bool {
        use PipelinePhase::*;
        matches!(
            (self, next),
            (Init, Ingested)
                | (Ingested, Validated)
                | (Validated, Transformed)
                | (Transformed, Trained)
                | (Trained, Evaluated)
                | (Evaluated, Pushed)
                | (Evaluated, Skipped)
        )
    }

    /// Number of stages completed when the run sits in this phase
    pub fn completed_stages(&self) -> usize {
        match self {
            PipelinePhase::Init => 0,
            PipelinePhase::Ingested => 1,
            PipelinePhase::Validated => 2,
            PipelinePhase::Transformed => 3,
            PipelinePhase::Trained => 4,
            PipelinePhase::Evaluated => 5,
            PipelinePhase::Pushed | PipelinePhase::Skipped => 6,
        }
    }
}

/// State of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current status
    pub status: RunStatus,

    /// Last phase reached
    pub phase: PipelinePhase,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run completed or failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Stage that aborted the run
    pub failed_stage: Option<Stage>,

    /// Error text of the aborting failure
    pub error: Option<String>,
}

impl RunState {
    /// Create a new run state
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Pending,
            phase: PipelinePhase::Init,
            started_at: None,
            completed_at: None,
            failed_stage: None,
            error: None,
        }
    }

    /// Mark run as started
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Move to the next phase, rejecting out-of-order transitions
    pub fn advance(&mut self, next: PipelinePhase) -> PipelineResult<()> {
        if self.status != RunStatus::Running {
            return Err(PipelineError::InvalidState(format!(
                "cannot advance to {:?} while run is {:?}",
                next, self.status
            )));
        }
        if !self.phase.can_advance_to(next) {
            return Err(PipelineError::InvalidState(format!(
                "illegal transition {:?} -> {:?}",
                self.phase, next
            )));
        }
        self.phase = next;
        if next.is_terminal() {
            self.status = RunStatus::Completed;
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Mark run as failed
    pub fn fail(&mut self, stage: Option<Stage>, error: &PipelineError) {
        self.status = RunStatus::Failed;
        self.failed_stage = stage.or_else(|| error.stage());
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
    }

    /// Calculate progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        self.phase.completed_stages() as f64 / Stage::ALL.len() as f64
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
