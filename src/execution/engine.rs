//! Training pipeline orchestrator - runs the six stages in order

use crate::{
    core::{
        Artifact, EvaluationArtifact, IngestionArtifact, PipelineError, PipelinePhase,
        PipelineResult, PusherArtifact, RunLayout, RunState, RunStatus, Stage, TrainerArtifact,
        TrainingConfig, TransformationArtifact, ValidationArtifact,
    },
    stages::{
        DataIngestion, DataTransformation, DataValidation, DriftDetector, ModelEvaluation,
        ModelPusher, ModelTrainer, StatisticalDriftDetector,
    },
    store::{DocumentStore, ObjectStore},
};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events emitted while a run progresses
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        run_dir: PathBuf,
    },
    StageStarted {
        stage: Stage,
    },
    StageCompleted {
        stage: Stage,
        summary: String,
    },
    StageFailed {
        stage: Stage,
        error: String,
    },
    PromotionSkipped {
        difference: f64,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
        phase: PipelinePhase,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Every artifact of a run that reached a terminal phase
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: RunState,
    pub run_dir: PathBuf,
    pub ingestion: IngestionArtifact,
    pub validation: ValidationArtifact,
    pub transformation: TransformationArtifact,
    pub trainer: TrainerArtifact,
    pub evaluation: EvaluationArtifact,
    /// `None` when the candidate was rejected
    pub pusher: Option<PusherArtifact>,
}

impl RunOutcome {
    pub fn promoted(&self) -> bool {
        self.pusher.is_some()
    }
}

/// A run aborted by a stage failure
///
/// The run directory is left on disk for inspection.
#[derive(Debug, Error)]
#[error("run {} failed: {}", .state.run_id, .error)]
pub struct RunFailure {
    pub state: RunState,
    pub run_dir: Option<PathBuf>,
    #[source]
    pub error: PipelineError,
}

/// Sequential training pipeline
///
/// Owns the configuration and the two external stores. Each call to
/// [`TrainingPipeline::run`] gets a fresh run directory and run state.
pub struct TrainingPipeline {
    config: TrainingConfig,
    documents: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    drift: Arc<dyn DriftDetector>,
    event_handlers: Vec<EventHandler>,
}

impl TrainingPipeline {
    pub fn new(
        config: TrainingConfig,
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            documents,
            objects,
            drift: Arc::new(StatisticalDriftDetector),
            event_handlers: Vec::new(),
        }
    }

    /// Replace the default drift detector
    pub fn with_drift_detector(mut self, detector: Arc<dyn DriftDetector>) -> Self {
        self.drift = detector;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: PipelineEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Run one stage, then move the run state to `next`
    fn run_stage<T, F>(
        &self,
        state: &mut RunState,
        stage: Stage,
        next: PipelinePhase,
        body: F,
    ) -> PipelineResult<T>
    where
        T: Artifact,
        F: FnOnce() -> PipelineResult<T>,
    {
        self.emit_event(PipelineEvent::StageStarted { stage });
        match body().and_then(|artifact| state.advance(next).map(|_| artifact)) {
            Ok(artifact) => {
                self.emit_event(PipelineEvent::StageCompleted {
                    stage,
                    summary: artifact.summary(),
                });
                Ok(artifact)
            }
            Err(e) => {
                error!("Stage {} failed: {}", stage, e);
                self.emit_event(PipelineEvent::StageFailed {
                    stage,
                    error: e.to_string(),
                });
                state.fail(Some(stage), &e);
                Err(e)
            }
        }
    }

    /// Execute the whole pipeline
    ///
    /// Blocking: stages do synchronous I/O and CPU-bound model search.
    pub fn run(&self) -> Result<RunOutcome, RunFailure> {
        let mut state = RunState::new();
        state.start();
        let started_at = state.started_at.unwrap_or_else(chrono::Utc::now);

        let layout = match RunLayout::create(&self.config.artifact_root, state.run_id, started_at) {
            Ok(layout) => layout,
            Err(e) => {
                let error = PipelineError::storage(Stage::Ingestion, "create run directory", e);
                state.fail(Some(Stage::Ingestion), &error);
                self.finish(&state);
                return Err(RunFailure {
                    state,
                    run_dir: None,
                    error,
                });
            }
        };

        info!(
            "Starting pipeline {} ({}) in {}",
            self.config.pipeline_name,
            state.run_id,
            layout.root().display()
        );
        self.emit_event(PipelineEvent::RunStarted {
            run_id: state.run_id,
            pipeline_name: self.config.pipeline_name.clone(),
            run_dir: layout.root().to_path_buf(),
        });

        let result = self.run_stages(&mut state, &layout);
        self.finish(&state);
        match result {
            Ok(outcome) => Ok(outcome),
            Err(error) => Err(RunFailure {
                state,
                run_dir: Some(layout.root().to_path_buf()),
                error,
            }),
        }
    }

    fn finish(&self, state: &RunState) {
        info!(
            "Pipeline {} finished: {:?} at {:?}",
            state.run_id, state.status, state.phase
        );
        self.emit_event(PipelineEvent::RunFinished {
            run_id: state.run_id,
            status: state.status,
            phase: state.phase,
        });
    }

    fn run_stages(&self, state: &mut RunState, layout: &RunLayout) -> PipelineResult<RunOutcome> {
        let config = &self.config;

        let ingestion = self.run_stage(state, Stage::Ingestion, PipelinePhase::Ingested, || {
            DataIngestion::new(config, layout, self.documents.as_ref()).initiate()
        })?;

        let validation = self.run_stage(state, Stage::Validation, PipelinePhase::Validated, || {
            DataValidation::new(config, layout, self.drift.as_ref()).initiate(&ingestion)
        })?;
        if !validation.validation_status {
            warn!("Validation failed: {}", validation.message);
        }

        let transformation =
            self.run_stage(state, Stage::Transformation, PipelinePhase::Transformed, || {
                DataTransformation::new(config, layout).initiate(&ingestion, &validation)
            })?;

        let trainer = self.run_stage(state, Stage::Training, PipelinePhase::Trained, || {
            ModelTrainer::new(config, layout).initiate(&transformation)
        })?;

        let evaluation = self.run_stage(state, Stage::Evaluation, PipelinePhase::Evaluated, || {
            ModelEvaluation::new(config, self.objects.as_ref()).initiate(&ingestion, &trainer)
        })?;

        let pusher = if evaluation.is_model_accepted {
            Some(self.run_stage(state, Stage::Pusher, PipelinePhase::Pushed, || {
                ModelPusher::new(config, self.objects.as_ref()).initiate(&evaluation)
            })?)
        } else {
            info!(
                "Trained model is not better than the production model (delta {:+.4}), skipping promotion",
                evaluation.difference
            );
            self.emit_event(PipelineEvent::PromotionSkipped {
                difference: evaluation.difference,
            });
            if let Err(e) = state.advance(PipelinePhase::Skipped) {
                state.fail(Some(Stage::Pusher), &e);
                return Err(e);
            }
            None
        };

        Ok(RunOutcome {
            state: state.clone(),
            run_dir: layout.root().to_path_buf(),
            ingestion,
            validation,
            transformation,
            trainer,
            evaluation,
            pusher,
        })
    }
}
