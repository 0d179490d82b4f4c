//! Stage artifacts and the per-run directory layout
//!
//! Every stage returns one artifact. Artifacts are plain immutable values:
//! downstream stages read them and never write back.

use crate::core::error::{PipelineError, PipelineResult, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Common view over stage outputs
pub trait Artifact {
    /// Stage that produced the artifact
    fn stage(&self) -> Stage;

    /// One-line description for logs and terminal output
    fn summary(&self) -> String;
}

/// Paths written by data ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionArtifact {
    pub feature_store_path: PathBuf,
    pub train_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

impl Artifact for IngestionArtifact {
    fn stage(&self) -> Stage {
        Stage::Ingestion
    }

    fn summary(&self) -> String {
        format!(
            "train: {}, test: {}",
            self.train_file_path.display(),
            self.test_file_path.display()
        )
    }
}

/// Verdict of data validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationArtifact {
    pub validation_status: bool,
    /// Aggregated failure message, empty when the data conforms
    pub message: String,
    pub drift_report_path: Option<PathBuf>,
}

/// Proof that a validation artifact passed
///
/// Only obtainable through [`ValidationArtifact::ensure_passed`], which makes
/// it impossible to build a [`TransformationArtifact`] from failed validation.
#[derive(Debug, Clone, Copy)]
pub struct PassedValidation<'a> {
    artifact: &'a ValidationArtifact,
}

impl PassedValidation<'_> {
    pub fn artifact(&self) -> &ValidationArtifact {
        self.artifact
    }
}

impl ValidationArtifact {
    /// Fail with the validation message when the data did not conform
    pub fn ensure_passed(&self) -> PipelineResult<PassedValidation<'_>> {
        if self.validation_status {
            Ok(PassedValidation { artifact: self })
        } else {
            Err(PipelineError::schema(Stage::Transformation, self.message.clone()))
        }
    }
}

impl Artifact for ValidationArtifact {
    fn stage(&self) -> Stage {
        Stage::Validation
    }

    fn summary(&self) -> String {
        if self.validation_status {
            "schema conforms".to_string()
        } else {
            format!("schema mismatch: {}", self.message)
        }
    }
}

/// Paths written by data transformation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationArtifact {
    transformed_train_path: PathBuf,
    transformed_test_path: PathBuf,
    preprocessor_path: PathBuf,
}

impl TransformationArtifact {
    pub fn new(
        _validated: &PassedValidation<'_>,
        transformed_train_path: PathBuf,
        transformed_test_path: PathBuf,
        preprocessor_path: PathBuf,
    ) -> Self {
        Self {
            transformed_train_path,
            transformed_test_path,
            preprocessor_path,
        }
    }

    pub fn transformed_train_path(&self) -> &Path {
        &self.transformed_train_path
    }

    pub fn transformed_test_path(&self) -> &Path {
        &self.transformed_test_path
    }

    pub fn preprocessor_path(&self) -> &Path {
        &self.preprocessor_path
    }
}

impl Artifact for TransformationArtifact {
    fn stage(&self) -> Stage {
        Stage::Transformation
    }

    fn summary(&self) -> String {
        format!("arrays in {}", parent_display(&self.transformed_train_path))
    }
}

/// Held-out classification scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetric {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Output of the model trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerArtifact {
    pub trained_model_path: PathBuf,
    pub metric: ClassificationMetric,
    /// Score reported by model selection
    pub best_score: f64,
    pub model_name: String,
}

impl Artifact for TrainerArtifact {
    fn stage(&self) -> Stage {
        Stage::Training
    }

    fn summary(&self) -> String {
        format!(
            "{} (search score {:.4}, f1 {:.4})",
            self.model_name, self.best_score, self.metric.f1
        )
    }
}

/// Outcome of comparing the candidate with the production model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationArtifact {
    pub is_model_accepted: bool,
    /// Candidate F1 minus production F1 (0 when there is no production model)
    pub difference: f64,
    pub trained_model_path: PathBuf,
    /// Object-store key of the best known model
    pub production_model_key: String,
    pub candidate_f1: f64,
    pub production_f1: Option<f64>,
}

impl Artifact for EvaluationArtifact {
    fn stage(&self) -> Stage {
        Stage::Evaluation
    }

    fn summary(&self) -> String {
        let verdict = if self.is_model_accepted {
            "accepted"
        } else {
            "rejected"
        };
        format!("candidate {} (delta {:+.4})", verdict, self.difference)
    }
}

/// Location of the promoted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PusherArtifact {
    pub bucket_name: String,
    pub model_key: String,
}

impl Artifact for PusherArtifact {
    fn stage(&self) -> Stage {
        Stage::Pusher
    }

    fn summary(&self) -> String {
        format!("pushed to {}/{}", self.bucket_name, self.model_key)
    }
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

/// Timestamp format of run directory names
pub const RUN_TIMESTAMP_FORMAT: &str = "%m_%d_%Y__%H_%M_%S";

/// Directory tree owned by one pipeline run
///
/// ```text
/// <root>/
///   data_ingestion/feature_store/visa.csv
///   data_ingestion/ingested/{train,test}.csv
///   data_validation/drift_report/report.yaml
///   data_transformation/transformed/{train,test}.npy
///   data_transformation/transformed_object/preprocessing.json
///   model_trainer/trained_model/model.json
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    /// Create a fresh run directory under `artifact_root`
    ///
    /// Fails if the directory already exists, so two runs never share paths.
    pub fn create(
        artifact_root: &Path,
        run_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> io::Result<Self> {
        let simple = run_id.simple().to_string();
        let name = format!(
            "{}_{}",
            started_at.format(RUN_TIMESTAMP_FORMAT),
            &simple[..8]
        );
        std::fs::create_dir_all(artifact_root)?;
        let root = artifact_root.join(name);
        std::fs::create_dir(&root)?;
        Ok(Self { root })
    }

    /// Use an existing directory as the run root
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn feature_store_file(&self) -> PathBuf {
        self.root
            .join("data_ingestion")
            .join("feature_store")
            .join("visa.csv")
    }

    pub fn train_file(&self) -> PathBuf {
        self.root.join("data_ingestion").join("ingested").join("train.csv")
    }

    pub fn test_file(&self) -> PathBuf {
        self.root.join("data_ingestion").join("ingested").join("test.csv")
    }

    pub fn drift_report_file(&self) -> PathBuf {
        self.root
            .join("data_validation")
            .join("drift_report")
            .join("report.yaml")
    }

    pub fn transformed_train_file(&self) -> PathBuf {
        self.root
            .join("data_transformation")
            .join("transformed")
            .join("train.npy")
    }

    pub fn transformed_test_file(&self) -> PathBuf {
        self.root
            .join("data_transformation")
            .join("transformed")
            .join("test.npy")
    }

    pub fn preprocessor_file(&self) -> PathBuf {
        self.root
            .join("data_transformation")
            .join("transformed_object")
            .join("preprocessing.json")
    }

    pub fn trained_model_file(&self) -> PathBuf {
        self.root
            .join("model_trainer")
            .join("trained_model")
            .join("model.json")
    }
}

/// Create a new file, creating parent directories; an existing file is an error
pub fn create_new_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Write bytes to a new file
pub fn write_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = create_new_file(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
