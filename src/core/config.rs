//! Training configuration from YAML
//!
//! A `TrainingConfig` is loaded once at process start, validated, and then
//! shared by reference with every stage. Nothing inside the stages reads
//! configuration from anywhere else.

use crate::ml::preprocess::FeatureGroups;
use crate::ml::selection::ModelSpace;
use anyhow::{Context, Result};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A section that is either written inline or loaded from a separate YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Resource<T> {
    File { path: PathBuf },
    Inline(T),
}

impl<T: serde::de::DeserializeOwned> Resource<T> {
    fn resolve(self, base: &Path, what: &str) -> Result<T> {
        match self {
            Resource::Inline(value) => Ok(value),
            Resource::File { path } => {
                let path = if path.is_relative() { base.join(path) } else { path };
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {} file {}", what, path.display()))?;
                serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse {} file {}", what, path.display()))
            }
        }
    }
}

/// Kind of a declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// One declared column of the raw dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Derived "age" feature: `reference_year - source_column`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeFeature {
    #[serde(default = "default_age_source")]
    pub source_column: String,
    #[serde(default = "default_age_name")]
    pub name: String,
}

impl Default for AgeFeature {
    fn default() -> Self {
        Self {
            source_column: default_age_source(),
            name: default_age_name(),
        }
    }
}

fn default_age_source() -> String {
    "yr_of_estab".to_string()
}

fn default_age_name() -> String {
    "company_age".to_string()
}

fn default_target_column() -> String {
    "case_status".to_string()
}

/// Schema descriptor of the raw dataset and its feature groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Every column of the raw dataset, in order (target included)
    pub columns: Vec<ColumnSpec>,

    #[serde(default = "default_target_column")]
    pub target_column: String,

    #[serde(default)]
    pub numerical_columns: Vec<String>,

    #[serde(default)]
    pub categorical_columns: Vec<String>,

    /// Nominal columns, one-hot encoded
    #[serde(default)]
    pub oh_columns: Vec<String>,

    /// Ordered columns, ordinal encoded
    #[serde(default)]
    pub or_columns: Vec<String>,

    /// Skewed numeric columns, Yeo-Johnson transformed
    #[serde(default)]
    pub transform_columns: Vec<String>,

    /// Numeric columns, standard scaled
    #[serde(default)]
    pub num_features: Vec<String>,

    /// Columns removed before fitting
    #[serde(default)]
    pub drop_columns: Vec<String>,

    #[serde(default)]
    pub age_feature: AgeFeature,
}

impl SchemaConfig {
    /// Declared total column count
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Declared kind of a column, if the column is declared
    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.kind)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Column groups the preprocessor is built from
    pub fn feature_groups(&self) -> FeatureGroups {
        FeatureGroups {
            one_hot: self.oh_columns.clone(),
            ordinal: self.or_columns.clone(),
            power: self.transform_columns.clone(),
            scaled: self.num_features.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            anyhow::bail!("Schema declares no columns");
        }
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                anyhow::bail!("Duplicate schema column: {}", column.name);
            }
        }
        if self.kind_of(&self.target_column).is_none() {
            anyhow::bail!(
                "Target column '{}' is not declared in the schema",
                self.target_column
            );
        }
        for name in self.numerical_columns.iter().chain(&self.categorical_columns) {
            if self.kind_of(name).is_none() {
                anyhow::bail!("Column '{}' is listed but not declared", name);
            }
        }
        Ok(())
    }
}

/// Document-store source and split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub database: String,
    pub collection: String,

    /// Fraction of rows placed in the test partition
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_split_ratio() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub detect_drift: bool,

    /// A feature drifts when its test p-value is below this
    #[serde(default = "default_p_value")]
    pub p_value_threshold: f64,

    /// The dataset drifts when this share of features drift
    #[serde(default = "default_drift_share")]
    pub drift_share: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            detect_drift: true,
            p_value_threshold: default_p_value(),
            drift_share: default_drift_share(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_p_value() -> f64 {
    0.05
}

fn default_drift_share() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationConfig {
    /// Also rebalance the test partition
    #[serde(default = "default_true")]
    pub rebalance_test: bool,

    #[serde(default = "default_smote_neighbors")]
    pub smote_neighbors: usize,

    #[serde(default = "default_enn_neighbors")]
    pub enn_neighbors: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self {
            rebalance_test: true,
            smote_neighbors: default_smote_neighbors(),
            enn_neighbors: default_enn_neighbors(),
            seed: default_seed(),
        }
    }
}

fn default_smote_neighbors() -> usize {
    5
}

fn default_enn_neighbors() -> usize {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Floor the best model must reach to be bundled
    pub expected_score: f64,
    pub model_space: ModelSpace,
}

/// Where the promoted bundle lives in the object store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub bucket: String,
    #[serde(default = "default_model_key")]
    pub model_key: String,
}

fn default_model_key() -> String {
    "model.json".to_string()
}

/// Locations of the local store backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionsConfig {
    #[serde(default = "default_document_store")]
    pub document_store: PathBuf,
    #[serde(default = "default_object_store")]
    pub object_store: PathBuf,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            document_store: default_document_store(),
            object_store: default_object_store(),
        }
    }
}

fn default_document_store() -> PathBuf {
    PathBuf::from("data/documents")
}

fn default_object_store() -> PathBuf {
    PathBuf::from("data/registry")
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_expected_score() -> f64 {
    0.6
}

#[derive(Debug, Deserialize)]
struct RawTrainerConfig {
    #[serde(default = "default_expected_score")]
    expected_score: f64,
    #[serde(default)]
    model_space: Option<Resource<ModelSpace>>,
}

impl Default for RawTrainerConfig {
    fn default() -> Self {
        Self {
            expected_score: default_expected_score(),
            model_space: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    pipeline_name: String,
    #[serde(default = "default_artifact_root")]
    artifact_root: PathBuf,
    #[serde(default)]
    reference_year: Option<i32>,
    ingestion: IngestionConfig,
    #[serde(default)]
    validation: ValidationConfig,
    #[serde(default)]
    transformation: TransformationConfig,
    #[serde(default)]
    trainer: RawTrainerConfig,
    registry: RegistryConfig,
    #[serde(default)]
    connections: ConnectionsConfig,
    schema: Resource<SchemaConfig>,
}

/// Top-level training configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingConfig {
    pub pipeline_name: String,

    /// Root under which every run gets its own directory
    pub artifact_root: PathBuf,

    /// Year the age feature is computed against, frozen at load time
    pub reference_year: i32,

    pub ingestion: IngestionConfig,
    pub validation: ValidationConfig,
    pub transformation: TransformationConfig,
    pub trainer: TrainerConfig,
    pub registry: RegistryConfig,
    pub connections: ConnectionsConfig,
    pub schema: SchemaConfig,
}

/// Command-line overrides applied before the config is shared
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub artifact_root: Option<PathBuf>,
    pub expected_score: Option<f64>,
    pub disable_drift: bool,
}

impl TrainingConfig {
    /// Load the configuration from a YAML file
    ///
    /// Relative paths to the schema and model-space files are resolved
    /// against the directory containing the config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml_in(&content, base)
    }

    /// Parse the configuration from a YAML string, resolving files against the working directory
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_yaml_in(yaml, Path::new("."))
    }

    fn from_yaml_in(yaml: &str, base: &Path) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;
        let model_space = match raw.trainer.model_space {
            Some(resource) => resource.resolve(base, "model space")?,
            None => ModelSpace::default(),
        };
        let config = TrainingConfig {
            pipeline_name: raw.pipeline_name,
            artifact_root: raw.artifact_root,
            reference_year: raw
                .reference_year
                .unwrap_or_else(|| chrono::Utc::now().year()),
            ingestion: raw.ingestion,
            validation: raw.validation,
            transformation: raw.transformation,
            trainer: TrainerConfig {
                expected_score: raw.trainer.expected_score,
                model_space,
            },
            registry: raw.registry,
            connections: raw.connections,
            schema: raw.schema.resolve(base, "schema")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides and re-validate
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(root) = overrides.artifact_root {
            self.artifact_root = root;
        }
        if let Some(score) = overrides.expected_score {
            self.trainer.expected_score = score;
        }
        if overrides.disable_drift {
            self.validation.detect_drift = false;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pipeline_name.trim().is_empty() {
            anyhow::bail!("pipeline_name must not be empty");
        }

        let ratio = self.ingestion.split_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            anyhow::bail!("ingestion.split_ratio must be in (0, 1), got {}", ratio);
        }
        if self.ingestion.database.is_empty() || self.ingestion.collection.is_empty() {
            anyhow::bail!("ingestion.database and ingestion.collection must be set");
        }

        for (name, value) in [
            ("validation.p_value_threshold", self.validation.p_value_threshold),
            ("validation.drift_share", self.validation.drift_share),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                anyhow::bail!("{} must be in (0, 1], got {}", name, value);
            }
        }

        if self.transformation.smote_neighbors == 0 || self.transformation.enn_neighbors == 0 {
            anyhow::bail!("transformation neighbour counts must be at least 1");
        }

        let score = self.trainer.expected_score;
        if !(0.0..=1.0).contains(&score) {
            anyhow::bail!("trainer.expected_score must be in [0, 1], got {}", score);
        }
        self.trainer
            .model_space
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid model space: {}", e))?;

        if self.registry.bucket.is_empty() || self.registry.model_key.is_empty() {
            anyhow::bail!("registry.bucket and registry.model_key must be set");
        }

        self.schema.validate()
    }
}
