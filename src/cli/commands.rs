//! CLI command definitions

use crate::core::ConfigOverrides;
use clap::Args;
use std::path::PathBuf;

/// Run the training pipeline
#[derive(Debug, Args, Clone)]
pub struct TrainCommand {
    /// Override the artifact root directory
    #[arg(long)]
    pub artifact_root: Option<PathBuf>,

    /// Override the minimum acceptable model score
    #[arg(long)]
    pub expected_score: Option<f64>,

    /// Skip drift detection
    #[arg(long)]
    pub no_drift: bool,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

impl TrainCommand {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            artifact_root: self.artifact_root.clone(),
            expected_score: self.expected_score,
            disable_drift: self.no_drift,
        }
    }
}

/// Validate the pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Predict one application
#[derive(Debug, Args, Clone)]
pub struct PredictCommand {
    /// JSON file holding one prediction request
    #[arg(short, long)]
    pub input: PathBuf,
}

/// Serve predictions over HTTP
#[derive(Debug, Args, Clone)]
pub struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,
}

impl ServeCommand {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run
    #[arg(long)]
    pub run_id: Option<String>,
}
