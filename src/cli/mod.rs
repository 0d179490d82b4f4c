//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, PredictCommand, ServeCommand, TrainCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Visa-application training pipeline with gated model promotion
#[derive(Debug, Parser, Clone)]
#[command(name = "visa-pipeline")]
#[command(version)]
#[command(about = "Train, evaluate and promote the visa-approval classifier", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to pipeline configuration file
    #[arg(short, long, global = true, default_value = "config/pipeline.yaml")]
    pub config: PathBuf,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the training pipeline once
    Train(TrainCommand),

    /// Validate the pipeline configuration
    Validate(ValidateCommand),

    /// Predict one application with the promoted model
    Predict(PredictCommand),

    /// Serve predictions over HTTP
    Serve(ServeCommand),

    /// Show training run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_flags() {
        let cli = Cli::try_parse_from([
            "visa-pipeline",
            "--config",
            "conf/p.yaml",
            "train",
            "--expected-score",
            "0.7",
            "--no-drift",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("conf/p.yaml"));
        match cli.command {
            Command::Train(cmd) => {
                let overrides = cmd.overrides();
                assert_eq!(overrides.expected_score, Some(0.7));
                assert!(overrides.disable_drift);
                assert!(overrides.artifact_root.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["visa-pipeline", "serve"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config/pipeline.yaml"));
        match cli.command {
            Command::Serve(cmd) => assert_eq!(cmd.address(), "0.0.0.0:8080"),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
