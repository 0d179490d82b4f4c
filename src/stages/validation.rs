//! Data validation: schema conformance and drift report

use super::read_table;
use crate::core::{
    IngestionArtifact, PipelineError, PipelineResult, RunLayout, Stage, TrainingConfig,
    ValidationArtifact,
};
use crate::data::Table;
use crate::stages::drift::{DriftDetector, DriftReport};
use tracing::{info, warn};

pub struct DataValidation<'a> {
    config: &'a TrainingConfig,
    layout: &'a RunLayout,
    detector: &'a dyn DriftDetector,
}

impl<'a> DataValidation<'a> {
    pub fn new(config: &'a TrainingConfig, layout: &'a RunLayout, detector: &'a dyn DriftDetector) -> Self {
        Self {
            config,
            layout,
            detector,
        }
    }

    /// True iff the table has exactly the declared number of columns
    pub fn validate_column_count(&self, table: &Table) -> bool {
        let expected = self.config.schema.column_count();
        let status = table.n_cols() == expected;
        info!(
            "Required number of columns: {}, data frame has: {}",
            expected,
            table.n_cols()
        );
        status
    }

    /// Declared numerical and categorical columns absent from the table
    pub fn missing_columns(&self, table: &Table) -> Vec<String> {
        let schema = &self.config.schema;
        schema
            .numerical_columns
            .iter()
            .chain(&schema.categorical_columns)
            .filter(|c| !table.has_column(c))
            .cloned()
            .collect()
    }

    /// True iff every declared numerical and categorical column is present
    pub fn columns_exist(&self, table: &Table) -> bool {
        let missing = self.missing_columns(table);
        if !missing.is_empty() {
            warn!("Missing columns: {}", missing.join(", "));
        }
        missing.is_empty()
    }

    /// Compare distributions and persist the report
    pub fn detect_drift(&self, reference: &Table, current: &Table) -> PipelineResult<DriftReport> {
        let report = self
            .detector
            .detect(reference, current, &self.config.schema, &self.config.validation);
        let yaml = serde_yaml::to_string(&report)
            .map_err(|e| PipelineError::serialization(Stage::Validation, "encode drift report", e))?;
        let path = self.layout.drift_report_file();
        crate::core::write_new(&path, yaml.as_bytes())
            .map_err(|e| PipelineError::storage(Stage::Validation, "write drift report", e))?;

        info!(
            "Drifted features: {} of {} (share {:.2})",
            report.drifted_feature_count,
            report.features.len(),
            report.drifted_share
        );
        if report.dataset_drift {
            warn!("Dataset drift detected: {}", report.drifted_features.join(", "));
        }
        Ok(report)
    }

    fn check_partition(&self, name: &str, table: &Table, messages: &mut Vec<String>) {
        if !self.validate_column_count(table) {
            messages.push(format!(
                "Column count mismatch in {}: expected {}, found {}",
                name,
                self.config.schema.column_count(),
                table.n_cols()
            ));
        }
        if !self.columns_exist(table) {
            let missing = self.missing_columns(table);
            messages.push(format!("Columns missing in {}: {}", name, missing.join(", ")));
        }
    }

    /// Check both partitions and aggregate every failure into one message
    pub fn initiate(&self, ingestion: &IngestionArtifact) -> PipelineResult<ValidationArtifact> {
        info!("Starting data validation");
        let train = read_table(Stage::Validation, "read train set", &ingestion.train_file_path)?;
        let test = read_table(Stage::Validation, "read test set", &ingestion.test_file_path)?;

        let mut messages = Vec::new();
        self.check_partition("Training Set", &train, &mut messages);
        self.check_partition("Test Set", &test, &mut messages);
        let validation_status = messages.is_empty();

        let drift_report_path = if validation_status && self.config.validation.detect_drift {
            self.detect_drift(&train, &test)?;
            Some(self.layout.drift_report_file())
        } else {
            None
        };

        info!("Data validation finished, status: {}", validation_status);
        Ok(ValidationArtifact {
            validation_status,
            message: messages.join("; "),
            drift_report_path,
        })
    }
}
