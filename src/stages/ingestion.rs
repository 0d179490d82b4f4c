//! Data ingestion: document store -> feature-store snapshot -> train/test split

use super::{read_table, write_table};
use crate::core::{
    ColumnKind, IngestionArtifact, PipelineError, PipelineResult, RunLayout, SchemaConfig, Stage,
    TrainingConfig,
};
use crate::data::{Cell, Table};
use crate::store::{Document, DocumentStore};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Internal identifier column added by the document store
const ID_FIELD: &str = "_id";

/// Strings treated as missing values
const MISSING_SENTINELS: &[&str] = &["na"];

pub struct DataIngestion<'a> {
    config: &'a TrainingConfig,
    layout: &'a RunLayout,
    store: &'a dyn DocumentStore,
}

impl<'a> DataIngestion<'a> {
    pub fn new(config: &'a TrainingConfig, layout: &'a RunLayout, store: &'a dyn DocumentStore) -> Self {
        Self {
            config,
            layout,
            store,
        }
    }

    /// Pull the whole collection and write it to the feature store
    pub fn export_to_feature_store(&self) -> PipelineResult<Table> {
        let settings = &self.config.ingestion;
        info!(
            "Exporting {}.{} to feature store",
            settings.database, settings.collection
        );
        let documents = self
            .store
            .find(&settings.collection, &settings.database)
            .map_err(|e| PipelineError::connectivity(Stage::Ingestion, "find documents", e))?;
        debug!("Fetched {} documents", documents.len());

        let table = documents_to_table(&documents, &self.config.schema)
            .map_err(|message| PipelineError::schema(Stage::Ingestion, message))?;

        let path = self.layout.feature_store_file();
        write_table(Stage::Ingestion, "write feature store", &table, &path)?;
        info!(
            "Saved {} rows x {} columns to {}",
            table.n_rows(),
            table.n_cols(),
            path.display()
        );
        Ok(table)
    }

    /// Split the feature-store snapshot and write both partitions
    pub fn split_train_test(&self, ratio: f64) -> PipelineResult<(Table, Table)> {
        let snapshot = read_table(
            Stage::Ingestion,
            "read feature store",
            &self.layout.feature_store_file(),
        )?;
        let (train_idx, test_idx) = split_indices(snapshot.n_rows(), ratio, self.config.ingestion.seed);
        let train = snapshot.select_rows(&train_idx);
        let test = snapshot.select_rows(&test_idx);

        write_table(Stage::Ingestion, "write train set", &train, &self.layout.train_file())?;
        write_table(Stage::Ingestion, "write test set", &test, &self.layout.test_file())?;
        info!(
            "Split {} rows into {} train / {} test (ratio {})",
            snapshot.n_rows(),
            train.n_rows(),
            test.n_rows(),
            ratio
        );
        Ok((train, test))
    }

    pub fn initiate(&self) -> PipelineResult<IngestionArtifact> {
        self.export_to_feature_store()?;
        self.split_train_test(self.config.ingestion.split_ratio)?;
        Ok(IngestionArtifact {
            feature_store_path: self.layout.feature_store_file(),
            train_file_path: self.layout.train_file(),
            test_file_path: self.layout.test_file(),
        })
    }
}

/// Seeded shuffle split: the first `ceil(n * ratio)` shuffled rows form the test set
pub fn split_indices(n: usize, ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let n_test = ((n as f64) * ratio).ceil() as usize;
    let n_test = n_test.min(n);
    let train = indices.split_off(n_test);
    (train, indices)
}

/// Convert raw documents into a typed table
///
/// Declared columns come first in schema order and are typed by their
/// declared kind. Undeclared fields are kept as text columns so validation
/// can report them; the store's `_id` is dropped.
pub fn documents_to_table(documents: &[Document], schema: &SchemaConfig) -> Result<Table, String> {
    let declared: BTreeSet<&str> = schema.column_names().collect();
    let extras: BTreeSet<&str> = documents
        .iter()
        .flat_map(|d| d.keys().map(String::as_str))
        .filter(|k| *k != ID_FIELD && !declared.contains(k))
        .collect();

    let columns: Vec<String> = schema
        .column_names()
        .chain(extras.iter().copied())
        .map(str::to_string)
        .collect();
    let mut table = Table::new(columns.clone());

    for (i, document) in documents.iter().enumerate() {
        let row = columns
            .iter()
            .map(|name| {
                let kind = schema.kind_of(name);
                to_cell(document.get(name), kind)
                    .map_err(|e| format!("document {}: column '{}' {}", i, name, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        table.push_row(row).map_err(|e| e.to_string())?;
    }
    table.normalize_missing(MISSING_SENTINELS);
    Ok(table)
}

fn to_cell(value: Option<&Value>, kind: Option<ColumnKind>) -> Result<Cell, String> {
    let value = match value {
        None | Some(Value::Null) => return Ok(Cell::Missing),
        Some(v) => v,
    };
    match (kind, value) {
        (_, Value::String(s)) if MISSING_SENTINELS.contains(&s.as_str()) => Ok(Cell::Missing),
        (Some(ColumnKind::Numeric), Value::Number(n)) => n
            .as_f64()
            .map(Cell::Number)
            .ok_or_else(|| format!("holds an unrepresentable number {}", n)),
        (Some(ColumnKind::Numeric), Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) if !v.is_nan() => Ok(Cell::Number(v)),
            _ => Err(format!("expects a number, got '{}'", s)),
        },
        (Some(ColumnKind::Numeric), other) => Err(format!("expects a number, got {}", other)),
        (_, Value::String(s)) => Ok(Cell::Text(s.clone())),
        (_, Value::Number(n)) => Ok(Cell::Text(n.to_string())),
        (_, Value::Bool(b)) => Ok(Cell::Text(b.to_string())),
        (_, other) => Err(format!("holds a nested value {}", other)),
    }
}
