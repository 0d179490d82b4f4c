//! Test utilities for the training pipeline scenarios

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use visa_pipeline::core::{StoreError, TrainingConfig};
use visa_pipeline::execution::{PipelineEvent, TrainingPipeline};
use visa_pipeline::ml::bundle::ModelBundle;
use visa_pipeline::ml::models::{Classifier, Estimator, KNearest, Weights};
use visa_pipeline::ml::preprocess::Preprocessor;
use visa_pipeline::stages::ingestion::documents_to_table;
use visa_pipeline::stages::prepare_features;
use visa_pipeline::store::{Document, InMemoryDocumentStore, InMemoryObjectStore, ObjectStore};

pub const DATABASE: &str = "US_VISA";
pub const COLLECTION: &str = "visa_data";
pub const BUCKET: &str = "usvisa-model";
pub const MODEL_KEY: &str = "model.json";
pub const REFERENCE_YEAR: i32 = 2024;

const EDUCATION: [&str; 4] = ["High School", "Bachelor's", "Master's", "Doctorate"];
const CONTINENTS: [&str; 3] = ["Asia", "Europe", "Africa"];
const REGIONS: [&str; 3] = ["Northeast", "South", "West"];
const WAGE_UNITS: [&str; 2] = ["Year", "Hour"];

/// Schema of the synthetic dataset: 5 categorical and 3 numeric features plus the target
pub const SCHEMA_YAML: &str = r#"
    columns:
      - { name: continent, kind: categorical }
      - { name: education_of_employee, kind: categorical }
      - { name: has_job_experience, kind: categorical }
      - { name: no_of_employees, kind: numeric }
      - { name: yr_of_estab, kind: numeric }
      - { name: region_of_employment, kind: categorical }
      - { name: prevailing_wage, kind: numeric }
      - { name: unit_of_wage, kind: categorical }
      - { name: case_status, kind: categorical }
    numerical_columns: [no_of_employees, yr_of_estab, prevailing_wage]
    categorical_columns: [continent, education_of_employee, has_job_experience, region_of_employment, unit_of_wage, case_status]
    drop_columns: [yr_of_estab]
    oh_columns: [continent, region_of_employment, unit_of_wage]
    or_columns: [education_of_employee, has_job_experience]
    transform_columns: [no_of_employees, company_age]
    num_features: [prevailing_wage, no_of_employees, company_age]
"#;

/// Pipeline configuration writing under `artifact_root`
pub fn test_config(artifact_root: &Path, expected_score: f64) -> TrainingConfig {
    let yaml = format!(
        r#"
pipeline_name: visa-test
artifact_root: {root}
reference_year: {year}
ingestion:
  database: {database}
  collection: {collection}
  split_ratio: 0.2
  seed: 42
validation:
  detect_drift: true
trainer:
  expected_score: {expected_score}
  model_space:
    cv_folds: 3
    base_score: 0.5
    candidates:
      - kind: k_nearest
        n_neighbors: [5]
        weights: [distance]
      - kind: logistic_regression
        learning_rate: [0.1]
        epochs: [300]
registry:
  bucket: {bucket}
  model_key: {key}
schema:
{schema}
"#,
        root = artifact_root.display(),
        year = REFERENCE_YEAR,
        database = DATABASE,
        collection = COLLECTION,
        expected_score = expected_score,
        bucket = BUCKET,
        key = MODEL_KEY,
        schema = SCHEMA_YAML,
    );
    TrainingConfig::from_yaml(&yaml).unwrap()
}

/// Label rule of the synthetic data: certified when at least two of
/// advanced education, job experience and a high wage hold
pub fn label_for(education: &str, experience: &str, wage: f64) -> &'static str {
    let advanced = matches!(education, "Master's" | "Doctorate");
    let score = advanced as u8 + (experience == "Y") as u8 + (wage > 70_000.0) as u8;
    if score >= 2 {
        "Certified"
    } else {
        "Denied"
    }
}

/// Labeled synthetic visa applications, as the document store returns them
pub fn synthetic_documents(n: usize, seed: u64) -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let education = EDUCATION[rng.gen_range(0..EDUCATION.len())];
            let experience = if rng.gen_bool(0.5) { "Y" } else { "N" };
            let wage: f64 = (rng.gen_range(10_000.0..150_000.0_f64) * 100.0).round() / 100.0;
            let document = json!({
                "_id": format!("{:024x}", i),
                "continent": CONTINENTS[rng.gen_range(0..CONTINENTS.len())],
                "education_of_employee": education,
                "has_job_experience": experience,
                "no_of_employees": rng.gen_range(10..5000),
                "yr_of_estab": rng.gen_range(1950..2016),
                "region_of_employment": REGIONS[rng.gen_range(0..REGIONS.len())],
                "prevailing_wage": wage,
                "unit_of_wage": WAGE_UNITS[rng.gen_range(0..WAGE_UNITS.len())],
                "case_status": label_for(education, experience, wage),
            });
            match document {
                Value::Object(map) => map,
                _ => unreachable!(),
            }
        })
        .collect()
}

/// Synthetic applications whose labels are coin flips, unlearnable by any model
pub fn noise_documents(n: usize, seed: u64) -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    synthetic_documents(n, seed)
        .into_iter()
        .map(|mut document| {
            let label = if rng.gen_bool(0.5) { "Certified" } else { "Denied" };
            document.insert("case_status".to_string(), json!(label));
            document
        })
        .collect()
}

/// Strip `fields` from every document
pub fn without_fields(documents: Vec<Document>, fields: &[&str]) -> Vec<Document> {
    documents
        .into_iter()
        .map(|mut document| {
            for field in fields {
                document.remove(*field);
            }
            document
        })
        .collect()
}

/// Document store holding `documents` in the test collection
pub fn document_store(documents: Vec<Document>) -> Arc<InMemoryDocumentStore> {
    let store = InMemoryDocumentStore::new();
    store.insert_many(DATABASE, COLLECTION, documents).unwrap();
    Arc::new(store)
}

/// Object store that counts uploads
#[derive(Debug, Default)]
pub struct SpyObjectStore {
    inner: InMemoryObjectStore,
    uploads: AtomicUsize,
    buckets_created: AtomicUsize,
}

impl SpyObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn buckets_created(&self) -> usize {
        self.buckets_created.load(Ordering::SeqCst)
    }

    /// Place a bundle at the production key without counting it as an upload
    pub fn seed_production(&self, bundle: &ModelBundle) {
        self.inner
            .put(BUCKET, MODEL_KEY, bundle.to_bytes().unwrap())
            .unwrap();
    }

    pub fn production_bytes(&self) -> Option<Vec<u8>> {
        self.inner.download(BUCKET, MODEL_KEY).ok()
    }
}

impl ObjectStore for SpyObjectStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.inner.bucket_exists(bucket)
    }

    fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.buckets_created.fetch_add(1, Ordering::SeqCst);
        self.inner.create_bucket(bucket)
    }

    fn key_exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        self.inner.key_exists(bucket, key)
    }

    fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        remove_local: bool,
    ) -> Result<(), StoreError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.inner.upload(local_path, bucket, key, remove_local)
    }

    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.download(bucket, key)
    }
}

/// Bundle that memorizes every document: F1 of 1.0 on any subset of them
pub fn memorizing_bundle(config: &TrainingConfig, documents: &[Document]) -> ModelBundle {
    knn_bundle(config, documents, |_| true)
}

/// Bundle that always predicts "Certified": F1 of 0.0 for the denied class
pub fn certified_only_bundle(config: &TrainingConfig, documents: &[Document]) -> ModelBundle {
    let mut kept = false;
    knn_bundle(config, documents, |label| {
        let keep = !kept && label == 0.0;
        kept |= keep;
        keep
    })
}

/// Preprocessor fitted on every document, 1-NN fitted on the rows `keep` selects
fn knn_bundle(
    config: &TrainingConfig,
    documents: &[Document],
    mut keep: impl FnMut(f64) -> bool,
) -> ModelBundle {
    let table = documents_to_table(documents, &config.schema).unwrap();
    let (features, labels) =
        prepare_features(&table, &config.schema, config.reference_year).unwrap();
    let preprocessor = Preprocessor::fit(&features, &config.schema.feature_groups()).unwrap();
    let x = preprocessor.transform(&features).unwrap();

    let rows: Vec<usize> = (0..labels.len()).filter(|&i| keep(labels[i])).collect();
    let y: Vec<f64> = rows.iter().map(|&i| labels[i]).collect();
    let mut knn = KNearest::new(1, Weights::Uniform);
    knn.fit(&x.select_rows(&rows), &y).unwrap();
    ModelBundle::new(preprocessor, Estimator::KNearest(knn))
}

/// Pipeline over the given stores, recording every emitted event
pub fn recording_pipeline(
    config: TrainingConfig,
    documents: Arc<InMemoryDocumentStore>,
    objects: Arc<SpyObjectStore>,
) -> (TrainingPipeline, Arc<Mutex<Vec<PipelineEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let mut pipeline = TrainingPipeline::new(config, documents, objects);
    pipeline.add_event_handler(move |event| sink.lock().unwrap().push(event.clone()));
    (pipeline, events)
}
