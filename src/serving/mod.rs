//! Prediction endpoint serving the promoted model bundle

use crate::core::{RegistryConfig, StoreError};
use crate::data::{Cell, Table, TARGET_MAPPING};
use crate::ml::bundle::ModelBundle;
use crate::ml::MlError;
use crate::store::ObjectStore;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Feature values of one visa application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub continent: String,
    pub education_of_employee: String,
    pub has_job_experience: String,
    pub requires_job_training: String,
    pub no_of_employees: f64,
    pub region_of_employment: String,
    pub prevailing_wage: f64,
    pub unit_of_wage: String,
    pub full_time_position: String,
    pub company_age: f64,
}

impl PredictionRequest {
    /// Single-row table with the model input columns
    pub fn to_table(&self) -> std::io::Result<Table> {
        let text = |s: &str| Cell::Text(s.to_string());
        let columns = [
            ("continent", text(&self.continent)),
            ("education_of_employee", text(&self.education_of_employee)),
            ("has_job_experience", text(&self.has_job_experience)),
            ("requires_job_training", text(&self.requires_job_training)),
            ("no_of_employees", Cell::Number(self.no_of_employees)),
            ("region_of_employment", text(&self.region_of_employment)),
            ("prevailing_wage", Cell::Number(self.prevailing_wage)),
            ("unit_of_wage", text(&self.unit_of_wage)),
            ("full_time_position", text(&self.full_time_position)),
            ("company_age", Cell::Number(self.company_age)),
        ];
        let (names, row): (Vec<String>, Vec<Cell>) = columns
            .into_iter()
            .map(|(name, cell)| (name.to_string(), cell))
            .unzip();
        Table::from_rows(names, vec![row])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// "Approved" or "Denied"
    pub prediction: String,
    pub class: f64,
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("no model has been promoted to {bucket}/{key}")]
    NoModel { bucket: String, key: String },

    #[error("model store error: {0}")]
    Store(#[from] StoreError),

    #[error("model error: {0}")]
    Model(#[from] MlError),

    #[error("invalid request: {0}")]
    Request(#[from] std::io::Error),

    #[error("unexpected class {0}")]
    UnknownClass(f64),

    #[error("prediction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for PredictionError {
    fn into_response(self) -> Response {
        error!("Prediction failed: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Decoded bundle together with the stored bytes it was decoded from
struct CachedBundle {
    bytes: Vec<u8>,
    bundle: Arc<ModelBundle>,
}

/// Answers predictions with the bundle currently promoted in the registry
///
/// The stored object is read on every request; decoding only happens when
/// its bytes differ from the cached copy, so a new promotion takes effect
/// on the next prediction.
pub struct ModelPredictor {
    store: Arc<dyn ObjectStore>,
    registry: RegistryConfig,
    cached: RwLock<Option<CachedBundle>>,
}

impl ModelPredictor {
    pub fn new(store: Arc<dyn ObjectStore>, registry: RegistryConfig) -> Self {
        Self {
            store,
            registry,
            cached: RwLock::new(None),
        }
    }

    fn fetch(store: &dyn ObjectStore, registry: &RegistryConfig) -> Result<Vec<u8>, PredictionError> {
        if !store.bucket_exists(&registry.bucket)?
            || !store.key_exists(&registry.bucket, &registry.model_key)?
        {
            return Err(PredictionError::NoModel {
                bucket: registry.bucket.clone(),
                key: registry.model_key.clone(),
            });
        }
        Ok(store.download(&registry.bucket, &registry.model_key)?)
    }

    /// The promoted bundle, decoded again only when the stored object changed
    pub async fn bundle(&self) -> Result<Arc<ModelBundle>, PredictionError> {
        let store = self.store.clone();
        let registry = self.registry.clone();
        let bytes =
            tokio::task::spawn_blocking(move || Self::fetch(store.as_ref(), &registry)).await??;

        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.bytes == bytes {
                return Ok(cached.bundle.clone());
            }
        }

        let mut slot = self.cached.write().await;
        if let Some(cached) = slot.as_ref() {
            if cached.bytes == bytes {
                return Ok(cached.bundle.clone());
            }
        }
        let bundle = Arc::new(ModelBundle::from_bytes(&bytes)?);
        info!(
            "Loaded {} model from {}/{}",
            bundle.model_name(),
            self.registry.bucket,
            self.registry.model_key
        );
        *slot = Some(CachedBundle {
            bytes,
            bundle: bundle.clone(),
        });
        Ok(bundle)
    }

    pub async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse, PredictionError> {
        let bundle = self.bundle().await?;
        let table = request.to_table()?;
        let classes = tokio::task::spawn_blocking(move || bundle.predict(&table)).await??;
        let class = classes.first().copied().unwrap_or(f64::NAN);
        let prediction = TARGET_MAPPING
            .human_label(class)
            .ok_or(PredictionError::UnknownClass(class))?;
        Ok(PredictionResponse {
            prediction: prediction.to_string(),
            class,
        })
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn predict(
    State(predictor): State<Arc<ModelPredictor>>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<PredictionResponse>, PredictionError> {
    predictor.predict(&request).await.map(Json)
}

/// Router exposing `GET /health` and `POST /predict`
pub fn router(predictor: Arc<ModelPredictor>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .with_state(predictor)
}
