//! Deployable model bundle and the versioned JSON envelope
//!
//! The preprocessor and estimator are always stored together so that a
//! served prediction uses the preprocessing the model was trained with.

use crate::data::Table;
use crate::ml::models::{Classifier, Estimator};
use crate::ml::preprocess::Preprocessor;
use crate::ml::{MlError, MlResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const PREPROCESSOR_KIND: &str = "preprocessor";
pub const BUNDLE_KIND: &str = "model_bundle";

/// Current on-disk version of both envelopes
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    format_version: u32,
    kind: String,
    body: T,
}

/// Wrap `body` in a versioned envelope
pub fn encode<T: Serialize>(kind: &str, body: &T) -> MlResult<Vec<u8>> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        kind: kind.to_string(),
        body,
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

/// Unwrap an envelope, rejecting other kinds and versions
pub fn decode<T: DeserializeOwned>(kind: &str, bytes: &[u8]) -> MlResult<T> {
    let envelope: Envelope<serde_json::Value> = serde_json::from_slice(bytes)?;
    if envelope.format_version != FORMAT_VERSION {
        return Err(MlError::UnsupportedVersion {
            kind: kind.to_string(),
            found: envelope.format_version,
            expected: FORMAT_VERSION,
        });
    }
    if envelope.kind != kind {
        return Err(MlError::InvalidSpace(format!(
            "expected a {} envelope, found {}",
            kind, envelope.kind
        )));
    }
    Ok(serde_json::from_value(envelope.body)?)
}

impl Preprocessor {
    pub fn to_bytes(&self) -> MlResult<Vec<u8>> {
        encode(PREPROCESSOR_KIND, self)
    }

    pub fn from_bytes(bytes: &[u8]) -> MlResult<Self> {
        decode(PREPROCESSOR_KIND, bytes)
    }
}

/// Fitted preprocessor paired with the estimator trained on its output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    preprocessor: Preprocessor,
    estimator: Estimator,
}

impl ModelBundle {
    pub fn new(preprocessor: Preprocessor, estimator: Estimator) -> Self {
        Self {
            preprocessor,
            estimator,
        }
    }

    pub fn model_name(&self) -> &'static str {
        self.estimator.name()
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Predict classes for raw feature rows
    pub fn predict(&self, table: &Table) -> MlResult<Vec<f64>> {
        let features = self.preprocessor.transform(table)?;
        self.estimator.predict(&features)
    }

    pub fn to_bytes(&self) -> MlResult<Vec<u8>> {
        encode(BUNDLE_KIND, self)
    }

    pub fn from_bytes(bytes: &[u8]) -> MlResult<Self> {
        decode(BUNDLE_KIND, bytes)
    }
}
