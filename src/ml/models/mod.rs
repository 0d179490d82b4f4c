//! Binary classifiers available to model selection

pub mod forest;
pub mod knn;
pub mod logistic;

pub use forest::RandomForest;
pub use knn::{KNearest, Weights};
pub use logistic::LogisticRegression;

use crate::data::Matrix;
use crate::ml::{MlError, MlResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fitted or fittable binary classifier over dense features
pub trait Classifier {
    /// Learn from features `x` and 0/1 labels `y`
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> MlResult<()>;

    /// Predicted class (0.0 or 1.0) of one row
    fn predict_row(&self, row: &[f64]) -> MlResult<f64>;

    fn predict(&self, x: &Matrix) -> MlResult<Vec<f64>> {
        x.iter_rows().map(|row| self.predict_row(row)).collect()
    }
}

pub(crate) fn check_fit_input(x: &Matrix, y: &[f64]) -> MlResult<()> {
    if x.rows() == 0 {
        return Err(MlError::EmptyInput);
    }
    if x.rows() != y.len() {
        return Err(MlError::DimensionMismatch {
            expected: x.rows(),
            actual: y.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_width(expected: usize, row: &[f64]) -> MlResult<()> {
    if row.len() == expected {
        Ok(())
    } else {
        Err(MlError::DimensionMismatch {
            expected,
            actual: row.len(),
        })
    }
}

/// Any supported estimator, serialized with its kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    KNearest(KNearest),
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

impl Estimator {
    pub fn name(&self) -> &'static str {
        match self {
            Estimator::KNearest(_) => "k_nearest",
            Estimator::LogisticRegression(_) => "logistic_regression",
            Estimator::RandomForest(_) => "random_forest",
        }
    }
}

impl Classifier for Estimator {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> MlResult<()> {
        match self {
            Estimator::KNearest(m) => m.fit(x, y),
            Estimator::LogisticRegression(m) => m.fit(x, y),
            Estimator::RandomForest(m) => m.fit(x, y),
        }
    }

    fn predict_row(&self, row: &[f64]) -> MlResult<f64> {
        match self {
            Estimator::KNearest(m) => m.predict_row(row),
            Estimator::LogisticRegression(m) => m.predict_row(row),
            Estimator::RandomForest(m) => m.predict_row(row),
        }
    }
}

/// One point of a hyperparameter grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelParams {
    KNearest {
        n_neighbors: usize,
        weights: Weights,
    },
    LogisticRegression {
        learning_rate: f64,
        epochs: usize,
        l2: f64,
    },
    RandomForest {
        n_estimators: usize,
        max_depth: Option<usize>,
        min_samples_split: usize,
        seed: u64,
    },
}

impl ModelParams {
    /// Unfitted estimator configured with these parameters
    pub fn build(&self) -> Estimator {
        match *self {
            ModelParams::KNearest {
                n_neighbors,
                weights,
            } => Estimator::KNearest(KNearest::new(n_neighbors, weights)),
            ModelParams::LogisticRegression {
                learning_rate,
                epochs,
                l2,
            } => Estimator::LogisticRegression(LogisticRegression::new(learning_rate, epochs, l2)),
            ModelParams::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
                seed,
            } => Estimator::RandomForest(RandomForest::new(
                n_estimators,
                max_depth,
                min_samples_split,
                seed,
            )),
        }
    }
}

impl fmt::Display for ModelParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelParams::KNearest {
                n_neighbors,
                weights,
            } => write!(f, "k_nearest(n_neighbors={}, weights={:?})", n_neighbors, weights),
            ModelParams::LogisticRegression {
                learning_rate,
                epochs,
                l2,
            } => write!(
                f,
                "logistic_regression(learning_rate={}, epochs={}, l2={})",
                learning_rate, epochs, l2
            ),
            ModelParams::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
                ..
            } => write!(
                f,
                "random_forest(n_estimators={}, max_depth={:?}, min_samples_split={})",
                n_estimators, max_depth, min_samples_split
            ),
        }
    }
}
