//! k-nearest-neighbours classifier

use super::{check_fit_input, check_width, Classifier};
use crate::data::Matrix;
use crate::ml::neighbors::nearest;
use crate::ml::{binary_labels, MlError, MlResult};
use serde::{Deserialize, Serialize};

/// How neighbour votes are weighted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weights {
    Uniform,
    Distance,
}

/// Memorizes the training set and votes among the closest rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNearest {
    n_neighbors: usize,
    weights: Weights,
    #[serde(default)]
    points: Vec<Vec<f64>>,
    #[serde(default)]
    labels: Vec<bool>,
}

impl KNearest {
    pub fn new(n_neighbors: usize, weights: Weights) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            weights,
            points: Vec::new(),
            labels: Vec::new(),
        }
    }
}

impl Classifier for KNearest {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> MlResult<()> {
        check_fit_input(x, y)?;
        self.labels = binary_labels(y)?;
        self.points = x.iter_rows().map(<[f64]>::to_vec).collect();
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> MlResult<f64> {
        let width = self.points.first().map(Vec::len).ok_or(MlError::EmptyInput)?;
        check_width(width, row)?;

        let found = nearest(self.points.iter().map(Vec::as_slice), row, self.n_neighbors, None);
        let (mut yes, mut no) = (0.0, 0.0);
        match self.weights {
            Weights::Uniform => {
                for (i, _) in &found {
                    if self.labels[*i] {
                        yes += 1.0;
                    } else {
                        no += 1.0;
                    }
                }
            }
            Weights::Distance => {
                // exact matches outvote everything else
                let exact: Vec<_> = found.iter().filter(|(_, d)| *d == 0.0).collect();
                if exact.is_empty() {
                    for (i, d) in &found {
                        let w = 1.0 / d.sqrt();
                        if self.labels[*i] {
                            yes += w;
                        } else {
                            no += w;
                        }
                    }
                } else {
                    for (i, _) in exact {
                        if self.labels[*i] {
                            yes += 1.0;
                        } else {
                            no += 1.0;
                        }
                    }
                }
            }
        }
        Ok(if yes > no { 1.0 } else { 0.0 })
    }
}
