//! Combined over- and under-sampling (SMOTE followed by edited nearest neighbours)

use crate::data::Matrix;
use crate::ml::neighbors::nearest;
use crate::ml::{binary_labels, MlError, MlResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

/// SMOTE on the minority class, then ENN cleaning of every class
#[derive(Debug, Clone, PartialEq)]
pub struct SmoteEnn {
    /// Neighbours considered when synthesizing minority samples
    pub k_neighbors: usize,
    /// Neighbours that must all agree for a sample to survive cleaning
    pub enn_neighbors: usize,
    pub seed: u64,
}

impl Default for SmoteEnn {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            enn_neighbors: 3,
            seed: 42,
        }
    }
}

impl SmoteEnn {
    pub fn new(k_neighbors: usize, enn_neighbors: usize, seed: u64) -> Self {
        Self {
            k_neighbors,
            enn_neighbors,
            seed,
        }
    }

    /// Rebalance `(x, y)` and return the resampled pair
    pub fn fit_resample(&self, x: &Matrix, y: &[f64]) -> MlResult<(Matrix, Vec<f64>)> {
        if x.rows() == 0 {
            return Err(MlError::EmptyInput);
        }
        if x.rows() != y.len() {
            return Err(MlError::DimensionMismatch {
                expected: x.rows(),
                actual: y.len(),
            });
        }
        let labels = binary_labels(y)?;
        let positives = labels.iter().filter(|&&l| l).count();
        if positives == 0 || positives == labels.len() {
            warn!("Only one class present, skipping resampling");
            return Ok((x.clone(), y.to_vec()));
        }

        let (rows, targets) = self.smote(x, &labels, positives);
        debug!("SMOTE produced {} rows", rows.len());
        let (rows, targets) = self.edited_nearest_neighbours(rows, targets);
        debug!("ENN kept {} rows", rows.len());

        let matrix = Matrix::from_rows(&rows).map_err(|_| MlError::DimensionMismatch {
            expected: x.cols(),
            actual: rows.first().map(Vec::len).unwrap_or(0),
        })?;
        let y = targets.into_iter().map(|t| if t { 1.0 } else { 0.0 }).collect();
        Ok((matrix, y))
    }

    fn smote(&self, x: &Matrix, labels: &[bool], positives: usize) -> (Vec<Vec<f64>>, Vec<bool>) {
        let mut rows: Vec<Vec<f64>> = x.iter_rows().map(<[f64]>::to_vec).collect();
        let mut targets = labels.to_vec();

        let minority_label = positives * 2 < labels.len();
        let minority: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == minority_label).collect();
        let to_generate = labels.len() - 2 * minority.len();
        if to_generate == 0 || minority.len() < 2 {
            return (rows, targets);
        }

        let k = self.k_neighbors.min(minority.len() - 1);
        let minority_rows: Vec<&[f64]> = minority.iter().map(|&i| x.row(i)).collect();
        let neighbours: Vec<Vec<usize>> = (0..minority.len())
            .map(|i| {
                nearest(minority_rows.iter().copied(), minority_rows[i], k, Some(i))
                    .into_iter()
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..to_generate {
            let i = rng.gen_range(0..minority.len());
            let j = neighbours[i][rng.gen_range(0..neighbours[i].len())];
            let gap: f64 = rng.gen();
            let synthetic = minority_rows[i]
                .iter()
                .zip(minority_rows[j])
                .map(|(a, b)| a + gap * (b - a))
                .collect();
            rows.push(synthetic);
            targets.push(minority_label);
        }
        (rows, targets)
    }

    fn edited_nearest_neighbours(
        &self,
        rows: Vec<Vec<f64>>,
        targets: Vec<bool>,
    ) -> (Vec<Vec<f64>>, Vec<bool>) {
        let keep: Vec<bool> = (0..rows.len())
            .map(|i| {
                nearest(rows.iter().map(Vec::as_slice), &rows[i], self.enn_neighbors, Some(i))
                    .iter()
                    .all(|&(j, _)| targets[j] == targets[i])
            })
            .collect();

        let kept_positive = (0..rows.len()).any(|i| keep[i] && targets[i]);
        let kept_negative = (0..rows.len()).any(|i| keep[i] && !targets[i]);
        if !(kept_positive && kept_negative) {
            warn!("Cleaning would remove a whole class, keeping oversampled data");
            return (rows, targets);
        }

        rows.into_iter()
            .zip(targets)
            .zip(keep)
            .filter_map(|(pair, k)| k.then_some(pair))
            .unzip()
    }
}
