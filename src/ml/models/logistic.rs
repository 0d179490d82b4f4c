//! L2-regularized logistic regression trained by batch gradient descent

use super::{check_fit_input, check_width, Classifier};
use crate::data::Matrix;
use crate::ml::{binary_labels, MlError, MlResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    learning_rate: f64,
    epochs: usize,
    l2: f64,
    #[serde(default)]
    weights: Vec<f64>,
    #[serde(default)]
    bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticRegression {
    pub fn new(learning_rate: f64, epochs: usize, l2: f64) -> Self {
        Self {
            learning_rate,
            epochs,
            l2,
            weights: Vec::new(),
            bias: 0.0,
        }
    }

    /// Probability of class 1
    pub fn predict_proba_row(&self, row: &[f64]) -> MlResult<f64> {
        if self.weights.is_empty() {
            return Err(MlError::EmptyInput);
        }
        check_width(self.weights.len(), row)?;
        let z: f64 = self.bias + self.weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>();
        Ok(sigmoid(z))
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> MlResult<()> {
        check_fit_input(x, y)?;
        let labels = binary_labels(y)?;
        let n = x.rows() as f64;
        let mut weights = vec![0.0; x.cols()];
        let mut bias = 0.0;

        for _ in 0..self.epochs {
            let mut grad = vec![0.0; x.cols()];
            let mut grad_bias = 0.0;
            for (row, &label) in x.iter_rows().zip(&labels) {
                let z: f64 = bias + weights.iter().zip(row).map(|(w, v)| w * v).sum::<f64>();
                let err = sigmoid(z) - if label { 1.0 } else { 0.0 };
                for (g, v) in grad.iter_mut().zip(row) {
                    *g += err * v;
                }
                grad_bias += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad) {
                *w -= self.learning_rate * (g / n + self.l2 * *w);
            }
            bias -= self.learning_rate * grad_bias / n;
        }

        self.weights = weights;
        self.bias = bias;
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> MlResult<f64> {
        Ok(if self.predict_proba_row(row)? >= 0.5 { 1.0 } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learns_linear_boundary() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 / 10.0 - 2.0]).collect();
        let y: Vec<f64> = rows.iter().map(|r| if r[0] > 0.0 { 1.0 } else { 0.0 }).collect();
        let x = Matrix::from_rows(&rows).unwrap();

        let mut model = LogisticRegression::new(0.5, 500, 0.0);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict_row(&[-1.5]).unwrap(), 0.0);
        assert_eq!(model.predict_row(&[1.5]).unwrap(), 1.0);
        assert!(model.predict_row(&[1.0, 2.0]).is_err());
    }
}
