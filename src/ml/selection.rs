//! Grid search over a declared model space

use crate::data::Matrix;
use crate::ml::metrics::accuracy;
use crate::ml::models::{Classifier, Estimator, ModelParams, Weights};
use crate::ml::{MlError, MlResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Hyperparameter grid for one model kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateGrid {
    KNearest {
        n_neighbors: Vec<usize>,
        #[serde(default = "default_weights")]
        weights: Vec<Weights>,
    },
    LogisticRegression {
        learning_rate: Vec<f64>,
        epochs: Vec<usize>,
        #[serde(default = "default_l2")]
        l2: Vec<f64>,
    },
    RandomForest {
        n_estimators: Vec<usize>,
        #[serde(default = "default_max_depth")]
        max_depth: Vec<Option<usize>>,
        #[serde(default = "default_min_samples_split")]
        min_samples_split: Vec<usize>,
        #[serde(default = "default_seed")]
        seed: u64,
    },
}

fn default_weights() -> Vec<Weights> {
    vec![Weights::Uniform]
}

fn default_l2() -> Vec<f64> {
    vec![0.0]
}

fn default_max_depth() -> Vec<Option<usize>> {
    vec![None]
}

fn default_min_samples_split() -> Vec<usize> {
    vec![2]
}

fn default_seed() -> u64 {
    42
}

impl CandidateGrid {
    /// Every parameter combination of the grid
    pub fn expand(&self) -> Vec<ModelParams> {
        let mut out = Vec::new();
        match self {
            CandidateGrid::KNearest {
                n_neighbors,
                weights,
            } => {
                for &n in n_neighbors {
                    for &w in weights {
                        out.push(ModelParams::KNearest {
                            n_neighbors: n,
                            weights: w,
                        });
                    }
                }
            }
            CandidateGrid::LogisticRegression {
                learning_rate,
                epochs,
                l2,
            } => {
                for &lr in learning_rate {
                    for &e in epochs {
                        for &reg in l2 {
                            out.push(ModelParams::LogisticRegression {
                                learning_rate: lr,
                                epochs: e,
                                l2: reg,
                            });
                        }
                    }
                }
            }
            CandidateGrid::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
                seed,
            } => {
                for &n in n_estimators {
                    for &d in max_depth {
                        for &s in min_samples_split {
                            out.push(ModelParams::RandomForest {
                                n_estimators: n,
                                max_depth: d,
                                min_samples_split: s,
                                seed: *seed,
                            });
                        }
                    }
                }
            }
        }
        out
    }
}

/// Model-space descriptor: candidates and the minimum acceptable search score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpace {
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,

    /// Candidates scoring below this are discarded
    #[serde(default = "default_base_score")]
    pub base_score: f64,

    pub candidates: Vec<CandidateGrid>,
}

fn default_cv_folds() -> usize {
    3
}

fn default_base_score() -> f64 {
    0.5
}

impl Default for ModelSpace {
    fn default() -> Self {
        Self {
            cv_folds: default_cv_folds(),
            base_score: default_base_score(),
            candidates: vec![
                CandidateGrid::KNearest {
                    n_neighbors: vec![3, 5],
                    weights: vec![Weights::Uniform, Weights::Distance],
                },
                CandidateGrid::LogisticRegression {
                    learning_rate: vec![0.1],
                    epochs: vec![300],
                    l2: vec![0.0, 0.01],
                },
                CandidateGrid::RandomForest {
                    n_estimators: vec![30],
                    max_depth: vec![Some(8), None],
                    min_samples_split: vec![2],
                    seed: default_seed(),
                },
            ],
        }
    }
}

impl ModelSpace {
    pub fn validate(&self) -> MlResult<()> {
        if self.cv_folds < 2 {
            return Err(MlError::InvalidSpace(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if !(0.0..=1.0).contains(&self.base_score) {
            return Err(MlError::InvalidSpace(format!(
                "base_score must be in [0, 1], got {}",
                self.base_score
            )));
        }
        if self.candidates.iter().all(|c| c.expand().is_empty()) {
            return Err(MlError::InvalidSpace("no candidate parameters".to_string()));
        }
        Ok(())
    }

    pub fn expand(&self) -> Vec<ModelParams> {
        self.candidates.iter().flat_map(CandidateGrid::expand).collect()
    }
}

/// Winner of a grid search, refit on the full training data
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub params: ModelParams,
    pub estimator: Estimator,
    /// Mean cross-validated accuracy of the winner
    pub best_score: f64,
    /// Score of every evaluated combination, in search order
    pub scores: Vec<(ModelParams, f64)>,
}

/// Mean k-fold accuracy; fold `f` holds the rows with `index % k == f`
pub fn cross_val_score(params: &ModelParams, x: &Matrix, y: &[f64], folds: usize) -> MlResult<f64> {
    let folds = folds.min(x.rows());
    if folds < 2 {
        return Err(MlError::EmptyInput);
    }
    let mut total = 0.0;
    for fold in 0..folds {
        let (test, train): (Vec<usize>, Vec<usize>) = (0..x.rows()).partition(|i| i % folds == fold);
        let mut model = params.build();
        let y_train: Vec<f64> = train.iter().map(|&i| y[i]).collect();
        model.fit(&x.select_rows(&train), &y_train)?;
        let predictions = model.predict(&x.select_rows(&test))?;
        let y_test: Vec<f64> = test.iter().map(|&i| y[i]).collect();
        total += accuracy(&y_test, &predictions);
    }
    Ok(total / folds as f64)
}

/// Evaluate every combination and refit the best one
pub fn grid_search(space: &ModelSpace, x: &Matrix, y: &[f64]) -> MlResult<SearchResult> {
    let mut scores = Vec::new();
    let mut best: Option<(usize, f64)> = None;

    for params in space.expand() {
        let score = cross_val_score(&params, x, y, space.cv_folds)?;
        debug!("{} scored {:.4}", params, score);
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((scores.len(), score));
        }
        scores.push((params, score));
    }

    let (index, best_score) = best.ok_or_else(|| MlError::InvalidSpace("no candidate parameters".to_string()))?;
    if best_score < space.base_score {
        return Err(MlError::NoCandidate {
            best_score,
            base_score: space.base_score,
        });
    }

    let params = scores[index].0.clone();
    info!("Best model {} with cross-validated accuracy {:.4}", params, best_score);
    let mut estimator = params.build();
    estimator.fit(x, y)?;

    Ok(SearchResult {
        params,
        estimator,
        best_score,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Matrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y = (0..30).map(|i| if i >= 15 { 1.0 } else { 0.0 }).collect();
        (Matrix::from_rows(&rows).unwrap(), y)
    }

    #[test]
    fn test_grid_expansion() {
        let grid = CandidateGrid::RandomForest {
            n_estimators: vec![10, 20],
            max_depth: vec![None, Some(3)],
            min_samples_split: vec![2],
            seed: 1,
        };
        assert_eq!(grid.expand().len(), 4);
        assert_eq!(ModelSpace::default().expand().len(), 4 + 2 + 2);
    }

    #[test]
    fn test_model_space_from_yaml() {
        let yaml = r#"
cv_folds: 4
base_score: 0.6
candidates:
  - kind: k_nearest
    n_neighbors: [3, 5]
    weights: [uniform, distance]
  - kind: random_forest
    n_estimators: [10]
    max_depth: [~, 4]
"#;
        let space: ModelSpace = serde_yaml::from_str(yaml).unwrap();
        space.validate().unwrap();
        assert_eq!(space.cv_folds, 4);
        assert_eq!(space.expand().len(), 6);
    }

    #[test]
    fn test_invalid_space() {
        let space = ModelSpace {
            cv_folds: 1,
            ..Default::default()
        };
        assert!(space.validate().is_err());
    }

    #[test]
    fn test_grid_search_picks_a_good_model() {
        let (x, y) = separable();
        let space = ModelSpace {
            cv_folds: 3,
            base_score: 0.8,
            candidates: vec![CandidateGrid::KNearest {
                n_neighbors: vec![1, 3],
                weights: vec![Weights::Uniform],
            }],
        };
        let result = grid_search(&space, &x, &y).unwrap();
        assert!(result.best_score >= 0.9);
        assert_eq!(result.scores.len(), 2);
        assert_eq!(result.estimator.predict_row(&[29.0, 2.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_no_candidate_above_base_score() {
        let (x, y) = separable();
        let space = ModelSpace {
            cv_folds: 3,
            base_score: 1.0,
            candidates: vec![CandidateGrid::LogisticRegression {
                learning_rate: vec![0.0],
                epochs: vec![1],
                l2: vec![0.0],
            }],
        };
        let err = grid_search(&space, &x, &y).unwrap_err();
        assert!(matches!(err, MlError::NoCandidate { .. }));
    }
}
