//! Random forest of gini decision trees

use super::{check_fit_input, check_width, Classifier};
use crate::data::Matrix;
use crate::ml::{binary_labels, MlError, MlResult};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Tree node stored in a flat arena; children are indices into it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Node {
    Leaf {
        /// Fraction of class-1 samples that reached the leaf
        probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTree")]
struct DecisionTree {
    nodes: Vec<Node>,
}

#[derive(Deserialize)]
struct RawTree {
    nodes: Vec<Node>,
}

impl TryFrom<RawTree> for DecisionTree {
    type Error = String;

    /// Children must point forward inside the arena, so traversal always ends at a leaf
    fn try_from(raw: RawTree) -> Result<Self, Self::Error> {
        if raw.nodes.is_empty() {
            return Err("decision tree has no nodes".to_string());
        }
        let n = raw.nodes.len();
        for (at, node) in raw.nodes.iter().enumerate() {
            if let Node::Split { left, right, .. } = node {
                for child in [*left, *right] {
                    if child <= at || child >= n {
                        return Err(format!(
                            "node {} points to child {} outside ({}, {})",
                            at, child, at, n
                        ));
                    }
                }
            }
        }
        Ok(DecisionTree { nodes: raw.nodes })
    }
}

struct TreeParams {
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: usize,
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl DecisionTree {
    fn fit(x: &Matrix, labels: &[bool], samples: Vec<usize>, params: &TreeParams, rng: &mut StdRng) -> Self {
        let mut tree = DecisionTree { nodes: Vec::new() };
        tree.grow(x, labels, samples, 0, params, rng);
        tree
    }

    /// Grow the subtree for `samples` and return its root index
    fn grow(
        &mut self,
        x: &Matrix,
        labels: &[bool],
        samples: Vec<usize>,
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let positives = samples.iter().filter(|&&i| labels[i]).count();
        let probability = positives as f64 / samples.len().max(1) as f64;
        let at = self.nodes.len();
        self.nodes.push(Node::Leaf { probability });

        let pure = positives == 0 || positives == samples.len();
        let too_deep = params.max_depth.is_some_and(|d| depth >= d);
        if pure || too_deep || samples.len() < params.min_samples_split {
            return at;
        }

        let Some((feature, threshold)) = best_split(x, labels, &samples, params.max_features, rng) else {
            return at;
        };
        let (left, right): (Vec<usize>, Vec<usize>) =
            samples.into_iter().partition(|&i| x.get(i, feature) <= threshold);

        let left = self.grow(x, labels, left, depth + 1, params, rng);
        let right = self.grow(x, labels, right, depth + 1, params, rng);
        self.nodes[at] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        at
    }

    /// Highest feature index any split reads
    fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }

    fn probability(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { probability } => return *probability,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Best gini split over a random subset of features, `None` when nothing separates
fn best_split(
    x: &Matrix,
    labels: &[bool],
    samples: &[usize],
    max_features: usize,
    rng: &mut StdRng,
) -> Option<(usize, f64)> {
    let total = samples.len();
    let total_pos = samples.iter().filter(|&&i| labels[i]).count();
    let parent = gini(total_pos, total);
    let mut best: Option<(f64, usize, f64)> = None;

    // Visit features in random order; past `max_features`, keep looking only
    // while no separating split has been found
    for (visited, feature) in sample(rng, x.cols(), x.cols()).into_iter().enumerate() {
        if visited >= max_features && best.is_some() {
            break;
        }
        let mut order: Vec<usize> = samples.to_vec();
        order.sort_by(|&a, &b| {
            x.get(a, feature)
                .partial_cmp(&x.get(b, feature))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_pos = 0;
        for k in 1..total {
            if labels[order[k - 1]] {
                left_pos += 1;
            }
            let lo = x.get(order[k - 1], feature);
            let hi = x.get(order[k], feature);
            if lo == hi {
                continue;
            }
            let left_n = k;
            let right_n = total - k;
            let impurity = (left_n as f64 * gini(left_pos, left_n)
                + right_n as f64 * gini(total_pos - left_pos, right_n))
                / total as f64;
            if impurity < parent - 1e-12 && best.map_or(true, |(b, _, _)| impurity < b) {
                best = Some((impurity, feature, (lo + hi) / 2.0));
            }
        }
    }
    best.map(|(_, feature, threshold)| (feature, threshold))
}

/// Bagged ensemble of decision trees with per-split feature subsampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawForest")]
pub struct RandomForest {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    seed: u64,
    #[serde(default)]
    n_features: usize,
    #[serde(default)]
    trees: Vec<DecisionTree>,
}

#[derive(Deserialize)]
struct RawForest {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    seed: u64,
    #[serde(default)]
    n_features: usize,
    #[serde(default)]
    trees: Vec<DecisionTree>,
}

impl TryFrom<RawForest> for RandomForest {
    type Error = String;

    fn try_from(raw: RawForest) -> Result<Self, Self::Error> {
        if let Some(feature) = raw.trees.iter().filter_map(DecisionTree::max_feature).max() {
            if feature >= raw.n_features {
                return Err(format!(
                    "split on feature {} but the forest was fitted on {} features",
                    feature, raw.n_features
                ));
            }
        }
        Ok(RandomForest {
            n_estimators: raw.n_estimators,
            max_depth: raw.max_depth,
            min_samples_split: raw.min_samples_split,
            seed: raw.seed,
            n_features: raw.n_features,
            trees: raw.trees,
        })
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize, max_depth: Option<usize>, min_samples_split: usize, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            max_depth,
            min_samples_split: min_samples_split.max(2),
            seed,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    /// Mean class-1 probability over the trees
    pub fn predict_proba_row(&self, row: &[f64]) -> MlResult<f64> {
        if self.trees.is_empty() {
            return Err(MlError::EmptyInput);
        }
        check_width(self.n_features, row)?;
        let sum: f64 = self.trees.iter().map(|t| t.probability(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> MlResult<()> {
        check_fit_input(x, y)?;
        let labels = binary_labels(y)?;
        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: ((x.cols() as f64).sqrt().round() as usize).max(1),
        };
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = x.rows();

        self.trees = (0..self.n_estimators)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, &labels, bootstrap, &params, &mut rng)
            })
            .collect();
        self.n_features = x.cols();
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> MlResult<f64> {
        Ok(if self.predict_proba_row(row)? > 0.5 { 1.0 } else { 0.0 })
    }
}
