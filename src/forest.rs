//! Random forest regression over multiple outputs.
//!
//! Each tree is grown on a bootstrap sample of the training rows. Every
//! feature is considered at every split and the split criterion is the
//! squared error summed over all outputs, so one forest predicts all targets
//! jointly. The forest prediction is the mean of the tree predictions.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ForestError;

/// Forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the ensemble.
    pub n_estimators: usize,

    /// Seed for bootstrap sampling. Each tree derives its own seed from it,
    /// so the fitted forest does not depend on thread scheduling.
    pub seed: u64,

    /// Maximum tree depth; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,

    /// Minimum number of samples required to split a node.
    pub min_samples_split: usize,

    /// Minimum number of samples in each child of a split.
    pub min_samples_leaf: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl ForestConfig {
    fn validate(&self) -> Result<(), ForestError> {
        if self.n_estimators == 0 {
            return Err(ForestError::InvalidConfig(
                "n_estimators must be positive".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(ForestError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ForestError::InvalidConfig(
                "min_samples_leaf must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn tree_seed(&self, tree: usize) -> u64 {
        self.seed ^ (tree as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Best split found for a node.
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

/// A single regression tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grows a tree on the given sample indices (duplicates allowed).
    fn fit(x: &DMatrix<f64>, y: &DMatrix<f64>, samples: Vec<usize>, config: &ForestConfig) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, samples, 0, config);
        tree
    }

    fn grow(
        &mut self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        samples: Vec<usize>,
        depth: usize,
        config: &ForestConfig,
    ) -> usize {
        let idx = self.nodes.len();
        let value = mean_targets(y, &samples);

        let depth_reached = config.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || samples.len() < config.min_samples_split || is_pure(y, &samples) {
            self.nodes.push(Node::Leaf { value });
            return idx;
        }

        let Some(split) = best_split(x, y, &samples, config.min_samples_leaf) else {
            self.nodes.push(Node::Leaf { value });
            return idx;
        };

        // Reserve the slot; children are appended after it
        self.nodes.push(Node::Leaf { value });

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&s| x[(s, split.feature)] <= split.threshold);

        let left = self.grow(x, y, left_samples, depth + 1, config);
        let right = self.grow(x, y, right_samples, depth + 1, config);

        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    /// Returns the leaf value reached by a feature row.
    fn predict_row(&self, row: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf (root-only tree has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

/// Bagged ensemble of regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    n_features: usize,
    n_outputs: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Fits the forest on a feature matrix (samples × features) and a target
    /// matrix (samples × outputs).
    ///
    /// Trees are grown in parallel.
    pub fn fit(
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        config: ForestConfig,
    ) -> Result<Self, ForestError> {
        config.validate()?;

        let n = x.nrows();
        if n == 0 || x.ncols() == 0 || y.ncols() == 0 {
            return Err(ForestError::EmptyTrainingSet);
        }
        if y.nrows() != n {
            return Err(ForestError::ShapeMismatch {
                features: n,
                targets: y.nrows(),
            });
        }

        let trees: Vec<RegressionTree> = (0..config.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(config.tree_seed(t));
                let samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, samples, &config)
            })
            .collect();

        Ok(Self {
            n_features: x.ncols(),
            n_outputs: y.ncols(),
            config,
            trees,
        })
    }

    /// Predicts all outputs for one feature row.
    pub fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ForestError> {
        if features.len() != self.n_features {
            return Err(ForestError::FeatureCount {
                expected: self.n_features,
                actual: features.len(),
            });
        }

        let mut sums = vec![0.0; self.n_outputs];
        for tree in &self.trees {
            for (sum, value) in sums.iter_mut().zip(tree.predict_row(features)) {
                *sum += value;
            }
        }

        let count = self.trees.len() as f64;
        Ok(sums.into_iter().map(|s| s / count).collect())
    }

    /// Predicts every row of a feature matrix.
    pub fn predict_matrix(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, ForestError> {
        let mut out = DMatrix::zeros(x.nrows(), self.n_outputs);
        for r in 0..x.nrows() {
            let row: Vec<f64> = x.row(r).iter().copied().collect();
            for (c, value) in self.predict(&row)?.into_iter().enumerate() {
                out[(r, c)] = value;
            }
        }
        Ok(out)
    }

    /// Number of input features the forest was fitted on.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of outputs predicted per row.
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// The fitted trees.
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// The configuration used for fitting.
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

// === Helper Functions ===

fn mean_targets(y: &DMatrix<f64>, samples: &[usize]) -> Vec<f64> {
    let n = samples.len().max(1) as f64;
    (0..y.ncols())
        .map(|c| samples.iter().map(|&s| y[(s, c)]).sum::<f64>() / n)
        .collect()
}

fn is_pure(y: &DMatrix<f64>, samples: &[usize]) -> bool {
    let Some(&first) = samples.first() else {
        return true;
    };
    samples
        .iter()
        .all(|&s| (0..y.ncols()).all(|c| y[(s, c)] == y[(first, c)]))
}

/// Finds the split minimising the summed squared error of the children.
///
/// Minimising child SSE is equivalent to maximising
/// Σ_outputs (sum_left² / n_left + sum_right² / n_right), which only needs
/// running sums. Ties keep the first candidate (lowest feature, lowest
/// threshold).
fn best_split(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    samples: &[usize],
    min_samples_leaf: usize,
) -> Option<SplitCandidate> {
    let n = samples.len();
    let n_outputs = y.ncols();

    let totals: Vec<f64> = (0..n_outputs)
        .map(|c| samples.iter().map(|&s| y[(s, c)]).sum())
        .collect();
    let parent_score: f64 = totals.iter().map(|t| t * t / n as f64).sum();

    let mut best: Option<SplitCandidate> = None;
    let mut order: Vec<usize> = samples.to_vec();
    let mut left_sums = vec![0.0; n_outputs];

    for feature in 0..x.ncols() {
        order.sort_by(|&a, &b| x[(a, feature)].total_cmp(&x[(b, feature)]));
        left_sums.iter_mut().for_each(|s| *s = 0.0);

        for i in 0..n - 1 {
            let s = order[i];
            for (c, sum) in left_sums.iter_mut().enumerate() {
                *sum += y[(s, c)];
            }

            let current = x[(s, feature)];
            let next = x[(order[i + 1], feature)];
            if current >= next {
                continue;
            }

            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_samples_leaf || n_right < min_samples_leaf {
                continue;
            }

            let score: f64 = left_sums
                .iter()
                .zip(&totals)
                .map(|(l, t)| {
                    let r = t - l;
                    l * l / n_left as f64 + r * r / n_right as f64
                })
                .sum();

            if score > parent_score + 1e-12 && best.as_ref().is_none_or(|b| score > b.score) {
                let mut threshold = (current + next) / 2.0;
                if threshold >= next {
                    threshold = current;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }

    best
}
