//! CART regression tree
//!
//! Squared-error splits over the samples reaching each node. The `Best`
//! splitter scans every distinct threshold of a feature; the `Random`
//! splitter draws one threshold uniformly between the feature's node
//! minimum and maximum, as extremely randomized trees do.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{check_features, check_training_data, invalid, ModelError, Regressor};

/// Threshold search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Splitter {
    Best,
    Random,
}

/// Growth limits and split strategy of a single tree
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    /// Unlimited when None
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; all when None
    pub max_features: Option<usize>,
    pub splitter: Splitter,
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            splitter: Splitter::Best,
            seed: 0,
        }
    }
}

impl TreeParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.max_depth == Some(0) {
            return Err(invalid("max_depth", "must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(invalid("min_samples_split", "must be at least 2"));
        }
        if self.min_samples_leaf == 0 {
            return Err(invalid("min_samples_leaf", "must be at least 1"));
        }
        if self.max_features == Some(0) {
            return Err(invalid("max_features", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Count, sum and range of the targets in a node
#[derive(Debug, Clone, Copy)]
struct NodeStats {
    n: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl NodeStats {
    fn of(y: &ArrayView1<f64>, samples: &[usize]) -> Self {
        let empty = NodeStats {
            n: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        };
        samples.iter().fold(empty, |s, &i| NodeStats {
            n: s.n + 1,
            sum: s.sum + y[i],
            min: s.min.min(y[i]),
            max: s.max.max(y[i]),
        })
    }

    fn mean(&self) -> f64 {
        self.sum / self.n as f64
    }

    /// All targets identical, whatever their scale or offset
    fn is_pure(&self) -> bool {
        self.max <= self.min
    }
}

/// sum_l^2 / n_l + sum_r^2 / n_r; maximising it minimises the children's squared error
fn split_proxy(left_sum: f64, left_n: usize, right_sum: f64, right_n: usize) -> f64 {
    left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64
}

/// A fitted (or empty) regression tree stored as an arena of nodes
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    params: TreeParams,
    nodes: Vec<Node>,
    n_features: usize,
}

impl RegressionTree {
    pub fn new(params: TreeParams) -> Self {
        RegressionTree {
            params,
            nodes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Longest root-to-leaf path, counting edges
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            match self.nodes.get(id) {
                Some(Node::Split { left, right, .. }) => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
                Some(Node::Leaf { .. }) => deepest = deepest.max(depth),
                None => {}
            }
        }
        deepest
    }

    /// Grow the tree on a multiset of sample rows
    ///
    /// Rows may repeat, which is how bootstrap samples are passed in. The
    /// rng drives feature order and random thresholds.
    pub(crate) fn fit_samples(
        &mut self,
        x: &ArrayView2<f64>,
        y: &ArrayView1<f64>,
        samples: Vec<usize>,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), ModelError> {
        self.params.validate()?;
        if samples.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        self.n_features = x.ncols();
        self.nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack = vec![(0usize, samples, 0usize)];

        while let Some((id, samples, depth)) = stack.pop() {
            let stats = NodeStats::of(y, &samples);
            let leaf = Node::Leaf {
                value: stats.mean(),
            };

            if self.is_terminal(&stats, depth) {
                self.nodes[id] = leaf;
                continue;
            }

            match self.find_split(x, y, &samples, stats.sum, rng) {
                Some((feature, threshold)) => {
                    let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                        .iter()
                        .partition(|&&i| x[[i, feature]] <= threshold);

                    let left = self.nodes.len();
                    let right = left + 1;
                    self.nodes.push(Node::Leaf { value: 0.0 });
                    self.nodes.push(Node::Leaf { value: 0.0 });
                    self.nodes[id] = Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    };
                    stack.push((right, right_samples, depth + 1));
                    stack.push((left, left_samples, depth + 1));
                }
                None => self.nodes[id] = leaf,
            }
        }

        Ok(())
    }

    fn is_terminal(&self, stats: &NodeStats, depth: usize) -> bool {
        self.params.max_depth.map_or(false, |max| depth >= max)
            || stats.n < self.params.min_samples_split
            || stats.n < 2 * self.params.min_samples_leaf
            || stats.is_pure()
    }

    fn find_split(
        &self,
        x: &ArrayView2<f64>,
        y: &ArrayView1<f64>,
        samples: &[usize],
        total: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64)> {
        let n_features = x.ncols();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(rng);
        let max_features = self
            .params
            .max_features
            .map_or(n_features, |m| m.min(n_features));

        let mut best: Option<(usize, f64, f64)> = None;
        for &feature in features.iter().take(max_features) {
            let candidate = match self.params.splitter {
                Splitter::Best => self.best_threshold(x, y, samples, feature, total),
                Splitter::Random => self.random_threshold(x, y, samples, feature, total, rng),
            };
            if let Some((threshold, proxy)) = candidate {
                if best.map_or(true, |(_, _, b)| proxy > b) {
                    best = Some((feature, threshold, proxy));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    fn best_threshold(
        &self,
        x: &ArrayView2<f64>,
        y: &ArrayView1<f64>,
        samples: &[usize],
        feature: usize,
        total: f64,
    ) -> Option<(f64, f64)> {
        let mut sorted: Vec<(f64, f64)> = samples.iter().map(|&i| (x[[i, feature]], y[i])).collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = sorted.len();
        let min_leaf = self.params.min_samples_leaf;
        let mut left_sum = 0.0;
        let mut best: Option<(f64, f64)> = None;

        for pos in 1..n {
            left_sum += sorted[pos - 1].1;
            if pos < min_leaf || n - pos < min_leaf {
                continue;
            }
            let (lo, hi) = (sorted[pos - 1].0, sorted[pos].0);
            // No threshold separates equal values
            if lo >= hi {
                continue;
            }

            let proxy = split_proxy(left_sum, pos, total - left_sum, n - pos);
            if best.map_or(true, |(_, b)| proxy > b) {
                let mut threshold = lo / 2.0 + hi / 2.0;
                if threshold >= hi || !threshold.is_finite() {
                    threshold = lo;
                }
                best = Some((threshold, proxy));
            }
        }

        best
    }

    fn random_threshold(
        &self,
        x: &ArrayView2<f64>,
        y: &ArrayView1<f64>,
        samples: &[usize],
        feature: usize,
        total: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<(f64, f64)> {
        let (lo, hi) = samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let v = x[[i, feature]];
            (lo.min(v), hi.max(v))
        });
        if hi <= lo {
            return None;
        }

        let threshold = rng.gen_range(lo..hi);
        let (left_n, left_sum) = samples
            .iter()
            .filter(|&&i| x[[i, feature]] <= threshold)
            .fold((0usize, 0.0), |(n, s), &i| (n + 1, s + y[i]));
        let right_n = samples.len() - left_n;

        let min_leaf = self.params.min_samples_leaf;
        if left_n < min_leaf || right_n < min_leaf {
            return None;
        }

        Some((threshold, split_proxy(left_sum, left_n, total - left_sum, right_n)))
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

impl Regressor for RegressionTree {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), ModelError> {
        check_training_data(&x, &y)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        let samples: Vec<usize> = (0..x.nrows()).collect();
        self.fit_samples(&x, &y, samples, &mut rng)
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        check_features(self.n_features, &x)?;
        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }
}
