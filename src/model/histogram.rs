//! Feature binning and histogram trees
//!
//! Continuous features are mapped to at most 255 ordinal bins once per
//! fit. Trees then search splits over per-bin gradient sums instead of
//! sorted raw values, and grow best-first: the leaf whose best split gains
//! the most is expanded next, until the leaf budget is spent.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::seq::index;
use rand_chacha::ChaCha8Rng;

use super::{invalid, ModelError};

/// Largest supported bin count; bin indices fit in a byte
pub const MAX_BINS: usize = 255;

/// Rows used to learn bin edges on large inputs
const BINNING_SUBSAMPLE: usize = 200_000;

/// Per-feature bin edges
///
/// A value falls in bin `b` when it is above edge `b - 1` and at most edge
/// `b`, so `value <= edge(b)` is the same test in raw and binned space.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBinner {
    edges: Vec<Vec<f64>>,
}

impl FeatureBinner {
    /// Learn edges: midpoints between distinct values when there are few,
    /// otherwise evenly spaced quantiles
    pub fn fit(
        x: &ArrayView2<f64>,
        max_bins: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self, ModelError> {
        if !(2..=MAX_BINS).contains(&max_bins) {
            return Err(invalid(
                "max_bins",
                format!("must be between 2 and {}, got {}", MAX_BINS, max_bins),
            ));
        }

        let rows: Vec<usize> = if x.nrows() > BINNING_SUBSAMPLE {
            let mut rows = index::sample(rng, x.nrows(), BINNING_SUBSAMPLE).into_vec();
            rows.sort_unstable();
            rows
        } else {
            (0..x.nrows()).collect()
        };

        let edges = x
            .columns()
            .into_iter()
            .map(|column| {
                let mut values: Vec<f64> = rows.iter().map(|&i| column[i]).collect();
                values.sort_by(|a, b| a.total_cmp(b));
                feature_edges(&values, max_bins)
            })
            .collect();

        Ok(FeatureBinner { edges })
    }

    pub fn n_features(&self) -> usize {
        self.edges.len()
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.edges[feature].len() + 1
    }

    /// Upper edge of a bin; the split threshold for "bin <= b"
    pub fn edge(&self, feature: usize, bin: usize) -> f64 {
        self.edges[feature][bin]
    }

    pub fn bin(&self, feature: usize, value: f64) -> u8 {
        self.edges[feature].partition_point(|&edge| edge < value) as u8
    }

    pub fn transform(&self, x: &ArrayView2<f64>) -> Array2<u8> {
        Array2::from_shape_fn(x.dim(), |(i, j)| self.bin(j, x[[i, j]]))
    }
}

fn feature_edges(sorted: &[f64], max_bins: usize) -> Vec<f64> {
    let mut distinct = sorted.to_vec();
    distinct.dedup();

    if distinct.len() <= max_bins {
        return distinct.windows(2).map(|w| w[0] / 2.0 + w[1] / 2.0).collect();
    }

    let last = (sorted.len() - 1) as f64;
    let mut edges: Vec<f64> = (1..max_bins)
        .map(|k| {
            let position = last * k as f64 / max_bins as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let weight = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        })
        .collect();
    edges.dedup();
    edges
}

/// Growth limits of a histogram tree
#[derive(Debug, Clone, PartialEq)]
pub struct HistTreeParams {
    pub max_leaf_nodes: Option<usize>,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub l2_regularization: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum HistNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        bin: u8,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitInfo {
    gain: f64,
    feature: usize,
    bin: u8,
}

struct OpenLeaf {
    node: usize,
    samples: Vec<usize>,
    depth: usize,
    split: Option<SplitInfo>,
}

/// Tree fitted to squared-error gradients over binned features
#[derive(Debug, Clone, PartialEq)]
pub struct HistTree {
    nodes: Vec<HistNode>,
}

impl HistTree {
    /// Grow one tree on the gradients of the current ensemble
    ///
    /// Leaf values are the regularized Newton step scaled by `shrinkage`;
    /// the squared-error hessian is 1 for every sample.
    pub fn grow(
        binned: &ArrayView2<u8>,
        binner: &FeatureBinner,
        gradients: &[f64],
        params: &HistTreeParams,
        shrinkage: f64,
    ) -> Self {
        let grower = Grower {
            binned: binned.view(),
            binner,
            gradients,
            params,
            shrinkage,
        };
        grower.run()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, HistNode::Leaf { .. }))
            .count()
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                HistNode::Leaf { value } => return *value,
                HistNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => id = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }

    pub fn predict_binned(&self, row: ArrayView1<u8>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                HistNode::Leaf { value } => return *value,
                HistNode::Split {
                    feature,
                    bin,
                    left,
                    right,
                    ..
                } => id = if row[*feature] <= *bin { *left } else { *right },
            }
        }
    }
}

struct Grower<'a> {
    binned: ArrayView2<'a, u8>,
    binner: &'a FeatureBinner,
    gradients: &'a [f64],
    params: &'a HistTreeParams,
    shrinkage: f64,
}

impl Grower<'_> {
    fn run(&self) -> HistTree {
        let all: Vec<usize> = (0..self.binned.nrows()).collect();
        let mut nodes = vec![self.leaf(&all)];
        let mut open = vec![self.open_leaf(0, all, 0)];
        let max_leaves = self.params.max_leaf_nodes.unwrap_or(usize::MAX);
        let mut n_leaves = 1;

        while n_leaves < max_leaves {
            // Highest gain first; the earliest opened leaf wins ties
            let mut chosen: Option<(usize, SplitInfo)> = None;
            for (pos, leaf) in open.iter().enumerate() {
                if let Some(split) = leaf.split {
                    if chosen.map_or(true, |(_, best)| split.gain > best.gain) {
                        chosen = Some((pos, split));
                    }
                }
            }
            let Some((pos, split)) = chosen else {
                break;
            };

            let leaf = open.remove(pos);
            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = leaf
                .samples
                .iter()
                .partition(|&&i| self.binned[[i, split.feature]] <= split.bin);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(self.leaf(&left_samples));
            nodes.push(self.leaf(&right_samples));
            nodes[leaf.node] = HistNode::Split {
                feature: split.feature,
                bin: split.bin,
                threshold: self.binner.edge(split.feature, split.bin as usize),
                left,
                right,
            };

            open.push(self.open_leaf(left, left_samples, leaf.depth + 1));
            open.push(self.open_leaf(right, right_samples, leaf.depth + 1));
            n_leaves += 1;
        }

        HistTree { nodes }
    }

    fn leaf(&self, samples: &[usize]) -> HistNode {
        let sum: f64 = samples.iter().map(|&i| self.gradients[i]).sum();
        let value = -sum / (samples.len() as f64 + self.params.l2_regularization);
        HistNode::Leaf {
            value: value * self.shrinkage,
        }
    }

    fn open_leaf(&self, node: usize, samples: Vec<usize>, depth: usize) -> OpenLeaf {
        let splittable = self.params.max_depth.map_or(true, |max| depth < max)
            && samples.len() >= 2 * self.params.min_samples_leaf;
        let split = if splittable {
            self.best_split(&samples)
        } else {
            None
        };
        OpenLeaf {
            node,
            samples,
            depth,
            split,
        }
    }

    fn best_split(&self, samples: &[usize]) -> Option<SplitInfo> {
        let lambda = self.params.l2_regularization;
        let min_leaf = self.params.min_samples_leaf;
        let n = samples.len();
        let total: f64 = samples.iter().map(|&i| self.gradients[i]).sum();
        let parent_score = total * total / (n as f64 + lambda);

        let mut best: Option<SplitInfo> = None;
        for feature in 0..self.binner.n_features() {
            let n_bins = self.binner.n_bins(feature);
            let mut grad_hist = vec![0.0; n_bins];
            let mut count_hist = vec![0usize; n_bins];
            for &i in samples {
                let bin = self.binned[[i, feature]] as usize;
                grad_hist[bin] += self.gradients[i];
                count_hist[bin] += 1;
            }

            let mut left_grad = 0.0;
            let mut left_n = 0;
            for bin in 0..n_bins - 1 {
                left_grad += grad_hist[bin];
                left_n += count_hist[bin];
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }
                let right_grad = total - left_grad;
                let gain = left_grad * left_grad / (left_n as f64 + lambda)
                    + right_grad * right_grad / (right_n as f64 + lambda)
                    - parent_score;
                if gain > 0.0 && best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitInfo {
                        gain,
                        feature,
                        bin: bin as u8,
                    });
                }
            }
        }
        best
    }
}
