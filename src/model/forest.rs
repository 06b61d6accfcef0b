//! Bagged tree ensembles
//!
//! Random forest: bootstrap samples and best thresholds. Extra trees: the
//! full training set and random thresholds. Tree `i` draws from its own
//! ChaCha stream seeded with `random_state + i`, so trees can be grown in
//! parallel and still come out identical to a sequential run.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, Splitter, TreeParams};
use super::{check_features, check_training_data, invalid, ModelError, Regressor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; all when None
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub random_state: u64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        RandomForestConfig {
            n_estimators: 400,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            random_state: 73,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraTreesConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub random_state: u64,
}

impl Default for ExtraTreesConfig {
    fn default() -> Self {
        ExtraTreesConfig {
            n_estimators: 400,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: false,
            random_state: 73,
        }
    }
}

/// Settings shared by both forest flavours
#[derive(Debug, Clone, PartialEq)]
struct ForestSettings {
    n_estimators: usize,
    bootstrap: bool,
    random_state: u64,
    tree: TreeParams,
}

/// Averaging ensemble of independently grown regression trees
#[derive(Debug, Clone)]
pub struct ForestRegressor {
    settings: ForestSettings,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl ForestRegressor {
    pub fn random_forest(config: RandomForestConfig) -> Self {
        Self::with_settings(ForestSettings {
            n_estimators: config.n_estimators,
            bootstrap: config.bootstrap,
            random_state: config.random_state,
            tree: TreeParams {
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                min_samples_leaf: config.min_samples_leaf,
                max_features: config.max_features,
                splitter: Splitter::Best,
                seed: config.random_state,
            },
        })
    }

    pub fn extra_trees(config: ExtraTreesConfig) -> Self {
        Self::with_settings(ForestSettings {
            n_estimators: config.n_estimators,
            bootstrap: config.bootstrap,
            random_state: config.random_state,
            tree: TreeParams {
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                min_samples_leaf: config.min_samples_leaf,
                max_features: config.max_features,
                splitter: Splitter::Random,
                seed: config.random_state,
            },
        })
    }

    fn with_settings(settings: ForestSettings) -> Self {
        ForestRegressor {
            settings,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn grow_tree(
        &self,
        index: usize,
        x: &ArrayView2<f64>,
        y: &ArrayView1<f64>,
    ) -> Result<RegressionTree, ModelError> {
        let seed = self.settings.random_state.wrapping_add(index as u64);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = x.nrows();

        let samples: Vec<usize> = if self.settings.bootstrap {
            (0..n).map(|_| rng.gen_range(0..n)).collect()
        } else {
            (0..n).collect()
        };

        let mut tree = RegressionTree::new(TreeParams {
            seed,
            ..self.settings.tree.clone()
        });
        tree.fit_samples(x, y, samples, &mut rng)?;
        Ok(tree)
    }
}

impl Regressor for ForestRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), ModelError> {
        if self.settings.n_estimators == 0 {
            return Err(invalid("n_estimators", "must be at least 1"));
        }
        self.settings.tree.validate()?;
        check_training_data(&x, &y)?;

        let trees: Result<Vec<RegressionTree>, ModelError> = (0..self.settings.n_estimators)
            .into_par_iter()
            .map(|i| self.grow_tree(i, &x, &y))
            .collect();

        self.trees = trees?;
        self.n_features = x.ncols();
        log::debug!(
            "Grew {} trees ({})",
            self.trees.len(),
            if self.settings.bootstrap {
                "bootstrap"
            } else {
                "full sample"
            }
        );
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_features(self.n_features, &x)?;

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_, _>>()?;

        // Summed in tree order so the average does not depend on scheduling
        let mut total: Array1<f64> = Array1::zeros(x.nrows());
        for predictions in &per_tree {
            total += predictions;
        }
        Ok(total / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Axis};

    fn noisy_line(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                ((i * 7) % 5) as f64
            }
        });
        let y = x.column(0).mapv(|v| 2.0 * v) + x.column(1).mapv(|v| 0.1 * v);
        (x, y)
    }

    #[test]
    fn test_random_forest_tracks_trend() {
        let (x, y) = noisy_line(40);
        let mut forest = ForestRegressor::random_forest(RandomForestConfig {
            n_estimators: 25,
            ..Default::default()
        });
        forest.fit(x.view(), y.view()).unwrap();
        assert_eq!(forest.n_trees(), 25);

        let predictions = forest.predict(x.view()).unwrap();
        let first = predictions[0];
        let last = predictions[39];
        assert!(last - first > 50.0, "{} .. {}", first, last);
    }

    #[test]
    fn test_extra_trees_without_bootstrap_fits_training_set() {
        let (x, y) = noisy_line(20);
        let mut forest = ForestRegressor::extra_trees(ExtraTreesConfig {
            n_estimators: 10,
            ..Default::default()
        });
        forest.fit(x.view(), y.view()).unwrap();

        // Fully grown trees on distinct rows reproduce every target
        let predictions = forest.predict(x.view()).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = noisy_line(30);
        let config = RandomForestConfig {
            n_estimators: 8,
            random_state: 5,
            ..Default::default()
        };
        let mut a = ForestRegressor::random_forest(config.clone());
        let mut b = ForestRegressor::random_forest(config);
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();

        let pa = a.predict(x.view()).unwrap();
        let pb = b.predict(x.view()).unwrap();
        assert!(pa.iter().zip(pb.iter()).all(|(l, r)| l.to_bits() == r.to_bits()));
    }

    #[test]
    fn test_zero_trees_rejected() {
        let (x, y) = noisy_line(10);
        let mut forest = ForestRegressor::random_forest(RandomForestConfig {
            n_estimators: 0,
            ..Default::default()
        });
        assert!(matches!(
            forest.fit(x.view(), y.view()),
            Err(ModelError::InvalidParameter { param: "n_estimators", .. })
        ));
    }

    #[test]
    fn test_predict_checks_width() {
        let (x, y) = noisy_line(10);
        let mut forest = ForestRegressor::random_forest(RandomForestConfig {
            n_estimators: 2,
            ..Default::default()
        });
        forest.fit(x.view(), y.view()).unwrap();
        let narrow = x.select(Axis(1), &[0]);
        assert!(matches!(
            forest.predict(narrow.view()),
            Err(ModelError::DimensionMismatch { expected: 2, got: 1 })
        ));
    }
}
