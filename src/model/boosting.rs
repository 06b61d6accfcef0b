//! Gradient boosting for squared error
//!
//! Both flavours start from the target mean and add trees fitted to the
//! current residuals. The exact variant grows depth-limited CART trees on
//! raw values; the histogram variant grows leaf-limited trees on binned
//! features.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::histogram::{FeatureBinner, HistTree, HistTreeParams, MAX_BINS};
use super::tree::{RegressionTree, Splitter, TreeParams};
use super::{check_features, check_training_data, invalid, ModelError, Regressor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingConfig {
    pub learning_rate: f64,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn without replacement for each tree
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        GradientBoostingConfig {
            learning_rate: 0.05,
            n_estimators: 300,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 73,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistGradientBoostingConfig {
    pub learning_rate: f64,
    pub max_iter: usize,
    pub max_depth: Option<usize>,
    pub max_leaf_nodes: Option<usize>,
    pub min_samples_leaf: usize,
    pub l2_regularization: f64,
    pub max_bins: usize,
    pub random_state: u64,
}

impl Default for HistGradientBoostingConfig {
    fn default() -> Self {
        HistGradientBoostingConfig {
            learning_rate: 0.05,
            max_iter: 100,
            max_depth: Some(5),
            max_leaf_nodes: Some(31),
            min_samples_leaf: 20,
            l2_regularization: 0.0,
            max_bins: MAX_BINS,
            random_state: 73,
        }
    }
}

fn check_learning_rate(learning_rate: f64) -> Result<(), ModelError> {
    if !(learning_rate.is_finite() && learning_rate > 0.0) {
        return Err(invalid(
            "learning_rate",
            format!("must be positive, got {}", learning_rate),
        ));
    }
    Ok(())
}

fn mean(values: &ArrayView1<f64>) -> f64 {
    values.sum() / values.len() as f64
}

fn mean_squared_error(y: &ArrayView1<f64>, predictions: &Array1<f64>) -> f64 {
    y.iter()
        .zip(predictions.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y.len() as f64
}

/// Gradient boosting over exact CART trees
#[derive(Debug, Clone)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    baseline: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        GradientBoostingRegressor {
            config,
            baseline: 0.0,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: Some(self.config.max_depth),
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: None,
            splitter: Splitter::Best,
            seed: self.config.random_state,
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        check_learning_rate(self.config.learning_rate)?;
        if self.config.n_estimators == 0 {
            return Err(invalid("n_estimators", "must be at least 1"));
        }
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0) {
            return Err(invalid(
                "subsample",
                format!("must be in (0, 1], got {}", self.config.subsample),
            ));
        }
        self.tree_params().validate()
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), ModelError> {
        self.validate()?;
        check_training_data(&x, &y)?;

        let n = x.nrows();
        let n_sampled = ((self.config.subsample * n as f64) as usize).clamp(1, n);
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);

        self.baseline = mean(&y);
        self.n_features = x.ncols();
        self.trees = Vec::with_capacity(self.config.n_estimators);
        let mut predictions = Array1::from_elem(n, self.baseline);

        for _ in 0..self.config.n_estimators {
            let residuals = &y - &predictions;
            let samples: Vec<usize> = if n_sampled < n {
                let mut rows = index::sample(&mut rng, n, n_sampled).into_vec();
                rows.sort_unstable();
                rows
            } else {
                (0..n).collect()
            };

            let mut tree = RegressionTree::new(self.tree_params());
            tree.fit_samples(&x, &residuals.view(), samples, &mut rng)?;
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
            self.trees.push(tree);
        }

        log::debug!(
            "Gradient boosting: {} trees, training MSE {:.6}",
            self.trees.len(),
            mean_squared_error(&y, &predictions)
        );
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_features(self.n_features, &x)?;

        let mut predictions = Array1::from_elem(x.nrows(), self.baseline);
        for tree in &self.trees {
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(predictions)
    }
}

/// Gradient boosting over histogram trees
#[derive(Debug, Clone)]
pub struct HistGradientBoostingRegressor {
    config: HistGradientBoostingConfig,
    baseline: f64,
    trees: Vec<HistTree>,
    n_features: usize,
}

impl HistGradientBoostingRegressor {
    pub fn new(config: HistGradientBoostingConfig) -> Self {
        HistGradientBoostingRegressor {
            config,
            baseline: 0.0,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        check_learning_rate(self.config.learning_rate)?;
        if self.config.max_iter == 0 {
            return Err(invalid("max_iter", "must be at least 1"));
        }
        if matches!(self.config.max_leaf_nodes, Some(n) if n < 2) {
            return Err(invalid("max_leaf_nodes", "must be at least 2"));
        }
        if self.config.max_depth == Some(0) {
            return Err(invalid("max_depth", "must be at least 1"));
        }
        if self.config.min_samples_leaf == 0 {
            return Err(invalid("min_samples_leaf", "must be at least 1"));
        }
        if !(self.config.l2_regularization >= 0.0) {
            return Err(invalid("l2_regularization", "must be non-negative"));
        }
        Ok(())
    }
}

impl Regressor for HistGradientBoostingRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), ModelError> {
        self.validate()?;
        check_training_data(&x, &y)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        let binner = FeatureBinner::fit(&x, self.config.max_bins, &mut rng)?;
        let binned = binner.transform(&x);
        let params = HistTreeParams {
            max_leaf_nodes: self.config.max_leaf_nodes,
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            l2_regularization: self.config.l2_regularization,
        };

        self.baseline = mean(&y);
        self.n_features = x.ncols();
        self.trees = Vec::with_capacity(self.config.max_iter);
        let mut predictions = Array1::from_elem(x.nrows(), self.baseline);

        for _ in 0..self.config.max_iter {
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(y.iter())
                .map(|(p, t)| p - t)
                .collect();
            let tree = HistTree::grow(
                &binned.view(),
                &binner,
                &gradients,
                &params,
                self.config.learning_rate,
            );
            for (prediction, row) in predictions.iter_mut().zip(binned.rows()) {
                *prediction += tree.predict_binned(row);
            }
            self.trees.push(tree);
        }

        log::debug!(
            "Histogram boosting: {} trees, training MSE {:.6}",
            self.trees.len(),
            mean_squared_error(&y, &predictions)
        );
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_features(self.n_features, &x)?;

        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                self.trees
                    .iter()
                    .fold(self.baseline, |acc, tree| acc + tree.predict_row(row))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn wave(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                i as f64 / n as f64
            } else {
                (i % 3) as f64
            }
        });
        let y = x
            .rows()
            .into_iter()
            .map(|r| (if r[0] < 0.5 { -1.0 } else { 1.0 }) + 0.2 * r[1])
            .collect();
        (x, y)
    }

    fn mse(model: &dyn Regressor, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        let predictions = model.predict(x.view()).unwrap();
        mean_squared_error(&y.view(), &predictions)
    }

    #[test]
    fn test_gradient_boosting_reduces_error() {
        let (x, y) = wave(60);
        let variance = mean_squared_error(&y.view(), &Array1::from_elem(60, mean(&y.view())));

        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 100,
            ..Default::default()
        });
        model.fit(x.view(), y.view()).unwrap();
        assert!(mse(&model, &x, &y) < 0.05 * variance);
    }

    #[test]
    fn test_more_rounds_fit_better() {
        let (x, y) = wave(60);
        let fit = |rounds| {
            let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
                n_estimators: rounds,
                ..Default::default()
            });
            model.fit(x.view(), y.view()).unwrap();
            mse(&model, &x, &y)
        };
        assert!(fit(50) < fit(5));
    }

    #[test]
    fn test_subsampled_boosting_is_seeded() {
        let (x, y) = wave(50);
        let config = GradientBoostingConfig {
            n_estimators: 20,
            subsample: 0.5,
            ..Default::default()
        };
        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(a.predict(x.view()).unwrap(), b.predict(x.view()).unwrap());
    }

    #[test]
    fn test_invalid_hyperparameters_fail_fit() {
        let (x, y) = wave(10);
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            learning_rate: -0.1,
            ..Default::default()
        });
        assert!(matches!(
            model.fit(x.view(), y.view()),
            Err(ModelError::InvalidParameter { param: "learning_rate", .. })
        ));

        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            subsample: 0.0,
            ..Default::default()
        });
        assert!(model.fit(x.view(), y.view()).is_err());

        let mut model = HistGradientBoostingRegressor::new(HistGradientBoostingConfig {
            max_leaf_nodes: Some(1),
            ..Default::default()
        });
        assert!(matches!(
            model.fit(x.view(), y.view()),
            Err(ModelError::InvalidParameter { param: "max_leaf_nodes", .. })
        ));
    }

    #[test]
    fn test_hist_boosting_learns_step() {
        let (x, y) = wave(200);
        let variance = mean_squared_error(&y.view(), &Array1::from_elem(200, mean(&y.view())));

        let mut model = HistGradientBoostingRegressor::new(HistGradientBoostingConfig::default());
        model.fit(x.view(), y.view()).unwrap();
        assert!(mse(&model, &x, &y) < 0.1 * variance);
    }

    #[test]
    fn test_hist_boosting_small_data_stays_at_mean() {
        // 30 rows cannot make two leaves of 20
        let (x, y) = wave(30);
        let mut model = HistGradientBoostingRegressor::new(HistGradientBoostingConfig::default());
        model.fit(x.view(), y.view()).unwrap();
        let predictions = model.predict(x.view()).unwrap();
        let expected = mean(&y.view());
        assert!(predictions.iter().all(|p| (p - expected).abs() < 1e-12));
    }

    #[test]
    fn test_raw_and_binned_predictions_agree() {
        let (x, y) = wave(120);
        let mut model = HistGradientBoostingRegressor::new(HistGradientBoostingConfig {
            max_iter: 10,
            min_samples_leaf: 5,
            ..Default::default()
        });
        model.fit(x.view(), y.view()).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(73);
        let binner = FeatureBinner::fit(&x.view(), MAX_BINS, &mut rng).unwrap();
        let binned = binner.transform(&x.view());
        let predictions = model.predict(x.view()).unwrap();
        for (i, row) in binned.rows().into_iter().enumerate() {
            let via_bins = model
                .trees
                .iter()
                .fold(model.baseline, |acc, tree| acc + tree.predict_binned(row));
            assert!((via_bins - predictions[i]).abs() < 1e-12);
        }
    }
}
