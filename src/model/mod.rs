//! Regression models
//!
//! Tree ensembles and a linear baseline behind one [`Regressor`] trait:
//! - `tree`: CART regression tree with best or random thresholds
//! - `forest`: bagged forests (random forest, extra trees)
//! - `histogram`: binned features and best-first histogram trees
//! - `boosting`: exact and histogram gradient boosting
//! - `linear`: elastic net by coordinate descent

pub mod boosting;
pub mod forest;
pub mod histogram;
pub mod linear;
pub mod tree;

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use boosting::{
    GradientBoostingConfig, GradientBoostingRegressor, HistGradientBoostingConfig,
    HistGradientBoostingRegressor,
};
pub use forest::{ExtraTreesConfig, ForestRegressor, RandomForestConfig};
pub use linear::{ElasticNet, ElasticNetConfig};
pub use tree::{RegressionTree, Splitter, TreeParams};

/// Errors raised while fitting or applying a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model has not been fitted yet")]
    NotFitted,

    #[error("Invalid parameter {param}: {reason}")]
    InvalidParameter { param: &'static str, reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("Non-finite value: {0}")]
    NonFinite(String),
}

/// A regressor trained on a dense feature matrix
pub trait Regressor: Send + Sync + fmt::Debug {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), ModelError>;

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError>;
}

/// Shared input checks for every `fit`
pub(crate) fn check_training_data(
    x: &ArrayView2<f64>,
    y: &ArrayView1<f64>,
) -> Result<(), ModelError> {
    if x.nrows() == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    if y.len() != x.nrows() {
        return Err(ModelError::DimensionMismatch {
            expected: x.nrows(),
            got: y.len(),
        });
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite("feature matrix".to_string()));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite("target".to_string()));
    }
    Ok(())
}

/// Column count check for `predict`
pub(crate) fn check_features(expected: usize, x: &ArrayView2<f64>) -> Result<(), ModelError> {
    if x.ncols() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            got: x.ncols(),
        });
    }
    Ok(())
}

pub(crate) fn invalid(param: &'static str, reason: impl Into<String>) -> ModelError {
    ModelError::InvalidParameter {
        param,
        reason: reason.into(),
    }
}

/// Structured regressor configuration, tagged by `kind` in config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressorConfig {
    HistGradientBoosting(HistGradientBoostingConfig),
    GradientBoosting(GradientBoostingConfig),
    RandomForest(RandomForestConfig),
    ExtraTrees(ExtraTreesConfig),
    ElasticNet(ElasticNetConfig),
}

impl RegressorConfig {
    /// Fresh, unfitted regressor for this configuration
    ///
    /// Hyperparameters are validated when the model is fitted, so a bad
    /// configuration surfaces as that candidate's fit error.
    pub fn build(&self) -> Box<dyn Regressor> {
        match self {
            RegressorConfig::HistGradientBoosting(c) => {
                Box::new(HistGradientBoostingRegressor::new(c.clone()))
            }
            RegressorConfig::GradientBoosting(c) => {
                Box::new(GradientBoostingRegressor::new(c.clone()))
            }
            RegressorConfig::RandomForest(c) => Box::new(ForestRegressor::random_forest(c.clone())),
            RegressorConfig::ExtraTrees(c) => Box::new(ForestRegressor::extra_trees(c.clone())),
            RegressorConfig::ElasticNet(c) => Box::new(ElasticNet::new(c.clone())),
        }
    }

    /// Short family name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            RegressorConfig::HistGradientBoosting(_) => "hist_gradient_boosting",
            RegressorConfig::GradientBoosting(_) => "gradient_boosting",
            RegressorConfig::RandomForest(_) => "random_forest",
            RegressorConfig::ExtraTrees(_) => "extra_trees",
            RegressorConfig::ElasticNet(_) => "elastic_net",
        }
    }
}
