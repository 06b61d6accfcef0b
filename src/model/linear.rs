//! Elastic net regression
//!
//! Minimizes
//!
//! ```text
//! 1/(2n) ||y - Xw - b||² + alpha * l1_ratio * ||w||₁ + alpha * (1 - l1_ratio) / 2 * ||w||²
//! ```
//!
//! by cyclic coordinate descent on centered data, stopping when the
//! duality gap falls below `tol * ||y - mean(y)||²`.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::{check_features, check_training_data, invalid, ModelError, Regressor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticNetConfig {
    pub alpha: f64,
    /// 1.0 is the lasso, 0.0 is ridge
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub fit_intercept: bool,
}

impl Default for ElasticNetConfig {
    fn default() -> Self {
        ElasticNetConfig {
            alpha: 0.001,
            l1_ratio: 0.5,
            max_iter: 2000,
            tol: 1e-4,
            fit_intercept: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElasticNet {
    config: ElasticNetConfig,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    n_iter: usize,
}

fn soft_threshold(x: f64, lambda: f64) -> f64 {
    if x > lambda {
        x - lambda
    } else if x < -lambda {
        x + lambda
    } else {
        0.0
    }
}

impl ElasticNet {
    pub fn new(config: ElasticNetConfig) -> Self {
        ElasticNet {
            config,
            coefficients: None,
            intercept: 0.0,
            n_iter: 0,
        }
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Coordinate sweeps run by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn validate(&self) -> Result<(), ModelError> {
        let c = &self.config;
        if !(c.alpha.is_finite() && c.alpha >= 0.0) {
            return Err(invalid("alpha", format!("must be non-negative, got {}", c.alpha)));
        }
        if !(0.0..=1.0).contains(&c.l1_ratio) {
            return Err(invalid("l1_ratio", format!("must be in [0, 1], got {}", c.l1_ratio)));
        }
        if c.max_iter == 0 {
            return Err(invalid("max_iter", "must be at least 1"));
        }
        if !(c.tol.is_finite() && c.tol >= 0.0) {
            return Err(invalid("tol", format!("must be non-negative, got {}", c.tol)));
        }
        Ok(())
    }
}

/// Duality gap of the elastic-net problem scaled by n
fn duality_gap(
    x: &ArrayView2<f64>,
    y: &ArrayView1<f64>,
    w: &Array1<f64>,
    residual: &Array1<f64>,
    l1_reg: f64,
    l2_reg: f64,
) -> f64 {
    let xt_r = x.t().dot(residual) - &(w * l2_reg);
    let dual_norm = xt_r.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let r_norm2 = residual.dot(residual);
    let w_norm2 = w.dot(w);

    let (scale, mut gap) = if dual_norm > l1_reg {
        let scale = l1_reg / dual_norm;
        (scale, 0.5 * (r_norm2 + r_norm2 * scale * scale))
    } else {
        (1.0, r_norm2)
    };

    let l1_norm: f64 = w.iter().map(|v| v.abs()).sum();
    gap += l1_reg * l1_norm - scale * residual.dot(y) + 0.5 * l2_reg * (1.0 + scale * scale) * w_norm2;
    gap
}

impl Regressor for ElasticNet {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), ModelError> {
        self.validate()?;
        check_training_data(&x, &y)?;

        let n_features = x.ncols();
        let (x_mean, y_mean) = if self.config.fit_intercept {
            let x_mean = x.mean_axis(Axis(0)).ok_or(ModelError::EmptyTrainingSet)?;
            let y_mean = y.mean().ok_or(ModelError::EmptyTrainingSet)?;
            (x_mean, y_mean)
        } else {
            (Array1::zeros(n_features), 0.0)
        };
        let xc = &x - &x_mean;
        let yc = &y - y_mean;

        let n = x.nrows() as f64;
        let l1_reg = self.config.alpha * self.config.l1_ratio * n;
        let l2_reg = self.config.alpha * (1.0 - self.config.l1_ratio) * n;
        let col_norms: Vec<f64> = xc.columns().into_iter().map(|c| c.dot(&c)).collect();
        let tol = self.config.tol * yc.dot(&yc);

        let mut w: Array1<f64> = Array1::zeros(n_features);
        let mut residual = yc.clone();
        let mut converged = false;
        self.n_iter = self.config.max_iter;

        for iter in 0..self.config.max_iter {
            let mut w_max = 0.0_f64;
            let mut d_w_max = 0.0_f64;

            for j in 0..n_features {
                if col_norms[j] == 0.0 {
                    continue;
                }
                let column = xc.column(j);
                let w_old = w[j];
                if w_old != 0.0 {
                    residual.scaled_add(w_old, &column);
                }

                let rho = column.dot(&residual);
                w[j] = soft_threshold(rho, l1_reg) / (col_norms[j] + l2_reg);

                if w[j] != 0.0 {
                    residual.scaled_add(-w[j], &column);
                }
                d_w_max = d_w_max.max((w[j] - w_old).abs());
                w_max = w_max.max(w[j].abs());
            }

            let last = iter + 1 == self.config.max_iter;
            if w_max == 0.0 || d_w_max / w_max < self.config.tol || last {
                let gap = duality_gap(&xc.view(), &yc.view(), &w, &residual, l1_reg, l2_reg);
                if gap <= tol {
                    converged = true;
                    self.n_iter = iter + 1;
                    break;
                }
            }
        }

        if !converged {
            log::warn!(
                "Elastic net did not converge in {} iterations (alpha {}, l1_ratio {})",
                self.config.max_iter,
                self.config.alpha,
                self.config.l1_ratio
            );
        }
        if w.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite("elastic net coefficients".to_string()));
        }

        self.intercept = y_mean - x_mean.dot(&w);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        let w = self.coefficients.as_ref().ok_or(ModelError::NotFitted)?;
        check_features(w.len(), &x)?;
        Ok(x.dot(w) + self.intercept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                ((i * 11) % 7) as f64
            }
        });
        let y = x.column(0).mapv(|v| 3.0 * v) - x.column(1).mapv(|v| 2.0 * v) + 5.0;
        (x, y)
    }

    #[test]
    fn test_small_penalty_recovers_coefficients() {
        let (x, y) = linear_data();
        let mut model = ElasticNet::new(ElasticNetConfig {
            alpha: 1e-6,
            tol: 1e-10,
            max_iter: 10_000,
            ..Default::default()
        });
        model.fit(x.view(), y.view()).unwrap();

        let w = model.coefficients().unwrap();
        assert!((w[0] - 3.0).abs() < 1e-3, "{}", w[0]);
        assert!((w[1] + 2.0).abs() < 1e-3, "{}", w[1]);
        assert!((model.intercept() - 5.0).abs() < 1e-2);
    }

    #[test]
    fn test_default_penalty_fits_closely() {
        let (x, y) = linear_data();
        let mut model = ElasticNet::new(ElasticNetConfig::default());
        model.fit(x.view(), y.view()).unwrap();
        let predictions = model.predict(x.view()).unwrap();
        let worst = predictions
            .iter()
            .zip(y.iter())
            .fold(0.0_f64, |m, (p, t)| m.max((p - t).abs()));
        assert!(worst < 0.5, "{}", worst);
        assert!(model.n_iter() <= 2000);
    }

    #[test]
    fn test_large_l1_penalty_zeroes_coefficients() {
        let (x, y) = linear_data();
        let mut model = ElasticNet::new(ElasticNetConfig {
            alpha: 1e6,
            l1_ratio: 1.0,
            ..Default::default()
        });
        model.fit(x.view(), y.view()).unwrap();
        assert!(model.coefficients().unwrap().iter().all(|&w| w == 0.0));

        let mean = y.mean().unwrap();
        let predictions = model.predict(x.view()).unwrap();
        assert!(predictions.iter().all(|p| (p - mean).abs() < 1e-9));
    }

    #[test]
    fn test_constant_column_gets_zero_weight() {
        let x = array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0], [4.0, 7.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut model = ElasticNet::new(ElasticNetConfig::default());
        model.fit(x.view(), y.view()).unwrap();
        assert_eq!(model.coefficients().unwrap()[1], 0.0);
    }

    #[test]
    fn test_invalid_config_and_unfitted() {
        let (x, y) = linear_data();
        let mut model = ElasticNet::new(ElasticNetConfig {
            l1_ratio: 1.5,
            ..Default::default()
        });
        assert!(matches!(
            model.fit(x.view(), y.view()),
            Err(ModelError::InvalidParameter { param: "l1_ratio", .. })
        ));
        assert!(matches!(model.predict(x.view()), Err(ModelError::NotFitted)));
    }

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(5.0, 2.0), 3.0);
        assert_eq!(soft_threshold(-5.0, 2.0), -3.0);
        assert_eq!(soft_threshold(1.0, 2.0), 0.0);
    }
}
