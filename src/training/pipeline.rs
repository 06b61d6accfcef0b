//! Preprocessor plus regressor, fitted and applied as one unit

use ndarray::{Array1, ArrayView1};

use super::metrics::r2_score;
use super::preprocess::{FeatureSet, Preprocessor};
use crate::model::{ModelError, Regressor, RegressorConfig};
use crate::Result;

/// A candidate regressor behind the shared column transformer
///
/// This is the artifact handed to persistence: `predict` accepts rows
/// with the same feature columns it was fitted on.
#[derive(Debug)]
pub struct Pipeline {
    config: RegressorConfig,
    preprocessor: Preprocessor,
    regressor: Box<dyn Regressor>,
    fitted: bool,
}

impl Pipeline {
    pub fn new(config: &RegressorConfig) -> Self {
        Pipeline {
            config: config.clone(),
            preprocessor: Preprocessor::new(),
            regressor: config.build(),
            fitted: false,
        }
    }

    pub fn config(&self) -> &RegressorConfig {
        &self.config
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Fit the encoder and the regressor on the same rows
    pub fn fit(&mut self, features: &FeatureSet, target: ArrayView1<f64>) -> Result<()> {
        self.fitted = false;
        let encoded = self.preprocessor.fit_transform(features)?;
        self.regressor.fit(encoded.view(), target)?;
        self.fitted = true;
        Ok(())
    }

    pub fn predict(&self, features: &FeatureSet) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(ModelError::NotFitted.into());
        }
        let encoded = self.preprocessor.transform(features)?;
        Ok(self.regressor.predict(encoded.view())?)
    }

    /// R² of the fitted pipeline on the given rows
    pub fn score(&self, features: &FeatureSet, target: ArrayView1<f64>) -> Result<f64> {
        let predictions = self.predict(features)?;
        r2_score(target, predictions.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::strings;
    use crate::model::ElasticNetConfig;
    use crate::HockeyError;

    fn features() -> (FeatureSet, Array1<f64>) {
        let zones = ["ATTACK", "DEFEND", "ATTACK", "DEFEND", "ATTACK", "DEFEND"];
        let distance = vec![10.0, 40.0, 12.0, 38.0, 9.0, 45.0];
        let set = FeatureSet::new(
            vec![("offensive_zone".to_string(), strings(&zones))],
            vec![("shotDistance".to_string(), distance.clone())],
        )
        .unwrap();
        // Target is 1 in the attacking zone, -1 otherwise
        let target = zones
            .iter()
            .map(|z| if *z == "ATTACK" { 1.0 } else { -1.0 })
            .collect();
        (set, target)
    }

    #[test]
    fn test_fit_predict_score() {
        let (set, target) = features();
        let mut pipeline = Pipeline::new(&RegressorConfig::ElasticNet(ElasticNetConfig {
            alpha: 1e-6,
            ..Default::default()
        }));
        pipeline.fit(&set, target.view()).unwrap();

        assert!(pipeline.is_fitted());
        assert_eq!(pipeline.preprocessor().n_outputs(), 3);
        assert!(pipeline.score(&set, target.view()).unwrap() > 0.99);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let (set, _) = features();
        let pipeline = Pipeline::new(&RegressorConfig::ElasticNet(ElasticNetConfig::default()));
        assert!(matches!(
            pipeline.predict(&set),
            Err(HockeyError::Model(ModelError::NotFitted))
        ));
    }

    #[test]
    fn test_failed_fit_leaves_pipeline_unfitted() {
        let (set, target) = features();
        let mut pipeline = Pipeline::new(&RegressorConfig::ElasticNet(ElasticNetConfig {
            alpha: -1.0,
            ..Default::default()
        }));
        assert!(pipeline.fit(&set, target.view()).is_err());
        assert!(!pipeline.is_fitted());
    }
}
