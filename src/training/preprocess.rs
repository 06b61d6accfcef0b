//! Model inputs and the shared column transformer
//!
//! Categorical columns are one-hot encoded against the categories seen at
//! fit time; a category first met at transform time encodes as all zeros.
//! Numeric columns pass through unchanged after the one-hot blocks.

use ndarray::{Array1, Array2, Axis};
use std::collections::BTreeSet;

use crate::data::schema;
use crate::features::FeatureFrame;
use crate::{HockeyError, Result, Stage};

/// Feature columns for a set of rows, before encoding
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    categorical_names: Vec<String>,
    categorical: Vec<Vec<String>>,
    numeric_names: Vec<String>,
    numeric: Array2<f64>,
}

impl FeatureSet {
    /// Assemble from named columns; all columns must have the same length
    pub fn new(
        categorical: Vec<(String, Vec<String>)>,
        numeric: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let n_rows = categorical
            .first()
            .map(|(_, c)| c.len())
            .or_else(|| numeric.first().map(|(_, c)| c.len()))
            .unwrap_or(0);

        let check = |name: &str, len: usize| {
            if len == n_rows {
                Ok(())
            } else {
                Err(HockeyError::LengthMismatch {
                    column: name.to_string(),
                    expected: n_rows,
                    got: len,
                })
            }
        };
        for (name, values) in &categorical {
            check(name, values.len())?;
        }
        for (name, values) in &numeric {
            check(name, values.len())?;
        }

        let (categorical_names, categorical): (Vec<String>, Vec<Vec<String>>) =
            categorical.into_iter().unzip();
        let numeric_names: Vec<String> = numeric.iter().map(|(n, _)| n.clone()).collect();
        let numeric = Array2::from_shape_fn((n_rows, numeric_names.len()), |(i, j)| numeric[j].1[i]);

        Ok(FeatureSet {
            categorical_names,
            categorical,
            numeric_names,
            numeric,
        })
    }

    /// Model features and the rolling xGD target of a built frame
    pub fn from_frame(frame: &FeatureFrame) -> Result<(FeatureSet, Array1<f64>)> {
        let mut categorical = Vec::with_capacity(schema::CATEGORICAL_FEATURES.len());
        for name in schema::CATEGORICAL_FEATURES {
            let labels = frame.categorical(name).ok_or_else(|| HockeyError::MissingColumn {
                column: name.to_string(),
                stage: Stage::ModelFeatures,
            })?;
            categorical.push((
                name.to_string(),
                labels.into_iter().map(str::to_string).collect(),
            ));
        }

        let mut numeric = Vec::with_capacity(schema::NUMERIC_FEATURES.len());
        for name in schema::NUMERIC_FEATURES {
            let values = frame.table().numeric_column(name, Stage::ModelFeatures)?;
            numeric.push((name.to_string(), values));
        }

        let features = FeatureSet::new(categorical, numeric)?;
        let target = Array1::from(frame.xgd_shift().to_vec());
        Ok((features, target))
    }

    pub fn n_rows(&self) -> usize {
        self.numeric.nrows()
    }

    pub fn categorical_names(&self) -> &[String] {
        &self.categorical_names
    }

    pub fn numeric_names(&self) -> &[String] {
        &self.numeric_names
    }

    pub fn categorical_column(&self, index: usize) -> &[String] {
        &self.categorical[index]
    }

    pub fn numeric(&self) -> &Array2<f64> {
        &self.numeric
    }

    /// Copy of the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> FeatureSet {
        FeatureSet {
            categorical_names: self.categorical_names.clone(),
            categorical: self
                .categorical
                .iter()
                .map(|column| rows.iter().map(|&i| column[i].clone()).collect())
                .collect(),
            numeric_names: self.numeric_names.clone(),
            numeric: self.numeric.select(Axis(0), rows),
        }
    }
}

/// One-hot blocks for categorical columns, numeric columns appended as-is
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Preprocessor {
    categorical_names: Vec<String>,
    numeric_names: Vec<String>,
    /// Sorted categories per categorical column
    categories: Vec<Vec<String>>,
    fitted: bool,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }

    pub fn fit(&mut self, features: &FeatureSet) -> Result<()> {
        if features.n_rows() == 0 {
            return Err(HockeyError::InsufficientData(
                "cannot fit the preprocessor on zero rows".to_string(),
            ));
        }
        self.categorical_names = features.categorical_names.clone();
        self.numeric_names = features.numeric_names.clone();
        self.categories = features
            .categorical
            .iter()
            .map(|column| {
                column
                    .iter()
                    .cloned()
                    .collect::<BTreeSet<String>>()
                    .into_iter()
                    .collect()
            })
            .collect();
        self.fitted = true;
        Ok(())
    }

    /// Width of the encoded matrix
    pub fn n_outputs(&self) -> usize {
        self.categories.iter().map(Vec::len).sum::<usize>() + self.numeric_names.len()
    }

    /// Encoded column names, e.g. `entry_type=NEUTRAL`
    pub fn output_names(&self) -> Vec<String> {
        self.categorical_names
            .iter()
            .zip(&self.categories)
            .flat_map(|(name, cats)| cats.iter().map(move |c| format!("{}={}", name, c)))
            .chain(self.numeric_names.iter().cloned())
            .collect()
    }

    pub fn transform(&self, features: &FeatureSet) -> Result<Array2<f64>> {
        if !self.fitted {
            return Err(HockeyError::Model(crate::model::ModelError::NotFitted));
        }
        if features.categorical_names != self.categorical_names
            || features.numeric_names != self.numeric_names
        {
            return Err(HockeyError::Config(format!(
                "feature columns {:?} + {:?} do not match the fitted {:?} + {:?}",
                features.categorical_names,
                features.numeric_names,
                self.categorical_names,
                self.numeric_names
            )));
        }

        let n_rows = features.n_rows();
        let mut encoded = Array2::zeros((n_rows, self.n_outputs()));
        let mut offset = 0;

        for (column, categories) in features.categorical.iter().zip(&self.categories) {
            for (row, label) in column.iter().enumerate() {
                if let Ok(position) = categories.binary_search(label) {
                    encoded[[row, offset + position]] = 1.0;
                }
            }
            offset += categories.len();
        }

        for (j, values) in features.numeric.columns().into_iter().enumerate() {
            encoded.column_mut(offset + j).assign(&values);
        }

        Ok(encoded)
    }

    pub fn fit_transform(&mut self, features: &FeatureSet) -> Result<Array2<f64>> {
        self.fit(features)?;
        self.transform(features)
    }
}
