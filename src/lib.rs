//! Hockey shot analytics
//!
//! Turns shot-level event records into a model-ready feature frame and
//! selects the best regressor for the rolling expected-goal differential.

pub mod data;
pub mod features;
pub mod model;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::features::RowOrder;
use crate::model::{ModelError, RegressorConfig};

/// Pipeline stage that requested a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Coordinates,
    HomeIndicator,
    ZoneAndEntry,
    Manpower,
    ExpectedGoals,
    ModelFeatures,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Coordinates => write!(f, "coordinate normalization"),
            Stage::HomeIndicator => write!(f, "home indicator"),
            Stage::ZoneAndEntry => write!(f, "zone/entry classification"),
            Stage::Manpower => write!(f, "manpower classification"),
            Stage::ExpectedGoals => write!(f, "expected-goal differential"),
            Stage::ModelFeatures => write!(f, "model feature extraction"),
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum HockeyError {
    #[error("Missing column '{column}' required by {stage}")]
    MissingColumn { column: String, stage: Stage },

    #[error("No coordinate columns resolved: tried {tried}")]
    UnresolvedCoordinates { tried: String },

    #[error("Invalid value {value:?} in column '{column}' at row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Column '{column}' has {got} values, table has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("Unmatched team side {value:?} at row {row}")]
    UnmatchedTeamSide { row: usize, value: String },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Every candidate failed during cross-validation")]
    NoViableCandidate,

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HockeyError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Season shot file deposited by the download step
    pub shots_path: String,
    /// Season key, e.g. 20232024 for 2023-24
    pub season: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            shots_path: "data/raw/shots_20232024.csv".to_string(),
            season: "20232024".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Trailing window (in events) for the rolling xGD sum
    pub rolling_window: usize,
    pub row_order: RowOrder,
    /// Reject team-side values other than HOME/AWAY instead of treating them as away
    pub strict_team_side: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            rolling_window: 25,
            row_order: RowOrder::Input,
            strict_team_side: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub cv_folds: usize,
    /// Fraction of rows held out for the final generalization score
    pub test_size: f64,
    pub random_state: u64,
    /// Replaces the default candidate pool when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<CandidateConfig>>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            cv_folds: 5,
            test_size: 0.20,
            random_state: 73,
            candidates: None,
        }
    }
}

/// A named regressor configuration in the candidate pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub name: String,
    pub regressor: RegressorConfig,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HockeyError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| HockeyError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HockeyError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.features.rolling_window == 0 {
            return Err(HockeyError::Config(
                "features.rolling_window must be at least 1".to_string(),
            ));
        }
        if self.selection.cv_folds < 2 {
            return Err(HockeyError::Config(
                "selection.cv_folds must be at least 2".to_string(),
            ));
        }
        if !(self.selection.test_size > 0.0 && self.selection.test_size < 1.0) {
            return Err(HockeyError::Config(format!(
                "selection.test_size must be in (0, 1), got {}",
                self.selection.test_size
            )));
        }
        if let Some(candidates) = &self.selection.candidates {
            if candidates.is_empty() {
                return Err(HockeyError::Config(
                    "selection.candidates must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
