//! Candidate pool, cross-validated scoring and hold-out refit
//!
//! Every candidate is scored with the same unshuffled k-fold splits. The
//! highest mean R² wins and earlier candidates win ties. A candidate whose
//! fit fails on any fold is reported as failed, never as a score.

use ndarray::{Array1, ArrayView1, Axis};
use rayon::prelude::*;
use serde::Serialize;

use super::cross_validation::{k_fold, train_test_split, Split};
use super::metrics::{mean, std_dev};
use super::pipeline::Pipeline;
use super::preprocess::FeatureSet;
use crate::model::{
    ElasticNetConfig, ExtraTreesConfig, GradientBoostingConfig, HistGradientBoostingConfig,
    RandomForestConfig, RegressorConfig,
};
use crate::{CandidateConfig, HockeyError, Result, SelectionConfig};

/// The default pool, in tie-break order
pub fn default_candidates(seed: u64) -> Vec<CandidateConfig> {
    vec![
        CandidateConfig {
            name: "HGBR".to_string(),
            regressor: RegressorConfig::HistGradientBoosting(HistGradientBoostingConfig {
                random_state: seed,
                ..Default::default()
            }),
        },
        CandidateConfig {
            name: "GBR".to_string(),
            regressor: RegressorConfig::GradientBoosting(GradientBoostingConfig {
                random_state: seed,
                ..Default::default()
            }),
        },
        CandidateConfig {
            name: "RF".to_string(),
            regressor: RegressorConfig::RandomForest(RandomForestConfig {
                random_state: seed,
                ..Default::default()
            }),
        },
        CandidateConfig {
            name: "ET".to_string(),
            regressor: RegressorConfig::ExtraTrees(ExtraTreesConfig {
                random_state: seed,
                ..Default::default()
            }),
        },
        CandidateConfig {
            name: "ElasticNet".to_string(),
            regressor: RegressorConfig::ElasticNet(ElasticNetConfig::default()),
        },
    ]
}

/// Configured pool, or the default pool seeded with `random_state`
pub fn candidate_pool(config: &SelectionConfig) -> Vec<CandidateConfig> {
    config
        .candidates
        .clone()
        .unwrap_or_else(|| default_candidates(config.random_state))
}

/// Cross-validation summary of one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvScore {
    pub mean: f64,
    /// Population standard deviation of the fold scores
    pub std: f64,
    pub fold_scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOutcome {
    Scored(CvScore),
    Failed(String),
}

impl CandidateOutcome {
    pub fn mean_score(&self) -> Option<f64> {
        match self {
            CandidateOutcome::Scored(score) => Some(score.mean),
            CandidateOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    pub name: String,
    pub kind: String,
    pub outcome: CandidateOutcome,
}

fn fold_score(
    config: &RegressorConfig,
    features: &FeatureSet,
    target: &ArrayView1<f64>,
    split: &Split,
) -> Result<f64> {
    let mut pipeline = Pipeline::new(config);
    pipeline.fit(
        &features.select_rows(&split.train),
        target.select(Axis(0), &split.train).view(),
    )?;
    pipeline.score(
        &features.select_rows(&split.test),
        target.select(Axis(0), &split.test).view(),
    )
}

/// Score one candidate on precomputed folds
pub fn cross_validate(
    candidate: &CandidateConfig,
    features: &FeatureSet,
    target: ArrayView1<f64>,
    folds: &[Split],
) -> CandidateOutcome {
    let scores: Result<Vec<f64>> = folds
        .par_iter()
        .map(|split| fold_score(&candidate.regressor, features, &target, split))
        .collect();

    match scores {
        Ok(scores) if scores.iter().all(|s| s.is_finite()) => CandidateOutcome::Scored(CvScore {
            mean: mean(&scores),
            std: std_dev(&scores),
            fold_scores: scores,
        }),
        Ok(_) => CandidateOutcome::Failed("non-finite fold score".to_string()),
        Err(e) => CandidateOutcome::Failed(e.to_string()),
    }
}

/// Cross-validate every candidate on the same k folds
pub fn score_models(
    candidates: &[CandidateConfig],
    features: &FeatureSet,
    target: ArrayView1<f64>,
    n_folds: usize,
) -> Result<Vec<CandidateResult>> {
    if target.len() != features.n_rows() {
        return Err(HockeyError::LengthMismatch {
            column: "target".to_string(),
            expected: features.n_rows(),
            got: target.len(),
        });
    }
    let folds = k_fold(features.n_rows(), n_folds)?;

    let results = candidates
        .iter()
        .map(|candidate| {
            let outcome = cross_validate(candidate, features, target, &folds);
            match &outcome {
                CandidateOutcome::Scored(score) => log::info!(
                    "{}: R² = {:.4} ± {:.4}",
                    candidate.name,
                    score.mean,
                    score.std
                ),
                CandidateOutcome::Failed(reason) => {
                    log::warn!("{}: failed during cross-validation: {}", candidate.name, reason)
                }
            }
            CandidateResult {
                name: candidate.name.clone(),
                kind: candidate.regressor.kind().to_string(),
                outcome,
            }
        })
        .collect();

    Ok(results)
}

/// Index of the highest mean score; the first of equal scores wins
pub fn select_best(results: &[CandidateResult]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, result) in results.iter().enumerate() {
        if let Some(score) = result.outcome.mean_score() {
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }
    }
    best.map(|(i, _)| i)
}

/// Everything a caller reports about a selection run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionReport {
    pub results: Vec<CandidateResult>,
    pub selected: String,
    pub holdout_r2: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Report plus the selected pipeline refitted on the training split
#[derive(Debug)]
pub struct SelectionOutcome {
    pub report: SelectionReport,
    pub pipeline: Pipeline,
}

/// Score the pool, pick the best candidate and measure it on a hold-out split
pub fn select_model(
    features: &FeatureSet,
    target: ArrayView1<f64>,
    config: &SelectionConfig,
) -> Result<SelectionOutcome> {
    let candidates = candidate_pool(config);
    log::info!(
        "Scoring {} candidates with {}-fold cross-validation on {} rows",
        candidates.len(),
        config.cv_folds,
        features.n_rows()
    );

    let results = score_models(&candidates, features, target, config.cv_folds)?;
    let best = select_best(&results).ok_or(HockeyError::NoViableCandidate)?;
    let chosen = &candidates[best];
    log::info!("Selected {}", chosen.name);

    let split = train_test_split(features.n_rows(), config.test_size, config.random_state)?;
    let mut pipeline = Pipeline::new(&chosen.regressor);
    let train_target: Array1<f64> = target.select(Axis(0), &split.train);
    pipeline.fit(&features.select_rows(&split.train), train_target.view())?;
    let holdout_r2 = pipeline.score(
        &features.select_rows(&split.test),
        target.select(Axis(0), &split.test).view(),
    )?;
    log::info!("{} hold-out R² = {:.4}", chosen.name, holdout_r2);

    Ok(SelectionOutcome {
        report: SelectionReport {
            results,
            selected: chosen.name.clone(),
            holdout_r2,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
        },
        pipeline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::strings;

    /// Target driven by zone and distance plus a small periodic wobble
    fn synthetic(n: usize) -> (FeatureSet, Array1<f64>) {
        let zones: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "ATTACK" } else { "DEFEND" }).collect();
        let entries: Vec<&str> = (0..n)
            .map(|i| ["CONTROLLED", "NEUTRAL", "OTHER"][i % 3])
            .collect();
        let distance: Vec<f64> = (0..n).map(|i| ((i * 7) % 40) as f64 + 5.0).collect();
        let period: Vec<f64> = (0..n).map(|i| (i % 3 + 1) as f64).collect();

        let target = (0..n)
            .map(|i| {
                let zone = if i % 2 == 0 { 0.4 } else { -0.4 };
                zone - 0.01 * distance[i] + 0.02 * ((i % 5) as f64)
            })
            .collect();

        let set = FeatureSet::new(
            vec![
                ("entry_type".to_string(), strings(&entries)),
                ("offensive_zone".to_string(), strings(&zones)),
            ],
            vec![
                ("shotDistance".to_string(), distance),
                ("period".to_string(), period),
            ],
        )
        .unwrap();
        (set, target)
    }

    fn small_pool() -> Vec<CandidateConfig> {
        vec![
            CandidateConfig {
                name: "GBR".to_string(),
                regressor: RegressorConfig::GradientBoosting(GradientBoostingConfig {
                    n_estimators: 30,
                    ..Default::default()
                }),
            },
            CandidateConfig {
                name: "RF".to_string(),
                regressor: RegressorConfig::RandomForest(RandomForestConfig {
                    n_estimators: 10,
                    ..Default::default()
                }),
            },
            CandidateConfig {
                name: "ElasticNet".to_string(),
                regressor: RegressorConfig::ElasticNet(ElasticNetConfig::default()),
            },
        ]
    }

    fn selection_config(candidates: Vec<CandidateConfig>) -> SelectionConfig {
        SelectionConfig {
            candidates: Some(candidates),
            ..Default::default()
        }
    }

    fn scored(name: &str, mean: f64) -> CandidateResult {
        CandidateResult {
            name: name.to_string(),
            kind: "test".to_string(),
            outcome: CandidateOutcome::Scored(CvScore {
                mean,
                std: 0.0,
                fold_scores: vec![mean],
            }),
        }
    }

    #[test]
    fn test_default_pool_order_and_seed() {
        let pool = default_candidates(73);
        let names: Vec<&str> = pool.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["HGBR", "GBR", "RF", "ET", "ElasticNet"]);

        match &pool[2].regressor {
            RegressorConfig::RandomForest(c) => {
                assert_eq!(c.n_estimators, 400);
                assert_eq!(c.random_state, 73);
                assert!(c.bootstrap);
            }
            other => panic!("expected random forest, got {:?}", other),
        }
        assert_eq!(candidate_pool(&SelectionConfig::default()), pool);
    }

    #[test]
    fn test_select_best_prefers_first_on_ties() {
        let results = vec![
            scored("A", 0.5),
            scored("B", 0.7),
            scored("C", 0.7),
            CandidateResult {
                name: "D".to_string(),
                kind: "test".to_string(),
                outcome: CandidateOutcome::Failed("boom".to_string()),
            },
        ];
        assert_eq!(select_best(&results), Some(1));
        assert_eq!(select_best(&results[3..]), None);
    }

    #[test]
    fn test_failed_candidate_is_not_a_score() {
        let (features, target) = synthetic(40);
        let pool = vec![
            CandidateConfig {
                name: "Broken".to_string(),
                regressor: RegressorConfig::GradientBoosting(GradientBoostingConfig {
                    learning_rate: -1.0,
                    ..Default::default()
                }),
            },
            CandidateConfig {
                name: "ElasticNet".to_string(),
                regressor: RegressorConfig::ElasticNet(ElasticNetConfig::default()),
            },
        ];

        let results = score_models(&pool, &features, target.view(), 5).unwrap();
        assert!(matches!(results[0].outcome, CandidateOutcome::Failed(_)));
        assert_eq!(results[0].outcome.mean_score(), None);
        assert!(results[1].outcome.mean_score().is_some());
        assert_eq!(select_best(&results), Some(1));
    }

    #[test]
    fn test_all_failed_is_no_viable_candidate() {
        let (features, target) = synthetic(40);
        let config = selection_config(vec![CandidateConfig {
            name: "Broken".to_string(),
            regressor: RegressorConfig::ElasticNet(ElasticNetConfig {
                l1_ratio: 2.0,
                ..Default::default()
            }),
        }]);
        assert!(matches!(
            select_model(&features, target.view(), &config),
            Err(HockeyError::NoViableCandidate)
        ));
    }

    #[test]
    fn test_fold_statistics() {
        let (features, target) = synthetic(50);
        let results = score_models(&small_pool()[2..], &features, target.view(), 5).unwrap();
        match &results[0].outcome {
            CandidateOutcome::Scored(score) => {
                assert_eq!(score.fold_scores.len(), 5);
                assert!((score.mean - mean(&score.fold_scores)).abs() < 1e-15);
                assert!((score.std - std_dev(&score.fold_scores)).abs() < 1e-15);
            }
            other => panic!("expected a score, got {:?}", other),
        }
    }

    #[test]
    fn test_selection_is_deterministic() {
        let (features, target) = synthetic(80);
        let config = selection_config(small_pool());

        let first = select_model(&features, target.view(), &config).unwrap();
        let second = select_model(&features, target.view(), &config).unwrap();

        // Chosen candidate has the highest mean score
        let best = select_best(&first.report.results).unwrap();
        assert_eq!(first.report.selected, first.report.results[best].name);
        for result in &first.report.results {
            assert!(result.outcome.mean_score().unwrap() <= first.report.results[best].outcome.mean_score().unwrap());
        }

        assert_eq!(first.report.selected, second.report.selected);
        assert_eq!(first.report.holdout_r2.to_bits(), second.report.holdout_r2.to_bits());
        assert_eq!(first.report.results, second.report.results);
        assert_eq!(first.report.test_rows, 16);
        assert_eq!(first.report.train_rows, 64);
        assert!(first.pipeline.is_fitted());
    }
}
