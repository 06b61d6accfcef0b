//! Model selection
//!
//! Shared preprocessing, cross-validation splits, scoring and the
//! candidate selection routine.

pub mod cross_validation;
pub mod metrics;
pub mod pipeline;
pub mod preprocess;
pub mod selection;

pub use cross_validation::{k_fold, train_test_split, Split};
pub use metrics::r2_score;
pub use pipeline::Pipeline;
pub use preprocess::{FeatureSet, Preprocessor};
pub use selection::{
    default_candidates, select_model, CandidateOutcome, CandidateResult, CvScore,
    SelectionOutcome, SelectionReport,
};
