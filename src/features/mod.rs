//! Feature derivation
//!
//! Turns raw shot events into categorical and numeric model features:
//! coordinate aliasing, shooting side, zone and entry classification,
//! manpower situation and the rolling expected-goal differential.

pub mod coords;
pub mod frame;
pub mod manpower;
pub mod xgd;
pub mod zone;

pub use coords::Side;
pub use frame::{build_feature_frame, FeatureFrame, FeatureSummary, RowOrder};
pub use manpower::ManpowerSituation;
pub use xgd::GameKey;
pub use zone::{EntryType, OffensiveZone};
